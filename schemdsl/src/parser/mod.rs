pub mod sexp;

// Re-export for convenience
pub use sexp::{parse, ParseError, SExp, SExpParser};
