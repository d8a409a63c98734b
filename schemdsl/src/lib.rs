//! schemdsl - Token-efficient schematic views for language models
//!
//! This library normalizes EDA schematic exports into one tool-agnostic
//! model and renders them as a compact, net-centric text DSL: an index of
//! pages and inter-page signals, one page at a time, or a context bubble
//! around a few components.
//!
//! # Quick Start
//!
//! ```no_run
//! use schemdsl::{OpenOptions, SchematicCore};
//! use std::path::Path;
//!
//! let mut librarian =
//!     SchematicCore::open(Path::new("design.json"), &OpenOptions::default()).unwrap();
//!
//! println!("{}", librarian.index().unwrap());
//! println!("{}", librarian.page("Main.SchDoc").unwrap());
//! println!("{}", librarian.context(&["U1"]).unwrap());
//! ```
//!
//! # Features
//!
//! - **Providers**: Altium JSON exports, KiCad netlists and project directories, in-memory data
//! - **Librarian**: lazy fetch, Atlas of net pages, 1-hop context traversal
//! - **DSL**: deterministic output with compressed passives and pin hints

pub mod core;
pub mod dsl;
pub mod graph;
pub mod librarian;
pub mod model;
pub mod parser;
pub mod provider;
pub mod util;

// Re-export main types
pub use crate::core::{discover_schematic_sources, DynLibrarian, OpenOptions, SchematicCore, SchematicError};
pub use librarian::{Librarian, SchematicStats};
pub use model::{Component, ComponentType, Net, Pin};
pub use provider::{
    AltiumJsonProvider, KicadNetlistProvider, KicadProjectProvider, MemoryProvider, ProviderError,
    ProviderRegistry, SchematicProvider, SourceFormat,
};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        Component, Librarian, Net, OpenOptions, Pin, SchematicCore, SchematicError,
        SchematicProvider, SchematicStats,
    };
}
