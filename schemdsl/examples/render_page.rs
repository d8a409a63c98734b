//! Render the index and one page of a schematic export.

use schemdsl::prelude::*;
use std::path::Path;

fn main() -> Result<(), SchematicError> {
    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .unwrap_or_else(|| "tests/fixtures/design.json".to_string());
    let path = Path::new(&path);

    if !path.exists() {
        eprintln!("File not found: {}", path.display());
        eprintln!("Usage: cargo run --example render_page [path/to/export] [page]");
        std::process::exit(1);
    }

    let mut librarian = SchematicCore::open(path, &OpenOptions::default())?;
    println!("{}", librarian.index()?);
    println!();

    let page = match args.next() {
        Some(page) => page,
        None => match librarian.pages()?.into_iter().next() {
            Some(page) => page,
            None => return Ok(()),
        },
    };
    println!("{}", librarian.page(&page)?);

    Ok(())
}
