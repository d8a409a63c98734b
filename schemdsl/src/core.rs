//! Library entry points shared by the CLI and embedders.
//! Picks a provider for a source file and wraps it in a librarian.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::librarian::Librarian;
use crate::provider::{ProviderError, ProviderRegistry, SchematicProvider, SourceFormat};

#[derive(Debug, thiserror::Error)]
pub enum SchematicError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

/// Options for opening a schematic source.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct OpenOptions {
    /// Source format; `None` picks one from the file extension
    pub format: Option<SourceFormat>,
    /// Page name given to components on a KiCad root sheet
    pub root_page: String,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            format: None,
            root_page: crate::provider::kicad::DEFAULT_ROOT_PAGE.to_string(),
        }
    }
}

/// A librarian over whichever provider the registry picked.
pub type DynLibrarian = Librarian<Box<dyn SchematicProvider + Send>>;

/// Recursively discover schematic sources a provider can read.
pub fn discover_schematic_sources(dir: &Path) -> Result<Vec<PathBuf>, SchematicError> {
    let registry = ProviderRegistry::new();
    let mut files = Vec::new();
    walk_dir(dir, &registry, &mut files, 0)?;
    files.sort();
    Ok(files)
}

fn walk_dir(
    dir: &Path,
    registry: &ProviderRegistry,
    files: &mut Vec<PathBuf>,
    depth: usize,
) -> Result<(), SchematicError> {
    if depth > 20 {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if name.starts_with('.') || name == "node_modules" || name == "target" || name == "build" {
                continue;
            }
            walk_dir(&path, registry, files, depth + 1)?;
        } else if path.is_file() && registry.find_format(&path).is_some() {
            files.push(path);
        }
    }
    Ok(())
}

/// Entry points used by both the CLI and library callers.
pub struct SchematicCore;

impl SchematicCore {
    /// Build a librarian for `path`. Nothing is read until the first query.
    pub fn open(path: &Path, options: &OpenOptions) -> Result<DynLibrarian, SchematicError> {
        if !path.exists() {
            return Err(SchematicError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )));
        }
        let provider = ProviderRegistry::new().open(path, options)?;
        Ok(Librarian::new(provider))
    }

    /// Open every source under `dir`, one librarian each.
    pub fn open_project(
        dir: &Path,
        options: &OpenOptions,
    ) -> Result<Vec<(PathBuf, DynLibrarian)>, SchematicError> {
        discover_schematic_sources(dir)?
            .into_iter()
            .map(|path| {
                let librarian = Self::open(&path, options)?;
                Ok((path, librarian))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_options_from_json() {
        let options: OpenOptions =
            serde_json::from_str(r#"{"format": "kicad-netlist", "root_page": "Top"}"#).unwrap();
        assert_eq!(options.format, Some(SourceFormat::KicadNetlist));
        assert_eq!(options.root_page, "Top");

        let options: OpenOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.format, None);
        assert_eq!(options.root_page, "Root");
    }

    #[test]
    fn test_discover_skips_hidden_and_build_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("hw/power")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::create_dir_all(root.join("target")).unwrap();
        fs::write(root.join("hw/main.json"), "{}").unwrap();
        fs::write(root.join("hw/power/board.net"), "(export)").unwrap();
        fs::write(root.join("hw/notes.txt"), "").unwrap();
        fs::write(root.join(".git/x.json"), "{}").unwrap();
        fs::write(root.join("target/y.net"), "(export)").unwrap();

        let found = discover_schematic_sources(root).unwrap();
        assert_eq!(
            found,
            vec![root.join("hw/main.json"), root.join("hw/power/board.net")]
        );
    }

    #[test]
    fn test_open_missing_file() {
        let result = SchematicCore::open(Path::new("/no/such/design.json"), &OpenOptions::default());
        assert!(matches!(result, Err(SchematicError::Io(_))));
    }

    #[test]
    fn test_open_project() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), r#"{"components": []}"#).unwrap();
        fs::write(dir.path().join("b.net"), "(export (components))").unwrap();

        let mut opened = SchematicCore::open_project(dir.path(), &OpenOptions::default()).unwrap();
        assert_eq!(opened.len(), 2);
        for (_, librarian) in opened.iter_mut() {
            assert_eq!(librarian.stats().unwrap().total_components, 0);
        }
    }
}
