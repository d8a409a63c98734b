//! Schematic Providers
//!
//! This module defines the contract every EDA format adapter implements and
//! the registry used to pick one for a file. Providers ingest raw source data
//! and hand the librarian normalized components and nets.
//!
//! Supported formats:
//! - Altium JSON export (.json)
//! - KiCad netlist export (.net)
//! - KiCad project directory (.kicad_sch sheets + .kicad_pcb board)
//! - In-memory snapshots (tests and embedders)

pub mod altium;
pub mod kicad;
pub mod kicad_project;
pub mod memory;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::OpenOptions;
use crate::model::{Component, Net};

/// Errors raised by providers
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("No data fetched: call fetch_raw_data() before {0}()")]
    NotFetched(&'static str),
}

impl ProviderError {
    /// Ingestion failures come from the source data; the only other kind is
    /// querying a provider that has not fetched yet.
    pub fn is_ingestion(&self) -> bool {
        !matches!(self, ProviderError::NotFetched(_))
    }
}

impl From<crate::parser::ParseError> for ProviderError {
    fn from(e: crate::parser::ParseError) -> Self {
        ProviderError::Parse(e.to_string())
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(e: serde_json::Error) -> Self {
        ProviderError::Parse(e.to_string())
    }
}

/// Contract between format adapters and the librarian.
///
/// `fetch_raw_data` may be called any number of times; each call performs a
/// fresh fetch and replaces the provider's snapshot only once the whole fetch
/// has succeeded. `components` and `nets` read that snapshot without
/// re-fetching and fail with [`ProviderError::NotFetched`] before the first
/// successful fetch.
pub trait SchematicProvider {
    /// Short provider name used in logs
    fn name(&self) -> &str;

    /// Read and normalize the source
    fn fetch_raw_data(&mut self) -> Result<(), ProviderError>;

    /// All components from the last fetch
    fn components(&self) -> Result<Vec<Component>, ProviderError>;

    /// All nets from the last fetch, aggregated from pin connectivity
    fn nets(&self) -> Result<Vec<Net>, ProviderError>;
}

impl<P: SchematicProvider + ?Sized> SchematicProvider for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch_raw_data(&mut self) -> Result<(), ProviderError> {
        (**self).fetch_raw_data()
    }

    fn components(&self) -> Result<Vec<Component>, ProviderError> {
        (**self).components()
    }

    fn nets(&self) -> Result<Vec<Net>, ProviderError> {
        (**self).nets()
    }
}

/// A completed, normalized fetch. Providers build one of these off to the
/// side and swap it in whole.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub components: Vec<Component>,
    pub nets: Vec<Net>,
}

impl Snapshot {
    /// Build a snapshot whose nets are aggregated from the components' pins.
    pub fn from_components(components: Vec<Component>) -> Self {
        let nets = aggregate_nets(&components);
        Self { components, nets }
    }
}

/// Build the net list by grouping every pin on its net. Nets come out in
/// first-seen order; each net's pages are the pages of its member components.
/// Nets without members cannot occur.
pub fn aggregate_nets(components: &[Component]) -> Vec<Net> {
    let mut order: Vec<Net> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for component in components {
        for pin in &component.pins {
            let i = *index.entry(pin.net.as_str()).or_insert_with(|| {
                order.push(Net::new(pin.net.clone()));
                order.len() - 1
            });
            let net = &mut order[i];
            net.members
                .push((component.refdes.clone(), pin.designator.clone()));
            net.pages.insert(component.page.clone());
        }
    }

    order
}

/// Source formats with a shipped provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceFormat {
    AltiumJson,
    KicadNetlist,
    KicadProject,
}

impl SourceFormat {
    /// File extensions this format is recognized by
    pub fn supported_extensions(&self) -> &'static [&'static str] {
        match self {
            SourceFormat::AltiumJson => &["json"],
            SourceFormat::KicadNetlist => &["net"],
            SourceFormat::KicadProject => &[kicad_project::PROJECT_EXTENSION],
        }
    }

    /// Check if a file carries one of this format's extensions. A KiCad
    /// project is also recognized by its directory.
    pub fn can_handle(&self, path: &Path) -> bool {
        if *self == SourceFormat::KicadProject && kicad_project::is_project_dir(path) {
            return true;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.supported_extensions()
                    .iter()
                    .any(|&supported| supported.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    /// Create a provider reading `path`; the file is not touched until the
    /// first fetch.
    pub fn provider_for(
        &self,
        path: &Path,
        options: &OpenOptions,
    ) -> Box<dyn SchematicProvider + Send> {
        match self {
            SourceFormat::AltiumJson => Box::new(altium::AltiumJsonProvider::from_path(path)),
            SourceFormat::KicadNetlist => Box::new(
                kicad::KicadNetlistProvider::from_path(path).with_root_page(&options.root_page),
            ),
            SourceFormat::KicadProject => Box::new(kicad_project::KicadProjectProvider::new(path)),
        }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceFormat::AltiumJson => write!(f, "Altium JSON"),
            SourceFormat::KicadNetlist => write!(f, "KiCad netlist"),
            SourceFormat::KicadProject => write!(f, "KiCad project"),
        }
    }
}

/// Registry of available source formats
pub struct ProviderRegistry {
    formats: Vec<SourceFormat>,
}

impl ProviderRegistry {
    /// Create a new registry with the shipped formats
    pub fn new() -> Self {
        let mut registry = Self {
            formats: Vec::new(),
        };

        registry.register(SourceFormat::AltiumJson);
        registry.register(SourceFormat::KicadNetlist);
        registry.register(SourceFormat::KicadProject);

        registry
    }

    pub fn register(&mut self, format: SourceFormat) {
        if !self.formats.contains(&format) {
            self.formats.push(format);
        }
    }

    /// Find a format that can handle a file
    pub fn find_format(&self, path: &Path) -> Option<SourceFormat> {
        self.formats.iter().copied().find(|f| f.can_handle(path))
    }

    /// Create a provider for `path`, honoring an explicit format in `options`
    /// and otherwise choosing by extension.
    pub fn open(
        &self,
        path: &Path,
        options: &OpenOptions,
    ) -> Result<Box<dyn SchematicProvider + Send>, ProviderError> {
        let format = match options.format {
            Some(format) => format,
            None => self.find_format(path).ok_or_else(|| {
                let ext = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("unknown");
                ProviderError::UnsupportedFormat(format!("No provider for .{} files", ext))
            })?,
        };
        tracing::debug!("Opening {} as {}", path.display(), format);
        Ok(format.provider_for(path, options))
    }

    /// Get all supported file extensions
    pub fn supported_extensions(&self) -> Vec<&str> {
        self.formats
            .iter()
            .flat_map(|f| f.supported_extensions().iter().copied())
            .collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Where a file-backed provider reads from
#[derive(Debug, Clone)]
pub(crate) enum Source {
    Inline(String),
    File(PathBuf),
}

impl Source {
    pub(crate) fn read(&self) -> Result<String, ProviderError> {
        match self {
            Source::Inline(text) => Ok(text.clone()),
            Source::File(path) => Ok(std::fs::read_to_string(path)?),
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Source::Inline(_) => "<inline>".to_string(),
            Source::File(path) => path.display().to_string(),
        }
    }
}

// Re-export providers
pub use altium::AltiumJsonProvider;
pub use kicad::KicadNetlistProvider;
pub use kicad_project::KicadProjectProvider;
pub use memory::MemoryProvider;
