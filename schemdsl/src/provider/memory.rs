//! In-memory provider for tests and embedders that already hold normalized
//! data.

use super::{ProviderError, SchematicProvider, Snapshot};
use crate::model::{Component, Net};

/// Serves a fixed component/net list. Every fetch copies the staged data
/// into the served snapshot and bumps `fetch_count`.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    staged: Snapshot,
    snapshot: Option<Snapshot>,
    fail_fetch: bool,
    fetch_count: usize,
}

impl MemoryProvider {
    pub fn new(components: Vec<Component>, nets: Vec<Net>) -> Self {
        Self {
            staged: Snapshot { components, nets },
            ..Default::default()
        }
    }

    /// Nets are aggregated from the components' pins.
    pub fn from_components(components: Vec<Component>) -> Self {
        Self {
            staged: Snapshot::from_components(components),
            ..Default::default()
        }
    }

    /// Replace the data the next fetch will serve.
    pub fn set_data(&mut self, components: Vec<Component>, nets: Vec<Net>) {
        self.staged = Snapshot { components, nets };
    }

    /// Make subsequent fetches fail without touching the served snapshot.
    pub fn set_fail_fetch(&mut self, fail: bool) {
        self.fail_fetch = fail;
    }

    /// Number of fetch attempts, failed ones included
    pub fn fetch_count(&self) -> usize {
        self.fetch_count
    }
}

impl SchematicProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    fn fetch_raw_data(&mut self) -> Result<(), ProviderError> {
        self.fetch_count += 1;
        if self.fail_fetch {
            return Err(ProviderError::InvalidData("simulated fetch failure".to_string()));
        }
        self.snapshot = Some(self.staged.clone());
        Ok(())
    }

    fn components(&self) -> Result<Vec<Component>, ProviderError> {
        self.snapshot
            .as_ref()
            .map(|s| s.components.clone())
            .ok_or(ProviderError::NotFetched("components"))
    }

    fn nets(&self) -> Result<Vec<Net>, ProviderError> {
        self.snapshot
            .as_ref()
            .map(|s| s.nets.clone())
            .ok_or(ProviderError::NotFetched("nets"))
    }
}
