//! Librarian
//!
//! Caching and navigation layer between a provider and the DSL emitter. The
//! librarian owns one provider, fetches from it lazily, and keeps a snapshot
//! of components and nets plus the Atlas (net name → pages) and a
//! connectivity graph. Cache state is only rebuilt as a whole: queries call
//! [`Librarian::refresh`], which does nothing until [`Librarian::mark_stale`]
//! is called.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::dsl::{self, Atlas};
use crate::graph::Connectivity;
use crate::model::{Component, Net};
use crate::provider::{ProviderError, SchematicProvider};

/// Counts reported by [`Librarian::stats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SchematicStats {
    pub total_components: usize,
    pub total_nets: usize,
    pub total_pages: usize,
    pub inter_page_nets: usize,
    pub global_nets: usize,
}

/// State manager and query surface for one schematic
pub struct Librarian<P> {
    provider: P,
    stale: bool,
    components: Vec<Component>,
    nets: Vec<Net>,
    atlas: Atlas,
    connectivity: Connectivity,
}

impl<P: SchematicProvider> Librarian<P> {
    /// Wrap a provider. Nothing is fetched until the first query.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            stale: true,
            components: Vec::new(),
            nets: Vec::new(),
            atlas: Atlas::new(),
            connectivity: Connectivity::default(),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Rebuild the cache from the provider if it is stale.
    ///
    /// On failure the previous cache is kept and the librarian stays stale,
    /// so the next query retries.
    pub fn refresh(&mut self) -> Result<(), ProviderError> {
        if !self.stale {
            tracing::debug!("Cache fresh, skipping fetch from {}", self.provider.name());
            return Ok(());
        }

        self.provider.fetch_raw_data()?;
        let components = self.provider.components()?;
        let nets = self.provider.nets()?;

        let atlas: Atlas = nets
            .iter()
            .map(|net| (net.name.clone(), net.pages.clone()))
            .collect();
        self.connectivity = Connectivity::build(&components, &nets);
        self.components = components;
        self.nets = nets;
        self.atlas = atlas;
        self.stale = false;

        tracing::info!(
            "Refreshed from {}: {} components, {} nets",
            self.provider.name(),
            self.components.len(),
            self.nets.len()
        );
        Ok(())
    }

    /// Force the next query to re-fetch.
    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    /// Page summary and inter-page signal list.
    pub fn index(&mut self) -> Result<String, ProviderError> {
        self.refresh()?;

        if self.components.is_empty() && self.nets.is_empty() {
            return Ok("# SCHEMATIC INDEX\n\n(Empty schematic - no components or nets)\n".to_string());
        }

        let mut page_components: BTreeMap<&str, usize> = BTreeMap::new();
        for component in &self.components {
            *page_components.entry(component.page.as_str()).or_default() += 1;
        }
        let mut page_nets: BTreeMap<&str, usize> = BTreeMap::new();
        for net in &self.nets {
            for page in &net.pages {
                *page_nets.entry(page.as_str()).or_default() += 1;
            }
        }
        let pages: BTreeSet<&str> = page_components
            .keys()
            .chain(page_nets.keys())
            .copied()
            .collect();

        let mut lines = vec!["# SCHEMATIC INDEX".to_string(), String::new()];
        lines.push("## Pages".to_string());
        if pages.is_empty() {
            lines.push("(No pages found)".to_string());
        }
        for page in pages {
            lines.push(format!(
                "- {} ({} components, {} nets)",
                page,
                page_components.get(page).copied().unwrap_or(0),
                page_nets.get(page).copied().unwrap_or(0)
            ));
        }
        lines.push(String::new());

        lines.push("## Inter-Page Signals".to_string());
        let mut inter_page: Vec<&Net> = self.nets.iter().filter(|n| n.is_inter_page()).collect();
        if inter_page.is_empty() {
            lines.push("(No inter-page signals)".to_string());
        }
        inter_page.sort_by(|a, b| a.name.cmp(&b.name));
        for net in inter_page {
            if net.is_global() {
                let kind = if net.is_ground() { "Ground" } else { "Power Rail" };
                lines.push(format!("- {}: ALL_PAGES ({})", net.name, kind));
            } else {
                let pages: Vec<&str> = net.pages.iter().map(String::as_str).collect();
                lines.push(format!("- {}: {}", net.name, pages.join(" ↔ ")));
            }
        }

        Ok(lines.join("\n"))
    }

    /// DSL for one page: its components and every net touching them.
    /// A page known only from net pages renders a `(No components on this page)` stub.
    pub fn page(&mut self, name: &str) -> Result<String, ProviderError> {
        self.refresh()?;

        let components: Vec<&Component> =
            self.components.iter().filter(|c| c.page == name).collect();
        if components.is_empty() {
            if self.nets.iter().any(|n| n.pages.contains(name)) {
                return Ok(format!("# PAGE: {}\n\n(No components on this page)\n", name));
            }
            return Ok(format!("# PAGE: {}\n\n(Page not found in schematic)\n", name));
        }

        let refdes: BTreeSet<String> = components.iter().map(|c| c.refdes.clone()).collect();
        let nets: Vec<&Net> = self.nets.iter().filter(|n| n.has_member_in(&refdes)).collect();
        tracing::debug!(
            "Page {}: {} components, {} nets",
            name,
            components.len(),
            nets.len()
        );

        Ok(dsl::emit_page(name, &components, &nets, &self.atlas))
    }

    /// Context bubble around `refdes`: the requested components, their
    /// non-passive neighbors one net away, and the joining nets.
    pub fn context<S: AsRef<str>>(&mut self, refdes: &[S]) -> Result<String, ProviderError> {
        self.refresh()?;

        if refdes.is_empty() {
            return Ok("# CONTEXT: (empty)\n\n(No components specified for context)\n".to_string());
        }

        let requested: BTreeSet<&str> = refdes.iter().map(|r| r.as_ref()).collect();
        let primary: Vec<&Component> = self
            .components
            .iter()
            .filter(|c| requested.contains(c.refdes.as_str()))
            .collect();
        if primary.is_empty() {
            let missing: Vec<&str> = refdes.iter().map(|r| r.as_ref()).collect();
            return Ok(format!(
                "# CONTEXT: {}\n\n(Components not found in schematic)\n",
                missing.join(", ")
            ));
        }

        Ok(self.render_context(&primary))
    }

    /// Context bubble for every component on a net.
    pub fn net_context(&mut self, name: &str) -> Result<String, ProviderError> {
        self.refresh()?;

        let Some(net) = self.nets.iter().find(|n| n.name == name) else {
            return Ok(format!("# CONTEXT: NET {}\n\n(Net not found in schematic)\n", name));
        };

        let mut refdes: Vec<String> = Vec::new();
        for (r, _) in &net.members {
            if !refdes.contains(r) {
                refdes.push(r.clone());
            }
        }
        self.context(refdes.as_slice())
    }

    fn render_context(&self, primary: &[&Component]) -> String {
        let primary_refdes: BTreeSet<String> = primary.iter().map(|c| c.refdes.clone()).collect();
        let (net_ids, neighbor_refdes) = self.connectivity.one_hop(&primary_refdes);

        let neighbors: Vec<&Component> = self
            .components
            .iter()
            .filter(|c| neighbor_refdes.contains(&c.refdes) && !c.is_passive())
            .collect();

        let nets: Vec<Net> = net_ids
            .iter()
            .filter_map(|&i| self.nets.get(i))
            .map(|net| {
                net.filtered(|r| primary_refdes.contains(r) || neighbor_refdes.contains(r))
            })
            .collect();

        tracing::debug!(
            "Context {:?}: {} nets, {} neighbors ({} shown)",
            primary_refdes,
            nets.len(),
            neighbor_refdes.len(),
            neighbors.len()
        );

        dsl::emit_context(primary, &neighbors, &nets)
    }

    /// Every page named by a component or a net, sorted.
    pub fn pages(&mut self) -> Result<Vec<String>, ProviderError> {
        self.refresh()?;
        Ok(self.page_set().into_iter().map(str::to_string).collect())
    }

    fn page_set(&self) -> BTreeSet<&str> {
        self.components
            .iter()
            .map(|c| c.page.as_str())
            .chain(self.nets.iter().flat_map(|n| n.pages.iter().map(String::as_str)))
            .collect()
    }

    pub fn component(&mut self, refdes: &str) -> Result<Option<&Component>, ProviderError> {
        self.refresh()?;
        Ok(self.components.iter().find(|c| c.refdes == refdes))
    }

    pub fn net(&mut self, name: &str) -> Result<Option<&Net>, ProviderError> {
        self.refresh()?;
        Ok(self.nets.iter().find(|n| n.name == name))
    }

    /// Cached components in provider order
    pub fn components(&mut self) -> Result<&[Component], ProviderError> {
        self.refresh()?;
        Ok(&self.components)
    }

    /// Cached nets in provider order
    pub fn nets(&mut self) -> Result<&[Net], ProviderError> {
        self.refresh()?;
        Ok(&self.nets)
    }

    pub fn stats(&mut self) -> Result<SchematicStats, ProviderError> {
        self.refresh()?;
        Ok(SchematicStats {
            total_components: self.components.len(),
            total_nets: self.nets.len(),
            total_pages: self.page_set().len(),
            inter_page_nets: self.nets.iter().filter(|n| n.is_inter_page()).count(),
            global_nets: self.nets.iter().filter(|n| n.is_global()).count(),
        })
    }
}
