//! DSL Emitter
//!
//! Renders normalized schematic data as compact, net-centric text for
//! language models:
//! - Connectivity lives only in `NET` blocks
//! - Simple passives never get a component block; they appear inline in
//!   `CON:` lines
//! - Complex components get a `DEF`/`COMP` block with a pin listing
//! - Named pins are hinted inline, e.g. `U1.22(PA9_TX)`
//! - Global nets are truncated to their first ten connections
//!
//! Output is byte-deterministic: components sort by refdes, nets by name and
//! pins in natural order.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::model::{Component, Net};
use crate::util::{is_trivial_pin_name, natural_cmp};

/// Connections shown for a global net before the rest are summarized.
pub const GLOBAL_CON_LIMIT: usize = 10;

/// Net name → pages the net appears on.
pub type Atlas = BTreeMap<String, BTreeSet<String>>;

/// Render one page. `components` are the components placed on the page and
/// `nets` those with at least one member among them; inter-page links come
/// from `atlas`.
pub fn emit_page(page: &str, components: &[&Component], nets: &[&Net], atlas: &Atlas) -> String {
    let components = sorted_components(components);
    let nets = sorted_nets(nets);
    let lookup = PinLookup::new(&components);

    let mut lines = vec![format!("# PAGE: {}", page), String::new()];

    lines.push("# COMPONENTS".to_string());
    let complex: Vec<_> = components.iter().filter(|c| c.is_complex()).collect();
    if complex.is_empty() {
        lines.push("(All components are simple passives - see NETS section)".to_string());
    } else {
        lines.extend(complex.into_iter().map(|c| component_block(c)));
    }
    lines.push(String::new());

    lines.push("# NETS".to_string());
    let no_pages = BTreeSet::new();
    for net in nets {
        let pages = atlas.get(&net.name).unwrap_or(&no_pages);
        lines.push(net_block(net, pages, &lookup));
    }

    lines.join("\n")
}

/// Render a context bubble: full blocks for the primary components, one-line
/// summaries for neighbors, and the nets joining them. Net links come from
/// each net's own pages.
pub fn emit_context(primary: &[&Component], neighbors: &[&Component], nets: &[Net]) -> String {
    let primary = sorted_components(primary);
    let neighbors = sorted_components(neighbors);
    let nets: Vec<&Net> = nets.iter().collect();
    let nets = sorted_nets(&nets);

    let refs: Vec<&str> = primary.iter().map(|c| c.refdes.as_str()).collect();
    let mut lines = vec![format!("# CONTEXT: {}", refs.join(", ")), String::new()];

    lines.push("# COMPONENTS".to_string());
    lines.extend(
        primary
            .iter()
            .filter(|c| c.is_complex())
            .map(|c| component_block(c)),
    );
    lines.push(String::new());

    if !neighbors.is_empty() {
        lines.push("# CONTEXT_NEIGHBORS".to_string());
        lines.extend(neighbors.iter().map(|c| neighbor_summary(c)));
        lines.push(String::new());
    }

    lines.push("# NETS".to_string());
    let everyone: Vec<&Component> = primary.iter().chain(neighbors.iter()).copied().collect();
    let lookup = PinLookup::new(&everyone);
    for net in nets {
        lines.push(net_block(net, &net.pages, &lookup));
    }

    lines.join("\n")
}

fn sorted_components<'a>(components: &[&'a Component]) -> Vec<&'a Component> {
    let mut sorted = components.to_vec();
    sorted.sort_by(|a, b| a.refdes.cmp(&b.refdes));
    sorted
}

fn sorted_nets<'a>(nets: &[&'a Net]) -> Vec<&'a Net> {
    let mut sorted = nets.to_vec();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    sorted
}

/// `DEF`/`COMP` block for a complex component.
pub fn component_block(component: &Component) -> String {
    let mut lines = Vec::new();

    let kind = component.derived_type();
    if component.description.is_empty() {
        lines.push(format!("DEF {}", kind));
    } else {
        lines.push(format!("DEF {} {}", kind, component.description));
    }
    lines.push(format!("COMP {} ({})", component.refdes, component.value));

    if !component.mpn.is_empty() {
        lines.push(format!("  MPN: {}", component.mpn));
    }
    if !component.footprint.is_empty() {
        lines.push(format!("  FP: {}", component.footprint));
    }

    if !component.pins.is_empty() {
        lines.push("  PINS:".to_string());
        let mut pins: Vec<_> = component.pins.iter().collect();
        pins.sort_by(|a, b| natural_cmp(&a.designator, &b.designator));
        for pin in pins {
            if pin.name.is_empty() {
                lines.push(format!("    {}:", pin.designator));
            } else {
                lines.push(format!("    {}: {}", pin.designator, pin.name));
            }
        }
    }

    lines.join("\n")
}

/// One-line neighbor summary: `U2 (LM358) - Dual Op-Amp`.
pub fn neighbor_summary(component: &Component) -> String {
    if component.description.is_empty() {
        format!("{} ({})", component.refdes, component.value)
    } else {
        format!(
            "{} ({}) - {}",
            component.refdes, component.value, component.description
        )
    }
}

/// Components visible to pin-name hints, first occurrence of a refdes wins.
pub struct PinLookup<'a> {
    by_refdes: HashMap<&'a str, &'a Component>,
}

impl<'a> PinLookup<'a> {
    pub fn new(components: &[&'a Component]) -> Self {
        let mut by_refdes = HashMap::new();
        for component in components {
            by_refdes.entry(component.refdes.as_str()).or_insert(*component);
        }
        Self { by_refdes }
    }

    /// `R1.1`, or `U1.22(PA9_TX)` when the pin carries a meaningful name.
    pub fn pin_ref(&self, refdes: &str, designator: &str) -> String {
        let name = self
            .by_refdes
            .get(refdes)
            .and_then(|c| c.pin(designator))
            .map(|p| p.name.as_str())
            .filter(|name| !is_trivial_pin_name(name));

        match name {
            Some(name) => format!("{}.{}({})", refdes, designator, name),
            None => format!("{}.{}", refdes, designator),
        }
    }
}

/// `NET` block with optional `LINKS:` line and the `CON:` list.
pub fn net_block(net: &Net, pages: &BTreeSet<String>, lookup: &PinLookup<'_>) -> String {
    let mut lines = vec![format!("NET {}", net.name)];

    let global = net.is_global();
    if global {
        lines.push("  LINKS: ALL_PAGES".to_string());
    } else if pages.len() > 1 {
        let pages: Vec<&str> = pages.iter().map(String::as_str).collect();
        lines.push(format!("  LINKS: {}", pages.join(", ")));
    }

    let mut refs: Vec<String> = net
        .members
        .iter()
        .map(|(refdes, pin)| lookup.pin_ref(refdes, pin))
        .collect();
    refs.sort();

    let con = if global && refs.len() > GLOBAL_CON_LIMIT {
        format!(
            "{} (+ {} others)",
            refs[..GLOBAL_CON_LIMIT].join(", "),
            refs.len() - GLOBAL_CON_LIMIT
        )
    } else {
        refs.join(", ")
    };
    lines.push(format!("  CON: {}", con));

    lines.join("\n")
}
