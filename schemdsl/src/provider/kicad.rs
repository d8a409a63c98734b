//! KiCad Netlist Provider
//!
//! Reads the S-expression netlist KiCad exports (`.net`, "KiCad" netlist
//! format). Component metadata comes from the `components` section, pin
//! names from `libparts`, and connectivity from the `nets` section. Pages are
//! taken from each component's `sheetpath`.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use super::{ProviderError, SchematicProvider, Snapshot, Source};
use crate::model::{Component, Net, Pin, NO_CONNECT};
use crate::parser::{self, SExp};
use crate::util::{is_semantic_pin_name, multipart_parent};

/// Page name used for components on the root sheet.
pub const DEFAULT_ROOT_PAGE: &str = "Root";

/// Property names that commonly carry a manufacturer part number.
pub(super) const MPN_KEYS: [&str; 9] = [
    "MPN",
    "mpn",
    "Mpn",
    "PN",
    "Part Number",
    "PartNumber",
    "Manufacturer Part Number",
    "Mfr Part",
    "P/N",
];

/// Provider for KiCad netlist exports
pub struct KicadNetlistProvider {
    source: Source,
    root_page: String,
    snapshot: Option<Snapshot>,
}

impl KicadNetlistProvider {
    pub fn from_netlist(text: impl Into<String>) -> Self {
        Self {
            source: Source::Inline(text.into()),
            root_page: DEFAULT_ROOT_PAGE.to_string(),
            snapshot: None,
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self {
            source: Source::File(path.as_ref().to_path_buf()),
            root_page: DEFAULT_ROOT_PAGE.to_string(),
            snapshot: None,
        }
    }

    /// Page name for components on the root sheet (`/`).
    pub fn with_root_page(mut self, root_page: impl Into<String>) -> Self {
        self.root_page = root_page.into();
        self
    }

    fn snapshot(&self, caller: &'static str) -> Result<&Snapshot, ProviderError> {
        self.snapshot.as_ref().ok_or(ProviderError::NotFetched(caller))
    }
}

impl SchematicProvider for KicadNetlistProvider {
    fn name(&self) -> &str {
        "kicad-netlist"
    }

    fn fetch_raw_data(&mut self) -> Result<(), ProviderError> {
        let text = self.source.read()?;
        let root = parser::parse(&text)?;
        if !root.is("export") {
            return Err(ProviderError::MissingField("export".to_string()));
        }

        let libparts = collect_libparts(&root);
        let connections = collect_connections(&root);

        let mut components = Vec::new();
        if let Some(section) = root.child("components") {
            for comp in section.children("comp") {
                match self.transform_component(comp, &libparts, &connections) {
                    Ok(component) => components.push(component),
                    Err(e) => {
                        tracing::warn!(
                            "Skipping component {}: {}",
                            comp.value("ref").unwrap_or("UNKNOWN"),
                            e
                        );
                    }
                }
            }
        }

        let snapshot = Snapshot::from_components(components);
        tracing::info!(
            "Loaded {} components and {} nets from {}",
            snapshot.components.len(),
            snapshot.nets.len(),
            self.source.describe()
        );
        self.snapshot = Some(snapshot);
        Ok(())
    }

    fn components(&self) -> Result<Vec<Component>, ProviderError> {
        Ok(self.snapshot("components")?.components.clone())
    }

    fn nets(&self) -> Result<Vec<Net>, ProviderError> {
        Ok(self.snapshot("nets")?.nets.clone())
    }
}

/// Library part data needed to name pins and describe components
#[derive(Debug, Default)]
struct LibPart {
    description: String,
    /// (pin number, pin name) in library order
    pins: Vec<(String, String)>,
}

/// One pin's membership, as listed under a net
#[derive(Debug, Clone)]
struct Connection {
    pin: String,
    function: String,
    net: String,
}

/// KiCad writes `~` for "no value".
pub(super) fn meaningful(value: &str) -> Option<&str> {
    match value {
        "" | "~" => None,
        other => Some(other),
    }
}

/// KiCad gives every unconnected pin its own `unconnected-(...)` net; those
/// all collapse into the no-connect sentinel.
pub(super) fn normalize_net_name(name: &str) -> String {
    if name.is_empty() || name.starts_with("unconnected-") {
        NO_CONNECT.to_string()
    } else {
        name.to_string()
    }
}

/// First part-number property, else a datasheet entry that is not a URL.
pub(super) fn pick_mpn(properties: &BTreeMap<String, String>, datasheet: &str) -> String {
    MPN_KEYS
        .iter()
        .find_map(|key| properties.get(*key).cloned())
        .unwrap_or_else(|| {
            if datasheet.is_empty() || datasheet.starts_with("http") {
                String::new()
            } else {
                datasheet.to_string()
            }
        })
}

fn collect_libparts(root: &SExp) -> HashMap<(String, String), LibPart> {
    let mut parts = HashMap::new();
    let Some(section) = root.child("libparts") else {
        return parts;
    };

    for libpart in section.children("libpart") {
        let key = (libpart.value_or_empty("lib"), libpart.value_or_empty("part"));
        let pins = libpart
            .child("pins")
            .map(|pins| {
                pins.children("pin")
                    .filter_map(|pin| {
                        let num = pin.value("num")?;
                        Some((num.to_string(), pin.value_or_empty("name")))
                    })
                    .collect()
            })
            .unwrap_or_default();
        parts.insert(
            key,
            LibPart {
                description: libpart.value_or_empty("description"),
                pins,
            },
        );
    }
    parts
}

fn collect_connections(root: &SExp) -> HashMap<String, Vec<Connection>> {
    let mut by_ref: HashMap<String, Vec<Connection>> = HashMap::new();
    let Some(section) = root.child("nets") else {
        return by_ref;
    };

    for net in section.children("net") {
        let name = normalize_net_name(net.value("name").unwrap_or_default());
        for node in net.children("node") {
            let (Some(refdes), Some(pin)) = (node.value("ref"), node.value("pin")) else {
                tracing::warn!("Skipping node without ref/pin on net {}", name);
                continue;
            };
            by_ref.entry(refdes.to_string()).or_default().push(Connection {
                pin: pin.to_string(),
                function: node.value_or_empty("pinfunction"),
                net: name.clone(),
            });
        }
    }
    by_ref
}

impl KicadNetlistProvider {
    fn transform_component(
        &self,
        comp: &SExp,
        libparts: &HashMap<(String, String), LibPart>,
        connections: &HashMap<String, Vec<Connection>>,
    ) -> Result<Component, ProviderError> {
        let refdes = comp
            .value("ref")
            .and_then(meaningful)
            .ok_or_else(|| ProviderError::MissingField("ref".to_string()))?
            .to_string();

        let mut component = Component::new(refdes.clone());
        component.value = comp.value("value").and_then(meaningful).unwrap_or_default().to_string();
        component.footprint = comp
            .value("footprint")
            .and_then(meaningful)
            .unwrap_or_default()
            .to_string();
        component.multipart_parent = multipart_parent(&refdes);

        // Properties: user fields first, then sheet properties.
        if let Some(fields) = comp.child("fields") {
            for field in fields.children("field") {
                if let (Some(name), Some(value)) = (field.value("name"), field.last_atom()) {
                    if let Some(value) = meaningful(value) {
                        component.properties.insert(name.to_string(), value.to_string());
                    }
                }
            }
        }
        for property in comp.children("property") {
            if let (Some(name), Some(value)) = (property.value("name"), property.value("value")) {
                if let Some(value) = meaningful(value) {
                    component.properties.insert(name.to_string(), value.to_string());
                }
            }
        }

        let libsource = comp.child("libsource");
        let lib = libsource.map(|l| l.value_or_empty("lib")).unwrap_or_default();
        let part = libsource.map(|l| l.value_or_empty("part")).unwrap_or_default();
        let libpart = libparts.get(&(lib.clone(), part.clone()));
        if !lib.is_empty() || !part.is_empty() {
            component
                .properties
                .insert("lib_id".to_string(), format!("{}:{}", lib, part));
        }

        let datasheet = comp.value("datasheet").and_then(meaningful).unwrap_or_default();
        if !datasheet.is_empty() {
            component
                .properties
                .entry("Datasheet".to_string())
                .or_insert_with(|| datasheet.to_string());
        }

        component.mpn = pick_mpn(&component.properties, datasheet);

        component.description = component
            .properties
            .get("Description")
            .cloned()
            .or_else(|| {
                libsource
                    .and_then(|l| l.value("description"))
                    .and_then(meaningful)
                    .map(str::to_string)
            })
            .or_else(|| libpart.map(|p| p.description.clone()))
            .unwrap_or_default();

        component.page = comp
            .child("sheetpath")
            .and_then(|s| s.value("names"))
            .map(|names| self.page_from_sheetpath(names))
            .unwrap_or_else(|| self.root_page.clone());

        component.pins = build_pins(connections.get(&refdes), libpart);
        Ok(component)
    }

    /// `/` is the root sheet; `/Power/Charger/` is the sheet named `Charger`.
    fn page_from_sheetpath(&self, names: &str) -> String {
        names
            .split('/')
            .filter(|segment| !segment.is_empty())
            .last()
            .map(str::to_string)
            .unwrap_or_else(|| self.root_page.clone())
    }
}

/// Pins connected to nets come first, in netlist order; library pins that
/// appear on no net follow as no-connects.
fn build_pins(connections: Option<&Vec<Connection>>, libpart: Option<&LibPart>) -> Vec<Pin> {
    let lib_name = |num: &str| -> String {
        libpart
            .and_then(|p| p.pins.iter().find(|(n, _)| n == num))
            .map(|(_, name)| name.clone())
            .unwrap_or_default()
    };
    let semantic = |name: String| if is_semantic_pin_name(&name) && name != "~" { name } else { String::new() };

    let mut pins: Vec<Pin> = Vec::new();
    for conn in connections.into_iter().flatten() {
        if pins.iter().any(|p| p.designator == conn.pin) {
            continue;
        }
        let name = if conn.function.is_empty() {
            lib_name(&conn.pin)
        } else {
            conn.function.clone()
        };
        pins.push(Pin::new(conn.pin.clone(), semantic(name), conn.net.clone()));
    }

    if let Some(libpart) = libpart {
        for (num, name) in &libpart.pins {
            if pins.iter().any(|p| &p.designator == num) {
                continue;
            }
            pins.push(Pin::new(num.clone(), semantic(name.clone()), NO_CONNECT));
        }
    }
    pins
}
