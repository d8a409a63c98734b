//! KiCad Project Provider
//!
//! Reads a KiCad project directory in place, no netlist export needed.
//! Component metadata comes from every `*.kicad_sch` sheet in the directory
//! (page = sheet file stem) and pin-to-net connectivity from the pads of the
//! project's `*.kicad_pcb`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::kicad::{meaningful, normalize_net_name, pick_mpn};
use super::{ProviderError, SchematicProvider, Snapshot};
use crate::model::{Component, Net, Pin};
use crate::parser::{self, SExp};
use crate::util::{is_semantic_pin_name, multipart_parent};

/// Extension of the project file that marks a KiCad project directory.
pub const PROJECT_EXTENSION: &str = "kicad_pro";

/// (pad number, net name) in board order, first pad per number
type PadNets = Vec<(String, String)>;

/// Provider for a KiCad project directory
pub struct KicadProjectProvider {
    root: PathBuf,
    snapshot: Option<Snapshot>,
}

/// A placed schematic symbol plus the pin names of its library symbol
struct SheetSymbol {
    component: Component,
    pin_names: HashMap<String, String>,
}

impl KicadProjectProvider {
    /// `path` is the project directory or the `.kicad_pro` file inside it.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let root = if has_extension(path, PROJECT_EXTENSION) {
            match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            }
        } else {
            path.to_path_buf()
        };
        Self { root, snapshot: None }
    }

    /// Directory the project files are read from
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn snapshot(&self, caller: &'static str) -> Result<&Snapshot, ProviderError> {
        self.snapshot.as_ref().ok_or(ProviderError::NotFetched(caller))
    }

    /// Files in the project directory with extension `ext`, sorted by name.
    fn project_files(&self, ext: &str) -> Result<Vec<PathBuf>, ProviderError> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.is_file() && has_extension(&path, ext) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Pad connectivity by refdes. Without a readable board every component
    /// comes out pinless.
    fn read_board(&self) -> HashMap<String, PadNets> {
        let boards = match self.project_files("kicad_pcb") {
            Ok(boards) => boards,
            Err(e) => {
                tracing::warn!("Cannot list boards in {}: {}", self.root.display(), e);
                return HashMap::new();
            }
        };
        let Some(board) = boards.first() else {
            tracing::warn!(
                "No .kicad_pcb file in {}; pin connectivity unavailable",
                self.root.display()
            );
            return HashMap::new();
        };

        match read_pads(board) {
            Ok(pads) => {
                tracing::debug!(
                    "Read pad nets for {} footprints from {}",
                    pads.len(),
                    board.display()
                );
                pads
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to read {}: {}; continuing without pin connectivity",
                    board.display(),
                    e
                );
                HashMap::new()
            }
        }
    }
}

impl SchematicProvider for KicadProjectProvider {
    fn name(&self) -> &str {
        "kicad-project"
    }

    fn fetch_raw_data(&mut self) -> Result<(), ProviderError> {
        let sheets = self.project_files("kicad_sch")?;
        if sheets.is_empty() {
            return Err(ProviderError::InvalidData(format!(
                "No .kicad_sch files found in {}",
                self.root.display()
            )));
        }

        let mut symbols = Vec::new();
        let mut parsed = 0;
        for path in &sheets {
            match read_sheet(path) {
                Ok(found) => {
                    parsed += 1;
                    symbols.extend(found);
                }
                Err(e) => tracing::warn!("Skipping sheet {}: {}", path.display(), e),
            }
        }
        if parsed == 0 {
            return Err(ProviderError::Parse(format!(
                "Failed to parse any .kicad_sch files in {}",
                self.root.display()
            )));
        }

        let pads = self.read_board();

        // Units of one multi-unit part share a reference; keep the first.
        let mut seen = HashSet::new();
        let mut components = Vec::new();
        for SheetSymbol {
            mut component,
            pin_names,
        } in symbols
        {
            if !seen.insert(component.refdes.clone()) {
                continue;
            }
            component.pins = build_pins(pads.get(&component.refdes), &pin_names);
            components.push(component);
        }

        let snapshot = Snapshot::from_components(components);
        tracing::info!(
            "Loaded {} components and {} nets from {} sheets in {}",
            snapshot.components.len(),
            snapshot.nets.len(),
            parsed,
            self.root.display()
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

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

/// True for a directory holding at least one `.kicad_sch` sheet.
pub fn is_project_dir(path: &Path) -> bool {
    path.is_dir()
        && std::fs::read_dir(path)
            .map(|entries| {
                entries
                    .flatten()
                    .any(|entry| has_extension(&entry.path(), "kicad_sch"))
            })
            .unwrap_or(false)
}

fn read_sheet(path: &Path) -> Result<Vec<SheetSymbol>, ProviderError> {
    let text = std::fs::read_to_string(path)?;
    let root = parser::parse(&text)?;
    if !root.is("kicad_sch") {
        return Err(ProviderError::MissingField("kicad_sch".to_string()));
    }

    let page = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let library = collect_lib_pins(&root);

    let mut symbols = Vec::new();
    for symbol in root.children("symbol") {
        match transform_symbol(symbol, &page, &library) {
            Ok(Some(found)) => symbols.push(found),
            Ok(None) => {}
            Err(e) => tracing::warn!("Skipping symbol on {}: {}", page, e),
        }
    }
    Ok(symbols)
}

/// Pin number to pin name for every library symbol embedded in a sheet.
fn collect_lib_pins(root: &SExp) -> HashMap<String, HashMap<String, String>> {
    let mut library = HashMap::new();
    let Some(section) = root.child("lib_symbols") else {
        return library;
    };

    for symbol in section.children("symbol") {
        let Some(name) = symbol.atom_at(1) else {
            continue;
        };
        let mut pins = HashMap::new();
        collect_unit_pins(symbol, &mut pins);
        library.insert(name.to_string(), pins);
    }
    library
}

/// Pins live on the symbol itself or on its nested unit symbols.
fn collect_unit_pins(symbol: &SExp, pins: &mut HashMap<String, String>) {
    for pin in symbol.children("pin") {
        if let Some(number) = pin.value("number") {
            pins.entry(number.to_string())
                .or_insert_with(|| pin.value_or_empty("name"));
        }
    }
    for unit in symbol.children("symbol") {
        collect_unit_pins(unit, pins);
    }
}

/// `Ok(None)` for power ports and flags, whose references start with `#`.
fn transform_symbol(
    symbol: &SExp,
    page: &str,
    library: &HashMap<String, HashMap<String, String>>,
) -> Result<Option<SheetSymbol>, ProviderError> {
    let mut properties = BTreeMap::new();
    for property in symbol.children("property") {
        if let (Some(name), Some(value)) = (property.atom_at(1), property.atom_at(2)) {
            if let Some(value) = meaningful(value) {
                properties.insert(name.to_string(), value.to_string());
            }
        }
    }

    let refdes = properties
        .remove("Reference")
        .ok_or_else(|| ProviderError::MissingField("Reference".to_string()))?;
    if refdes.starts_with('#') {
        return Ok(None);
    }

    let mut component = Component::new(refdes.clone());
    component.value = properties.remove("Value").unwrap_or_default();
    component.footprint = properties.remove("Footprint").unwrap_or_default();
    component.page = page.to_string();
    component.multipart_parent = multipart_parent(&refdes);
    component.location = symbol
        .child("at")
        .map(|at| (coordinate(at, 1), coordinate(at, 2)))
        .unwrap_or_default();

    let lib_id = symbol.value("lib_id").unwrap_or_default();
    let datasheet = properties.get("Datasheet").cloned().unwrap_or_default();
    component.mpn = pick_mpn(&properties, &datasheet);
    component.description = properties
        .get("Description")
        .cloned()
        .unwrap_or_else(|| lib_id.rsplit(':').next().unwrap_or_default().to_string());
    if !lib_id.is_empty() {
        properties.insert("lib_id".to_string(), lib_id.to_string());
    }
    component.properties = properties;

    // A placed symbol names an edited library copy through `lib_name`.
    let lib_key = symbol.value("lib_name").unwrap_or(lib_id);
    let pin_names = library.get(lib_key).cloned().unwrap_or_default();

    Ok(Some(SheetSymbol {
        component,
        pin_names,
    }))
}

fn coordinate(at: &SExp, index: usize) -> f64 {
    at.atom_at(index)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0.0)
}

fn read_pads(path: &Path) -> Result<HashMap<String, PadNets>, ProviderError> {
    let text = std::fs::read_to_string(path)?;
    let root = parser::parse(&text)?;
    if !root.is("kicad_pcb") {
        return Err(ProviderError::MissingField("kicad_pcb".to_string()));
    }

    // Board-level net table: `(net 3 "/SDA")`.
    let net_names: HashMap<&str, &str> = root
        .children("net")
        .filter_map(|net| Some((net.atom_at(1)?, net.atom_at(2).unwrap_or_default())))
        .collect();

    let mut pads: HashMap<String, PadNets> = HashMap::new();
    let footprints = root
        .as_list()
        .unwrap_or(&[])
        .iter()
        .filter(|item| item.is("footprint") || item.is("module"));

    for footprint in footprints {
        let Some(refdes) = footprint_reference(footprint) else {
            continue;
        };

        let mut pad_nets: PadNets = Vec::new();
        for pad in footprint.children("pad") {
            let Some(number) = pad.atom_at(1).filter(|n| !n.is_empty()) else {
                continue;
            };
            // Mechanical pads carry no net at all.
            let Some(net) = pad.child("net") else {
                continue;
            };
            let name = net.atom_at(2).or_else(|| {
                let first = net.atom_at(1)?;
                Some(net_names.get(first).copied().unwrap_or(first))
            });
            if pad_nets.iter().all(|(n, _)| n != number) {
                pad_nets.push((
                    number.to_string(),
                    normalize_net_name(name.unwrap_or_default()),
                ));
            }
        }

        if !pad_nets.is_empty() {
            pads.entry(refdes.to_string()).or_insert(pad_nets);
        }
    }
    Ok(pads)
}

/// `(property "Reference" "U1")` on current boards, `(fp_text reference "U1")`
/// on older ones.
fn footprint_reference(footprint: &SExp) -> Option<&str> {
    footprint
        .children("property")
        .find(|p| p.atom_at(1) == Some("Reference"))
        .and_then(|p| p.atom_at(2))
        .or_else(|| {
            footprint
                .children("fp_text")
                .find(|t| t.atom_at(1) == Some("reference"))
                .and_then(|t| t.atom_at(2))
        })
}

fn build_pins(pads: Option<&PadNets>, pin_names: &HashMap<String, String>) -> Vec<Pin> {
    pads.into_iter()
        .flatten()
        .map(|(number, net)| {
            let name = pin_names.get(number).map(String::as_str).unwrap_or_default();
            let name = if name != "~" && is_semantic_pin_name(name) {
                name
            } else {
                ""
            };
            Pin::new(number.clone(), name, net.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SHEET: &str = r##"(kicad_sch (version 20231120) (generator "eeschema")
  (lib_symbols
    (symbol "Device:R"
      (pin_numbers hide)
      (property "Reference" "R" (at 2.032 0 90))
      (symbol "R_1_1"
        (pin passive line (at 0 3.81 270) (length 1.27) (name "~") (number "1"))
        (pin passive line (at 0 -3.81 90) (length 1.27) (name "~") (number "2"))))
    (symbol "Regulator_Linear:AP2112K-3.3"
      (symbol "AP2112K-3.3_1_1"
        (pin power_in line (at -7.62 2.54 0) (length 2.54) (name "VIN") (number "1"))
        (pin power_in line (at 0 -7.62 90) (length 2.54) (name "GND") (number "2"))
        (pin power_out line (at 7.62 2.54 180) (length 2.54) (name "VOUT") (number "5")))))
  (symbol (lib_id "Regulator_Linear:AP2112K-3.3") (at 101.6 50.8 0) (unit 1)
    (property "Reference" "U3" (at 101.6 43.18 0))
    (property "Value" "AP2112K-3.3" (at 101.6 45.72 0))
    (property "Footprint" "Package_TO_SOT_SMD:SOT-23-5" (at 101.6 50.8 0))
    (property "Datasheet" "https://www.diodes.com/assets/Datasheets/AP2112.pdf" (at 0 0 0))
    (property "Description" "600mA LDO" (at 0 0 0))
    (property "Manufacturer" "Diodes" (at 0 0 0))
    (pin "1" (uuid "a")) (pin "2" (uuid "b")) (pin "5" (uuid "c")))
  (symbol (lib_id "Device:R") (at 80 50 90) (unit 1)
    (property "Reference" "R7" (at 0 0 0))
    (property "Value" "10k" (at 0 0 0))
    (property "Datasheet" "RC0603FR-0710KL" (at 0 0 0)))
  (symbol (lib_id "power:GND") (at 90 60 0) (unit 1)
    (property "Reference" "#PWR03" (at 0 0 0))
    (property "Value" "GND" (at 0 0 0)))
  (symbol (lib_id "Device:R") (at 10 10 0)
    (property "Value" "orphan" (at 0 0 0))))"##;

    const BOARD: &str = r#"(kicad_pcb (version 20240108) (generator "pcbnew")
  (net 0 "")
  (net 1 "GND")
  (net 2 "+3V3")
  (net 3 "VBUS")
  (footprint "Package_TO_SOT_SMD:SOT-23-5" (layer "F.Cu") (at 120 80)
    (property "Reference" "U3" (at 0 -2.4 0) (layer "F.SilkS"))
    (pad "1" smd rect (at -1.1 -0.95) (size 1.06 0.65) (layers "F.Cu") (net 3 "VBUS"))
    (pad "2" smd rect (at -1.1 0) (size 1.06 0.65) (layers "F.Cu") (net 1 "GND"))
    (pad "2" smd rect (at 0 0) (size 1.6 1.6) (layers "F.Cu") (net 2 "+3V3"))
    (pad "5" smd rect (at 1.1 -0.95) (size 1.06 0.65) (layers "F.Cu") (net 2))
    (pad "" np_thru_hole circle (at 0 1) (size 1 1) (layers "*.Cu")))
  (module "Resistor_SMD:R_0603" (layer "F.Cu") (at 130 80)
    (fp_text reference "R7" (at 0 -1.4) (layer "F.SilkS"))
    (pad "1" smd rect (at -0.8 0) (size 0.8 0.9) (layers "F.Cu") (net 2 "+3V3"))
    (pad "2" smd rect (at 0.8 0) (size 0.8 0.9) (layers "F.Cu") (net 0 ""))))"#;

    fn project(with_board: bool) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Power.kicad_sch"), SHEET).unwrap();
        fs::write(dir.path().join("demo.kicad_pro"), "{}").unwrap();
        if with_board {
            fs::write(dir.path().join("demo.kicad_pcb"), BOARD).unwrap();
        }
        dir
    }

    #[test]
    fn test_components_from_sheet() {
        let dir = project(true);
        let mut provider = KicadProjectProvider::new(dir.path());
        provider.fetch_raw_data().unwrap();
        let components = provider.components().unwrap();

        // Power symbol and the reference-less symbol are dropped.
        let refs: Vec<_> = components.iter().map(|c| c.refdes.as_str()).collect();
        assert_eq!(refs, vec!["U3", "R7"]);

        let u3 = &components[0];
        assert_eq!(u3.page, "Power");
        assert_eq!(u3.value, "AP2112K-3.3");
        assert_eq!(u3.footprint, "Package_TO_SOT_SMD:SOT-23-5");
        assert_eq!(u3.mpn, "");
        assert_eq!(u3.description, "600mA LDO");
        assert_eq!(u3.location, (101.6, 50.8));
        assert_eq!(u3.properties.get("Manufacturer").map(String::as_str), Some("Diodes"));
        assert_eq!(
            u3.properties.get("lib_id").map(String::as_str),
            Some("Regulator_Linear:AP2112K-3.3")
        );

        let r7 = &components[1];
        assert_eq!(r7.mpn, "RC0603FR-0710KL");
        assert_eq!(r7.description, "R");
    }

    #[test]
    fn test_pins_from_board_pads() {
        let dir = project(true);
        let mut provider = KicadProjectProvider::new(dir.path().join("demo.kicad_pro"));
        provider.fetch_raw_data().unwrap();
        let components = provider.components().unwrap();

        let pins: Vec<_> = components[0]
            .pins
            .iter()
            .map(|p| (p.designator.as_str(), p.name.as_str(), p.net.as_str()))
            .collect();
        // First pad per number wins; a bare net id resolves through the table.
        assert_eq!(
            pins,
            vec![("1", "VIN", "VBUS"), ("2", "GND", "GND"), ("5", "VOUT", "+3V3")]
        );

        let r7 = &components[1];
        assert_eq!(r7.pins[0].name, "");
        assert_eq!(r7.pins[1].net, "NC");

        let nets = provider.nets().unwrap();
        let names: Vec<_> = nets.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["VBUS", "GND", "+3V3", "NC"]);
    }

    #[test]
    fn test_missing_board_leaves_components_pinless() {
        let dir = project(false);
        let mut provider = KicadProjectProvider::new(dir.path());
        provider.fetch_raw_data().unwrap();
        assert_eq!(provider.components().unwrap().len(), 2);
        assert!(provider.components().unwrap().iter().all(|c| c.pins.is_empty()));
        assert!(provider.nets().unwrap().is_empty());
    }

    #[test]
    fn test_broken_board_is_not_fatal() {
        let dir = project(false);
        fs::write(dir.path().join("demo.kicad_pcb"), "(kicad_pcb (net 1").unwrap();
        let mut provider = KicadProjectProvider::new(dir.path());
        provider.fetch_raw_data().unwrap();
        assert!(provider.nets().unwrap().is_empty());
    }

    #[test]
    fn test_directory_without_sheets() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = KicadProjectProvider::new(dir.path());
        assert!(matches!(
            provider.fetch_raw_data(),
            Err(ProviderError::InvalidData(_))
        ));
        assert!(matches!(
            provider.components(),
            Err(ProviderError::NotFetched("components"))
        ));
    }

    #[test]
    fn test_no_parseable_sheet() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.kicad_sch"), "(kicad_sch (symbol").unwrap();
        fs::write(dir.path().join("b.kicad_sch"), "(export)").unwrap();
        let mut provider = KicadProjectProvider::new(dir.path());
        assert!(matches!(provider.fetch_raw_data(), Err(ProviderError::Parse(_))));
    }

    #[test]
    fn test_project_dir_detection() {
        let dir = project(false);
        assert!(is_project_dir(dir.path()));
        assert!(!is_project_dir(&dir.path().join("Power.kicad_sch")));
        assert!(!is_project_dir(tempfile::tempdir().unwrap().path()));
        assert_eq!(
            KicadProjectProvider::new("demo.kicad_pro").root(),
            Path::new(".")
        );
    }
}
