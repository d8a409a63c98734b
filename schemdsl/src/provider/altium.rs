//! Altium JSON Provider
//!
//! Reads the JSON document Altium exports for a whole design:
//!
//! ```json
//! {
//!   "components": [
//!     {
//!       "designator": "U1",
//!       "description": "ARM MCU",
//!       "footprint": "LQFP-100",
//!       "sheet": "C:\\Project\\Main.SchDoc",
//!       "schematic_x": 1000,
//!       "schematic_y": 2000,
//!       "parameters": { "PN": "STM32F407VGT6", "Comment": "STM32F407VGT6" },
//!       "pins": [ { "name": "1", "net": "VCC" }, { "name": "22", "net": "UART_TX" } ]
//!     }
//!   ]
//! }
//! ```
//!
//! Field mapping: `designator` → refdes, `parameters.Comment` (else `PN`) →
//! value, `parameters.PN` → mpn, file name of `sheet` → page, remaining
//! parameters → properties. Pin `name` is the designator and doubles as the
//! semantic name when it is not purely numeric.

use serde_json::{Map, Value};
use std::path::Path;

use super::{ProviderError, SchematicProvider, Snapshot, Source};
use crate::model::{Component, Net, Pin};
use crate::util::{is_semantic_pin_name, multipart_parent, page_from_path};

/// Provider for Altium JSON exports
pub struct AltiumJsonProvider {
    source: Source,
    snapshot: Option<Snapshot>,
}

impl AltiumJsonProvider {
    /// Provider over JSON text held in memory
    pub fn from_json(json: impl Into<String>) -> Self {
        Self {
            source: Source::Inline(json.into()),
            snapshot: None,
        }
    }

    /// Provider over a file, read on every fetch
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self {
            source: Source::File(path.as_ref().to_path_buf()),
            snapshot: None,
        }
    }

    fn snapshot(&self, caller: &'static str) -> Result<&Snapshot, ProviderError> {
        self.snapshot.as_ref().ok_or(ProviderError::NotFetched(caller))
    }
}

impl SchematicProvider for AltiumJsonProvider {
    fn name(&self) -> &str {
        "altium-json"
    }

    fn fetch_raw_data(&mut self) -> Result<(), ProviderError> {
        let text = self.source.read()?;
        let root: Value = serde_json::from_str(&text)?;

        let root = root
            .as_object()
            .ok_or_else(|| ProviderError::InvalidData("JSON root must be an object".to_string()))?;

        let raw_components = match root.get("components") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(_) => {
                return Err(ProviderError::InvalidData(
                    "'components' must be an array".to_string(),
                ))
            }
        };

        let mut components = Vec::with_capacity(raw_components.len());
        for raw in &raw_components {
            match transform_component(raw) {
                Ok(component) => components.push(component),
                Err(e) => {
                    let designator = raw
                        .get("designator")
                        .and_then(Value::as_str)
                        .unwrap_or("UNKNOWN");
                    tracing::warn!("Skipping component {}: {}", designator, e);
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

/// Render any scalar JSON value as text; null and absent become empty.
fn text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn coordinate(value: Option<&Value>) -> f64 {
    value.and_then(Value::as_f64).unwrap_or(0.0)
}

fn transform_component(raw: &Value) -> Result<Component, ProviderError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| ProviderError::InvalidData("component must be an object".to_string()))?;

    let refdes = text(obj.get("designator"));
    if refdes.is_empty() {
        return Err(ProviderError::MissingField("designator".to_string()));
    }

    let empty = Map::new();
    let parameters = match obj.get("parameters") {
        None | Some(Value::Null) => &empty,
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(ProviderError::InvalidData(
                "'parameters' must be an object".to_string(),
            ))
        }
    };

    let comment = text(parameters.get("Comment"));
    let mpn = text(parameters.get("PN"));
    let value = if !comment.is_empty() {
        comment
    } else {
        mpn.clone()
    };

    let properties = parameters
        .iter()
        .filter(|(key, _)| key.as_str() != "PN" && key.as_str() != "Comment")
        .map(|(key, v)| (key.clone(), text(Some(v))))
        .collect();

    let pins = match obj.get("pins") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().map(transform_pin).collect::<Result<_, _>>()?,
        Some(_) => return Err(ProviderError::InvalidData("'pins' must be an array".to_string())),
    };

    Ok(Component {
        multipart_parent: multipart_parent(&refdes),
        value,
        footprint: text(obj.get("footprint")),
        mpn,
        page: page_from_path(&text(obj.get("sheet"))),
        description: text(obj.get("description")),
        pins,
        location: (coordinate(obj.get("schematic_x")), coordinate(obj.get("schematic_y"))),
        properties,
        refdes,
    })
}

fn transform_pin(raw: &Value) -> Result<Pin, ProviderError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| ProviderError::InvalidData("pin must be an object".to_string()))?;

    let designator = text(obj.get("name"));
    let name = if is_semantic_pin_name(&designator) {
        designator.clone()
    } else {
        String::new()
    };

    Ok(Pin::new(designator, name, text(obj.get("net"))))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESIGN: &str = r#"{
        "components": [
            {
                "designator": "U1",
                "description": "ARM MCU",
                "footprint": "LQFP-100",
                "sheet": "C:\\Project\\Main.SchDoc",
                "schematic_x": 1000,
                "schematic_y": 2000.5,
                "parameters": {"PN": "STM32F407VGT6", "Comment": "STM32F407", "MFG": "ST", "Qty": 1},
                "pins": [
                    {"name": "1", "net": "VCC"},
                    {"name": "22", "net": "UART_TX"},
                    {"name": "VSS", "net": ""}
                ]
            },
            {
                "designator": "R1",
                "sheet": "/home/me/Project/Power.SchDoc",
                "parameters": {"PN": "RC0603"},
                "pins": [{"name": "1", "net": "UART_TX"}, {"name": "2"}]
            },
            {"description": "no designator"},
            "not an object"
        ]
    }"#;

    #[test]
    fn test_components_before_fetch() {
        let provider = AltiumJsonProvider::from_json(DESIGN);
        assert!(matches!(provider.components(), Err(ProviderError::NotFetched("components"))));
        assert!(matches!(provider.nets(), Err(ProviderError::NotFetched("nets"))));
    }

    #[test]
    fn test_field_mapping() {
        let mut provider = AltiumJsonProvider::from_json(DESIGN);
        provider.fetch_raw_data().unwrap();
        let components = provider.components().unwrap();

        // Malformed records are skipped, the rest survive.
        assert_eq!(components.len(), 2);

        let u1 = &components[0];
        assert_eq!(u1.refdes, "U1");
        assert_eq!(u1.value, "STM32F407");
        assert_eq!(u1.mpn, "STM32F407VGT6");
        assert_eq!(u1.page, "Main.SchDoc");
        assert_eq!(u1.location, (1000.0, 2000.5));
        assert_eq!(u1.properties.get("MFG").map(String::as_str), Some("ST"));
        assert_eq!(u1.properties.get("Qty").map(String::as_str), Some("1"));
        assert!(!u1.properties.contains_key("PN"));

        assert_eq!(u1.pins[0].name, "");
        assert_eq!(u1.pins[2].name, "VSS");
        assert_eq!(u1.pins[2].net, "NC");

        let r1 = &components[1];
        assert_eq!(r1.value, "RC0603");
        assert_eq!(r1.page, "Power.SchDoc");
        assert_eq!(r1.pins[1].net, "NC");
    }

    #[test]
    fn test_nets_from_pins() {
        let mut provider = AltiumJsonProvider::from_json(DESIGN);
        provider.fetch_raw_data().unwrap();
        let nets = provider.nets().unwrap();

        let tx = nets.iter().find(|n| n.name == "UART_TX").unwrap();
        assert_eq!(
            tx.members,
            vec![
                ("U1".to_string(), "22".to_string()),
                ("R1".to_string(), "1".to_string())
            ]
        );
        assert!(tx.is_inter_page());

        let nc = nets.iter().find(|n| n.name == "NC").unwrap();
        assert_eq!(nc.members.len(), 2);
    }

    #[test]
    fn test_missing_components_key_is_empty_design() {
        let mut provider = AltiumJsonProvider::from_json(r#"{"nets": []}"#);
        provider.fetch_raw_data().unwrap();
        assert!(provider.components().unwrap().is_empty());
        assert!(provider.nets().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_json_is_ingestion_error() {
        let mut provider = AltiumJsonProvider::from_json("{not json");
        let err = provider.fetch_raw_data().unwrap_err();
        assert!(matches!(err, ProviderError::Parse(_)));
        assert!(err.is_ingestion());

        let mut provider = AltiumJsonProvider::from_json("[1, 2]");
        assert!(matches!(provider.fetch_raw_data(), Err(ProviderError::InvalidData(_))));

        let mut provider = AltiumJsonProvider::from_json(r#"{"components": {}}"#);
        assert!(matches!(provider.fetch_raw_data(), Err(ProviderError::InvalidData(_))));
    }

    #[test]
    fn test_missing_file() {
        let mut provider = AltiumJsonProvider::from_path("/definitely/not/here.json");
        assert!(matches!(provider.fetch_raw_data(), Err(ProviderError::Io(_))));
    }

    #[test]
    fn test_failed_refetch_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("design.json");
        std::fs::write(&path, DESIGN).unwrap();

        let mut provider = AltiumJsonProvider::from_path(&path);
        provider.fetch_raw_data().unwrap();

        std::fs::write(&path, "{ broken").unwrap();
        assert!(provider.fetch_raw_data().is_err());
        assert_eq!(provider.components().unwrap().len(), 2);
    }
}
