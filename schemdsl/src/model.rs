//! Unified Schematic Model
//!
//! Tool-agnostic data structures shared by every provider, the librarian and
//! the DSL emitter. These types are:
//! - Immutable snapshots: built once per refresh, never edited afterwards
//! - CAD-agnostic: Altium and KiCad exports normalize into the same shape
//! - Self-classifying: component type, complexity and net globality are
//!   derived from the data rather than stored

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use crate::util::is_trivial_pin_name;

/// Net name given to pins that are not connected to anything.
pub const NO_CONNECT: &str = "NC";

/// Nets with more members than this are treated as global.
pub const GLOBAL_MEMBER_THRESHOLD: usize = 15;

/// Nets present on more pages than this are treated as global.
pub const GLOBAL_PAGE_THRESHOLD: usize = 3;

/// Power and ground naming conventions, matched case-insensitively from the
/// start of the net name:
/// - `GND`, `PGND`, `VSS`, `VCC`, `VDD`, `VEE`, `VBAT`, alone or followed by `_...`
/// - voltage rails such as `3V3`, `3.3V`, `+5V`, `12V`, `1V8`
/// - any name ending in `_GND`, `_VCC` or `_VDD`
///
/// Rails like `VBAT_SW` match only through the `VBAT_...` branch; no further
/// conventions are recognized.
pub const POWER_NET_PATTERN: &str = r"(?i)^(P?GND|VSS|VCC|VDD|VEE|VBAT)($|_.*)|^(\+?(\d+\.?\d*V\d*|\d*\.?\d*V\d+)|\+?(\d+V))|^.*_(GND|VCC|VDD)$";

static POWER_NET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(POWER_NET_PATTERN).expect("power net pattern is valid"));

/// True when `name` follows a power or ground naming convention.
pub fn is_power_net_name(name: &str) -> bool {
    POWER_NET_RE.is_match(name)
}

/// Component category derived from the reference designator prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComponentType {
    Res,
    Cap,
    Ind,
    Fuse,
    Diode,
    Transistor,
    Ic,
    Conn,
    Switch,
    Osc,
    Active,
}

impl ComponentType {
    /// Map an alphabetic refdes prefix (any case) to its category.
    pub fn from_prefix(prefix: &str) -> Self {
        match prefix.to_ascii_uppercase().as_str() {
            "R" => ComponentType::Res,
            "C" => ComponentType::Cap,
            "L" | "FB" => ComponentType::Ind,
            "F" => ComponentType::Fuse,
            "D" | "LED" => ComponentType::Diode,
            "Q" => ComponentType::Transistor,
            "U" => ComponentType::Ic,
            "J" | "P" | "CN" | "CONN" => ComponentType::Conn,
            "SW" => ComponentType::Switch,
            "X" | "Y" => ComponentType::Osc,
            _ => ComponentType::Active,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentType::Res => "RES",
            ComponentType::Cap => "CAP",
            ComponentType::Ind => "IND",
            ComponentType::Fuse => "FUSE",
            ComponentType::Diode => "DIODE",
            ComponentType::Transistor => "TRANSISTOR",
            ComponentType::Ic => "IC",
            ComponentType::Conn => "CONN",
            ComponentType::Switch => "SWITCH",
            ComponentType::Osc => "OSC",
            ComponentType::Active => "ACTIVE",
        }
    }

    pub fn is_passive(&self) -> bool {
        matches!(
            self,
            ComponentType::Res | ComponentType::Cap | ComponentType::Ind | ComponentType::Fuse
        )
    }
}

impl std::fmt::Display for ComponentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pin on a component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pin {
    /// Pin number or identifier (e.g., "1", "22", "A1"); unique per component
    pub designator: String,

    /// Semantic pin name (e.g., "VCC", "PA9_TX"), empty when unnamed
    pub name: String,

    /// Net this pin belongs to; never empty, no-connects use [`NO_CONNECT`]
    pub net: String,
}

impl Pin {
    pub fn new(
        designator: impl Into<String>,
        name: impl Into<String>,
        net: impl Into<String>,
    ) -> Self {
        let net = net.into();
        Self {
            designator: designator.into(),
            name: name.into(),
            net: if net.is_empty() {
                NO_CONNECT.to_string()
            } else {
                net
            },
        }
    }
}

/// An electronic component instance in the schematic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Reference designator (e.g., "U1", "R5", "U1A" for a multi-part unit)
    pub refdes: String,

    /// Component value (e.g., "10k", "STM32F407VGT6")
    #[serde(default)]
    pub value: String,

    /// PCB footprint name
    #[serde(default)]
    pub footprint: String,

    /// Manufacturer part number
    #[serde(default)]
    pub mpn: String,

    /// Page (sheet) the component is placed on
    #[serde(default)]
    pub page: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Pins with their net connectivity
    #[serde(default)]
    pub pins: Vec<Pin>,

    /// Placement on the sheet; captured but never rendered
    #[serde(default)]
    pub location: (f64, f64),

    /// Extra tool-specific metadata
    #[serde(default)]
    pub properties: BTreeMap<String, String>,

    /// Parent designator for multi-part units (e.g., "U1" for "U1A")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multipart_parent: Option<String>,
}

impl Component {
    /// Create a component with only a reference designator; everything else
    /// takes its default.
    pub fn new(refdes: impl Into<String>) -> Self {
        Self {
            refdes: refdes.into(),
            value: String::new(),
            footprint: String::new(),
            mpn: String::new(),
            page: String::new(),
            description: String::new(),
            pins: Vec::new(),
            location: (0.0, 0.0),
            properties: BTreeMap::new(),
            multipart_parent: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_page(mut self, page: impl Into<String>) -> Self {
        self.page = page.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_footprint(mut self, footprint: impl Into<String>) -> Self {
        self.footprint = footprint.into();
        self
    }

    pub fn with_mpn(mut self, mpn: impl Into<String>) -> Self {
        self.mpn = mpn.into();
        self
    }

    pub fn with_pins(mut self, pins: Vec<Pin>) -> Self {
        self.pins = pins;
        self
    }

    /// Leading alphabetic run of the refdes ("FB" for "FB3", "U" for "U1A").
    pub fn prefix(&self) -> &str {
        let end = self
            .refdes
            .char_indices()
            .find(|(_, c)| !c.is_alphabetic())
            .map(|(i, _)| i)
            .unwrap_or(self.refdes.len());
        &self.refdes[..end]
    }

    pub fn derived_type(&self) -> ComponentType {
        ComponentType::from_prefix(self.prefix())
    }

    /// Complex components get a full block in the DSL; simple ones appear
    /// only inline in net connection lists.
    pub fn is_complex(&self) -> bool {
        if self.pins.len() > 4 {
            return true;
        }
        self.pins.iter().any(|p| !is_trivial_pin_name(&p.name))
    }

    pub fn is_passive(&self) -> bool {
        self.derived_type().is_passive()
    }

    pub fn pin(&self, designator: &str) -> Option<&Pin> {
        self.pins.iter().find(|p| p.designator == designator)
    }
}

/// A net: the set of pins that are electrically common
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Net {
    /// Net name (e.g., "UART_TX", "GND", "Net_U1_5")
    pub name: String,

    /// Pages this net appears on
    #[serde(default)]
    pub pages: BTreeSet<String>,

    /// (refdes, pin designator) pairs; a component may contribute several pins
    #[serde(default)]
    pub members: Vec<(String, String)>,
}

impl Net {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pages: BTreeSet::new(),
            members: Vec::new(),
        }
    }

    pub fn with_pages<I, S>(mut self, pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pages = pages.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_member(mut self, refdes: impl Into<String>, pin: impl Into<String>) -> Self {
        self.members.push((refdes.into(), pin.into()));
        self
    }

    pub fn is_inter_page(&self) -> bool {
        self.pages.len() > 1
    }

    /// Global nets are summarized rather than fully expanded: power/ground
    /// rails by name, plus anything too widely connected.
    pub fn is_global(&self) -> bool {
        is_power_net_name(&self.name)
            || self.members.len() > GLOBAL_MEMBER_THRESHOLD
            || self.pages.len() > GLOBAL_PAGE_THRESHOLD
    }

    /// Ground rails are told apart from other global nets by name alone.
    pub fn is_ground(&self) -> bool {
        let upper = self.name.to_uppercase();
        upper.contains("GND") || upper.contains("VSS")
    }

    pub fn has_member_in(&self, refdes: &BTreeSet<String>) -> bool {
        self.members.iter().any(|(r, _)| refdes.contains(r))
    }

    /// Copy of this net keeping only members whose refdes passes `keep`.
    pub fn filtered<F>(&self, mut keep: F) -> Net
    where
        F: FnMut(&str) -> bool,
    {
        Net {
            name: self.name.clone(),
            pages: self.pages.clone(),
            members: self
                .members
                .iter()
                .filter(|(r, _)| keep(r))
                .cloned()
                .collect(),
        }
    }
}
