//! Integration tests for KiCad netlist sources

use schemdsl::prelude::*;
use schemdsl::{KicadNetlistProvider, SourceFormat};
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn test_netlist_index() {
    let mut librarian =
        SchematicCore::open(&fixture_path("board.net"), &OpenOptions::default()).unwrap();
    let index = librarian.index().unwrap();

    assert!(index.contains("- Root (2 components, 5 nets)"));
    assert!(index.contains("- Sensors (2 components, 5 nets)"));
    assert!(index.contains("- +3V3: ALL_PAGES (Power Rail)"));
    assert!(index.contains("- GND: ALL_PAGES (Ground)"));
    assert!(index.contains("- /SDA: Root ↔ Sensors"));
}

#[test]
fn test_root_page_option() {
    let options = OpenOptions {
        root_page: "Main".to_string(),
        ..Default::default()
    };
    let mut librarian = SchematicCore::open(&fixture_path("board.net"), &options).unwrap();
    assert_eq!(librarian.pages().unwrap(), vec!["Main", "Sensors"]);
}

#[test]
fn test_netlist_components() {
    let mut librarian = Librarian::new(KicadNetlistProvider::from_path(fixture_path("board.net")));

    let u1 = librarian.component("U1").unwrap().unwrap().clone();
    assert_eq!(u1.mpn, "ATMEGA328P-AU");
    assert_eq!(u1.description, "20MHz, 32kB Flash, 2kB SRAM, TQFP-32");
    assert_eq!(u1.pin("29").map(|p| p.net.as_str()), Some("NC"));
    assert_eq!(u1.pin("29").map(|p| p.name.as_str()), Some("~{RESET}/PC6"));

    let u2 = librarian.component("U2").unwrap().unwrap().clone();
    assert_eq!(u2.page, "Sensors");
    assert_eq!(u2.pin("2").map(|p| p.net.as_str()), Some("NC"));

    let nc = librarian.net("NC").unwrap().unwrap();
    assert_eq!(
        nc.members,
        vec![
            ("U1".to_string(), "29".to_string()),
            ("U2".to_string(), "2".to_string())
        ]
    );
}

#[test]
fn test_sensor_context() {
    let mut librarian =
        SchematicCore::open(&fixture_path("board.net"), &OpenOptions::default()).unwrap();
    let context = librarian.context(&["U2"]).unwrap();

    assert!(context.starts_with("# CONTEXT: U2\n\n# COMPONENTS\nDEF IC Combined humidity"));
    assert!(context.contains(
        "# CONTEXT_NEIGHBORS\nU1 (ATmega328P) - 20MHz, 32kB Flash, 2kB SRAM, TQFP-32\n"
    ));
    assert!(context.contains("NET /SDA\n  LINKS: Root, Sensors\n  CON: R1.2, U1.27(PC4), U2.3(SDI)"));
    assert!(context.contains("NET /SCL\n  LINKS: Root, Sensors\n  CON: U1.28(PC5), U2.4(SCK)"));
}

#[test]
fn test_explicit_format_overrides_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("board.txt");
    std::fs::copy(fixture_path("board.net"), &path).unwrap();

    assert!(SchematicCore::open(&path, &OpenOptions::default()).is_err());

    let options = OpenOptions {
        format: Some(SourceFormat::KicadNetlist),
        ..Default::default()
    };
    let mut librarian = SchematicCore::open(&path, &options).unwrap();
    assert_eq!(librarian.stats().unwrap().total_components, 4);
}

#[test]
fn test_schematic_file_is_not_a_netlist() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("board.net");
    std::fs::write(&path, "(kicad_sch (version 20231120) (generator eeschema))").unwrap();

    let mut librarian = SchematicCore::open(&path, &OpenOptions::default()).unwrap();
    let err = librarian.index().unwrap_err();
    assert!(err.to_string().contains("export"), "{}", err);
}
