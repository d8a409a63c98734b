use criterion::{black_box, criterion_group, criterion_main, Criterion};
use schemdsl::prelude::*;
use schemdsl::MemoryProvider;
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// A few hundred parts spread over eight pages, with a wide ground net.
fn synthetic_board() -> Vec<Component> {
    (0..400)
        .map(|i| {
            let page = format!("Sheet{}", i % 8);
            if i % 10 == 0 {
                Component::new(format!("U{}", i))
                    .with_value("MCU")
                    .with_page(page)
                    .with_pins(vec![
                        Pin::new("1", "VDD", "3V3"),
                        Pin::new("2", "VSS", "GND"),
                        Pin::new("3", "TX", format!("SIG{}", i)),
                        Pin::new("4", "RX", format!("SIG{}", i + 1)),
                        Pin::new("5", "EN", format!("SIG{}", i + 2)),
                    ])
            } else {
                Component::new(format!("R{}", i))
                    .with_value("10k")
                    .with_page(page)
                    .with_pins(vec![
                        Pin::new("1", "", format!("SIG{}", i)),
                        Pin::new("2", "", "GND"),
                    ])
            }
        })
        .collect()
}

fn bench_refresh_fixture(c: &mut Criterion) {
    let path = fixture_path("design.json");
    c.bench_function("refresh_altium_fixture", |b| {
        b.iter(|| {
            let mut librarian =
                SchematicCore::open(black_box(&path), &OpenOptions::default()).unwrap();
            librarian.stats().unwrap()
        });
    });
}

fn bench_render(c: &mut Criterion) {
    let mut librarian = Librarian::new(MemoryProvider::from_components(synthetic_board()));
    librarian.refresh().unwrap();

    c.bench_function("render_index", |b| {
        b.iter(|| librarian.index().unwrap());
    });
    c.bench_function("render_page", |b| {
        b.iter(|| librarian.page(black_box("Sheet3")).unwrap());
    });
    c.bench_function("render_context", |b| {
        b.iter(|| librarian.context(black_box(&["U40", "R41"])).unwrap());
    });
}

criterion_group!(benches, bench_refresh_fixture, bench_render);
criterion_main!(benches);
