use criterion::{black_box, criterion_group, criterion_main, Criterion};
use schgraph::prelude::*;
use schgraph::schema::{ElectricalType, Pin};
use std::path::PathBuf;
use uuid::Uuid;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// One channel sheet placed `channels` times, each with a resistor ladder.
fn wide_design(channels: usize, rungs: i64) -> Schematic {
    let mut sch = Schematic::new("root");
    let root = sch.root();
    let channel = sch.add_screen("channel");

    sch.add_label(channel, LabelKind::Hierarchical, "IN", Point::new(0, 0));
    for rung in 0..rungs {
        let x = rung * 100;
        sch.add_wire(channel, Point::new(x, 0), Point::new(x + 100, 0));
        sch.add_item(
            channel,
            ItemKind::Pin(Pin {
                symbol: Uuid::new_v4(),
                reference: format!("R{}", rung + 1),
                number: "1".into(),
                name: String::new(),
                electrical_type: ElectricalType::Passive,
                power_net: None,
                at: Point::new(x + 100, 0),
            }),
        );
    }
    sch.add_label(channel, LabelKind::Global, "GND", Point::new(0, 500));
    sch.add_wire(channel, Point::new(0, 500), Point::new(100, 500));

    for n in 0..channels {
        let sheet = sch.add_sheet(root, format!("CH{}", n), channel);
        let y = n as i64 * 200;
        sch.add_sheet_pin(root, sheet, "IN", Point::new(0, y));
        sch.add_wire(root, Point::new(0, y), Point::new(-100, y));
        sch.add_label(root, LabelKind::Local, format!("IN{}", n), Point::new(-100, y));
    }
    sch
}

fn bench_recalculate_fixture(c: &mut Criterion) {
    let sch = GraphCore::load(&fixture_path("amplifier.json")).unwrap();

    c.bench_function("recalculate_amplifier", |b| {
        b.iter(|| ConnectionGraph::build(black_box(&sch), GraphOptions::default()));
    });
}

fn bench_recalculate_wide(c: &mut Criterion) {
    let sch = wide_design(64, 32);
    let serial = GraphOptions {
        parallel: false,
        ..Default::default()
    };

    c.bench_function("recalculate_wide_parallel", |b| {
        b.iter(|| ConnectionGraph::build(black_box(&sch), GraphOptions::default()));
    });
    c.bench_function("recalculate_wide_serial", |b| {
        b.iter(|| ConnectionGraph::build(black_box(&sch), serial.clone()));
    });
}

criterion_group!(benches, bench_recalculate_fixture, bench_recalculate_wide);
criterion_main!(benches);
