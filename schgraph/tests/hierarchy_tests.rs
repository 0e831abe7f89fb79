//! Hierarchy: sheet pins, reused sub-sheets, global names and bus alignment

use schgraph::connectivity::{Condition, ConnectionGraph, HierSide, NetCode};
use schgraph::prelude::*;
use schgraph::schema::{BusEntry, ElectricalType, InstanceId, ItemId, Pin, ScreenId};
use schgraph::{ErcOptions, GraphCore};
use std::path::PathBuf;
use uuid::Uuid;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn pin(reference: &str, number: &str, at: Point) -> ItemKind {
    ItemKind::Pin(Pin {
        symbol: Uuid::new_v4(),
        reference: reference.into(),
        number: number.into(),
        name: String::new(),
        electrical_type: ElectricalType::Passive,
        power_net: None,
        at,
    })
}

fn power(net: &str, at: Point) -> ItemKind {
    ItemKind::Pin(Pin {
        symbol: Uuid::new_v4(),
        reference: "#PWR".into(),
        number: "1".into(),
        name: net.into(),
        electrical_type: ElectricalType::PowerIn,
        power_net: Some(net.into()),
        at,
    })
}

fn build(sch: &Schematic) -> ConnectionGraph {
    ConnectionGraph::build(sch, GraphOptions::default()).unwrap()
}

fn code_at(graph: &ConnectionGraph, item: ItemId, instance: InstanceId) -> Option<NetCode> {
    graph.connection(item, instance).and_then(|c| c.net_code)
}

fn instance(graph: &ConnectionGraph, human_path: &str) -> InstanceId {
    graph
        .sheet_list()
        .find_by_human_path(human_path)
        .unwrap_or_else(|| panic!("no instance {}", human_path))
}

#[test]
fn test_amplifier_fixture_nets() {
    let sch = GraphCore::load(&fixture_path("amplifier.json")).unwrap();
    let graph = build(&sch);

    let names: Vec<(u32, String)> = graph
        .nets()
        .into_iter()
        .map(|n| (n.code.0, n.name))
        .collect();
    assert_eq!(
        names,
        vec![
            (1, "/Left/Net-(R1-Pad2)".to_string()),
            (2, "/Right/Net-(R1-Pad2)".to_string()),
            (3, "GND".to_string()),
            (4, "SIG".to_string()),
        ]
    );
    assert!(graph.conditions().is_empty());
    assert_eq!(graph.stats().instances, 3);
    assert!(graph.stats().converged);
}

#[test]
fn test_amplifier_signal_spans_all_instances() {
    let sch = GraphCore::load(&fixture_path("amplifier.json")).unwrap();
    let graph = build(&sch);

    let sig = graph
        .nets()
        .into_iter()
        .find(|n| n.name == "SIG")
        .unwrap();
    assert_eq!(sig.sheets, vec!["/", "/Left/", "/Right/"]);

    let nodes: Vec<String> = graph.netlist()[sig.code.0 as usize - 1]
        .nodes
        .iter()
        .map(|n| format!("{}{}-{}", n.sheet, n.reference, n.pin))
        .collect();
    assert_eq!(nodes, vec!["/Left/R1-1", "/Right/R1-1", "/U1-1"]);
}

#[test]
fn test_amplifier_reused_sheet_keeps_local_nets_apart() {
    let sch = GraphCore::load(&fixture_path("amplifier.json")).unwrap();
    let graph = build(&sch);
    let left = instance(&graph, "/Left/");
    let right = instance(&graph, "/Right/");
    let r1_pad2 = sch.find_item(Uuid::from_u128(0x204)).unwrap();
    let r2_pad2 = sch.find_item(Uuid::from_u128(0x209)).unwrap();

    assert_ne!(code_at(&graph, r1_pad2, left), code_at(&graph, r1_pad2, right));
    assert_eq!(code_at(&graph, r2_pad2, left), code_at(&graph, r2_pad2, right));
    assert_eq!(graph.net_code("GND"), code_at(&graph, r2_pad2, left));
}

#[test]
fn test_amplifier_passes_erc() {
    let result = GraphCore::check_file(
        &fixture_path("amplifier.json"),
        GraphOptions::default(),
        &ErcOptions::default(),
    )
    .unwrap();
    assert_eq!(result.total_issues(), 0, "{:?}", result.issues);
    assert!(result.file.is_some());
}

#[test]
fn test_clk_net_spans_parent_and_child() {
    let mut sch = Schematic::new("root");
    let root = sch.root();
    let child = sch.add_screen("timer");
    let sheet = sch.add_sheet(root, "Timer", child);

    let u1 = sch.add_item(root, pin("U1", "3", Point::new(0, 0)));
    sch.add_wire(root, Point::new(0, 0), Point::new(100, 0));
    sch.add_label(root, LabelKind::Local, "CLK", Point::new(50, 0));
    sch.add_sheet_pin(root, sheet, "CLK", Point::new(100, 0));
    sch.add_label(child, LabelKind::Hierarchical, "CLK", Point::new(0, 0));
    sch.add_wire(child, Point::new(0, 0), Point::new(50, 0));
    let u2 = sch.add_item(child, pin("U2", "1", Point::new(50, 0)));

    let graph = build(&sch);
    let timer = instance(&graph, "/Timer/");
    let code = code_at(&graph, u1, InstanceId(0)).unwrap();
    assert_eq!(code_at(&graph, u2, timer), Some(code));
    assert_eq!(graph.net_name(code), Some("CLK"));
    assert_eq!(graph.net_map()["CLK"].len(), 2);

    let child_conn = graph.connection(u2, timer).unwrap();
    assert_eq!(child_conn.name, "CLK");
    assert!(graph.conditions().is_empty());
}

#[test]
fn test_five_level_hierarchy_shares_one_code() {
    let mut sch = Schematic::new("root");
    let mut parent = sch.root();
    sch.add_label(parent, LabelKind::Local, "TOP", Point::new(0, 0));
    sch.add_wire(parent, Point::new(0, 0), Point::new(100, 0));

    let mut deepest = None;
    for level in 1..=4 {
        let screen = sch.add_screen(format!("level{}", level));
        let sheet = sch.add_sheet(parent, format!("L{}", level), screen);
        sch.add_sheet_pin(parent, sheet, "SIG", Point::new(100, 0));
        sch.add_label(screen, LabelKind::Hierarchical, "SIG", Point::new(0, 0));
        sch.add_wire(screen, Point::new(0, 0), Point::new(100, 0));
        parent = screen;
        deepest = Some(screen);
    }
    let leaf: ScreenId = deepest.unwrap();
    let u9 = sch.add_item(leaf, pin("U9", "1", Point::new(100, 0)));

    let graph = build(&sch);
    assert_eq!(graph.sheet_list().max_depth(), 4);
    assert_eq!(graph.nets().len(), 1);
    assert_eq!(graph.net_name(NetCode(1)), Some("TOP"));

    let leaf_instance = instance(&graph, "/L1/L2/L3/L4/");
    assert_eq!(code_at(&graph, u9, leaf_instance), Some(NetCode(1)));
    assert_eq!(graph.subgraphs_for_code(NetCode(1)).len(), 5);
    assert!(graph.stats().converged);
}

#[test]
fn test_hier_label_outranks_sheet_pin() {
    let mut sch = Schematic::new("root");
    let root = sch.root();
    let child = sch.add_screen("child");
    let sheet = sch.add_sheet(root, "Child", child);
    let wire = sch.add_wire(root, Point::new(0, 0), Point::new(100, 0));
    sch.add_sheet_pin(root, sheet, "DATA", Point::new(100, 0));
    sch.add_label(child, LabelKind::Hierarchical, "DATA", Point::new(0, 0));

    let graph = build(&sch);
    assert_eq!(graph.connection(wire, InstanceId(0)).unwrap().name, "/Child/DATA");
}

#[test]
fn test_sibling_sheets_wired_through_differently_named_pins() {
    let mut sch = Schematic::new("root");
    let root = sch.root();
    let producer = sch.add_screen("producer");
    let consumer = sch.add_screen("consumer");
    let a = sch.add_sheet(root, "A", producer);
    let b = sch.add_sheet(root, "B", consumer);

    sch.add_wire(root, Point::new(0, 0), Point::new(100, 0));
    sch.add_sheet_pin(root, a, "OUT", Point::new(0, 0));
    sch.add_sheet_pin(root, b, "IN", Point::new(100, 0));

    sch.add_label(producer, LabelKind::Hierarchical, "OUT", Point::new(0, 0));
    sch.add_wire(producer, Point::new(0, 0), Point::new(10, 0));
    let u1 = sch.add_item(producer, pin("U1", "2", Point::new(10, 0)));
    sch.add_label(consumer, LabelKind::Hierarchical, "IN", Point::new(0, 0));
    sch.add_wire(consumer, Point::new(0, 0), Point::new(10, 0));
    let u2 = sch.add_item(consumer, pin("U2", "5", Point::new(10, 0)));

    let graph = build(&sch);
    assert!(graph.conditions().is_empty(), "{:?}", graph.conditions());
    let code = code_at(&graph, u1, instance(&graph, "/A/"));
    assert!(code.is_some());
    assert_eq!(code, code_at(&graph, u2, instance(&graph, "/B/")));
    assert_eq!(graph.nets().len(), 1);
}

#[test]
fn test_global_label_joins_sibling_sheets() {
    let mut sch = Schematic::new("root");
    let root = sch.root();
    let a = sch.add_screen("a");
    let b = sch.add_screen("b");
    sch.add_sheet(root, "A", a);
    sch.add_sheet(root, "B", b);
    sch.add_label(a, LabelKind::Global, "IRQ", Point::new(0, 0));
    sch.add_wire(a, Point::new(0, 0), Point::new(10, 0));
    let pa = sch.add_item(a, pin("U1", "7", Point::new(10, 0)));
    sch.add_label(b, LabelKind::Global, "IRQ", Point::new(0, 0));
    sch.add_wire(b, Point::new(0, 0), Point::new(10, 0));
    let pb = sch.add_item(b, pin("U2", "7", Point::new(10, 0)));

    let graph = build(&sch);
    let code = code_at(&graph, pa, instance(&graph, "/A/"));
    assert!(code.is_some());
    assert_eq!(code, code_at(&graph, pb, instance(&graph, "/B/")));
    assert_eq!(graph.net_name(code.unwrap()), Some("IRQ"));
}

#[test]
fn test_local_labels_do_not_cross_sheets() {
    let mut sch = Schematic::new("root");
    let root = sch.root();
    let a = sch.add_screen("a");
    sch.add_sheet(root, "A", a);
    sch.add_label(root, LabelKind::Local, "EN", Point::new(0, 0));
    sch.add_wire(root, Point::new(0, 0), Point::new(10, 0));
    sch.add_label(a, LabelKind::Local, "EN", Point::new(0, 0));
    sch.add_wire(a, Point::new(0, 0), Point::new(10, 0));

    let graph = build(&sch);
    let names: Vec<String> = graph.nets().into_iter().map(|n| n.name).collect();
    assert_eq!(names, vec!["/A/EN", "EN"]);
}

#[test]
fn test_power_pins_merge_across_instances() {
    let mut sch = Schematic::new("root");
    let root = sch.root();
    let child = sch.add_screen("child");
    sch.add_sheet(root, "One", child);
    sch.add_sheet(root, "Two", child);
    sch.add_item(root, power("+5V", Point::new(0, 0)));
    sch.add_wire(root, Point::new(0, 0), Point::new(10, 0));
    sch.add_item(child, power("+5V", Point::new(0, 0)));
    sch.add_wire(child, Point::new(0, 0), Point::new(10, 0));

    let graph = build(&sch);
    assert_eq!(graph.nets().len(), 1);
    let net = &graph.nets()[0];
    assert_eq!(net.name, "+5V");
    assert_eq!(net.sheets, vec!["/", "/One/", "/Two/"]);
}

#[test]
fn test_root_local_label_joins_global_name() {
    let mut sch = Schematic::new("root");
    let root = sch.root();
    let child = sch.add_screen("child");
    sch.add_sheet(root, "Child", child);
    let p1 = sch.add_item(root, power("VBUS", Point::new(0, 0)));
    sch.add_wire(root, Point::new(0, 0), Point::new(10, 0));
    let label = sch.add_label(root, LabelKind::Local, "VBUS", Point::new(0, 100));
    sch.add_wire(root, Point::new(0, 100), Point::new(10, 100));
    sch.add_label(child, LabelKind::Local, "VBUS", Point::new(0, 0));
    sch.add_wire(child, Point::new(0, 0), Point::new(10, 0));
    let u1 = sch.add_item(child, pin("U1", "1", Point::new(10, 0)));

    let graph = build(&sch);
    let names: Vec<String> = graph.nets().into_iter().map(|n| n.name).collect();
    assert_eq!(names, vec!["/Child/VBUS", "VBUS"]);
    assert_eq!(code_at(&graph, p1, InstanceId::ROOT), code_at(&graph, label, InstanceId::ROOT));
    assert_ne!(
        code_at(&graph, p1, InstanceId::ROOT),
        code_at(&graph, u1, instance(&graph, "/Child/"))
    );
    assert!(graph.conditions().is_empty());
}

#[test]
fn test_unmatched_sheet_pin_is_reported() {
    let mut sch = Schematic::new("root");
    let root = sch.root();
    let child = sch.add_screen("child");
    let sheet = sch.add_sheet(root, "Child", child);
    sch.add_wire(root, Point::new(0, 0), Point::new(100, 0));
    let spin = sch.add_sheet_pin(root, sheet, "ENABLE", Point::new(100, 0));

    let graph = build(&sch);
    match graph.conditions() {
        [Condition::UnconnectedHierarchicalPin {
            instance,
            item,
            name,
            side,
        }] => {
            assert_eq!(*instance, InstanceId(0));
            assert_eq!(*item, spin);
            assert_eq!(name, "ENABLE");
            assert_eq!(*side, HierSide::SheetPin);
        }
        other => panic!("expected one unconnected pin, got {:?}", other),
    }

    let result = GraphCore::check(&sch, GraphOptions::default(), &ErcOptions::default()).unwrap();
    assert!(result.has_errors());
    assert!(result
        .issues
        .iter()
        .any(|i| i.rule_id == "unconnected_hierarchical_pin"));
}

#[test]
fn test_bus_aligns_across_sheet_boundary() {
    let mut sch = Schematic::new("root");
    let root = sch.root();
    let child = sch.add_screen("child");
    let sheet = sch.add_sheet(root, "Child", child);

    let entry = |sch: &mut Schematic, screen: ScreenId, y: i64, reference: &str| {
        sch.add_item(
            screen,
            ItemKind::BusEntry(BusEntry {
                bus_end: Point::new(0, y),
                wire_end: Point::new(10, y + 10),
            }),
        );
        sch.add_wire(screen, Point::new(10, y + 10), Point::new(100, y + 10));
        sch.add_item(screen, pin(reference, "1", Point::new(100, y + 10)))
    };

    sch.add_bus(root, Point::new(0, 0), Point::new(0, 200));
    sch.add_label(root, LabelKind::Local, "D[0..1]", Point::new(0, 0));
    sch.add_sheet_pin(root, sheet, "D[0..1]", Point::new(0, 200));
    let r1 = entry(&mut sch, root, 50, "R1");
    let r2 = entry(&mut sch, root, 150, "R2");

    sch.add_bus(child, Point::new(0, 0), Point::new(0, 200));
    sch.add_label(child, LabelKind::Hierarchical, "D[0..1]", Point::new(0, 0));
    let r3 = entry(&mut sch, child, 50, "R3");
    let r4 = entry(&mut sch, child, 150, "R4");

    let graph = build(&sch);
    let child_instance = instance(&graph, "/Child/");
    let root_instance = InstanceId(0);

    assert_eq!(code_at(&graph, r1, root_instance), code_at(&graph, r3, child_instance));
    assert_eq!(code_at(&graph, r2, root_instance), code_at(&graph, r4, child_instance));
    assert_ne!(code_at(&graph, r1, root_instance), code_at(&graph, r2, root_instance));
    assert_eq!(graph.connection(r3, child_instance).unwrap().name, "D0");
    assert_eq!(graph.connection(r4, child_instance).unwrap().name, "D1");
    assert_eq!(graph.buses().len(), 1);
}

#[test]
fn test_recursive_sheet_is_rejected() {
    let mut sch = Schematic::new("root");
    let root = sch.root();
    let child = sch.add_screen("loop");
    sch.add_sheet(root, "Loop", child);
    sch.add_sheet(child, "Again", child);

    let err = ConnectionGraph::build(&sch, GraphOptions::default()).unwrap_err();
    assert!(matches!(err, GraphError::RecursiveSheet(ref name) if name == "loop"));
}
