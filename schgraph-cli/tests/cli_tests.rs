//! CLI integration tests

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use schgraph::schema::{ItemKind, LabelKind, Pin, Point, Schematic};
use std::io::Write;
use tempfile::NamedTempFile;
use uuid::Uuid;

fn schgraph_cli() -> Command {
    cargo_bin_cmd!("schgraph-cli")
}

fn pin(reference: &str, number: &str, at: Point) -> ItemKind {
    ItemKind::Pin(Pin {
        symbol: Uuid::new_v4(),
        reference: reference.into(),
        number: number.into(),
        name: String::new(),
        electrical_type: Default::default(),
        power_net: None,
        at,
    })
}

fn write_schematic(sch: &Schematic) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(sch.to_json().unwrap().as_bytes()).unwrap();
    file
}

/// Root wire labelled CLK into a child sheet, plus a dangling label.
fn clk_design() -> NamedTempFile {
    let mut sch = Schematic::new("root");
    let root = sch.root();
    let child = sch.add_screen("timer");
    let sheet = sch.add_sheet(root, "Timer", child);

    sch.add_item(root, pin("U1", "3", Point::new(0, 0)));
    sch.add_wire(root, Point::new(0, 0), Point::new(100, 0));
    sch.add_label(root, LabelKind::Local, "CLK", Point::new(50, 0));
    sch.add_sheet_pin(root, sheet, "CLK", Point::new(100, 0));

    sch.add_label(child, LabelKind::Hierarchical, "CLK", Point::new(0, 0));
    sch.add_wire(child, Point::new(0, 0), Point::new(50, 0));
    sch.add_item(child, pin("U2", "1", Point::new(50, 0)));

    sch.add_label(root, LabelKind::Local, "SPARE", Point::new(900, 900));
    write_schematic(&sch)
}

#[test]
fn test_cli_help() {
    let mut cmd = schgraph_cli();

    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("connectivity"));
}

#[test]
fn test_cli_version() {
    let mut cmd = schgraph_cli();

    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_nets_human() {
    let file = clk_design();
    let mut cmd = schgraph_cli();

    cmd.arg("nets").arg(file.path());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("CLK"))
        .stdout(predicate::str::contains("U1-3"))
        .stdout(predicate::str::contains("U2-1"));
}

#[test]
fn test_cli_nets_json() {
    let file = clk_design();
    let mut cmd = schgraph_cli();

    cmd.arg("nets").arg(file.path()).arg("--format").arg("json");
    let output = cmd.assert().success().get_output().stdout.clone();
    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();

    let nets = json["nets"].as_array().unwrap();
    let clk = nets.iter().find(|n| n["name"] == "CLK").unwrap();
    assert_eq!(clk["sheets"].as_array().unwrap().len(), 2);
}

#[test]
fn test_cli_check_reports_dangling_label() {
    let file = clk_design();
    let mut cmd = schgraph_cli();

    cmd.arg("check").arg(file.path());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("dangling_label"))
        .stdout(predicate::str::contains("SPARE"));
}

#[test]
fn test_cli_check_fail_on_warning() {
    let file = clk_design();
    let mut cmd = schgraph_cli();

    cmd.arg("check")
        .arg(file.path())
        .arg("--fail-on")
        .arg("warning");
    cmd.assert().failure();
}

#[test]
fn test_cli_check_fail_on_error_passes() {
    let file = clk_design();
    let mut cmd = schgraph_cli();

    cmd.arg("check").arg(file.path()).arg("--fail-on").arg("error");
    cmd.assert().success();
}

#[test]
fn test_cli_check_json_output() {
    let file = clk_design();
    let mut cmd = schgraph_cli();

    cmd.arg("check").arg(file.path()).arg("--format").arg("json");
    let output = cmd.assert().success().get_output().stdout.clone();
    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["stats"]["warnings"], 1);
    assert_eq!(json["stats"]["errors"], 0);
}

#[test]
fn test_cli_check_rule_filter() {
    let file = clk_design();
    let mut cmd = schgraph_cli();

    cmd.arg("check")
        .arg(file.path())
        .arg("--rule")
        .arg("unconnected_pin");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("No issues found"));
}

#[test]
fn test_cli_stats_serial() {
    let file = clk_design();
    let mut cmd = schgraph_cli();

    cmd.arg("stats").arg(file.path()).arg("--serial");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Sheet instances:    2"));
}

#[test]
fn test_cli_missing_file() {
    let mut cmd = schgraph_cli();

    cmd.arg("nets").arg("/nonexistent/design.json");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("failed to load"));
}

#[test]
fn test_cli_invalid_json() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"{\"screens\": 3}").unwrap();
    let mut cmd = schgraph_cli();

    cmd.arg("check").arg(file.path());
    cmd.assert().failure().stderr(predicate::str::contains("Error"));
}

#[test]
fn test_cli_rules_list() {
    let mut cmd = schgraph_cli();

    cmd.arg("rules");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("unconnected_pin"))
        .stdout(predicate::str::contains("noconnect_connected"));
}
