//! Example: build a connection graph and print its netlist.
//! Run with: cargo run --example simple_netlist [path/to/design.json]

use schgraph::prelude::*;
use std::path::Path;

fn main() -> Result<(), GraphError> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tests/fixtures/amplifier.json".to_string());
    let path = Path::new(&path);

    if !path.exists() {
        eprintln!("File not found: {}", path.display());
        eprintln!("Usage: cargo run --example simple_netlist [path/to/design.json]");
        std::process::exit(1);
    }

    let schematic = GraphCore::load(path)?;
    let graph = GraphCore::build(&schematic, GraphOptions::default())?;

    println!("{} nets in {}", graph.netlist().len(), path.display());
    for net in graph.netlist() {
        println!("  {:>3} {}", net.code, net.name);
        for node in &net.nodes {
            println!("        {}{}-{}", node.sheet, node.reference, node.pin);
        }
    }

    for condition in graph.conditions() {
        println!("  ! {}", condition.message());
    }
    Ok(())
}
