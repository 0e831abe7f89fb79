//! Example: add a project-specific rule to the ERC engine.
//! Run with: cargo run --example custom_rules [path/to/design.json]

use schgraph::erc::{ErcEngine, ErcInput, ErcRule, Issue, Severity};
use schgraph::schema::ItemKind;
use schgraph::{GraphCore, GraphError, GraphOptions};
use std::path::Path;
use std::sync::Arc;

/// Nets that carry exactly one symbol pin.
struct SinglePinNetRule;

impl ErcRule for SinglePinNetRule {
    fn id(&self) -> &str {
        "single_pin_net"
    }

    fn name(&self) -> &str {
        "Single Pin Net"
    }

    fn severity(&self) -> Severity {
        Severity::Info
    }

    fn check(&self, input: &ErcInput<'_>) -> Vec<Issue> {
        let mut issues = Vec::new();
        for net in input.graph.netlist() {
            if net.nodes.len() != 1 {
                continue;
            }
            let pin = input.graph.subgraphs_for_code(net.code).iter().find_map(|id| {
                let subgraph = input.graph.subgraph(*id)?;
                subgraph
                    .items
                    .iter()
                    .find(|&&item| {
                        matches!(input.schematic.item(item).map(|i| &i.kind), Some(ItemKind::Pin(_)))
                    })
                    .map(|&item| (item, subgraph.instance))
            });
            if let Some((item, instance)) = pin {
                issues.push(input.issue(
                    self.id(),
                    self.severity(),
                    format!("Net {} reaches only one pin", net.name),
                    item,
                    instance,
                ));
            }
        }
        issues
    }
}

fn main() -> Result<(), GraphError> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tests/fixtures/amplifier.json".to_string());
    let path = Path::new(&path);

    if !path.exists() {
        eprintln!("File not found: {}", path.display());
        eprintln!("Usage: cargo run --example custom_rules [path/to/design.json]");
        std::process::exit(1);
    }

    let schematic = GraphCore::load(path)?;
    let graph = GraphCore::build(&schematic, GraphOptions::default())?;

    let mut engine = ErcEngine::with_default_rules();
    engine.add_rule(Arc::new(SinglePinNetRule));
    let issues = engine.analyze(&ErcInput::new(&schematic, &graph));

    println!("Found {} issues for {}", issues.len(), path.display());
    for issue in &issues {
        println!("  [{}] {} ({})", issue.severity, issue.message, issue.sheet);
    }

    let errors = issues.iter().filter(|i| i.severity == Severity::Error).count();
    if errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}
