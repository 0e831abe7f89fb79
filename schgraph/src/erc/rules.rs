use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use super::context::ErcPinContext;
use crate::connectivity::{Condition, ConnectionGraph, ConnectionSubgraph, ElectricalRole};
use crate::schema::{ElectricalType, InstanceId, ItemId, ItemKind, LabelKind, Point, Schematic};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Issue {
    pub id: String,
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    /// Human path of the sheet instance, `/` for the root
    pub sheet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net: Option<String>,
}

/// What a rule sees: the drawn schematic and its completed graph.
pub struct ErcInput<'a> {
    pub schematic: &'a Schematic,
    pub graph: &'a ConnectionGraph,
}

impl<'a> ErcInput<'a> {
    pub fn new(schematic: &'a Schematic, graph: &'a ConnectionGraph) -> Self {
        Self { schematic, graph }
    }

    /// Issue anchored on `item` as placed on `instance`.
    pub fn issue(
        &self,
        rule_id: &str,
        severity: Severity,
        message: String,
        item: ItemId,
        instance: InstanceId,
    ) -> Issue {
        let sheet = self
            .graph
            .sheet_list()
            .get(instance)
            .map(|i| i.human_path.clone())
            .unwrap_or_else(|| "/".to_string());
        let sch_item = self.schematic.item(item);
        let uuid = sch_item.map(|i| i.uuid);
        Issue {
            id: format!(
                "{}:{}{}",
                rule_id,
                sheet,
                uuid.map(|u| u.to_string()).unwrap_or_default()
            ),
            rule_id: rule_id.to_string(),
            severity,
            message,
            sheet,
            item: uuid,
            location: sch_item.and_then(|i| i.kind.points().first().copied()),
            net: self
                .graph
                .connection(item, instance)
                .map(|c| c.name.clone()),
        }
    }

    /// Subgraph items resolved against the schematic.
    fn kinds<'s>(&'s self, subgraph: &'s ConnectionSubgraph) -> impl Iterator<Item = &'s ItemKind> + 's {
        subgraph
            .items
            .iter()
            .filter_map(|&id| self.schematic.item(id))
            .map(|item| &item.kind)
    }
}

pub trait ErcRule: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn severity(&self) -> Severity;
    fn check(&self, input: &ErcInput<'_>) -> Vec<Issue>;
}

pub struct ErcEngine {
    rules: Vec<Arc<dyn ErcRule>>,
}

impl ErcEngine {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_default_rules() -> Self {
        Self::from_options(&ErcOptions::default())
    }

    /// Default rules, restricted to `options.rules` when it is not empty.
    pub fn from_options(options: &ErcOptions) -> Self {
        let defaults: Vec<Arc<dyn ErcRule>> = vec![
            Arc::new(GraphConditionRule),
            Arc::new(UnconnectedPinRule {
                dedupe: options.dedupe_pins,
            }),
            Arc::new(DanglingLabelRule),
            Arc::new(NoConnectConnectedRule),
        ];
        let mut engine = Self::new();
        for rule in defaults {
            if options.rules.is_empty() || options.rules.iter().any(|r| r == rule.id()) {
                engine.add_rule(rule);
            }
        }
        engine
    }

    pub fn add_rule(&mut self, rule: Arc<dyn ErcRule>) {
        self.rules.push(rule);
    }

    pub fn rule_ids(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.id()).collect()
    }

    pub fn analyze(&self, input: &ErcInput<'_>) -> Vec<Issue> {
        let mut issues = Vec::new();
        for rule in &self.rules {
            let found = rule.check(input);
            tracing::debug!(rule = rule.id(), issues = found.len(), "erc rule finished");
            issues.extend(found);
        }
        issues
    }
}

impl Default for ErcEngine {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

/// Rule selection for an ERC run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ErcOptions {
    /// Rule ids to run; empty runs all
    pub rules: Vec<String>,
    /// Report a pin once per distinct sub-sheet content
    pub dedupe_pins: bool,
}

impl Default for ErcOptions {
    fn default() -> Self {
        Self {
            rules: vec![],
            dedupe_pins: true,
        }
    }
}

// Rule implementations

/// Turns the graph's reportable conditions into issues.
pub struct GraphConditionRule;

impl ErcRule for GraphConditionRule {
    fn id(&self) -> &str {
        "graph_conditions"
    }

    fn name(&self) -> &str {
        "Connectivity conditions"
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn check(&self, input: &ErcInput<'_>) -> Vec<Issue> {
        input
            .graph
            .conditions()
            .iter()
            .map(|condition| {
                let severity = match condition {
                    Condition::DriverConflict { .. } => Severity::Warning,
                    Condition::BusWidthMismatch { .. }
                    | Condition::UnconnectedHierarchicalPin { .. } => self.severity(),
                };
                input.issue(
                    condition.code(),
                    severity,
                    condition.message(),
                    condition.item(),
                    condition.instance(),
                )
            })
            .collect()
    }
}

/// A symbol pin with nothing else on its subgraph.
pub struct UnconnectedPinRule {
    pub dedupe: bool,
}

impl ErcRule for UnconnectedPinRule {
    fn id(&self) -> &str {
        "unconnected_pin"
    }

    fn name(&self) -> &str {
        "Unconnected pin"
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn check(&self, input: &ErcInput<'_>) -> Vec<Issue> {
        let mut seen = HashSet::new();
        let mut issues = Vec::new();

        for connection in input.graph.connections() {
            let Some(pin) = connection.pin.as_ref() else {
                continue;
            };
            if pin.electrical_type == ElectricalType::NoConnect
                || connection.role == ElectricalRole::PowerPin
            {
                continue;
            }
            let Some(subgraph) = input.graph.subgraph(connection.subgraph) else {
                continue;
            };
            if subgraph.len() > 1 || !subgraph.hier_neighbors.is_empty() {
                continue;
            }
            if self.dedupe {
                let context = ErcPinContext::new(
                    input.schematic,
                    input.graph.sheet_list(),
                    connection.item,
                    connection.instance,
                );
                if context.is_some_and(|c| !seen.insert(c)) {
                    continue;
                }
            }
            issues.push(input.issue(
                self.id(),
                self.severity(),
                format!("Pin {} of {} is not connected", pin.number, pin.reference),
                connection.item,
                connection.instance,
            ));
        }
        issues
    }
}

/// A local or global label touching nothing.
pub struct DanglingLabelRule;

impl ErcRule for DanglingLabelRule {
    fn id(&self) -> &str {
        "dangling_label"
    }

    fn name(&self) -> &str {
        "Dangling label"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn check(&self, input: &ErcInput<'_>) -> Vec<Issue> {
        input
            .graph
            .subgraphs()
            .iter()
            .filter(|s| s.len() == 1)
            .filter_map(|subgraph| {
                let item = subgraph.items[0];
                match input.schematic.item(item).map(|i| &i.kind) {
                    Some(ItemKind::Label(label)) if label.kind != LabelKind::Hierarchical => {
                        Some(input.issue(
                            self.id(),
                            self.severity(),
                            format!("Label '{}' is not connected to anything", label.text),
                            item,
                            subgraph.instance,
                        ))
                    }
                    _ => None,
                }
            })
            .collect()
    }
}

/// A no-connect marker on a net that joins more than one pin.
pub struct NoConnectConnectedRule;

impl ErcRule for NoConnectConnectedRule {
    fn id(&self) -> &str {
        "noconnect_connected"
    }

    fn name(&self) -> &str {
        "No-connect marker on a connected net"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn check(&self, input: &ErcInput<'_>) -> Vec<Issue> {
        let graph = input.graph;
        let mut issues = Vec::new();

        for subgraph in graph.subgraphs() {
            let Some(marker) = subgraph.items.iter().copied().find(|&id| {
                matches!(
                    input.schematic.item(id).map(|i| &i.kind),
                    Some(ItemKind::NoConnect(_))
                )
            }) else {
                continue;
            };
            let pins: usize = match subgraph.net_code {
                Some(code) => graph
                    .subgraphs_for_code(code)
                    .iter()
                    .filter_map(|id| graph.subgraph(*id))
                    .map(|s| input.kinds(s).filter(|k| k.as_pin().is_some()).count())
                    .sum(),
                None => input.kinds(subgraph).filter(|k| k.as_pin().is_some()).count(),
            };
            if pins > 1 {
                issues.push(input.issue(
                    self.id(),
                    self.severity(),
                    format!("No-connect marker is on net '{}' joining {} pins", subgraph.name, pins),
                    marker,
                    subgraph.instance,
                ));
            }
        }
        issues
    }
}
