//! Connection Graph
//!
//! Owns every subgraph of every sheet instance and answers connectivity
//! queries once [`ConnectionGraph::recalculate`] has completed. A
//! recalculation always starts from scratch; the graph is never patched.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info};

use super::bus::BusName;
use super::bus_expand::BusExpander;
use super::condition::Condition;
use super::connection::{ConnectionKind, ElectricalRole, ItemConnection};
use super::driver::{resolve_subgraphs, Driver, DriverPriority, NameScope};
use super::hierarchy::{link_sheet_pins, ItemLookup, Propagator};
use super::subgraph::{ConnectionSubgraph, SubgraphBuilder, SubgraphId, SubgraphKind};
use crate::core::{GraphError, GraphOptions};
use crate::schema::{InstanceId, ItemId, ItemKind, Schematic, SheetList};

/// Numeric identifier of a net, `1..=N` in name order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetCode(pub u32);

impl std::fmt::Display for NetCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Progress of a recalculation. Only `Empty` and `NetCodesAssigned` are
/// observable from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecalcStage {
    #[default]
    Empty,
    PerSheetSubgraphsBuilt,
    DriversResolved,
    BusesExpanded,
    HierarchyPropagated,
    NetCodesAssigned,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecalcStats {
    pub instances: usize,
    pub items: usize,
    pub subgraphs: usize,
    pub nets: usize,
    pub buses: usize,
    pub conditions: usize,
    pub propagation_passes: usize,
    pub converged: bool,
    pub elapsed_ms: u64,
}

/// A named net with its code and the subgraphs that form it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetInfo {
    pub code: NetCode,
    pub name: String,
    pub subgraphs: Vec<SubgraphId>,
    /// Sheet instances the net is visible on, by human path
    pub sheets: Vec<String>,
}

/// A named bus and its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BusInfo {
    pub name: String,
    pub members: Vec<String>,
    pub subgraphs: Vec<SubgraphId>,
}

/// One pin on a net, as written to a netlist.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct NetlistNode {
    pub reference: String,
    pub pin: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pin_name: String,
    pub sheet: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetlistNet {
    pub code: NetCode,
    pub name: String,
    pub nodes: Vec<NetlistNode>,
}

/// A merged group of subgraphs during naming.
struct NetGroup {
    subgraphs: Vec<SubgraphId>,
    kind: SubgraphKind,
    driver: Option<Driver>,
    name: String,
}

#[derive(Debug, Clone, Default)]
pub struct ConnectionGraph {
    options: GraphOptions,
    stage: RecalcStage,
    sheets: SheetList,
    subgraphs: Vec<ConnectionSubgraph>,
    lookup: ItemLookup,
    connections: Vec<ItemConnection>,
    connection_index: HashMap<(InstanceId, ItemId), usize>,
    names: BTreeMap<String, Vec<SubgraphId>>,
    buses: Vec<BusInfo>,
    code_names: Vec<String>,
    code_subgraphs: Vec<Vec<SubgraphId>>,
    netlist: Vec<NetlistNet>,
    conditions: Vec<Condition>,
    stats: RecalcStats,
}

impl ConnectionGraph {
    pub fn new(options: GraphOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    /// Build a graph for `schematic` in one step.
    pub fn build(schematic: &Schematic, options: GraphOptions) -> Result<Self, GraphError> {
        let mut graph = Self::new(options);
        graph.recalculate(schematic)?;
        Ok(graph)
    }

    pub fn options(&self) -> &GraphOptions {
        &self.options
    }

    pub fn stage(&self) -> RecalcStage {
        self.stage
    }

    fn advance(&mut self, stage: RecalcStage) {
        debug!(from = ?self.stage, to = ?stage, "recalculation stage");
        self.stage = stage;
    }

    /// Rebuild the whole graph from `schematic`.
    ///
    /// On error the graph is left empty.
    pub fn recalculate(&mut self, schematic: &Schematic) -> Result<RecalcStats, GraphError> {
        let started = Instant::now();
        let options = self.options.clone();
        *self = Self::new(options);

        let sheets = schematic.sheet_list()?;
        let tie_break = self.options.tie_break;

        let mut subgraphs =
            SubgraphBuilder::new(schematic, &sheets).build_all(self.options.parallel);
        let mut lookup = ItemLookup::new();
        for subgraph in &subgraphs {
            for &item in &subgraph.items {
                lookup.insert((subgraph.instance, item), subgraph.id);
            }
        }
        self.advance(RecalcStage::PerSheetSubgraphsBuilt);

        let mut conditions = resolve_subgraphs(&mut subgraphs, schematic, &sheets, tie_break);
        self.advance(RecalcStage::DriversResolved);

        let expander = BusExpander::new(schematic, &sheets, tie_break);
        let mut propagator = Propagator::new(schematic, &subgraphs, &expander, tie_break);
        propagator.refresh(&mut subgraphs);
        self.advance(RecalcStage::BusesExpanded);

        let links = link_sheet_pins(&mut subgraphs, schematic, &sheets, &lookup);
        conditions.extend(links.conditions.iter().cloned());
        let max_passes = self
            .options
            .max_propagation_passes
            .unwrap_or(2 * (sheets.max_depth() + 1) + 2);
        let outcome = propagator.propagate(&mut subgraphs, &links.pairs, max_passes);
        let merged = propagator.global_pass(&mut subgraphs);
        debug!(merged, "global name pass");
        conditions.extend(propagator.refresh(&mut subgraphs));
        self.advance(RecalcStage::HierarchyPropagated);

        let drivers = propagator.group_drivers(&subgraphs);
        let mut groups: Vec<NetGroup> = propagator
            .groups(&subgraphs)
            .into_iter()
            .map(|members| {
                let head = members[0].0 as usize;
                NetGroup {
                    kind: subgraphs[head].kind,
                    driver: drivers[head].clone(),
                    subgraphs: members,
                    name: String::new(),
                }
            })
            .collect();
        self.name_groups(&mut groups, &subgraphs, schematic, &sheets);
        self.assign_codes(&groups, &mut subgraphs);
        self.advance(RecalcStage::NetCodesAssigned);

        self.connections = build_connections(&groups, &subgraphs, schematic, &expander);
        self.connection_index = self
            .connections
            .iter()
            .enumerate()
            .map(|(i, c)| ((c.instance, c.item), i))
            .collect();
        self.netlist = self.build_netlist(&sheets);

        conditions.sort_by_key(|c| (c.instance(), c.item(), c.code()));
        conditions.dedup();

        self.stats = RecalcStats {
            instances: sheets.len(),
            items: lookup.len(),
            subgraphs: subgraphs.len(),
            nets: self.code_names.len(),
            buses: self.buses.len(),
            conditions: conditions.len(),
            propagation_passes: outcome.passes,
            converged: outcome.converged,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        self.sheets = sheets;
        self.subgraphs = subgraphs;
        self.lookup = lookup;
        self.conditions = conditions;

        info!(
            instances = self.stats.instances,
            subgraphs = self.stats.subgraphs,
            nets = self.stats.nets,
            conditions = self.stats.conditions,
            "connection graph recalculated"
        );
        Ok(self.stats.clone())
    }

    /// Final names: driver names, anonymous names for undriven groups, then
    /// collisions between distinct nets resolved.
    ///
    /// An undriven group is named after its lowest item UUID on its first
    /// instance, so adding or removing unrelated nets leaves it unchanged.
    fn name_groups(
        &self,
        groups: &mut [NetGroup],
        subgraphs: &[ConnectionSubgraph],
        schematic: &Schematic,
        sheets: &SheetList,
    ) {
        let order_key = |group: &NetGroup| {
            group
                .subgraphs
                .iter()
                .map(|id| &subgraphs[id.0 as usize])
                .flat_map(|subgraph| {
                    subgraph
                        .items
                        .iter()
                        .filter_map(|&item| schematic.item(item))
                        .map(|item| (subgraph.instance, item.uuid))
                })
                .min()
        };
        let keys: Vec<_> = groups.iter().map(order_key).collect();
        let mut order: Vec<usize> = (0..groups.len()).collect();
        order.sort_by_key(|&i| keys[i]);

        for &i in &order {
            let group = &mut groups[i];
            group.name = match (&group.driver, keys[i]) {
                (Some(driver), _) => driver.full_name.clone(),
                (None, Some((instance, uuid))) => {
                    let prefix = sheets.get(instance).map_or("", |s| s.name_prefix.as_str());
                    let simple = uuid.simple().to_string();
                    format!(
                        "{}{}{}",
                        prefix,
                        self.options.anonymous_prefix,
                        &simple[simple.len() - 8..]
                    )
                }
                (None, None) => self.options.anonymous_prefix.clone(),
            };
        }

        let mut by_name: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for &i in &order {
            by_name.entry(groups[i].name.clone()).or_default().push(i);
        }
        let mut taken: HashSet<String> = by_name.keys().cloned().collect();

        for (name, mut claimants) in by_name {
            if claimants.len() < 2 {
                continue;
            }
            // stable sort keeps creation order among equals
            claimants.sort_by_key(|&i| {
                !matches!(&groups[i].driver, Some(d) if d.scope == NameScope::Global)
            });
            for &i in &claimants[1..] {
                let root_local = matches!(
                    &groups[i].driver,
                    Some(d) if d.scope == NameScope::Local && d.depth == 0
                );
                let qualified = format!("/{}", name);
                let renamed = if root_local && !taken.contains(&qualified) {
                    qualified
                } else {
                    (1..)
                        .map(|n| format!("{}_{}", name, n))
                        .find(|candidate| !taken.contains(candidate))
                        .unwrap_or_default()
                };
                debug!(from = %name, to = %renamed, "renamed colliding net");
                taken.insert(renamed.clone());
                groups[i].name = renamed;
            }
        }
    }

    fn assign_codes(&mut self, groups: &[NetGroup], subgraphs: &mut [ConnectionSubgraph]) {
        let mut nets: Vec<&NetGroup> = groups.iter().filter(|g| g.kind == SubgraphKind::Net).collect();
        nets.sort_by(|a, b| a.name.cmp(&b.name));

        for (i, group) in nets.iter().enumerate() {
            let code = NetCode(i as u32 + 1);
            for id in &group.subgraphs {
                subgraphs[id.0 as usize].net_code = Some(code);
            }
            self.code_names.push(group.name.clone());
            self.code_subgraphs.push(group.subgraphs.clone());
        }

        for group in groups {
            for id in &group.subgraphs {
                subgraphs[id.0 as usize].name = group.name.clone();
            }
            self.names.insert(group.name.clone(), group.subgraphs.clone());
            if group.kind == SubgraphKind::Bus {
                let members = group
                    .subgraphs
                    .first()
                    .map(|id| {
                        subgraphs[id.0 as usize]
                            .members
                            .iter()
                            .map(|m| m.member.name.clone())
                            .collect()
                    })
                    .unwrap_or_default();
                self.buses.push(BusInfo {
                    name: group.name.clone(),
                    members,
                    subgraphs: group.subgraphs.clone(),
                });
            }
        }
        self.buses.sort_by(|a, b| a.name.cmp(&b.name));
    }

    fn build_netlist(&self, sheets: &SheetList) -> Vec<NetlistNet> {
        let mut nodes: Vec<Vec<NetlistNode>> = vec![Vec::new(); self.code_names.len()];
        for connection in &self.connections {
            let (Some(code), Some(pin)) = (connection.net_code, connection.pin.as_ref()) else {
                continue;
            };
            nodes[code.0 as usize - 1].push(NetlistNode {
                reference: pin.reference.clone(),
                pin: pin.number.clone(),
                pin_name: pin.name.clone(),
                sheet: sheets
                    .get(connection.instance)
                    .map(|i| i.human_path.clone())
                    .unwrap_or_default(),
            });
        }
        nodes
            .into_iter()
            .enumerate()
            .map(|(i, mut nodes)| {
                nodes.sort();
                nodes.dedup();
                NetlistNet {
                    code: NetCode(i as u32 + 1),
                    name: self.code_names[i].clone(),
                    nodes,
                }
            })
            .collect()
    }

    pub fn sheet_list(&self) -> &SheetList {
        &self.sheets
    }

    pub fn subgraphs(&self) -> &[ConnectionSubgraph] {
        &self.subgraphs
    }

    pub fn subgraph(&self, id: SubgraphId) -> Option<&ConnectionSubgraph> {
        self.subgraphs.get(id.0 as usize)
    }

    /// Subgraph holding `item` on `instance`.
    pub fn subgraph_for_item(&self, item: ItemId, instance: InstanceId) -> Option<&ConnectionSubgraph> {
        self.lookup
            .get(&(instance, item))
            .and_then(|id| self.subgraph(*id))
    }

    /// Final net and bus names with the subgraphs carrying each.
    pub fn net_map(&self) -> BTreeMap<String, Vec<SubgraphId>> {
        self.names.clone()
    }

    pub fn connection(&self, item: ItemId, instance: InstanceId) -> Option<&ItemConnection> {
        self.connection_index
            .get(&(instance, item))
            .map(|&i| &self.connections[i])
    }

    /// Every item connection, ordered by instance then item.
    pub fn connections(&self) -> &[ItemConnection] {
        &self.connections
    }

    pub fn net_code(&self, name: &str) -> Option<NetCode> {
        self.code_names
            .iter()
            .position(|n| n == name)
            .map(|i| NetCode(i as u32 + 1))
    }

    pub fn net_name(&self, code: NetCode) -> Option<&str> {
        let index = (code.0 as usize).checked_sub(1)?;
        self.code_names.get(index).map(String::as_str)
    }

    pub fn subgraphs_for_code(&self, code: NetCode) -> &[SubgraphId] {
        (code.0 as usize)
            .checked_sub(1)
            .and_then(|i| self.code_subgraphs.get(i))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn nets(&self) -> Vec<NetInfo> {
        self.code_names
            .iter()
            .zip(&self.code_subgraphs)
            .enumerate()
            .map(|(i, (name, subgraphs))| {
                let mut sheets: Vec<String> = subgraphs
                    .iter()
                    .filter_map(|id| self.subgraph(*id))
                    .filter_map(|s| self.sheets.get(s.instance))
                    .map(|inst| inst.human_path.clone())
                    .collect();
                sheets.sort();
                sheets.dedup();
                NetInfo {
                    code: NetCode(i as u32 + 1),
                    name: name.clone(),
                    subgraphs: subgraphs.clone(),
                    sheets,
                }
            })
            .collect()
    }

    pub fn buses(&self) -> &[BusInfo] {
        &self.buses
    }

    pub fn netlist(&self) -> &[NetlistNet] {
        &self.netlist
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn stats(&self) -> &RecalcStats {
        &self.stats
    }
}

fn build_connections(
    groups: &[NetGroup],
    subgraphs: &[ConnectionSubgraph],
    schematic: &Schematic,
    expander: &BusExpander<'_>,
) -> Vec<ItemConnection> {
    let group_of: HashMap<SubgraphId, &NetGroup> = groups
        .iter()
        .flat_map(|g| g.subgraphs.iter().map(move |id| (*id, g)))
        .collect();

    let mut connections = Vec::new();
    for subgraph in subgraphs {
        let Some(group) = group_of.get(&subgraph.id) else {
            continue;
        };
        let local_name = group
            .driver
            .as_ref()
            .map(|d| d.name.clone())
            .unwrap_or_else(|| group.name.clone());
        let kind = match subgraph.kind {
            SubgraphKind::Net => ConnectionKind::Net,
            SubgraphKind::Bus => {
                let text = subgraph
                    .driver
                    .as_ref()
                    .or(group.driver.as_ref())
                    .map(|d| d.name.as_str())
                    .unwrap_or_default();
                match expander.aliases(subgraph.instance).parse(text) {
                    Some(BusName::Vector { .. }) => ConnectionKind::BusVector,
                    _ => ConnectionKind::BusGroup,
                }
            }
        };
        let members = subgraph.members.iter().map(|m| m.member.clone()).collect::<Vec<_>>();
        let bus_parent = subgraph
            .bus_parents
            .first()
            .and_then(|id| subgraphs.get(id.0 as usize))
            .map(|bus| bus.name.clone());
        let driver_item = group
            .driver
            .as_ref()
            .filter(|d| d.priority != DriverPriority::BusMember && d.instance == subgraph.instance)
            .map(|d| d.item);

        for &item in &subgraph.items {
            let Some(sch_item) = schematic.item(item) else {
                continue;
            };
            connections.push(ItemConnection {
                item,
                instance: subgraph.instance,
                subgraph: subgraph.id,
                kind,
                name: group.name.clone(),
                local_name: local_name.clone(),
                members: members.clone(),
                bus_parent: bus_parent.clone(),
                is_driver: driver_item == Some(item),
                role: ElectricalRole::from(&sch_item.kind),
                net_code: subgraph.net_code,
                pin: match &sch_item.kind {
                    ItemKind::Pin(pin) => Some(pin.clone()),
                    _ => None,
                },
            });
        }
    }
    connections.sort_by_key(|c| (c.instance, c.item));
    connections
}
