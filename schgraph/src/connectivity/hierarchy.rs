//! Hierarchical Propagator
//!
//! Merges per-instance subgraphs into design-wide nets. Sheet pins pair with
//! the hierarchical labels of the child instance they sit on; names repeated
//! on one instance unify; buses that end up merged align their members. The
//! union pass repeats until the partition stops changing, then global names
//! are merged once. Root-sheet local names share the global namespace.

use petgraph::unionfind::UnionFind;
use std::collections::HashMap;

use super::bus_expand::{align_members, BusExpander};
use super::condition::{Condition, HierSide};
use super::driver::{Driver, NameScope, TieBreak};
use super::subgraph::{ConnectionSubgraph, SubgraphId};
use crate::schema::{InstanceId, ItemId, ItemKind, LabelKind, Schematic, SheetList};

/// Lookup from an item placed on an instance to its subgraph.
pub type ItemLookup = HashMap<(InstanceId, ItemId), SubgraphId>;

/// Sheet pin / hierarchical label pairings, fixed for one recalculation.
#[derive(Debug, Clone, Default)]
pub struct HierLinks {
    /// (parent subgraph holding the sheet pin, child subgraph holding the label)
    pub pairs: Vec<(SubgraphId, SubgraphId)>,
    pub conditions: Vec<Condition>,
}

/// Pair every sheet pin with the same-named hierarchical labels of its child
/// instance and record the neighbours on both subgraphs.
pub fn link_sheet_pins(
    subgraphs: &mut [ConnectionSubgraph],
    schematic: &Schematic,
    sheets: &SheetList,
    lookup: &ItemLookup,
) -> HierLinks {
    let mut links = HierLinks::default();

    for instance in sheets.iter() {
        let labels: Vec<(ItemId, &str)> = sheets
            .items(schematic, instance.id)
            .into_iter()
            .filter_map(|(id, item)| match &item.kind {
                ItemKind::Label(label)
                    if label.kind == LabelKind::Hierarchical && !label.text.is_empty() =>
                {
                    Some((id, label.text.as_str()))
                }
                _ => None,
            })
            .collect();

        let (Some(parent), Some(sheet)) = (instance.parent, instance.sheet) else {
            for (item, name) in labels {
                links.conditions.push(Condition::UnconnectedHierarchicalPin {
                    instance: instance.id,
                    item,
                    name: name.to_string(),
                    side: HierSide::HierLabel,
                });
            }
            continue;
        };

        let pins: Vec<(ItemId, &str)> = sheets
            .items(schematic, parent)
            .into_iter()
            .filter_map(|(id, item)| match &item.kind {
                ItemKind::SheetPin(pin) if pin.sheet == sheet => Some((id, pin.name.as_str())),
                _ => None,
            })
            .collect();

        for &(pin_item, pin_name) in &pins {
            let matching: Vec<ItemId> = labels
                .iter()
                .filter(|(_, name)| *name == pin_name)
                .map(|(id, _)| *id)
                .collect();
            if matching.is_empty() {
                links.conditions.push(Condition::UnconnectedHierarchicalPin {
                    instance: parent,
                    item: pin_item,
                    name: pin_name.to_string(),
                    side: HierSide::SheetPin,
                });
                continue;
            }
            let Some(&outer) = lookup.get(&(parent, pin_item)) else {
                continue;
            };
            for label_item in matching {
                if let Some(&inner) = lookup.get(&(instance.id, label_item)) {
                    links.pairs.push((outer, inner));
                }
            }
        }

        for &(label_item, name) in &labels {
            if !pins.iter().any(|(_, pin_name)| *pin_name == name) {
                links.conditions.push(Condition::UnconnectedHierarchicalPin {
                    instance: instance.id,
                    item: label_item,
                    name: name.to_string(),
                    side: HierSide::HierLabel,
                });
            }
        }
    }

    for &(outer, inner) in &links.pairs {
        let push = |list: &mut Vec<SubgraphId>, id: SubgraphId| {
            if !list.contains(&id) {
                list.push(id);
            }
        };
        push(&mut subgraphs[outer.0 as usize].hier_neighbors, inner);
        push(&mut subgraphs[inner.0 as usize].hier_neighbors, outer);
    }

    links
}

/// Name under which subgraphs are unified without a drawn connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum NameKey {
    Local {
        bus: bool,
        instance: InstanceId,
        name: String,
    },
    Global {
        bus: bool,
        name: String,
    },
}

impl NameKey {
    fn is_global(&self) -> bool {
        matches!(self, NameKey::Global { .. })
    }
}

/// Result of the fixpoint loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Propagation {
    pub passes: usize,
    pub converged: bool,
}

/// Union-find over subgraph ids plus the name keys that drive the unions.
pub struct Propagator<'a> {
    expander: &'a BusExpander<'a>,
    tie_break: TieBreak,
    sets: UnionFind<usize>,
    /// Label and power names drawn in each subgraph
    keys: Vec<Vec<NameKey>>,
    unions: usize,
}

impl<'a> Propagator<'a> {
    pub fn new(
        schematic: &Schematic,
        subgraphs: &[ConnectionSubgraph],
        expander: &'a BusExpander<'a>,
        tie_break: TieBreak,
    ) -> Self {
        let keys = subgraphs
            .iter()
            .map(|subgraph| {
                let bus = subgraph.is_bus();
                let at_root = subgraph.instance == InstanceId::ROOT;
                let mut keys = Vec::new();
                for item in subgraph.items.iter().filter_map(|&id| schematic.item(id)) {
                    match &item.kind {
                        ItemKind::Label(label) if label.text.is_empty() => {}
                        ItemKind::Label(label) => {
                            let name = label.text.clone();
                            match label.kind {
                                LabelKind::Global => keys.push(NameKey::Global { bus, name }),
                                LabelKind::Local | LabelKind::Hierarchical => {
                                    if at_root {
                                        keys.push(NameKey::Global {
                                            bus,
                                            name: name.clone(),
                                        });
                                    }
                                    keys.push(NameKey::Local {
                                        bus,
                                        instance: subgraph.instance,
                                        name,
                                    });
                                }
                            }
                        }
                        ItemKind::Pin(pin) if pin.is_power_driver() => keys.push(NameKey::Global {
                            bus: false,
                            name: pin.power_net.clone().unwrap_or_default(),
                        }),
                        _ => {}
                    }
                }
                keys.dedup();
                keys
            })
            .collect();

        Self {
            expander,
            tie_break,
            sets: UnionFind::new(subgraphs.len()),
            keys,
            unions: 0,
        }
    }

    pub fn find(&self, id: SubgraphId) -> SubgraphId {
        SubgraphId(self.sets.find(id.0 as usize) as u32)
    }

    fn union(&mut self, a: SubgraphId, b: SubgraphId) {
        if self.sets.union(a.0 as usize, b.0 as usize) {
            self.unions += 1;
        }
    }

    /// Number of merges performed so far.
    pub fn unions(&self) -> usize {
        self.unions
    }

    /// Winning driver of each subgraph's merged group, indexed by subgraph.
    pub fn group_drivers(&self, subgraphs: &[ConnectionSubgraph]) -> Vec<Option<Driver>> {
        let mut best: HashMap<usize, &Driver> = HashMap::new();
        for subgraph in subgraphs {
            let root = self.sets.find(subgraph.id.0 as usize);
            for driver in subgraph.drivers() {
                best.entry(root)
                    .and_modify(|current| {
                        if driver.rank(current, self.tie_break).is_lt() {
                            *current = driver;
                        }
                    })
                    .or_insert(driver);
            }
        }
        subgraphs
            .iter()
            .map(|s| best.get(&self.sets.find(s.id.0 as usize)).map(|d| (*d).clone()))
            .collect()
    }

    /// Re-expand buses under the current group drivers.
    pub fn refresh(&self, subgraphs: &mut [ConnectionSubgraph]) -> Vec<Condition> {
        let drivers = self.group_drivers(subgraphs);
        self.expander
            .expand(subgraphs, &|id: SubgraphId| drivers[id.0 as usize].clone())
    }

    /// Run union passes until nothing merges or `max_passes` is reached.
    pub fn propagate(
        &mut self,
        subgraphs: &mut [ConnectionSubgraph],
        pairs: &[(SubgraphId, SubgraphId)],
        max_passes: usize,
    ) -> Propagation {
        let mut passes = 0;
        loop {
            passes += 1;
            let before = self.unions;

            for &(outer, inner) in pairs {
                self.union(outer, inner);
            }
            self.union_names(subgraphs, false);
            self.align_buses(subgraphs);
            self.refresh(subgraphs);

            tracing::debug!(pass = passes, merged = self.unions - before, "propagation pass");

            if self.unions == before {
                return Propagation {
                    passes,
                    converged: true,
                };
            }
            if passes >= max_passes {
                tracing::warn!(
                    passes,
                    "hierarchical propagation hit its pass bound before converging"
                );
                return Propagation {
                    passes,
                    converged: false,
                };
            }
        }
    }

    /// Merge global labels, power nets and global bus members by name.
    pub fn global_pass(&mut self, subgraphs: &mut [ConnectionSubgraph]) -> usize {
        let before = self.unions;
        self.union_names(subgraphs, true);
        self.align_buses(subgraphs);
        self.unions - before
    }

    fn member_keys(subgraphs: &[ConnectionSubgraph]) -> Vec<(NameKey, SubgraphId)> {
        let mut keys = Vec::new();
        for bus in subgraphs.iter().filter(|s| s.is_bus()) {
            let Some(driver) = bus.driver.as_ref() else {
                continue;
            };
            for link in &bus.members {
                let Some(net) = link.net else {
                    continue;
                };
                let name = link.member.name.clone();
                if driver.scope == NameScope::Local && bus.instance == InstanceId::ROOT {
                    keys.push((
                        NameKey::Global {
                            bus: false,
                            name: name.clone(),
                        },
                        net,
                    ));
                }
                let key = match driver.scope {
                    NameScope::Global => NameKey::Global { bus: false, name },
                    NameScope::Local => NameKey::Local {
                        bus: false,
                        instance: bus.instance,
                        name,
                    },
                };
                keys.push((key, net));
            }
        }
        keys
    }

    fn union_names(&mut self, subgraphs: &[ConnectionSubgraph], global: bool) {
        let mut first: HashMap<NameKey, SubgraphId> = HashMap::new();
        let mut pending = Vec::new();

        let drawn = self
            .keys
            .iter()
            .enumerate()
            .flat_map(|(i, keys)| keys.iter().map(move |k| (k.clone(), SubgraphId(i as u32))));
        for (key, id) in drawn.chain(Self::member_keys(subgraphs)) {
            if key.is_global() != global {
                continue;
            }
            match first.get(&key) {
                Some(&head) => pending.push((head, id)),
                None => {
                    first.insert(key, id);
                }
            }
        }
        for (a, b) in pending {
            self.union(a, b);
        }
    }

    fn align_buses(&mut self, subgraphs: &[ConnectionSubgraph]) {
        let mut groups: HashMap<usize, Vec<&ConnectionSubgraph>> = HashMap::new();
        for bus in subgraphs.iter().filter(|s| s.is_bus()) {
            groups
                .entry(self.sets.find(bus.id.0 as usize))
                .or_default()
                .push(bus);
        }

        let mut pending = Vec::new();
        for buses in groups.values() {
            let Some((head, rest)) = buses.split_first() else {
                continue;
            };
            for other in rest {
                for (i, j) in align_members(&head.members, &other.members) {
                    if let (Some(a), Some(b)) = (head.members[i].net, other.members[j].net) {
                        pending.push((a, b));
                    }
                }
            }
        }
        for (a, b) in pending {
            self.union(a, b);
        }
    }

    /// Merged groups, each listed in subgraph order, ordered by first member.
    pub fn groups(&self, subgraphs: &[ConnectionSubgraph]) -> Vec<Vec<SubgraphId>> {
        let mut by_root: HashMap<usize, usize> = HashMap::new();
        let mut groups: Vec<Vec<SubgraphId>> = Vec::new();
        for subgraph in subgraphs {
            let root = self.sets.find(subgraph.id.0 as usize);
            let slot = *by_root.entry(root).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(subgraph.id);
        }
        groups
    }
}
