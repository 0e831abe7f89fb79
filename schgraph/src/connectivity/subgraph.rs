//! Subgraph Builder
//!
//! Partitions the items of each sheet instance into maximal connected
//! components. Instances are independent, so they can be built on the rayon
//! pool; each task returns a local result and a single sequential step
//! numbers the subgraphs globally.

use petgraph::unionfind::UnionFind;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::bus::{BusAliases, BusMember};
use super::driver::Driver;
use super::graph::NetCode;
use super::point_index::{item_layer, Layer, PointIndex};
use crate::schema::{InstanceId, ItemId, ItemKind, Point, Schematic, SheetInstance, SheetList};

/// Index of a subgraph in the graph's subgraph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubgraphId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubgraphKind {
    Net,
    Bus,
}

/// A bus entry touching a bus subgraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryLink {
    pub entry: ItemId,
    /// Bus-side coordinate of the entry
    pub at: Point,
    /// Net subgraph on the wire side
    pub net: SubgraphId,
}

/// One expanded member of a bus subgraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberLink {
    pub member: BusMember,
    /// Net subgraph carrying this member on the same sheet, if drawn
    pub net: Option<SubgraphId>,
}

/// A connected component of one sheet instance.
#[derive(Debug, Clone)]
pub struct ConnectionSubgraph {
    pub id: SubgraphId,
    pub instance: InstanceId,
    pub kind: SubgraphKind,
    pub items: Vec<ItemId>,
    /// Strongest driver among this subgraph's own items
    pub driver: Option<Driver>,
    /// Resolved name: the subgraph's own until propagation, the net's after
    pub name: String,
    /// Bus entries attached to this bus subgraph
    pub entries: Vec<EntryLink>,
    /// Expanded members of this bus subgraph
    pub members: Vec<MemberLink>,
    /// Bus subgraphs this net subgraph is attached to through entries
    pub bus_parents: Vec<SubgraphId>,
    /// Name inherited from a parent bus, when the net carries a member
    pub member_driver: Option<Driver>,
    /// Subgraphs in other instances joined through sheet pins
    pub hier_neighbors: Vec<SubgraphId>,
    pub net_code: Option<NetCode>,
}

impl ConnectionSubgraph {
    fn new(id: SubgraphId, instance: InstanceId) -> Self {
        Self {
            id,
            instance,
            kind: SubgraphKind::Net,
            items: Vec::new(),
            driver: None,
            name: String::new(),
            entries: Vec::new(),
            members: Vec::new(),
            bus_parents: Vec::new(),
            member_driver: None,
            hier_neighbors: Vec::new(),
            net_code: None,
        }
    }

    pub fn is_bus(&self) -> bool {
        self.kind == SubgraphKind::Bus
    }

    pub fn contains(&self, item: ItemId) -> bool {
        self.items.contains(&item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Own driver, or the name inherited from a bus when that is stronger.
    pub fn drivers(&self) -> impl Iterator<Item = &Driver> {
        self.driver.iter().chain(self.member_driver.iter())
    }

    /// Bus member name carried by this net, if any.
    pub fn bus_member_name(&self) -> Option<&str> {
        self.member_driver.as_ref().map(|d| d.name.as_str())
    }
}

/// Subgraphs of one instance before global numbering.
#[derive(Debug, Clone)]
struct InstanceSubgraphs {
    instance: InstanceId,
    subgraphs: Vec<ConnectionSubgraph>,
}

pub struct SubgraphBuilder<'a> {
    schematic: &'a Schematic,
    sheets: &'a SheetList,
}

impl<'a> SubgraphBuilder<'a> {
    pub fn new(schematic: &'a Schematic, sheets: &'a SheetList) -> Self {
        Self { schematic, sheets }
    }

    /// Build every instance, optionally in parallel, and number the result.
    pub fn build_all(&self, parallel: bool) -> Vec<ConnectionSubgraph> {
        let instances: Vec<&SheetInstance> = self.sheets.iter().collect();
        let built: Vec<InstanceSubgraphs> = if parallel {
            instances
                .par_iter()
                .map(|inst| self.build_instance(inst))
                .collect()
        } else {
            instances
                .iter()
                .map(|inst| self.build_instance(inst))
                .collect()
        };

        let mut all = Vec::new();
        for local in built {
            let offset = all.len() as u32;
            let remap = |id: SubgraphId| SubgraphId(id.0 + offset);
            for mut subgraph in local.subgraphs {
                debug_assert_eq!(subgraph.instance, local.instance);
                subgraph.id = remap(subgraph.id);
                for entry in &mut subgraph.entries {
                    entry.net = remap(entry.net);
                }
                for parent in &mut subgraph.bus_parents {
                    *parent = remap(*parent);
                }
                all.push(subgraph);
            }
        }
        all
    }

    /// Union-find over one instance. Subgraph ids are local to the instance.
    fn build_instance(&self, instance: &SheetInstance) -> InstanceSubgraphs {
        let items = self.sheets.items(self.schematic, instance.id);
        let aliases = BusAliases::new(self.schematic.bus_aliases(instance.screen));
        let index = PointIndex::build(&items, &aliases);

        let mut sets = UnionFind::<usize>::new(items.len());
        for (_, attached) in index.iter() {
            for layer in [Layer::Net, Layer::Bus] {
                let mut joined = attached
                    .iter()
                    .filter(|a| a.joins && a.layer == layer)
                    .map(|a| a.slot);
                if let Some(first) = joined.next() {
                    for other in joined {
                        sets.union(first, other);
                    }
                }
            }
        }
        let labels = sets.into_labeling();

        let mut subgraphs: Vec<ConnectionSubgraph> = Vec::new();
        let mut by_root: HashMap<usize, usize> = HashMap::new();
        let mut slot_subgraph = vec![0usize; items.len()];

        for (slot, (id, item)) in items.iter().enumerate() {
            let local = *by_root.entry(labels[slot]).or_insert_with(|| {
                let local = subgraphs.len();
                subgraphs.push(ConnectionSubgraph::new(SubgraphId(local as u32), instance.id));
                local
            });
            slot_subgraph[slot] = local;

            let subgraph = &mut subgraphs[local];
            subgraph.items.push(*id);
            if item_layer(&item.kind, &aliases) == Layer::Bus {
                subgraph.kind = SubgraphKind::Bus;
            }
        }

        for (slot, (id, item)) in items.iter().enumerate() {
            let ItemKind::BusEntry(entry) = &item.kind else {
                continue;
            };
            let Some(bus) = index.joining(entry.bus_end, Layer::Bus).next() else {
                continue;
            };
            let bus_local = slot_subgraph[bus.slot];
            let net_local = slot_subgraph[slot];
            subgraphs[bus_local].entries.push(EntryLink {
                entry: *id,
                at: entry.bus_end,
                net: SubgraphId(net_local as u32),
            });
            let parents = &mut subgraphs[net_local].bus_parents;
            if !parents.contains(&SubgraphId(bus_local as u32)) {
                parents.push(SubgraphId(bus_local as u32));
            }
        }

        tracing::trace!(
            instance = %instance.human_path,
            items = items.len(),
            subgraphs = subgraphs.len(),
            "built instance subgraphs"
        );

        InstanceSubgraphs {
            instance: instance.id,
            subgraphs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{BusEntry, LabelKind, Point};

    fn build(sch: &Schematic) -> Vec<ConnectionSubgraph> {
        let sheets = sch.sheet_list().unwrap();
        SubgraphBuilder::new(sch, &sheets).build_all(false)
    }

    fn owner(subgraphs: &[ConnectionSubgraph], item: ItemId) -> SubgraphId {
        subgraphs
            .iter()
            .find(|s| s.contains(item))
            .map(|s| s.id)
            .unwrap()
    }

    #[test]
    fn test_exact_endpoint_join() {
        let mut sch = Schematic::new("root");
        let root = sch.root();
        let a = sch.add_wire(root, Point::new(0, 100), Point::new(100, 100));
        let b = sch.add_wire(root, Point::new(100, 100), Point::new(100, 200));

        let subgraphs = build(&sch);
        assert_eq!(subgraphs.len(), 1);
        assert_eq!(owner(&subgraphs, a), owner(&subgraphs, b));
    }

    #[test]
    fn test_one_unit_shift_separates() {
        let mut sch = Schematic::new("root");
        let root = sch.root();
        let a = sch.add_wire(root, Point::new(0, 100), Point::new(100, 100));
        let b = sch.add_wire(root, Point::new(101, 100), Point::new(101, 200));

        let subgraphs = build(&sch);
        assert_eq!(subgraphs.len(), 2);
        assert_ne!(owner(&subgraphs, a), owner(&subgraphs, b));
    }

    #[test]
    fn test_isolated_pin_is_singleton() {
        let mut sch = Schematic::new("root");
        let root = sch.root();
        let pin = sch.add_item(
            root,
            ItemKind::Pin(crate::schema::Pin {
                symbol: uuid::Uuid::new_v4(),
                reference: "R1".into(),
                number: "1".into(),
                name: String::new(),
                electrical_type: Default::default(),
                power_net: None,
                at: Point::new(500, 500),
            }),
        );

        let subgraphs = build(&sch);
        assert_eq!(subgraphs.len(), 1);
        assert_eq!(subgraphs[0].items, vec![pin]);
        assert_eq!(subgraphs[0].kind, SubgraphKind::Net);
    }

    #[test]
    fn test_bus_entry_links_net_to_bus() {
        let mut sch = Schematic::new("root");
        let root = sch.root();
        let bus = sch.add_bus(root, Point::new(0, 0), Point::new(0, 100));
        sch.add_label(root, LabelKind::Local, "D[0..1]", Point::new(0, 0));
        let entry = sch.add_item(
            root,
            ItemKind::BusEntry(BusEntry {
                bus_end: Point::new(0, 50),
                wire_end: Point::new(10, 60),
            }),
        );
        let wire = sch.add_wire(root, Point::new(10, 60), Point::new(50, 60));

        let subgraphs = build(&sch);
        assert_eq!(subgraphs.len(), 2);
        let bus_sg = &subgraphs[owner(&subgraphs, bus).0 as usize];
        let net_sg = &subgraphs[owner(&subgraphs, wire).0 as usize];

        assert!(bus_sg.is_bus());
        assert_eq!(bus_sg.len(), 2);
        assert!(net_sg.contains(entry));
        assert_eq!(bus_sg.entries.len(), 1);
        assert_eq!(bus_sg.entries[0].net, net_sg.id);
        assert_eq!(net_sg.bus_parents, vec![bus_sg.id]);
    }

    #[test]
    fn test_parallel_build_matches_serial() {
        let mut sch = Schematic::new("root");
        let root = sch.root();
        let child = sch.add_screen("child");
        sch.add_sheet(root, "A", child);
        sch.add_sheet(root, "B", child);
        sch.add_wire(child, Point::new(0, 0), Point::new(0, 10));
        sch.add_wire(child, Point::new(0, 10), Point::new(10, 10));
        sch.add_wire(root, Point::new(0, 0), Point::new(5, 0));

        let sheets = sch.sheet_list().unwrap();
        let builder = SubgraphBuilder::new(&sch, &sheets);
        let serial = builder.build_all(false);
        let parallel = builder.build_all(true);

        assert_eq!(serial.len(), 3);
        let shape = |s: &[ConnectionSubgraph]| -> Vec<(InstanceId, Vec<ItemId>)> {
            s.iter().map(|sg| (sg.instance, sg.items.clone())).collect()
        };
        assert_eq!(shape(&serial), shape(&parallel));
    }
}
