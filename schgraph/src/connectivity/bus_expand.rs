//! Bus Expander
//!
//! Expands each bus subgraph into its ordered members and links every member
//! to the single-bit net reaching the bus through a bus entry. A net already
//! labelled with a member name keeps that member; unlabelled nets take the
//! remaining members in order of their attachment point along the bus.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use super::bus::{BusAliases, BusMember};
use super::condition::Condition;
use super::driver::{Driver, DriverPriority, NameScope, TieBreak};
use super::subgraph::{ConnectionSubgraph, EntryLink, MemberLink, SubgraphId};
use crate::schema::{InstanceId, ItemId, Schematic, SheetList};

/// Expansion of one bus subgraph.
#[derive(Debug, Clone)]
struct Expansion {
    bus: SubgraphId,
    members: Vec<MemberLink>,
    named: Vec<(SubgraphId, Driver)>,
    mismatch: Option<Condition>,
}

pub struct BusExpander<'a> {
    schematic: &'a Schematic,
    sheets: &'a SheetList,
    aliases: Vec<BusAliases>,
    tie_break: TieBreak,
}

impl<'a> BusExpander<'a> {
    pub fn new(schematic: &'a Schematic, sheets: &'a SheetList, tie_break: TieBreak) -> Self {
        let aliases = sheets
            .iter()
            .map(|inst| BusAliases::new(schematic.bus_aliases(inst.screen)))
            .collect();
        Self {
            schematic,
            sheets,
            aliases,
            tie_break,
        }
    }

    pub fn aliases(&self, instance: InstanceId) -> &BusAliases {
        &self.aliases[instance.0 as usize]
    }

    /// Expand every bus subgraph and (re)assign member names to the nets
    /// hanging off it.
    ///
    /// `group_driver` returns the driver naming the bus's merged group; the
    /// member names applied to nets follow it so that a bus renamed by a
    /// parent sheet renames its members too. Width mismatches are returned.
    pub fn expand(
        &self,
        subgraphs: &mut [ConnectionSubgraph],
        group_driver: &dyn Fn(SubgraphId) -> Option<Driver>,
    ) -> Vec<Condition> {
        let expansions: Vec<Expansion> = subgraphs
            .iter()
            .filter(|s| s.is_bus())
            .map(|bus| self.expand_one(bus, subgraphs, group_driver(bus.id)))
            .collect();

        for subgraph in subgraphs.iter_mut() {
            subgraph.member_driver = None;
        }

        let mut conditions = Vec::new();
        for expansion in expansions {
            for (net, driver) in expansion.named {
                let slot = &mut subgraphs[net.0 as usize].member_driver;
                let replace = match slot.as_ref() {
                    Some(current) => driver.rank(current, self.tie_break) == Ordering::Less,
                    None => true,
                };
                if replace {
                    *slot = Some(driver);
                }
            }
            subgraphs[expansion.bus.0 as usize].members = expansion.members;
            conditions.extend(expansion.mismatch);
        }
        conditions
    }

    fn expand_one(
        &self,
        bus: &ConnectionSubgraph,
        subgraphs: &[ConnectionSubgraph],
        group: Option<Driver>,
    ) -> Expansion {
        let own_text = bus.driver.as_ref().or(group.as_ref()).map(|d| d.name.clone());
        let own_members: Vec<BusMember> = own_text
            .as_deref()
            .and_then(|text| self.aliases(bus.instance).expand(text))
            .unwrap_or_default();

        let naming = group.or_else(|| bus.driver.clone());
        let group_members: Vec<BusMember> = naming
            .as_ref()
            .and_then(|d| self.aliases(d.instance).expand(&d.name))
            .unwrap_or_else(|| own_members.clone());

        let mut entries: Vec<&EntryLink> = bus.entries.iter().collect();
        entries.sort_by_key(|e| (e.at, e.entry));
        let mut seen = HashSet::new();
        entries.retain(|e| seen.insert(e.net));

        let mut links: Vec<MemberLink> = own_members
            .iter()
            .map(|m| MemberLink {
                member: m.clone(),
                net: None,
            })
            .collect();
        let mut entry_of: HashMap<SubgraphId, ItemId> = HashMap::new();
        let mut unnamed = Vec::new();

        for entry in &entries {
            entry_of.insert(entry.net, entry.entry);
            let net = &subgraphs[entry.net.0 as usize];
            match net.driver.as_ref() {
                Some(d) if d.priority > DriverPriority::BusMember => {
                    if let Some(link) = links
                        .iter_mut()
                        .find(|l| l.net.is_none() && l.member.name == d.name)
                    {
                        link.net = Some(entry.net);
                    }
                }
                _ => unnamed.push(entry.net),
            }
        }

        let mut unnamed = unnamed.into_iter();
        for link in links.iter_mut().filter(|l| l.net.is_none()) {
            match unnamed.next() {
                Some(net) => link.net = Some(net),
                None => break,
            }
        }

        let mut named = Vec::new();
        for (i, link) in links.iter().enumerate() {
            let Some(net) = link.net else {
                continue;
            };
            let member_name = group_members
                .get(i)
                .map(|m| m.name.clone())
                .unwrap_or_else(|| link.member.name.clone());
            let (scope, instance) = match &naming {
                Some(d) => (d.scope, d.instance),
                None => (NameScope::Local, bus.instance),
            };
            let (Some(name_instance), Some(entry)) = (self.sheets.get(instance), entry_of.get(&net)) else {
                continue;
            };
            let uuid = self
                .schematic
                .item(*entry)
                .map(|item| item.uuid)
                .unwrap_or_default();
            named.push((
                net,
                Driver::new(*entry, uuid, name_instance, DriverPriority::BusMember, member_name, scope),
            ));
        }

        let mismatch = if !entries.is_empty() && entries.len() != own_members.len() {
            Some(Condition::BusWidthMismatch {
                instance: bus.instance,
                subgraph: bus.id,
                item: bus
                    .driver
                    .as_ref()
                    .map(|d| d.item)
                    .unwrap_or(bus.items[0]),
                bus_name: bus.name.clone(),
                members: own_members.len(),
                entries: entries.len(),
            })
        } else {
            None
        };

        Expansion {
            bus: bus.id,
            members: links,
            named,
            mismatch,
        }
    }
}

/// Pairs of member positions that carry the same signal on two buses:
/// by index when both are vectors, otherwise by base name.
pub fn align_members(a: &[MemberLink], b: &[MemberLink]) -> Vec<(usize, usize)> {
    let vectors = |links: &[MemberLink]| links.iter().all(|l| l.member.index.is_some());
    if !a.is_empty() && vectors(a) && vectors(b) {
        return (0..a.len().min(b.len())).map(|i| (i, i)).collect();
    }
    a.iter()
        .enumerate()
        .filter_map(|(i, la)| {
            b.iter()
                .position(|lb| lb.member.base == la.member.base)
                .map(|j| (i, j))
        })
        .collect()
}
