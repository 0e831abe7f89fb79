//! Driver Resolver
//!
//! Every subgraph is named after exactly one item, its driver. Candidates are
//! ranked by [`DriverPriority`]; equal priorities fall back to the configured
//! [`TieBreak`] so rebuilds always pick the same item.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

use super::condition::Condition;
use super::subgraph::ConnectionSubgraph;
use crate::schema::{InstanceId, ItemId, ItemKind, LabelKind, Pin, SchItem, Schematic, SheetInstance, SheetList};

/// Driver strength, weakest first.
///
/// `BusMember` is not drawn by the user: it is the name a net inherits from
/// the bus it is attached to when nothing stronger names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverPriority {
    None,
    Pin,
    BusMember,
    SheetPin,
    HierLabel,
    GlobalLabel,
    LocalLabel,
    PowerPin,
}

impl DriverPriority {
    /// Tiers whose disagreement is reported as a conflict.
    pub fn is_named(self) -> bool {
        self >= DriverPriority::HierLabel
    }
}

/// Where a driver's name is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameScope {
    /// Qualified with the sheet instance's prefix
    Local,
    /// Shared by the whole design
    Global,
}

/// Deterministic order among drivers of equal priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Lowest item UUID wins
    #[default]
    Uuid,
    /// Earliest item in screen order wins, then UUID
    CreationOrder,
    /// Lexically smallest name wins, then UUID
    Alphabetical,
}

impl TieBreak {
    /// `Less` means `a` wins.
    pub fn compare(self, a: &Driver, b: &Driver) -> Ordering {
        match self {
            TieBreak::Uuid => a.uuid.cmp(&b.uuid),
            TieBreak::CreationOrder => a.item.cmp(&b.item).then(a.uuid.cmp(&b.uuid)),
            TieBreak::Alphabetical => a.name.cmp(&b.name).then(a.uuid.cmp(&b.uuid)),
        }
    }
}

impl std::str::FromStr for TieBreak {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uuid" => Ok(TieBreak::Uuid),
            "creation" | "creation_order" => Ok(TieBreak::CreationOrder),
            "alphabetical" => Ok(TieBreak::Alphabetical),
            other => Err(format!("unknown tie-break policy '{}'", other)),
        }
    }
}

/// An item proposing a name for its subgraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Driver {
    pub item: ItemId,
    pub uuid: Uuid,
    pub instance: InstanceId,
    pub depth: usize,
    pub priority: DriverPriority,
    /// Name as written on the item
    pub name: String,
    pub scope: NameScope,
    /// Name after scope qualification
    pub full_name: String,
}

impl Driver {
    pub fn new(
        item: ItemId,
        uuid: Uuid,
        instance: &SheetInstance,
        priority: DriverPriority,
        name: String,
        scope: NameScope,
    ) -> Self {
        let full_name = match scope {
            NameScope::Global => name.clone(),
            NameScope::Local => format!("{}{}", instance.name_prefix, name),
        };
        Self {
            item,
            uuid,
            instance: instance.id,
            depth: instance.depth(),
            priority,
            name,
            scope,
            full_name,
        }
    }

    /// Driver candidate for one item, if the item can drive at all.
    pub fn candidate(item: ItemId, sch_item: &SchItem, instance: &SheetInstance) -> Option<Self> {
        let (priority, name, scope) = match &sch_item.kind {
            ItemKind::Pin(pin) if pin.is_power_driver() => (
                DriverPriority::PowerPin,
                pin.power_net.clone().unwrap_or_default(),
                NameScope::Global,
            ),
            ItemKind::Pin(pin) => (DriverPriority::Pin, pin_net_name(pin), NameScope::Local),
            ItemKind::Label(label) if label.text.is_empty() => return None,
            ItemKind::Label(label) => match label.kind {
                LabelKind::Local => (DriverPriority::LocalLabel, label.text.clone(), NameScope::Local),
                LabelKind::Global => (DriverPriority::GlobalLabel, label.text.clone(), NameScope::Global),
                LabelKind::Hierarchical => (DriverPriority::HierLabel, label.text.clone(), NameScope::Local),
            },
            ItemKind::SheetPin(pin) if !pin.name.is_empty() => {
                (DriverPriority::SheetPin, pin.name.clone(), NameScope::Local)
            }
            _ => return None,
        };
        Some(Self::new(item, sch_item.uuid, instance, priority, name, scope))
    }

    /// Full ranking: priority, then shallower instance, then tie-break.
    /// `Less` means `self` wins.
    pub fn rank(&self, other: &Driver, tie_break: TieBreak) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then(self.depth.cmp(&other.depth))
            .then_with(|| tie_break.compare(self, other))
    }
}

/// Name a lone pin gives its net: `Net-(U1-Pad3)` or `Net-(U1-SDA-Pad3)`.
pub fn pin_net_name(pin: &Pin) -> String {
    if pin.name.is_empty() || pin.name == "~" {
        format!("Net-({}-Pad{})", pin.reference, pin.number)
    } else {
        format!("Net-({}-{}-Pad{})", pin.reference, pin.name, pin.number)
    }
}

/// Pick the winner among `drivers`.
pub fn best<'a>(drivers: impl IntoIterator<Item = &'a Driver>, tie_break: TieBreak) -> Option<&'a Driver> {
    drivers
        .into_iter()
        .min_by(|a, b| a.rank(b, tie_break))
}

/// Outcome of resolving one subgraph.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub driver: Option<Driver>,
    /// Highest-tier candidate that disagrees with the winner
    pub conflict: Option<Driver>,
}

pub fn resolve(candidates: &[Driver], tie_break: TieBreak) -> Resolution {
    let Some(winner) = best(candidates, tie_break) else {
        return Resolution::default();
    };
    let conflict = if winner.priority.is_named() {
        best(
            candidates
                .iter()
                .filter(|c| c.priority == winner.priority && c.name != winner.name),
            tie_break,
        )
        .cloned()
    } else {
        None
    };
    Resolution {
        driver: Some(winner.clone()),
        conflict,
    }
}

/// Resolve the own driver of every subgraph and report same-tier conflicts.
pub fn resolve_subgraphs(
    subgraphs: &mut [ConnectionSubgraph],
    schematic: &Schematic,
    sheets: &SheetList,
    tie_break: TieBreak,
) -> Vec<Condition> {
    let mut conditions = Vec::new();

    for subgraph in subgraphs.iter_mut() {
        let Some(instance) = sheets.get(subgraph.instance) else {
            debug_assert!(false, "subgraph references unknown instance");
            continue;
        };
        let candidates: Vec<Driver> = subgraph
            .items
            .iter()
            .filter_map(|&id| {
                schematic
                    .item(id)
                    .and_then(|item| Driver::candidate(id, item, instance))
            })
            .collect();

        let resolution = resolve(&candidates, tie_break);
        if let (Some(chosen), Some(other)) = (&resolution.driver, &resolution.conflict) {
            conditions.push(Condition::DriverConflict {
                instance: subgraph.instance,
                subgraph: subgraph.id,
                chosen: chosen.item,
                chosen_name: chosen.full_name.clone(),
                other: other.item,
                other_name: other.full_name.clone(),
            });
        }
        subgraph.name = resolution
            .driver
            .as_ref()
            .map(|d| d.full_name.clone())
            .unwrap_or_default();
        subgraph.driver = resolution.driver;
    }

    conditions
}
