//! Reportable conditions found while building the graph.
//!
//! None of these abort a recalculation; they are collected and returned next
//! to the finished graph for the ERC layer to format.

use serde::Serialize;

use super::subgraph::SubgraphId;
use crate::schema::{InstanceId, ItemId};

/// Which side of a sheet boundary was left without a partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HierSide {
    /// Sheet pin on the parent with no hierarchical label in the child
    SheetPin,
    /// Hierarchical label in the child with no sheet pin on the parent
    HierLabel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    /// Two equal-priority drivers propose different names
    DriverConflict {
        instance: InstanceId,
        subgraph: SubgraphId,
        chosen: ItemId,
        chosen_name: String,
        other: ItemId,
        other_name: String,
    },
    /// Bus entries attached to a bus disagree with the bus label's width
    BusWidthMismatch {
        instance: InstanceId,
        subgraph: SubgraphId,
        item: ItemId,
        bus_name: String,
        members: usize,
        entries: usize,
    },
    /// A sheet pin or hierarchical label with no partner across the boundary
    UnconnectedHierarchicalPin {
        instance: InstanceId,
        item: ItemId,
        name: String,
        side: HierSide,
    },
}

impl Condition {
    /// Stable reason code for the ERC layer.
    pub fn code(&self) -> &'static str {
        match self {
            Condition::DriverConflict { .. } => "driver_conflict",
            Condition::BusWidthMismatch { .. } => "bus_width_mismatch",
            Condition::UnconnectedHierarchicalPin { .. } => "unconnected_hierarchical_pin",
        }
    }

    pub fn item(&self) -> ItemId {
        match self {
            Condition::DriverConflict { chosen, .. } => *chosen,
            Condition::BusWidthMismatch { item, .. } => *item,
            Condition::UnconnectedHierarchicalPin { item, .. } => *item,
        }
    }

    pub fn instance(&self) -> InstanceId {
        match self {
            Condition::DriverConflict { instance, .. }
            | Condition::BusWidthMismatch { instance, .. }
            | Condition::UnconnectedHierarchicalPin { instance, .. } => *instance,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Condition::DriverConflict {
                chosen_name,
                other_name,
                ..
            } => format!(
                "Net has conflicting names '{}' and '{}'; using '{}'",
                chosen_name, other_name, chosen_name
            ),
            Condition::BusWidthMismatch {
                bus_name,
                members,
                entries,
                ..
            } => format!(
                "Bus '{}' defines {} members but has {} bus entries",
                bus_name, members, entries
            ),
            Condition::UnconnectedHierarchicalPin { name, side, .. } => match side {
                HierSide::SheetPin => format!(
                    "Sheet pin '{}' has no matching hierarchical label in the sub-sheet",
                    name
                ),
                HierSide::HierLabel => format!(
                    "Hierarchical label '{}' has no matching sheet pin in the parent sheet",
                    name
                ),
            },
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message())
    }
}
