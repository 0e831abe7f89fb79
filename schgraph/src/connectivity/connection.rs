//! Item Connection
//!
//! The per-(item, sheet instance) view of the finished graph: what net or bus
//! the item is on, under which name, and what it does electrically.

use serde::Serialize;

use super::bus::BusMember;
use super::graph::NetCode;
use super::subgraph::SubgraphId;
use crate::schema::{InstanceId, ItemId, ItemKind, LabelKind, Pin};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    Net,
    BusVector,
    BusGroup,
}

impl ConnectionKind {
    pub fn is_bus(self) -> bool {
        !matches!(self, ConnectionKind::Net)
    }
}

/// What an item does on its net.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectricalRole {
    Wire,
    Bus,
    BusEntry,
    Junction,
    NoConnect,
    LocalLabel,
    GlobalLabel,
    HierLabel,
    Pin,
    PowerPin,
    SheetPin,
}

impl From<&ItemKind> for ElectricalRole {
    fn from(kind: &ItemKind) -> Self {
        match kind {
            ItemKind::Wire(_) => ElectricalRole::Wire,
            ItemKind::Bus(_) => ElectricalRole::Bus,
            ItemKind::BusEntry(_) => ElectricalRole::BusEntry,
            ItemKind::Junction(_) => ElectricalRole::Junction,
            ItemKind::NoConnect(_) => ElectricalRole::NoConnect,
            ItemKind::Label(label) => match label.kind {
                LabelKind::Local => ElectricalRole::LocalLabel,
                LabelKind::Global => ElectricalRole::GlobalLabel,
                LabelKind::Hierarchical => ElectricalRole::HierLabel,
            },
            ItemKind::Pin(pin) if pin.is_power_driver() => ElectricalRole::PowerPin,
            ItemKind::Pin(_) => ElectricalRole::Pin,
            ItemKind::SheetPin(_) => ElectricalRole::SheetPin,
        }
    }
}

/// Connection of one item on one sheet instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemConnection {
    pub item: ItemId,
    pub instance: InstanceId,
    pub subgraph: SubgraphId,
    pub kind: ConnectionKind,
    /// Final, design-unique name of the net or bus
    pub name: String,
    /// Name without the instance prefix
    pub local_name: String,
    /// Expanded members, for bus connections
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<BusMember>,
    /// Name of the bus this net is a member of
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bus_parent: Option<String>,
    /// The item is the one naming its subgraph
    pub is_driver: bool,
    pub role: ElectricalRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_code: Option<NetCode>,
    /// Symbol pin data, for netlist nodes
    #[serde(skip)]
    pub pin: Option<Pin>,
}

impl ItemConnection {
    pub fn is_bus(&self) -> bool {
        self.kind.is_bus()
    }

    pub fn is_bus_member(&self) -> bool {
        self.bus_parent.is_some()
    }
}
