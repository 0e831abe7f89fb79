//! Connectivity: from drawn items to a hierarchical netlist.
//!
//! Stages run in order on every recalculation:
//! point index and subgraphs per sheet instance, driver resolution, bus
//! expansion, hierarchical propagation, then naming and net codes.

pub mod bus;
pub mod bus_expand;
pub mod condition;
pub mod connection;
pub mod driver;
pub mod graph;
pub mod hierarchy;
pub mod point_index;
pub mod snapshot;
pub mod subgraph;

pub use bus::{BusAliases, BusMember, BusName};
pub use condition::{Condition, HierSide};
pub use connection::{ConnectionKind, ElectricalRole, ItemConnection};
pub use driver::{Driver, DriverPriority, NameScope, TieBreak};
pub use graph::{BusInfo, ConnectionGraph, NetCode, NetInfo, NetlistNet, NetlistNode, RecalcStage, RecalcStats};
pub use snapshot::{GraphSnapshots, Ticket};
pub use subgraph::{ConnectionSubgraph, SubgraphId, SubgraphKind};
