//! schgraph - hierarchical schematic connectivity
//!
//! This library derives the logical netlist of a hierarchical schematic:
//! which drawn items are electrically the same node, what each node is
//! called, and on which sheets a name is visible.
//!
//! # Quick Start
//!
//! ```no_run
//! use schgraph::prelude::*;
//!
//! let mut sch = Schematic::new("root");
//! let root = sch.root();
//! sch.add_wire(root, Point::new(0, 0), Point::new(100, 0));
//! sch.add_label(root, LabelKind::Local, "CLK", Point::new(0, 0));
//!
//! let graph = ConnectionGraph::build(&sch, GraphOptions::default()).unwrap();
//! for net in graph.nets() {
//!     println!("{} {}", net.code, net.name);
//! }
//! ```
//!
//! # Features
//!
//! - **Exact connectivity**: items join only on identical coordinates
//! - **Hierarchy**: sheet pins, hierarchical labels and reused sub-sheets
//! - **Buses**: vector, group and alias buses expanded into member nets
//! - **ERC**: pluggable rules over the finished graph

pub mod connectivity;
pub mod core;
pub mod erc;
pub mod schema;

// Re-export main types
pub use crate::core::{CheckResult, CheckStats, ErcOptions, GraphCore, GraphError, GraphOptions};
pub use connectivity::{
    Condition, ConnectionGraph, GraphSnapshots, ItemConnection, NetCode, NetlistNet, RecalcStats,
    TieBreak,
};
pub use erc::{ErcEngine, Issue, Severity};
pub use schema::{ItemId, ItemKind, LabelKind, Point, Schematic};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::connectivity::{ConnectionGraph, NetCode, TieBreak};
    pub use crate::schema::{ItemKind, LabelKind, Point, Schematic};
    pub use crate::{GraphCore, GraphError, GraphOptions, Issue, Severity};
}
