//! Electrical rules checks over a completed connection graph.

pub mod context;
pub mod rules;

pub use context::ErcPinContext;
pub use rules::{ErcEngine, ErcInput, ErcOptions, ErcRule, Issue, Severity};
