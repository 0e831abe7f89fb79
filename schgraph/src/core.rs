//! Core API shared by library users and the CLI.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::connectivity::{ConnectionGraph, RecalcStats, TieBreak};
use crate::erc::{ErcEngine, ErcInput, Issue, Severity};
use crate::schema::Schematic;

pub use crate::erc::ErcOptions;

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Sheet '{0}' contains itself")]
    RecursiveSheet(String),
    #[error("Unknown screen {0}")]
    UnknownScreen(u32),
    #[error("Sheet pin '{pin}' refers to unknown sheet {sheet}")]
    UnknownSheet { pin: String, sheet: Uuid },
    #[error("Invalid schematic: {0}")]
    InvalidSchematic(String),
}

/// Options for graph recalculation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphOptions {
    /// Build per-instance subgraphs on the rayon pool
    pub parallel: bool,
    pub tie_break: TieBreak,
    /// Prefix of names given to undriven nets
    pub anonymous_prefix: String,
    /// Override of the propagation pass bound derived from sheet depth
    pub max_propagation_passes: Option<usize>,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            tie_break: TieBreak::Uuid,
            anonymous_prefix: "Net-".to_string(),
            max_propagation_passes: None,
        }
    }
}

/// ERC outcome for one schematic.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub file: Option<PathBuf>,
    pub issues: Vec<Issue>,
    pub stats: CheckStats,
    pub graph: RecalcStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckStats {
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
}

impl CheckResult {
    pub fn has_errors(&self) -> bool {
        self.stats.errors > 0
    }

    pub fn has_warnings_or_errors(&self) -> bool {
        self.stats.errors > 0 || self.stats.warnings > 0
    }

    pub fn total_issues(&self) -> usize {
        self.stats.errors + self.stats.warnings + self.stats.info
    }
}

fn issues_to_stats(issues: &[Issue]) -> CheckStats {
    let mut stats = CheckStats::default();
    for issue in issues {
        match issue.severity {
            Severity::Error => stats.errors += 1,
            Severity::Warning => stats.warnings += 1,
            Severity::Info => stats.info += 1,
        }
    }
    stats
}

/// Entry points used by the CLI.
pub struct GraphCore;

impl GraphCore {
    /// Read a JSON schematic from disk.
    pub fn load(path: &Path) -> Result<Schematic, GraphError> {
        let json = std::fs::read_to_string(path)?;
        let schematic = Schematic::from_json(&json)?;
        tracing::debug!(
            file = %path.display(),
            screens = schematic.screens.len(),
            "loaded schematic"
        );
        Ok(schematic)
    }

    pub fn build(schematic: &Schematic, options: GraphOptions) -> Result<ConnectionGraph, GraphError> {
        ConnectionGraph::build(schematic, options)
    }

    /// Build the graph and run ERC over it.
    pub fn check(
        schematic: &Schematic,
        options: GraphOptions,
        erc: &ErcOptions,
    ) -> Result<CheckResult, GraphError> {
        let graph = ConnectionGraph::build(schematic, options)?;
        let issues = ErcEngine::from_options(erc).analyze(&ErcInput::new(schematic, &graph));
        let stats = issues_to_stats(&issues);
        if stats.errors > 0 {
            tracing::warn!(errors = stats.errors, warnings = stats.warnings, "erc found errors");
        }
        Ok(CheckResult {
            file: None,
            issues,
            stats,
            graph: graph.stats().clone(),
        })
    }

    pub fn check_file(
        path: &Path,
        options: GraphOptions,
        erc: &ErcOptions,
    ) -> Result<CheckResult, GraphError> {
        let schematic = Self::load(path)?;
        let mut result = Self::check(&schematic, options, erc)?;
        result.file = Some(path.to_path_buf());
        Ok(result)
    }
}
