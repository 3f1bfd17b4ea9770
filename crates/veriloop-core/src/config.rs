//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

use crate::domain::{Result, Stage, VeriloopError};

/// Optional per-stage iteration ceilings.
///
/// Unset stages fall back to [`LoopConfig::max_iterations`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageBudgets {
    #[serde(default)]
    pub syntax: Option<u32>,
    #[serde(default)]
    pub execution: Option<u32>,
    #[serde(default)]
    pub mismatch: Option<u32>,
}

/// Configuration for one verification-repair run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Shared iteration ceiling for every stage.
    pub max_iterations: u32,

    /// Per-stage overrides of `max_iterations`.
    pub budgets: StageBudgets,

    /// Stop the run after this many consecutive unattributable mismatch
    /// repairs. `None` lets deadlocks consume budget like any other failure.
    pub max_consecutive_deadlocks: Option<u32>,

    /// Write `run_report.json` and `properly_finished.tag` at the end.
    pub write_report: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            budgets: StageBudgets::default(),
            max_consecutive_deadlocks: None,
            write_report: true,
        }
    }
}

impl LoopConfig {
    /// Shared ceiling with no overrides.
    pub fn with_max_iterations(max_iterations: u32) -> Self {
        Self {
            max_iterations,
            ..Default::default()
        }
    }

    /// Effective ceiling for `stage`.
    pub fn budget_for(&self, stage: Stage) -> u32 {
        let over = match stage {
            Stage::SyntaxCheck => self.budgets.syntax,
            Stage::ExecutionCheck => self.budgets.execution,
            Stage::MismatchCheck => self.budgets.mismatch,
        };
        over.unwrap_or(self.max_iterations)
    }

    /// Reject settings the loop cannot honour.
    ///
    /// A budget of 0 is valid: checks still run, and the first failure ends
    /// the run without a repair.
    pub fn validate(&self) -> Result<()> {
        if self.max_consecutive_deadlocks == Some(0) {
            return Err(VeriloopError::InvalidConfig(
                "max_consecutive_deadlocks must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}
