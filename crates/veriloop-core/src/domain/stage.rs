//! The three verification stages.

use serde::{Deserialize, Serialize};

/// One check/repair cycle of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Syntax-only elaboration of the design.
    SyntaxCheck,

    /// Compile testbench + design and run; must run clean.
    ExecutionCheck,

    /// Full simulation; must pass with zero mismatches.
    MismatchCheck,
}

impl Stage {
    /// Stages in pipeline order.
    pub const ALL: [Stage; 3] = [Stage::SyntaxCheck, Stage::ExecutionCheck, Stage::MismatchCheck];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::SyntaxCheck => "syntax_check",
            Stage::ExecutionCheck => "exec_check",
            Stage::MismatchCheck => "mismatch_check",
        }
    }

    /// The stage that follows this one, if any.
    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::SyntaxCheck => Some(Stage::ExecutionCheck),
            Stage::ExecutionCheck => Some(Stage::MismatchCheck),
            Stage::MismatchCheck => None,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "syntax" | "syntax_check" => Ok(Stage::SyntaxCheck),
            "exec" | "execution" | "exec_check" => Ok(Stage::ExecutionCheck),
            "mismatch" | "mismatch_check" => Ok(Stage::MismatchCheck),
            other => Err(format!("unknown stage: {other}")),
        }
    }
}
