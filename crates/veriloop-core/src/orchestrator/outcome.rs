//! Result of a verification run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::{Node, RunState, TerminalReason};
use crate::domain::{Stage, Verdict};

/// One executed node, as recorded in the run history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub seq: u32,
    pub node: Node,
    pub error: bool,
    pub iterations: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mismatch_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
}

impl StepRecord {
    /// Record `node` from the state that its outcome produced.
    pub fn after(seq: u32, node: Node, state: &RunState) -> Self {
        let mismatch_count = if node.is_check() && state.fault.is_none() {
            state.assessment.as_ref().map(|a| a.mismatch_count)
        } else {
            None
        };
        Self {
            seq,
            node,
            error: state.error,
            iterations: state.iterations,
            mismatch_count,
            fault: state.fault.clone(),
        }
    }
}

/// Final report of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopOutcome {
    pub run_id: String,
    /// True only when the run ended after a passing mismatch check.
    pub overall_success: bool,
    pub last_stage: Stage,
    /// Node that routed to `END`; `None` if nothing executed.
    pub last_node: Option<Node>,
    pub last_verdict: Option<Verdict>,
    pub iterations: u32,
    pub reason: TerminalReason,
    pub history: Vec<StepRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl LoopOutcome {
    pub fn from_state(
        run_id: String,
        state: RunState,
        history: Vec<StepRecord>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let reason = state.terminal.unwrap_or_else(|| TerminalReason::Aborted {
            reason: "run ended without a terminal reason".to_string(),
        });
        Self {
            run_id,
            overall_success: reason.is_success(),
            last_stage: state.last_stage,
            last_node: state.last_node,
            last_verdict: state.verdict,
            iterations: state.iterations,
            reason,
            history,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Outcome of a run that never entered the loop.
    pub fn without_loop(run_id: String, reason: TerminalReason, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            overall_success: false,
            last_stage: Stage::SyntaxCheck,
            last_node: None,
            last_verdict: None,
            iterations: 0,
            reason,
            history: Vec::new(),
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }

    /// Number of executed nodes of the given kind.
    pub fn count(&self, node: Node) -> usize {
        self.history.iter().filter(|r| r.node == node).count()
    }
}
