//! Orchestrator state machine: nodes, routing and the immutable run state.
//!
//! Everything in this module is pure. The engine executes a node, folds
//! the node's [`NodeOutcome`] into a new [`RunState`] and asks
//! [`transition`] where to go next.

use serde::{Deserialize, Serialize};

use crate::classifier::Assessment;
use crate::config::LoopConfig;
use crate::domain::{Stage, Verdict};

/// A node of the verification graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    SyntaxCheck,
    SyntaxFix,
    ProceedToExec,
    ExecCheck,
    ExecFix,
    ProceedToMismatch,
    MismatchCheck,
    MismatchFix,
    End,
}

impl Node {
    /// Stage this node belongs to. Advance nodes belong to the stage they
    /// lead into.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Node::SyntaxCheck | Node::SyntaxFix => Some(Stage::SyntaxCheck),
            Node::ProceedToExec | Node::ExecCheck | Node::ExecFix => Some(Stage::ExecutionCheck),
            Node::ProceedToMismatch | Node::MismatchCheck | Node::MismatchFix => {
                Some(Stage::MismatchCheck)
            }
            Node::End => None,
        }
    }

    pub fn is_check(&self) -> bool {
        matches!(self, Node::SyntaxCheck | Node::ExecCheck | Node::MismatchCheck)
    }

    pub fn is_fix(&self) -> bool {
        matches!(self, Node::SyntaxFix | Node::ExecFix | Node::MismatchFix)
    }

    pub fn is_advance(&self) -> bool {
        matches!(self, Node::ProceedToExec | Node::ProceedToMismatch)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Node::SyntaxCheck => "SYNTAX_CHECK",
            Node::SyntaxFix => "SYNTAX_FIX",
            Node::ProceedToExec => "PROCEED_TO_EXEC",
            Node::ExecCheck => "EXEC_CHECK",
            Node::ExecFix => "EXEC_FIX",
            Node::ProceedToMismatch => "PROCEED_TO_MISMATCH",
            Node::MismatchCheck => "MISMATCH_CHECK",
            Node::MismatchFix => "MISMATCH_FIX",
            Node::End => "END",
        }
    }

    fn check_for(stage: Stage) -> Node {
        match stage {
            Stage::SyntaxCheck => Node::SyntaxCheck,
            Stage::ExecutionCheck => Node::ExecCheck,
            Stage::MismatchCheck => Node::MismatchCheck,
        }
    }

    fn fix_for(stage: Stage) -> Node {
        match stage {
            Stage::SyntaxCheck => Node::SyntaxFix,
            Stage::ExecutionCheck => Node::ExecFix,
            Stage::MismatchCheck => Node::MismatchFix,
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Routing decision taken after a check node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Forward,
    Fix,
    End,
}

/// Route after a check: advance on success, repair while budget remains.
pub fn decide(error: bool, iterations: u32, max_iterations: u32) -> Route {
    if !error {
        Route::Forward
    } else if iterations >= max_iterations {
        Route::End
    } else {
        Route::Fix
    }
}

/// Why a run reached `END`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TerminalReason {
    /// The mismatch check passed.
    Passed,

    /// A stage kept failing until its iteration ceiling.
    BudgetExhausted { stage: Stage },

    /// The judge repeatedly attributed the mismatch to neither artifact.
    AttributionDeadlock { consecutive: u32 },

    /// Initial artifact generation failed.
    BootstrapFailed { reason: String },

    /// The run was cancelled or hit an unexpected fault.
    Aborted { reason: String },
}

impl TerminalReason {
    pub fn is_success(&self) -> bool {
        matches!(self, TerminalReason::Passed)
    }
}

impl std::fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminalReason::Passed => write!(f, "passed"),
            TerminalReason::BudgetExhausted { stage } => {
                write!(f, "iteration budget exhausted at {stage}")
            }
            TerminalReason::AttributionDeadlock { consecutive } => write!(
                f,
                "judge attributed no artifact {consecutive} time(s) in a row"
            ),
            TerminalReason::BootstrapFailed { reason } => write!(f, "bootstrap failed: {reason}"),
            TerminalReason::Aborted { reason } => write!(f, "aborted: {reason}"),
        }
    }
}

/// What executing one node produced.
#[derive(Debug, Clone, Default)]
pub struct NodeOutcome {
    pub error: bool,
    /// Verdict of a check node; `None` when the check faulted before a
    /// verdict existed.
    pub verdict: Option<Verdict>,
    pub assessment: Option<Assessment>,
    /// Internal fault message, if the node failed outside the tool.
    pub fault: Option<String>,
    /// Mismatch repair only: `Some(true)` when the judge named no artifact.
    pub deadlock: Option<bool>,
}

impl NodeOutcome {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn checked(verdict: Verdict, assessment: Assessment) -> Self {
        Self {
            error: !assessment.passed,
            verdict: Some(verdict),
            assessment: Some(assessment),
            ..Default::default()
        }
    }

    pub fn fault(message: impl Into<String>) -> Self {
        Self {
            error: true,
            fault: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn deadlocked() -> Self {
        Self {
            error: true,
            deadlock: Some(true),
            ..Default::default()
        }
    }

    pub fn attributed(mut self) -> Self {
        self.deadlock = Some(false);
        self
    }
}

/// Immutable run state threaded through every transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// Node to execute next.
    pub node: Node,
    pub error: bool,
    /// Check attempts made in the current stage.
    pub iterations: u32,
    /// Verdict of the most recent check.
    pub verdict: Option<Verdict>,
    pub assessment: Option<Assessment>,
    /// Last node that actually executed.
    pub last_node: Option<Node>,
    pub last_stage: Stage,
    pub consecutive_deadlocks: u32,
    pub fault: Option<String>,
    pub terminal: Option<TerminalReason>,
}

impl RunState {
    /// `SYNTAX_CHECK` with a clean error flag and zero iterations.
    pub fn initial() -> Self {
        Self {
            node: Node::SyntaxCheck,
            error: false,
            iterations: 0,
            verdict: None,
            assessment: None,
            last_node: None,
            last_stage: Stage::SyntaxCheck,
            consecutive_deadlocks: 0,
            fault: None,
            terminal: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.node == Node::End
    }

    /// Fold the outcome of the current node into a new state.
    ///
    /// Checks consume one iteration, repairs consume none, and advance nodes
    /// reset the counter for the stage they lead into.
    pub fn apply(self, outcome: NodeOutcome) -> RunState {
        let node = self.node;
        let mut next = self;
        next.last_node = Some(node);
        if let Some(stage) = node.stage() {
            next.last_stage = stage;
        }

        if node.is_advance() {
            next.error = false;
            next.iterations = 0;
            next.fault = None;
            return next;
        }

        next.error = outcome.error;
        next.fault = outcome.fault;
        if node.is_check() {
            next.iterations += 1;
            if outcome.verdict.is_some() {
                next.verdict = outcome.verdict;
                next.assessment = outcome.assessment;
            }
        }
        match outcome.deadlock {
            Some(true) => next.consecutive_deadlocks += 1,
            Some(false) => next.consecutive_deadlocks = 0,
            None => {}
        }
        next
    }

    /// Move to `node`, recording a terminal reason when it is `END`.
    pub fn goto(mut self, node: Node, terminal: Option<TerminalReason>) -> RunState {
        self.node = node;
        if terminal.is_some() {
            self.terminal = terminal;
        }
        self
    }

    /// Terminate immediately.
    pub fn abort(self, reason: TerminalReason) -> RunState {
        self.goto(Node::End, Some(reason))
    }
}

/// Next node for a state whose current node has just executed.
///
/// `state.node` must still name the node that ran; `state` must already
/// carry that node's outcome (see [`RunState::apply`]).
pub fn transition(state: &RunState, config: &LoopConfig) -> (Node, Option<TerminalReason>) {
    match state.node {
        Node::SyntaxCheck | Node::ExecCheck | Node::MismatchCheck => {
            let stage = state.node.stage().unwrap_or(Stage::SyntaxCheck);
            match decide(state.error, state.iterations, config.budget_for(stage)) {
                Route::Forward => match state.node {
                    Node::SyntaxCheck => (Node::ProceedToExec, None),
                    Node::ExecCheck => (Node::ProceedToMismatch, None),
                    _ => (Node::End, Some(TerminalReason::Passed)),
                },
                Route::Fix => (Node::fix_for(stage), None),
                Route::End => (Node::End, Some(TerminalReason::BudgetExhausted { stage })),
            }
        }
        Node::MismatchFix => match config.max_consecutive_deadlocks {
            Some(limit) if state.consecutive_deadlocks >= limit => (
                Node::End,
                Some(TerminalReason::AttributionDeadlock {
                    consecutive: state.consecutive_deadlocks,
                }),
            ),
            _ => (Node::MismatchCheck, None),
        },
        Node::SyntaxFix => (Node::SyntaxCheck, None),
        Node::ExecFix => (Node::ExecCheck, None),
        Node::ProceedToExec => (Node::check_for(Stage::ExecutionCheck), None),
        Node::ProceedToMismatch => (Node::check_for(Stage::MismatchCheck), None),
        Node::End => (Node::End, None),
    }
}
