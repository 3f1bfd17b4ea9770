//! Verification-repair orchestration.

pub mod context;
pub mod engine;
pub mod outcome;
pub mod state;

pub use context::{FailureContext, RepairTarget};
pub use engine::{run_verification_loop, VerificationLoop};
pub use outcome::{LoopOutcome, StepRecord};
pub use state::{decide, transition, Node, NodeOutcome, Route, RunState, TerminalReason};
