//! Veriloop Core Library
//!
//! Verdict classification, artifact storage, collaborator seams and the
//! verification-repair orchestrator that drives generated HDL artifacts
//! through syntax, execution and mismatch checks.

pub mod artifacts;
pub mod cancel;
pub mod classifier;
pub mod collaborators;
pub mod config;
pub mod domain;
pub mod obs;
pub mod orchestrator;
pub mod report;
pub mod telemetry;

pub use artifacts::{ArtifactStore, COMPLETION_TAG, SIMULATION_IMAGE};
pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use classifier::{
    add_line_numbers, classify_execution_run, classify_syntax_check, explain,
    extract_mismatch_count, extract_mismatch_lines, extract_warning_lines, Assessment,
    BenignAllowlist, OutputClassifier,
};
pub use collaborators::{
    Collaborators, DesignGenerator, DesignRequest, FaultJudge, JudgeRequest, Simulator,
    TestbenchBundle, TestbenchGenerator, TestbenchRequest,
};
pub use config::{LoopConfig, StageBudgets};
pub use domain::{
    Artifact, ArtifactKind, RepairDirective, Result, Stage, Verdict, VeriloopError,
};
pub use orchestrator::{
    decide, run_verification_loop, LoopOutcome, Node, Route, RunState, StepRecord,
    TerminalReason, VerificationLoop,
};
pub use report::{read_run_report, write_run_report};
pub use telemetry::init_tracing;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
