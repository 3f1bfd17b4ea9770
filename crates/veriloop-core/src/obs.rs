//! Structured lifecycle events for verification runs.
//!
//! Every event carries an `event` field (`run.started`, `stage.checked`,
//! ...) and the `run_id`, so JSON logs can be filtered per run.

use tracing::{info, warn};

use crate::domain::Stage;

/// Span tagging everything inside one run with its id.
///
/// Attach with [`tracing::Instrument::instrument`] so the span follows the
/// run future across `.await` points.
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("veriloop.run", run_id = %run_id)
}

pub fn emit_run_started(run_id: &str, dir: &std::path::Path, max_iterations: u32) {
    info!(
        event = "run.started",
        run_id = %run_id,
        dir = %dir.display(),
        max_iterations = max_iterations,
    );
}

/// Emit event: a check node finished.
pub fn emit_stage_checked(
    run_id: &str,
    stage: Stage,
    iteration: u32,
    passed: bool,
    mismatch_count: usize,
) {
    info!(
        event = "stage.checked",
        run_id = %run_id,
        stage = %stage,
        iteration = iteration,
        passed = passed,
        mismatch_count = mismatch_count,
    );
}

/// Emit event: a repair node finished.
pub fn emit_stage_repaired(run_id: &str, stage: Stage, success: bool) {
    info!(
        event = "stage.repaired",
        run_id = %run_id,
        stage = %stage,
        success = success,
    );
}

pub fn emit_stage_advanced(run_id: &str, to: Stage) {
    info!(event = "stage.advanced", run_id = %run_id, to = %to);
}

/// Emit event: the judge returned its attribution.
pub fn emit_judge_directive(run_id: &str, design_needs_fix: bool, testbench_needs_fix: bool) {
    info!(
        event = "judge.directive",
        run_id = %run_id,
        design_needs_fix = design_needs_fix,
        testbench_needs_fix = testbench_needs_fix,
    );
}

pub fn emit_run_finished(run_id: &str, duration_ms: u64, success: bool, reason: &str) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        success = success,
        reason = %reason,
    );
}

/// Emit event: run artifacts could not be finalised (warning level).
pub fn emit_run_finalize_error(run_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "run.finalize_error", run_id = %run_id, error = %error);
}
