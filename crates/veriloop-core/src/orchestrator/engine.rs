//! The verification-repair interpreter.
//!
//! [`VerificationLoop`] executes the node named by the current
//! [`RunState`], folds the node's outcome into a new state and asks
//! [`transition`] for the next node until the state reaches `END`.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use super::context::{FailureContext, RepairTarget};
use super::outcome::{LoopOutcome, StepRecord};
use super::state::{transition, Node, NodeOutcome, RunState, TerminalReason};
use crate::artifacts::ArtifactStore;
use crate::cancel::CancelSignal;
use crate::classifier::{add_line_numbers, explain, OutputClassifier};
use crate::collaborators::{Collaborators, Simulator};
use crate::config::LoopConfig;
use crate::domain::{ArtifactKind, Result, Stage, Verdict};
use crate::obs;
use crate::report;

/// Aborts the spawned run when the caller stops waiting for it.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Drives one artifact directory through the verification graph.
#[derive(Clone)]
pub struct VerificationLoop {
    spec: Arc<str>,
    store: ArtifactStore,
    simulator: Arc<dyn Simulator>,
    collaborators: Collaborators,
    classifier: OutputClassifier,
    config: LoopConfig,
    cancel: Option<CancelSignal>,
}

impl VerificationLoop {
    pub fn new(
        spec: impl Into<Arc<str>>,
        store: ArtifactStore,
        simulator: Arc<dyn Simulator>,
        collaborators: Collaborators,
        config: LoopConfig,
    ) -> Self {
        Self {
            spec: spec.into(),
            store,
            simulator,
            collaborators,
            classifier: OutputClassifier::default(),
            config,
            cancel: None,
        }
    }

    /// Replace the default classifier (e.g. to extend the benign allowlist).
    pub fn with_classifier(mut self, classifier: OutputClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Stop at the next node boundary once `signal` fires.
    pub fn with_cancel(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Generate the initial testbench, interface and design.
    ///
    /// The testbench is generated first and read back from disk so that the
    /// design generator sees exactly what the simulator will compile.
    pub async fn bootstrap(&self) -> Result<()> {
        info!("generating initial testbench and interface");
        let bundle = self.collaborators.generate_testbench(&self.spec, "").await?;
        self.store.write(ArtifactKind::Testbench, &bundle.testbench)?;
        self.store.write(ArtifactKind::Interface, &bundle.interface)?;

        let testbench = self.store.read(ArtifactKind::Testbench)?;
        let interface = self.store.read(ArtifactKind::Interface)?;

        info!("generating initial design");
        let design = self
            .collaborators
            .generate_design(&self.spec, &testbench, &interface, "")
            .await?;
        self.store.write(ArtifactKind::Design, &design)?;
        Ok(())
    }

    /// Run the loop over artifacts already present in the store.
    ///
    /// Dropping the returned future aborts the run at its next await point;
    /// no report is written in that case.
    pub async fn run(&self) -> LoopOutcome {
        self.launch(false).await
    }

    /// Bootstrap the artifacts, then run the loop.
    pub async fn generate_and_run(&self) -> LoopOutcome {
        self.launch(true).await
    }

    async fn launch(&self, bootstrap: bool) -> LoopOutcome {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let span = obs::run_span(&run_id);

        let this = self.clone();
        let id = run_id.clone();
        let mut task = AbortOnDrop(tokio::spawn(
            async move { this.drive(id, started_at, bootstrap).await }.instrument(span.clone()),
        ));

        let outcome = match (&mut task.0).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(run_id = %run_id, error = %e, "orchestrator task failed");
                LoopOutcome::without_loop(
                    run_id,
                    TerminalReason::Aborted {
                        reason: format!("orchestrator task failed: {e}"),
                    },
                    started_at,
                )
            }
        };

        let _entered = span.enter();
        self.finalize(&outcome);
        outcome
    }

    async fn drive(
        &self,
        run_id: String,
        started_at: chrono::DateTime<Utc>,
        bootstrap: bool,
    ) -> LoopOutcome {
        obs::emit_run_started(&run_id, self.store.dir(), self.config.max_iterations);
        self.store.clear_completion_tag();

        if let Err(e) = self.config.validate() {
            return LoopOutcome::without_loop(
                run_id,
                TerminalReason::Aborted {
                    reason: e.to_string(),
                },
                started_at,
            );
        }

        if bootstrap {
            if let Err(e) = self.bootstrap().await {
                warn!(error = %e, "bootstrap failed");
                return LoopOutcome::without_loop(
                    run_id,
                    TerminalReason::BootstrapFailed {
                        reason: e.to_string(),
                    },
                    started_at,
                );
            }
        }

        let mut state = RunState::initial();
        let mut history = Vec::new();
        let mut seq = 0u32;

        while !state.is_terminal() {
            if self.is_cancelled() {
                info!(node = %state.node, "cancellation requested");
                state = state.abort(TerminalReason::Aborted {
                    reason: "cancelled".to_string(),
                });
                break;
            }

            let node = state.node;
            debug!(node = %node, iterations = state.iterations, "entering node");
            let outcome = self.execute(node, &state, &run_id).await;

            state = state.apply(outcome);
            seq += 1;
            history.push(StepRecord::after(seq, node, &state));

            let (next, terminal) = transition(&state, &self.config);
            state = state.goto(next, terminal);
        }

        LoopOutcome::from_state(run_id, state, history, started_at)
    }

    fn finalize(&self, outcome: &LoopOutcome) {
        obs::emit_run_finished(
            &outcome.run_id,
            outcome.duration_ms(),
            outcome.overall_success,
            &outcome.reason.to_string(),
        );
        if self.config.write_report {
            if let Err(e) = report::write_run_report(outcome, &self.store) {
                obs::emit_run_finalize_error(&outcome.run_id, &e);
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelSignal::is_cancelled)
    }

    async fn execute(&self, node: Node, state: &RunState, run_id: &str) -> NodeOutcome {
        match node {
            Node::SyntaxCheck => self.check(Stage::SyntaxCheck, state, run_id).await,
            Node::ExecCheck => self.check(Stage::ExecutionCheck, state, run_id).await,
            Node::MismatchCheck => self.check(Stage::MismatchCheck, state, run_id).await,
            Node::SyntaxFix => {
                let result = self.repair_syntax(state).await;
                repaired(Stage::SyntaxCheck, result, run_id)
            }
            Node::ExecFix => {
                let result = self.repair_execution(state).await;
                repaired(Stage::ExecutionCheck, result, run_id)
            }
            Node::MismatchFix => self.repair_mismatch(state, run_id).await,
            Node::ProceedToExec => {
                obs::emit_stage_advanced(run_id, Stage::ExecutionCheck);
                NodeOutcome::ok()
            }
            Node::ProceedToMismatch => {
                obs::emit_stage_advanced(run_id, Stage::MismatchCheck);
                NodeOutcome::ok()
            }
            Node::End => NodeOutcome::ok(),
        }
    }

    async fn check(&self, stage: Stage, state: &RunState, run_id: &str) -> NodeOutcome {
        let result = match stage {
            Stage::SyntaxCheck => self.simulator.syntax_check(&self.store).await,
            Stage::ExecutionCheck | Stage::MismatchCheck => {
                self.simulator.simulate(&self.store).await
            }
        };

        match result {
            Ok(verdict) => {
                let assessment = self.classifier.assess(stage, &verdict);
                obs::emit_stage_checked(
                    run_id,
                    stage,
                    state.iterations + 1,
                    assessment.passed,
                    assessment.mismatch_count,
                );
                for line in &assessment.warning_lines {
                    debug!(stage = %stage, warning = %line, "simulation warning");
                }
                NodeOutcome::checked(verdict, assessment)
            }
            Err(e) => {
                warn!(stage = %stage, error = %e, "check faulted before producing a verdict");
                NodeOutcome::fault(e.to_string())
            }
        }
    }

    /// Failure log for a repair: the fault of the last check if it had one,
    /// otherwise `render` applied to its verdict.
    fn failure_log(&self, state: &RunState, render: fn(&Verdict) -> String) -> String {
        if let Some(fault) = &state.fault {
            return fault.clone();
        }
        match &state.verdict {
            Some(verdict) => render(verdict),
            None => "no verdict available".to_string(),
        }
    }

    async fn repair_syntax(&self, state: &RunState) -> Result<()> {
        let design = self.store.read(ArtifactKind::Design)?;
        let testbench = self.store.read(ArtifactKind::Testbench)?;
        let interface = self.store.read(ArtifactKind::Interface)?;

        let log = self.failure_log(state, |v| v.to_string());
        let context = FailureContext::new(RepairTarget::Design, log)
            .with_design(&design)
            .render();

        let design = self
            .collaborators
            .generate_design(&self.spec, &testbench, &interface, &context)
            .await?;
        self.store.write(ArtifactKind::Design, &design)
    }

    async fn repair_execution(&self, state: &RunState) -> Result<()> {
        let design = self.store.read(ArtifactKind::Design)?;
        let testbench = self.store.read(ArtifactKind::Testbench)?;

        let log = self.failure_log(state, explain);
        let context = FailureContext::new(RepairTarget::Testbench, log)
            .with_design(&design)
            .with_testbench(&testbench)
            .render();

        let bundle = self
            .collaborators
            .generate_testbench(&self.spec, &context)
            .await?;
        self.store.write(ArtifactKind::Testbench, &bundle.testbench)?;
        self.store.write(ArtifactKind::Interface, &bundle.interface)
    }

    async fn repair_mismatch(&self, state: &RunState, run_id: &str) -> NodeOutcome {
        match self.attribute_and_repair(state, run_id).await {
            Ok(true) => {
                obs::emit_stage_repaired(run_id, Stage::MismatchCheck, true);
                NodeOutcome::ok().attributed()
            }
            Ok(false) => {
                obs::emit_stage_repaired(run_id, Stage::MismatchCheck, false);
                NodeOutcome::deadlocked()
            }
            Err(e) => {
                warn!(error = %e, "mismatch repair failed");
                obs::emit_stage_repaired(run_id, Stage::MismatchCheck, false);
                NodeOutcome::fault(e.to_string())
            }
        }
    }

    /// Ask the judge who is at fault and regenerate what it names.
    /// Returns `false` when it names neither artifact.
    async fn attribute_and_repair(&self, state: &RunState, run_id: &str) -> Result<bool> {
        let log = self.failure_log(state, explain);
        let design = self.store.read(ArtifactKind::Design)?;
        let testbench = self.store.read(ArtifactKind::Testbench)?;

        let directive = self
            .collaborators
            .judge(
                &self.spec,
                &log,
                &add_line_numbers(&design),
                &add_line_numbers(&testbench),
            )
            .await?;
        obs::emit_judge_directive(
            run_id,
            directive.design_needs_fix,
            directive.testbench_needs_fix,
        );
        debug!(reasoning = %directive.reasoning, "judge reasoning");

        if !directive.is_actionable() {
            return Ok(false);
        }

        if directive.testbench_needs_fix {
            let context = FailureContext::new(RepairTarget::Testbench, log.as_str())
                .with_design(&design)
                .with_testbench(&testbench)
                .with_reasoning(&directive.reasoning)
                .render();
            let bundle = self
                .collaborators
                .generate_testbench(&self.spec, &context)
                .await?;
            self.store.write(ArtifactKind::Testbench, &bundle.testbench)?;
            self.store.write(ArtifactKind::Interface, &bundle.interface)?;
        }

        if directive.design_needs_fix {
            // The testbench may have just been replaced.
            let design = self.store.read(ArtifactKind::Design)?;
            let testbench = self.store.read(ArtifactKind::Testbench)?;
            let interface = self.store.read(ArtifactKind::Interface)?;
            let context = FailureContext::new(RepairTarget::Design, log.as_str())
                .with_design(&design)
                .with_testbench(&testbench)
                .with_reasoning(&directive.reasoning)
                .render();
            let design = self
                .collaborators
                .generate_design(&self.spec, &testbench, &interface, &context)
                .await?;
            self.store.write(ArtifactKind::Design, &design)?;
        }

        Ok(true)
    }
}

fn repaired(stage: Stage, result: Result<()>, run_id: &str) -> NodeOutcome {
    match result {
        Ok(()) => {
            obs::emit_stage_repaired(run_id, stage, true);
            NodeOutcome::ok()
        }
        Err(e) => {
            warn!(stage = %stage, error = %e, "repair failed");
            obs::emit_stage_repaired(run_id, stage, false);
            NodeOutcome::fault(e.to_string())
        }
    }
}

/// Run the loop over the artifacts in `dir` with a shared iteration ceiling.
///
/// Never fails: an unusable directory or any other fault outside the loop
/// is reported as an aborted outcome.
pub async fn run_verification_loop(
    spec: &str,
    dir: impl Into<PathBuf>,
    max_iterations: u32,
    simulator: Arc<dyn Simulator>,
    collaborators: Collaborators,
) -> LoopOutcome {
    let dir = dir.into();
    let store = match ArtifactStore::open(&dir) {
        Ok(store) => store,
        Err(e) => {
            return LoopOutcome::without_loop(
                Uuid::new_v4().to_string(),
                TerminalReason::Aborted {
                    reason: format!("cannot open {}: {e}", dir.display()),
                },
                Utc::now(),
            )
        }
    };
    VerificationLoop::new(
        spec,
        store,
        simulator,
        collaborators,
        LoopConfig::with_max_iterations(max_iterations),
    )
    .run()
    .await
}
