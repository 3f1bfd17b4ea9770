//! End-to-end orchestrator scenarios against scripted collaborators.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::tempdir;

use veriloop_core::{
    cancel_pair, read_run_report, run_verification_loop, ArtifactKind, ArtifactStore,
    Collaborators, DesignGenerator, DesignRequest, FaultJudge, JudgeRequest, LoopConfig, Node,
    RepairDirective, Result, Simulator, Stage, TerminalReason, TestbenchBundle,
    TestbenchGenerator, TestbenchRequest, Verdict, VerificationLoop, VeriloopError,
    COMPLETION_TAG,
};

const SPEC: &str = "An 8-bit up counter with synchronous reset.";

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Replays scripted verdicts; the last one repeats once the script runs out.
struct ScriptedSimulator {
    syntax: Mutex<VecDeque<Verdict>>,
    simulate: Mutex<VecDeque<Verdict>>,
    require_design: bool,
    panic_on_simulate: bool,
}

impl ScriptedSimulator {
    fn new(syntax: Vec<Verdict>, simulate: Vec<Verdict>) -> Self {
        Self {
            syntax: Mutex::new(syntax.into()),
            simulate: Mutex::new(simulate.into()),
            require_design: false,
            panic_on_simulate: false,
        }
    }

    fn next(queue: &Mutex<VecDeque<Verdict>>) -> Verdict {
        let mut q = queue.lock().unwrap();
        if q.len() > 1 {
            q.pop_front().unwrap()
        } else {
            q.front().cloned().expect("script must not be empty")
        }
    }
}

#[async_trait]
impl Simulator for ScriptedSimulator {
    async fn syntax_check(&self, store: &ArtifactStore) -> Result<Verdict> {
        if self.require_design {
            store.read(ArtifactKind::Design)?;
        }
        Ok(Self::next(&self.syntax))
    }

    async fn simulate(&self, store: &ArtifactStore) -> Result<Verdict> {
        if self.panic_on_simulate {
            panic!("simulator backend crashed");
        }
        if self.require_design {
            store.read(ArtifactKind::Design)?;
        }
        Ok(Self::next(&self.simulate))
    }
}

#[derive(Default)]
struct Calls {
    order: Vec<&'static str>,
    design_contexts: Vec<String>,
    testbench_contexts: Vec<String>,
    judge_requests: Vec<JudgeRequest>,
}

/// Deterministic generator/judge that records every call.
struct RecordingDelegate {
    calls: Mutex<Calls>,
    directives: Mutex<VecDeque<RepairDirective>>,
    fail_generation: bool,
}

impl RecordingDelegate {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Calls::default()),
            directives: Mutex::new(VecDeque::new()),
            fail_generation: false,
        }
    }

    fn judging(directives: Vec<RepairDirective>) -> Self {
        Self {
            directives: Mutex::new(directives.into()),
            ..Self::new()
        }
    }

    fn count(&self, what: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .order
            .iter()
            .filter(|c| **c == what)
            .count()
    }
}

#[async_trait]
impl DesignGenerator for RecordingDelegate {
    async fn generate_design(&self, request: &DesignRequest) -> Result<String> {
        let mut calls = self.calls.lock().unwrap();
        calls.order.push("design");
        calls.design_contexts.push(request.failure_context.clone());
        if self.fail_generation {
            return Err(VeriloopError::Delegate("model unavailable".to_string()));
        }
        Ok(format!(
            "module counter_v{};\nendmodule\n",
            calls.design_contexts.len()
        ))
    }
}

#[async_trait]
impl TestbenchGenerator for RecordingDelegate {
    async fn generate_testbench(&self, request: &TestbenchRequest) -> Result<TestbenchBundle> {
        let mut calls = self.calls.lock().unwrap();
        calls.order.push("testbench");
        calls.testbench_contexts.push(request.failure_context.clone());
        if self.fail_generation {
            return Err(VeriloopError::Delegate("model unavailable".to_string()));
        }
        let n = calls.testbench_contexts.len();
        Ok(TestbenchBundle {
            testbench: format!("module tb_v{n};\nendmodule\n"),
            interface: format!("interface counter_if_v{n};\nendinterface\n"),
        })
    }
}

#[async_trait]
impl FaultJudge for RecordingDelegate {
    async fn judge(&self, request: &JudgeRequest) -> Result<RepairDirective> {
        self.calls.lock().unwrap().order.push("judge");
        self.calls
            .lock()
            .unwrap()
            .judge_requests
            .push(request.clone());
        let mut q = self.directives.lock().unwrap();
        let directive = if q.len() > 1 {
            q.pop_front()
        } else {
            q.front().cloned()
        };
        directive.ok_or_else(|| VeriloopError::Delegate("no directive scripted".to_string()))
    }
}

/// Sets its flag when dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Never finishes a syntax check; records when the pending check is torn down.
struct HangingSimulator {
    started: Arc<AtomicBool>,
    dropped: Arc<AtomicBool>,
}

#[async_trait]
impl Simulator for HangingSimulator {
    async fn syntax_check(&self, _store: &ArtifactStore) -> Result<Verdict> {
        let _flag = DropFlag(self.dropped.clone());
        self.started.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(clean())
    }

    async fn simulate(&self, _store: &ArtifactStore) -> Result<Verdict> {
        Ok(sim_passed())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn clean() -> Verdict {
    Verdict::completed(0, String::new(), String::new(), 3)
}

fn sim_passed() -> Verdict {
    Verdict::completed(0, "SIMULATION PASSED\n".to_string(), String::new(), 12)
}

fn sim_mismatch() -> Verdict {
    Verdict::completed(
        0,
        "SIMULATION FAILED\nMismatch at t=40: expected 3 got 2\nWARNING: late sample\n"
            .to_string(),
        String::new(),
        12,
    )
}

fn directive(design: bool, testbench: bool) -> RepairDirective {
    RepairDirective {
        design_needs_fix: design,
        testbench_needs_fix: testbench,
        reasoning: "counter increments on the wrong edge".to_string(),
    }
}

fn seeded_store(dir: &std::path::Path) -> ArtifactStore {
    let store = ArtifactStore::open(dir).expect("open");
    store
        .write(ArtifactKind::Design, "module counter;\nendmodule\n")
        .expect("design");
    store
        .write(ArtifactKind::Testbench, "module tb;\nendmodule\n")
        .expect("testbench");
    store
        .write(ArtifactKind::Interface, "interface counter_if;\nendinterface\n")
        .expect("interface");
    store
}

fn build(
    store: ArtifactStore,
    simulator: ScriptedSimulator,
    delegate: Arc<RecordingDelegate>,
    config: LoopConfig,
) -> VerificationLoop {
    VerificationLoop::new(
        SPEC,
        store,
        Arc::new(simulator),
        Collaborators::from_delegate(delegate),
        config,
    )
}

fn nodes(outcome: &veriloop_core::LoopOutcome) -> Vec<Node> {
    outcome.history.iter().map(|r| r.node).collect()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_happy_path_needs_no_repair() {
    let dir = tempdir().expect("tempdir");
    let store = seeded_store(dir.path());
    let delegate = Arc::new(RecordingDelegate::new());
    let sim = ScriptedSimulator::new(vec![clean()], vec![sim_passed()]);

    let outcome = build(store, sim, delegate.clone(), LoopConfig::default())
        .run()
        .await;

    assert!(outcome.overall_success);
    assert_eq!(outcome.reason, TerminalReason::Passed);
    assert_eq!(outcome.last_stage, Stage::MismatchCheck);
    assert_eq!(outcome.last_node, Some(Node::MismatchCheck));
    assert_eq!(
        nodes(&outcome),
        vec![
            Node::SyntaxCheck,
            Node::ProceedToExec,
            Node::ExecCheck,
            Node::ProceedToMismatch,
            Node::MismatchCheck,
        ]
    );
    assert!(outcome.history.iter().all(|r| !r.node.is_check() || r.iterations == 1));
    assert!(delegate.calls.lock().unwrap().order.is_empty());
    assert_eq!(
        outcome.last_verdict.as_ref().map(|v| v.stdout.as_str()),
        Some("SIMULATION PASSED\n")
    );
}

#[tokio::test]
async fn test_syntax_repair_then_pass() {
    let dir = tempdir().expect("tempdir");
    let store = seeded_store(dir.path());
    let delegate = Arc::new(RecordingDelegate::new());
    let broken = Verdict::completed(
        1,
        String::new(),
        "rtl.sv:1: syntax error\nI give up.\n".to_string(),
        2,
    );
    let sim = ScriptedSimulator::new(vec![broken, clean()], vec![sim_passed()]);

    let outcome = build(store.clone(), sim, delegate.clone(), LoopConfig::default())
        .run()
        .await;

    assert!(outcome.overall_success);
    assert_eq!(outcome.count(Node::SyntaxFix), 1);
    assert_eq!(outcome.count(Node::SyntaxCheck), 2);
    let syntax_checks: Vec<u32> = outcome
        .history
        .iter()
        .filter(|r| r.node == Node::SyntaxCheck)
        .map(|r| r.iterations)
        .collect();
    assert_eq!(syntax_checks, vec![1, 2]);
    let advance = outcome
        .history
        .iter()
        .find(|r| r.node == Node::ProceedToExec)
        .expect("advance record");
    assert_eq!(advance.iterations, 0);
    let first_exec = outcome
        .history
        .iter()
        .find(|r| r.node == Node::ExecCheck)
        .expect("exec record");
    assert_eq!(first_exec.iterations, 1);

    let calls = delegate.calls.lock().unwrap();
    assert_eq!(calls.order, vec!["design"]);
    let context = &calls.design_contexts[0];
    assert!(context.contains("----- IMPORTANT HINT FROM PREVIOUS RUN -------"));
    assert!(context.contains("<previous_code - rtl.sv>\n1: module counter;\n2: endmodule"));
    assert!(context.contains("rtl.sv:1: syntax error"));
    assert_eq!(
        store.read(ArtifactKind::Design).expect("design"),
        "module counter_v1;\nendmodule\n"
    );
}

#[tokio::test]
async fn test_persistent_mismatch_exhausts_budget() {
    let dir = tempdir().expect("tempdir");
    let store = seeded_store(dir.path());
    let delegate = Arc::new(RecordingDelegate::judging(vec![directive(true, false)]));
    let sim = ScriptedSimulator::new(vec![clean()], vec![sim_mismatch()]);

    let outcome = build(store, sim, delegate.clone(), LoopConfig::with_max_iterations(2))
        .run()
        .await;

    assert!(!outcome.overall_success);
    assert_eq!(
        outcome.reason,
        TerminalReason::BudgetExhausted {
            stage: Stage::MismatchCheck
        }
    );
    assert_eq!(outcome.last_stage, Stage::MismatchCheck);
    assert_eq!(outcome.iterations, 2);
    assert_eq!(outcome.count(Node::MismatchFix), 1);
    assert_eq!(
        outcome.last_verdict.as_ref().map(Verdict::mismatch_count),
        Some(1)
    );

    let calls = delegate.calls.lock().unwrap();
    assert_eq!(calls.order, vec!["judge", "design"]);
    let request = &calls.judge_requests[0];
    assert!(request.design.starts_with("1: module counter;"));
    assert!(request.testbench.starts_with("1: module tb;"));
    assert!(request.failure_log.contains("- Mismatch at t=40"));
    assert!(request.failure_log.contains("- WARNING: late sample"));
    assert!(calls.design_contexts[0].contains("<Output by a reasoning agent>"));
}

#[tokio::test]
async fn test_execution_failure_regenerates_testbench() {
    let dir = tempdir().expect("tempdir");
    let store = seeded_store(dir.path());
    let delegate = Arc::new(RecordingDelegate::new());
    let crashed = Verdict::completed(
        2,
        String::new(),
        "tb.sv:4: error: Unknown module type: counter_iff\n".to_string(),
        5,
    );
    let sim = ScriptedSimulator::new(vec![clean()], vec![crashed, sim_passed()]);

    let outcome = build(store.clone(), sim, delegate.clone(), LoopConfig::default())
        .run()
        .await;

    assert!(outcome.overall_success);
    assert_eq!(outcome.count(Node::ExecFix), 1);
    assert_eq!(outcome.count(Node::SyntaxFix), 0);

    let calls = delegate.calls.lock().unwrap();
    assert_eq!(calls.order, vec!["testbench"]);
    let context = &calls.testbench_contexts[0];
    assert!(context.contains("<previous_tb - tb.sv>"));
    assert!(context.contains("The command failed with a return code of 2."));
    assert!(context.contains("Unknown module type"));

    assert_eq!(
        store.read(ArtifactKind::Testbench).expect("tb"),
        "module tb_v1;\nendmodule\n"
    );
    assert_eq!(
        store.read(ArtifactKind::Interface).expect("if"),
        "interface counter_if_v1;\nendinterface\n"
    );
}

#[tokio::test]
async fn test_judge_can_fix_both_artifacts() {
    let dir = tempdir().expect("tempdir");
    let store = seeded_store(dir.path());
    let delegate = Arc::new(RecordingDelegate::judging(vec![directive(true, true)]));
    let sim = ScriptedSimulator::new(vec![clean()], vec![sim_passed(), sim_mismatch(), sim_passed()]);

    let outcome = build(store, sim, delegate.clone(), LoopConfig::default())
        .run()
        .await;

    assert!(outcome.overall_success);
    let calls = delegate.calls.lock().unwrap();
    assert_eq!(calls.order, vec!["judge", "testbench", "design"]);
    // The design repair sees the testbench written moments before.
    assert!(calls.design_contexts[0].contains("1: module tb_v1;"));
}

#[tokio::test]
async fn test_unattributed_mismatch_consumes_budget_by_default() {
    let dir = tempdir().expect("tempdir");
    let store = seeded_store(dir.path());
    let delegate = Arc::new(RecordingDelegate::judging(vec![directive(false, false)]));
    let sim = ScriptedSimulator::new(vec![clean()], vec![sim_mismatch()]);

    let outcome = build(store, sim, delegate.clone(), LoopConfig::with_max_iterations(3))
        .run()
        .await;

    assert_eq!(
        outcome.reason,
        TerminalReason::BudgetExhausted {
            stage: Stage::MismatchCheck
        }
    );
    assert_eq!(outcome.count(Node::MismatchFix), 2);
    assert_eq!(delegate.count("design"), 0);
    assert_eq!(delegate.count("testbench"), 0);
}

#[tokio::test]
async fn test_later_attribution_recovers_from_deadlock() {
    let dir = tempdir().expect("tempdir");
    let store = seeded_store(dir.path());
    let delegate = Arc::new(RecordingDelegate::judging(vec![
        directive(false, false),
        directive(true, false),
    ]));
    let sim = ScriptedSimulator::new(
        vec![clean()],
        vec![sim_passed(), sim_mismatch(), sim_mismatch(), sim_passed()],
    );

    let outcome = build(store.clone(), sim, delegate.clone(), LoopConfig::default())
        .run()
        .await;

    assert!(outcome.overall_success);
    assert_eq!(outcome.reason, TerminalReason::Passed);
    assert_eq!(outcome.count(Node::MismatchFix), 2);
    let fixes: Vec<bool> = outcome
        .history
        .iter()
        .filter(|r| r.node == Node::MismatchFix)
        .map(|r| r.error)
        .collect();
    assert_eq!(fixes, vec![true, false]);

    let calls = delegate.calls.lock().unwrap();
    assert_eq!(calls.order, vec!["judge", "judge", "design"]);
    // The deadlocked attempt left every artifact untouched.
    assert_eq!(calls.judge_requests[0].design, calls.judge_requests[1].design);
    assert_eq!(
        calls.judge_requests[1].design,
        "1: module counter;\n2: endmodule"
    );
    assert_eq!(
        calls.judge_requests[0].testbench,
        calls.judge_requests[1].testbench
    );
    assert_eq!(
        store.read(ArtifactKind::Design).expect("design"),
        "module counter_v1;\nendmodule\n"
    );
}

#[tokio::test]
async fn test_zero_budget_passes_clean_artifacts() {
    let dir = tempdir().expect("tempdir");
    let store = seeded_store(dir.path());
    let delegate = Arc::new(RecordingDelegate::new());
    let sim = ScriptedSimulator::new(vec![clean()], vec![sim_passed()]);

    let outcome = build(store, sim, delegate.clone(), LoopConfig::with_max_iterations(0))
        .run()
        .await;

    assert!(outcome.overall_success);
    assert_eq!(outcome.reason, TerminalReason::Passed);
    assert_eq!(outcome.history.len(), 5);
    assert!(delegate.calls.lock().unwrap().order.is_empty());
}

#[tokio::test]
async fn test_zero_budget_ends_on_first_failure_without_repair() {
    let dir = tempdir().expect("tempdir");
    let store = seeded_store(dir.path());
    let delegate = Arc::new(RecordingDelegate::judging(vec![directive(true, false)]));
    let sim = ScriptedSimulator::new(vec![clean()], vec![sim_passed(), sim_mismatch()]);

    let outcome = build(store, sim, delegate.clone(), LoopConfig::with_max_iterations(0))
        .run()
        .await;

    assert!(!outcome.overall_success);
    assert_eq!(
        outcome.reason,
        TerminalReason::BudgetExhausted {
            stage: Stage::MismatchCheck
        }
    );
    assert_eq!(outcome.count(Node::MismatchFix), 0);
    assert!(delegate.calls.lock().unwrap().order.is_empty());
}

#[tokio::test]
async fn test_deadlock_limit_stops_early() {
    let dir = tempdir().expect("tempdir");
    let store = seeded_store(dir.path());
    let delegate = Arc::new(RecordingDelegate::judging(vec![directive(false, false)]));
    let sim = ScriptedSimulator::new(vec![clean()], vec![sim_mismatch()]);
    let config = LoopConfig {
        max_consecutive_deadlocks: Some(1),
        ..LoopConfig::with_max_iterations(5)
    };

    let outcome = build(store, sim, delegate, config).run().await;

    assert!(!outcome.overall_success);
    assert_eq!(
        outcome.reason,
        TerminalReason::AttributionDeadlock { consecutive: 1 }
    );
    assert_eq!(outcome.last_node, Some(Node::MismatchFix));
}

#[tokio::test]
async fn test_missing_design_folds_into_failures() {
    let dir = tempdir().expect("tempdir");
    let store = ArtifactStore::open(dir.path()).expect("open");
    let delegate = Arc::new(RecordingDelegate::new());
    let mut sim = ScriptedSimulator::new(vec![clean()], vec![sim_passed()]);
    sim.require_design = true;

    let outcome = build(store, sim, delegate.clone(), LoopConfig::with_max_iterations(2))
        .run()
        .await;

    assert!(!outcome.overall_success);
    assert_eq!(
        outcome.reason,
        TerminalReason::BudgetExhausted {
            stage: Stage::SyntaxCheck
        }
    );
    assert!(outcome.last_verdict.is_none());
    assert!(outcome
        .history
        .iter()
        .all(|r| r.error && r.fault.as_deref().is_some_and(|f| f.contains("not found"))));
    // The repair could not read the design either, so nothing was generated.
    assert_eq!(delegate.count("design"), 0);
}

#[tokio::test]
async fn test_generate_and_run_bootstraps_testbench_first() {
    let dir = tempdir().expect("tempdir");
    let store = ArtifactStore::open(dir.path()).expect("open");
    let delegate = Arc::new(RecordingDelegate::new());
    let sim = ScriptedSimulator::new(vec![clean()], vec![sim_passed()]);

    let outcome = build(store.clone(), sim, delegate.clone(), LoopConfig::default())
        .generate_and_run()
        .await;

    assert!(outcome.overall_success);
    let calls = delegate.calls.lock().unwrap();
    assert_eq!(calls.order, vec!["testbench", "design"]);
    assert!(calls.testbench_contexts[0].is_empty());
    assert!(calls.design_contexts[0].is_empty());
    for kind in ArtifactKind::ALL {
        assert!(store.exists(kind), "{kind} should exist");
    }
}

#[tokio::test]
async fn test_bootstrap_failure_aborts_run() {
    let dir = tempdir().expect("tempdir");
    let store = ArtifactStore::open(dir.path()).expect("open");
    let delegate = Arc::new(RecordingDelegate {
        fail_generation: true,
        ..RecordingDelegate::new()
    });
    let sim = ScriptedSimulator::new(vec![clean()], vec![sim_passed()]);

    let outcome = build(store, sim, delegate, LoopConfig::default())
        .generate_and_run()
        .await;

    assert!(!outcome.overall_success);
    assert!(matches!(
        outcome.reason,
        TerminalReason::BootstrapFailed { .. }
    ));
    assert!(outcome.history.is_empty());
    let tag = std::fs::read_to_string(dir.path().join(COMPLETION_TAG)).expect("tag");
    assert!(tag.starts_with("0\nbootstrap failed"));
}

#[tokio::test]
async fn test_cancelled_before_first_node() {
    let dir = tempdir().expect("tempdir");
    let store = seeded_store(dir.path());
    let delegate = Arc::new(RecordingDelegate::new());
    let sim = ScriptedSimulator::new(vec![clean()], vec![sim_passed()]);
    let (handle, signal) = cancel_pair();
    handle.cancel();

    let outcome = build(store, sim, delegate, LoopConfig::default())
        .with_cancel(signal)
        .run()
        .await;

    assert!(!outcome.overall_success);
    assert_eq!(
        outcome.reason,
        TerminalReason::Aborted {
            reason: "cancelled".to_string()
        }
    );
    assert!(outcome.history.is_empty());
}

#[tokio::test]
async fn test_simulator_panic_becomes_abort() {
    let dir = tempdir().expect("tempdir");
    let store = seeded_store(dir.path());
    let delegate = Arc::new(RecordingDelegate::new());
    let mut sim = ScriptedSimulator::new(vec![clean()], vec![sim_passed()]);
    sim.panic_on_simulate = true;

    let outcome = build(store, sim, delegate, LoopConfig::default())
        .run()
        .await;

    assert!(!outcome.overall_success);
    match &outcome.reason {
        TerminalReason::Aborted { reason } => assert!(reason.contains("orchestrator task failed")),
        other => panic!("expected Aborted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_dropping_run_future_stops_the_run() {
    let dir = tempdir().expect("tempdir");
    let store = seeded_store(dir.path());
    let started = Arc::new(AtomicBool::new(false));
    let dropped = Arc::new(AtomicBool::new(false));
    let sim = HangingSimulator {
        started: started.clone(),
        dropped: dropped.clone(),
    };
    let runner = VerificationLoop::new(
        SPEC,
        store.clone(),
        Arc::new(sim),
        Collaborators::from_delegate(Arc::new(RecordingDelegate::new())),
        LoopConfig::default(),
    );

    let result = tokio::time::timeout(Duration::from_millis(100), runner.run()).await;
    assert!(result.is_err());
    assert!(started.load(Ordering::SeqCst));

    for _ in 0..50 {
        if dropped.load(Ordering::SeqCst) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(dropped.load(Ordering::SeqCst));
    assert!(!store.transient_path(COMPLETION_TAG).exists());
}

#[tokio::test]
async fn test_report_written_and_verifiable() {
    let dir = tempdir().expect("tempdir");
    let store = seeded_store(dir.path());
    let delegate = Arc::new(RecordingDelegate::new());
    let sim = ScriptedSimulator::new(vec![clean()], vec![sim_passed()]);

    let outcome = build(store, sim, delegate, LoopConfig::default()).run().await;

    let report = read_run_report(dir.path()).expect("report");
    assert_eq!(report.run_id, outcome.run_id);
    assert_eq!(report.history.len(), outcome.history.len());
    assert_eq!(
        std::fs::read_to_string(dir.path().join(COMPLETION_TAG)).expect("tag"),
        "1"
    );
}

#[tokio::test]
async fn test_report_can_be_disabled() {
    let dir = tempdir().expect("tempdir");
    let store = seeded_store(dir.path());
    let delegate = Arc::new(RecordingDelegate::new());
    let sim = ScriptedSimulator::new(vec![clean()], vec![sim_passed()]);
    let config = LoopConfig {
        write_report: false,
        ..Default::default()
    };

    build(store, sim, delegate, config).run().await;

    assert!(!dir.path().join(COMPLETION_TAG).exists());
    assert!(read_run_report(dir.path()).is_err());
}

#[tokio::test]
async fn test_entry_point_with_shared_ceiling() {
    let dir = tempdir().expect("tempdir");
    seeded_store(dir.path());
    let delegate = Arc::new(RecordingDelegate::new());
    let failing = Verdict::completed(1, String::new(), "rtl.sv:1: error".to_string(), 1);
    let sim = ScriptedSimulator::new(vec![failing], vec![sim_passed()]);

    let outcome = run_verification_loop(
        SPEC,
        dir.path(),
        1,
        Arc::new(sim),
        Collaborators::from_delegate(delegate.clone()),
    )
    .await;

    assert!(!outcome.overall_success);
    assert_eq!(outcome.last_stage, Stage::SyntaxCheck);
    assert_eq!(delegate.count("design"), 0);
}
