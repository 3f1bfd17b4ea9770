//! Simulator backend and full-loop tests against stand-in tool scripts.
//!
//! The scripts mimic `iverilog`/`vvp` closely enough for the backend:
//! the compiler honours `-o`, fails on designs containing `BROKEN`, and the
//! runtime reports a mismatch for designs containing `OFF_BY_ONE`.

#![cfg(unix)]

use std::path::{Path, PathBuf};

use tempfile::{tempdir, TempDir};

use veriloop_core::{
    ArtifactKind, ArtifactStore, LoopConfig, Node, Simulator, Stage, TerminalReason,
    VerificationLoop, VeriloopError, SIMULATION_IMAGE,
};
use veriloop_exec::{DelegateConfig, IverilogSimulator, ToolchainConfig};

const FAKE_IVERILOG: &str = r#"
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; shift; fi
  shift
done
if grep -q BROKEN rtl.sv; then
  echo "rtl.sv:2: syntax error" >&2
  echo "I give up." >&2
  exit 1
fi
echo compiled > "$out"
"#;

const FAKE_VVP: &str = r#"
[ -f sim_output.vvp ] || { echo "sim_output.vvp: no such file" >&2; exit 2; }
if grep -q OFF_BY_ONE rtl.sv; then
  echo "SIMULATION FAILED"
  echo "Mismatch at t=40: expected 3 got 2"
else
  echo "SIMULATION PASSED"
fi
"#;

const FAKE_DELEGATE: &str = r#"
req=$(cat)
case "$req" in
  *'"operation":"judge"'*)
    printf '%s\n' '{"design_needs_fix": true, "testbench_needs_fix": false, "reasoning": "counter wraps one cycle late"}' ;;
  *'"operation":"generate_design"'*)
    printf '%s\n' '{"design": "module counter;\nendmodule\n"}' ;;
  *)
    printf '%s\n' '{"testbench": "module tb;\nendmodule\n", "interface": "interface counter_if;\nendinterface\n"}' ;;
esac
"#;

struct Fixture {
    dir: TempDir,
    tools: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let tools = tempdir().expect("tools dir");
        for (name, body) in [
            ("iverilog.sh", FAKE_IVERILOG),
            ("vvp.sh", FAKE_VVP),
            ("delegate.sh", FAKE_DELEGATE),
        ] {
            std::fs::write(tools.path().join(name), body).expect("write script");
        }
        Self {
            dir: tempdir().expect("run dir"),
            tools,
        }
    }

    fn script(&self, name: &str) -> String {
        self.tools.path().join(name).display().to_string()
    }

    /// Scripts run through `sh` so they never need the executable bit.
    fn toolchain(&self) -> ToolchainConfig {
        ToolchainConfig {
            iverilog: "sh".to_string(),
            vvp: "sh".to_string(),
            flags: vec![self.script("iverilog.sh"), "-g2012".to_string()],
            syntax_flags: Vec::new(),
            vvp_flags: vec![self.script("vvp.sh"), "-n".to_string()],
            timeout_secs: 30,
            extra_benign_patterns: Vec::new(),
        }
    }

    fn delegate(&self) -> DelegateConfig {
        DelegateConfig::Command {
            program: "sh".to_string(),
            args: vec![self.script("delegate.sh")],
            timeout_secs: 30,
        }
    }

    fn store(&self, design: &str) -> ArtifactStore {
        let store = ArtifactStore::open(self.dir.path()).expect("open");
        store.write(ArtifactKind::Design, design).expect("design");
        store
            .write(ArtifactKind::Testbench, "module tb;\nendmodule\n")
            .expect("tb");
        store
            .write(ArtifactKind::Interface, "interface counter_if;\nendinterface\n")
            .expect("if");
        store
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

fn exists(path: &Path) -> bool {
    path.exists()
}

#[tokio::test]
async fn test_syntax_check_passes_and_cleans_scratch() {
    let fx = Fixture::new();
    let store = fx.store("module counter;\nendmodule\n");
    let sim = IverilogSimulator::new(fx.toolchain());

    let verdict = sim.syntax_check(&store).await.expect("verdict");
    assert!(verdict.success, "{verdict}");
    assert!(!exists(&fx.path(veriloop_exec::toolchain::SYNTAX_SCRATCH)));
}

#[tokio::test]
async fn test_syntax_error_reported_in_verdict() {
    let fx = Fixture::new();
    let store = fx.store("module counter BROKEN\n");
    let sim = IverilogSimulator::new(fx.toolchain());

    let verdict = sim.syntax_check(&store).await.expect("verdict");
    assert!(!verdict.success);
    assert_eq!(verdict.returncode, 1);
    assert!(verdict.stderr.contains("syntax error"));
}

#[tokio::test]
async fn test_simulate_compiles_then_runs() {
    let fx = Fixture::new();
    let store = fx.store("module counter;\nendmodule\n");
    let sim = IverilogSimulator::new(fx.toolchain());

    let verdict = sim.simulate(&store).await.expect("verdict");
    assert!(verdict.success, "{verdict}");
    assert!(verdict.stdout.contains("SIMULATION PASSED"));
    assert!(exists(&fx.path(SIMULATION_IMAGE)));
}

#[tokio::test]
async fn test_compile_failure_skips_run_and_stale_image() {
    let fx = Fixture::new();
    let store = fx.store("module counter BROKEN\n");
    std::fs::write(fx.path(SIMULATION_IMAGE), "stale").expect("stale image");
    let sim = IverilogSimulator::new(fx.toolchain());

    let verdict = sim.simulate(&store).await.expect("verdict");
    assert!(!verdict.success);
    assert!(verdict.stderr.contains("syntax error"));
    assert!(!verdict.stdout.contains("SIMULATION"));
    assert!(!exists(&fx.path(SIMULATION_IMAGE)));
}

#[tokio::test]
async fn test_missing_testbench_is_error() {
    let fx = Fixture::new();
    let store = ArtifactStore::open(fx.dir.path()).expect("open");
    store
        .write(ArtifactKind::Design, "module counter;\nendmodule\n")
        .expect("design");
    let sim = IverilogSimulator::new(fx.toolchain());

    match sim.simulate(&store).await {
        Err(VeriloopError::ArtifactNotFound { kind, .. }) => {
            assert_eq!(kind, ArtifactKind::Testbench)
        }
        other => panic!("expected ArtifactNotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_tool_is_faulted_verdict() {
    let fx = Fixture::new();
    let store = fx.store("module counter;\nendmodule\n");
    let sim = IverilogSimulator::new(ToolchainConfig {
        iverilog: "veriloop-missing-iverilog".to_string(),
        ..ToolchainConfig::default()
    });

    let verdict = sim.syntax_check(&store).await.expect("verdict");
    assert!(!verdict.success);
    assert_eq!(verdict.returncode, -1);
    assert!(verdict.error_message.is_some());
}

#[tokio::test]
async fn test_loop_repairs_mismatch_through_delegate() {
    let fx = Fixture::new();
    let store = fx.store("module counter; // OFF_BY_ONE\nendmodule\n");
    let toolchain = fx.toolchain();
    let collaborators = fx.delegate().build(None).expect("collaborators");

    let outcome = VerificationLoop::new(
        "An 8-bit counter.",
        store.clone(),
        std::sync::Arc::new(IverilogSimulator::new(toolchain.clone())),
        collaborators,
        LoopConfig::default(),
    )
    .with_classifier(toolchain.classifier().expect("classifier"))
    .run()
    .await;

    assert!(outcome.overall_success, "{:?}", outcome.reason);
    assert_eq!(outcome.reason, TerminalReason::Passed);
    assert_eq!(outcome.last_stage, Stage::MismatchCheck);
    assert_eq!(outcome.count(Node::MismatchFix), 1);
    assert_eq!(
        store.read(ArtifactKind::Design).expect("design"),
        "module counter;\nendmodule\n"
    );
}

#[tokio::test]
async fn test_generate_and_run_from_empty_directory() {
    let fx = Fixture::new();
    let store = ArtifactStore::open(fx.dir.path()).expect("open");
    let collaborators = fx.delegate().build(None).expect("collaborators");

    let outcome = VerificationLoop::new(
        "An 8-bit counter.",
        store.clone(),
        std::sync::Arc::new(IverilogSimulator::new(fx.toolchain())),
        collaborators,
        LoopConfig::default(),
    )
    .generate_and_run()
    .await;

    assert!(outcome.overall_success, "{:?}", outcome.reason);
    assert!(outcome.history.iter().all(|r| !r.node.is_fix()));
    assert_eq!(
        store.read(ArtifactKind::Interface).expect("if"),
        "interface counter_if;\nendinterface\n"
    );
}
