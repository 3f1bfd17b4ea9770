//! Icarus Verilog backend for the core `Simulator` seam.

use async_trait::async_trait;
use tracing::{debug, instrument};

use veriloop_core::{
    ArtifactKind, ArtifactStore, CancelSignal, Result, Simulator, Verdict, VeriloopError,
    SIMULATION_IMAGE,
};

use crate::runner::ProcessRunner;
use crate::toolchain::{ToolchainConfig, SYNTAX_SCRATCH};

/// Runs `iverilog`/`vvp` inside the artifact directory.
#[derive(Debug, Clone)]
pub struct IverilogSimulator {
    toolchain: ToolchainConfig,
    runner: ProcessRunner,
}

impl IverilogSimulator {
    pub fn new(toolchain: ToolchainConfig) -> Self {
        let runner = toolchain.runner();
        Self { toolchain, runner }
    }

    /// Kill in-flight tool processes once `signal` fires.
    pub fn with_cancel(mut self, signal: CancelSignal) -> Self {
        self.runner = self.runner.with_cancel(signal);
        self
    }

    pub fn toolchain(&self) -> &ToolchainConfig {
        &self.toolchain
    }
}

fn require(store: &ArtifactStore, kinds: &[ArtifactKind]) -> Result<()> {
    for &kind in kinds {
        if !store.exists(kind) {
            return Err(VeriloopError::ArtifactNotFound {
                kind,
                path: store.path(kind),
            });
        }
    }
    Ok(())
}

#[async_trait]
impl Simulator for IverilogSimulator {
    #[instrument(skip_all, fields(dir = %store.dir().display()))]
    async fn syntax_check(&self, store: &ArtifactStore) -> Result<Verdict> {
        require(store, &[ArtifactKind::Design])?;
        let verdict = self
            .runner
            .execute(&self.toolchain.syntax_command(store.dir()))
            .await;
        store.delete_transient(SYNTAX_SCRATCH);
        debug!(success = verdict.success, "syntax check finished");
        Ok(verdict)
    }

    #[instrument(skip_all, fields(dir = %store.dir().display()))]
    async fn simulate(&self, store: &ArtifactStore) -> Result<Verdict> {
        require(store, &[ArtifactKind::Design, ArtifactKind::Testbench])?;

        // A stale image from an earlier compile must never be executed.
        store.delete_transient(SIMULATION_IMAGE);

        let compile = self
            .runner
            .execute(&self.toolchain.compile_command(store.dir()))
            .await;
        if !compile.success {
            debug!(returncode = compile.returncode, "compile failed");
            return Ok(compile);
        }

        let run = self
            .runner
            .execute(&self.toolchain.run_command(store.dir()))
            .await;
        debug!(returncode = run.returncode, "simulation finished");
        Ok(Verdict::sequence(compile, Some(run)))
    }
}
