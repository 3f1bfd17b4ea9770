//! External collaborators of the orchestrator and their typed proxies.
//!
//! Generators, the fault-attribution judge and the simulator backend are
//! injected as trait objects. Production wiring lives in `veriloop-exec`;
//! tests inject deterministic fakes.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::artifacts::ArtifactStore;
use crate::domain::{ArtifactKind, RepairDirective, Result, Verdict, VeriloopError};

// ---------------------------------------------------------------------------
// Request / response payloads
// ---------------------------------------------------------------------------

/// Input for design (RTL) generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignRequest {
    pub spec: String,
    pub testbench: String,
    pub interface: String,
    /// Empty on the first attempt.
    pub failure_context: String,
}

/// Input for testbench generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestbenchRequest {
    pub spec: String,
    /// Empty on the first attempt.
    pub failure_context: String,
}

/// Generated testbench together with its interface stub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestbenchBundle {
    pub testbench: String,
    pub interface: String,
}

/// Input for fault attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeRequest {
    pub spec: String,
    pub failure_log: String,
    /// Line-numbered design source.
    pub design: String,
    /// Line-numbered testbench source.
    pub testbench: String,
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Produces design source text.
#[async_trait]
pub trait DesignGenerator: Send + Sync {
    async fn generate_design(&self, request: &DesignRequest) -> Result<String>;
}

/// Produces testbench and interface source text.
#[async_trait]
pub trait TestbenchGenerator: Send + Sync {
    async fn generate_testbench(&self, request: &TestbenchRequest) -> Result<TestbenchBundle>;
}

/// Decides which artifact caused a functional mismatch.
#[async_trait]
pub trait FaultJudge: Send + Sync {
    async fn judge(&self, request: &JudgeRequest) -> Result<RepairDirective>;
}

/// Verification toolchain backend.
///
/// Implementations read artifacts from the store and return the verdict of
/// the underlying process. Tool faults belong in the verdict; `Err` is
/// reserved for faults outside the tool (missing artifacts, cancellation).
#[async_trait]
pub trait Simulator: Send + Sync {
    /// Syntax-only elaboration of the design artifact.
    async fn syntax_check(&self, store: &ArtifactStore) -> Result<Verdict>;

    /// Compile testbench + design, then execute the compiled image.
    async fn simulate(&self, store: &ArtifactStore) -> Result<Verdict>;
}

// ---------------------------------------------------------------------------
// Proxies
// ---------------------------------------------------------------------------

/// Typed wrapper over the generator and judge delegates.
///
/// Normalises delegate failures into [`VeriloopError::Generator`] or
/// [`VeriloopError::Attribution`] and rejects empty generator output so a
/// blank artifact never reaches disk.
#[derive(Clone)]
pub struct Collaborators {
    design: Arc<dyn DesignGenerator>,
    testbench: Arc<dyn TestbenchGenerator>,
    judge: Arc<dyn FaultJudge>,
}

impl Collaborators {
    pub fn new(
        design: Arc<dyn DesignGenerator>,
        testbench: Arc<dyn TestbenchGenerator>,
        judge: Arc<dyn FaultJudge>,
    ) -> Self {
        Self {
            design,
            testbench,
            judge,
        }
    }

    /// Use one delegate for all three roles.
    pub fn from_delegate<D>(delegate: Arc<D>) -> Self
    where
        D: DesignGenerator + TestbenchGenerator + FaultJudge + 'static,
    {
        Self {
            design: delegate.clone(),
            testbench: delegate.clone(),
            judge: delegate,
        }
    }

    #[instrument(skip_all, fields(artifact = "design"))]
    pub async fn generate_design(
        &self,
        spec: &str,
        testbench: &str,
        interface: &str,
        failure_context: &str,
    ) -> Result<String> {
        let request = DesignRequest {
            spec: spec.to_string(),
            testbench: testbench.to_string(),
            interface: interface.to_string(),
            failure_context: failure_context.to_string(),
        };
        debug!(
            spec = %preview(spec),
            has_failure_context = !failure_context.is_empty(),
            "invoking design generator"
        );
        let start = Instant::now();
        let design = self
            .design
            .generate_design(&request)
            .await
            .map_err(|e| generator_error(ArtifactKind::Design, e))?;
        if design.trim().is_empty() {
            return Err(VeriloopError::Generator {
                artifact: ArtifactKind::Design,
                reason: "generator returned empty design".to_string(),
            });
        }
        info!(
            duration_ms = start.elapsed().as_millis() as u64,
            bytes = design.len(),
            "design generated"
        );
        Ok(design)
    }

    #[instrument(skip_all, fields(artifact = "testbench"))]
    pub async fn generate_testbench(
        &self,
        spec: &str,
        failure_context: &str,
    ) -> Result<TestbenchBundle> {
        let request = TestbenchRequest {
            spec: spec.to_string(),
            failure_context: failure_context.to_string(),
        };
        debug!(
            spec = %preview(spec),
            has_failure_context = !failure_context.is_empty(),
            "invoking testbench generator"
        );
        let start = Instant::now();
        let bundle = self
            .testbench
            .generate_testbench(&request)
            .await
            .map_err(|e| generator_error(ArtifactKind::Testbench, e))?;
        if bundle.testbench.trim().is_empty() {
            return Err(VeriloopError::Generator {
                artifact: ArtifactKind::Testbench,
                reason: "generator returned empty testbench".to_string(),
            });
        }
        if bundle.interface.trim().is_empty() {
            return Err(VeriloopError::Generator {
                artifact: ArtifactKind::Interface,
                reason: "generator returned empty interface".to_string(),
            });
        }
        info!(
            duration_ms = start.elapsed().as_millis() as u64,
            testbench_bytes = bundle.testbench.len(),
            interface_bytes = bundle.interface.len(),
            "testbench generated"
        );
        Ok(bundle)
    }

    #[instrument(skip_all)]
    pub async fn judge(
        &self,
        spec: &str,
        failure_log: &str,
        design: &str,
        testbench: &str,
    ) -> Result<RepairDirective> {
        let request = JudgeRequest {
            spec: spec.to_string(),
            failure_log: failure_log.to_string(),
            design: design.to_string(),
            testbench: testbench.to_string(),
        };
        debug!(failure_log = %preview(failure_log), "invoking fault judge");
        let directive = self.judge.judge(&request).await.map_err(|e| match e {
            VeriloopError::Attribution(_) => e,
            other => VeriloopError::Attribution(other.to_string()),
        })?;
        if !directive.is_actionable() {
            warn!("judge attributed the failure to neither artifact");
        }
        Ok(directive)
    }
}

fn generator_error(artifact: ArtifactKind, err: VeriloopError) -> VeriloopError {
    match err {
        VeriloopError::Generator { .. } => err,
        other => VeriloopError::Generator {
            artifact,
            reason: other.to_string(),
        },
    }
}

/// First 50 characters, for log lines.
fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(50).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
