//! Generator and judge delegates.
//!
//! Both delegates receive the same envelope,
//! `{"operation": "<op>", "request": {...}}`. A command delegate reads it
//! from stdin and prints the response on stdout; an HTTP delegate receives
//! it as the body of `POST <endpoint>/<op>`.
//!
//! | operation            | response                                              |
//! |----------------------|-------------------------------------------------------|
//! | `generate_design`    | `{"design": "..."}`                                   |
//! | `generate_testbench` | `{"testbench": "...", "interface": "..."}`            |
//! | `judge`              | `{"design_needs_fix", "testbench_needs_fix", "reasoning"}` |

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use veriloop_core::{
    CancelSignal, Collaborators, DesignGenerator, DesignRequest, FaultJudge, JudgeRequest,
    RepairDirective, Result, TestbenchBundle, TestbenchGenerator, TestbenchRequest,
    VeriloopError,
};

use crate::runner::{CommandLine, ProcessRunner};

pub const OP_GENERATE_DESIGN: &str = "generate_design";
pub const OP_GENERATE_TESTBENCH: &str = "generate_testbench";
pub const OP_JUDGE: &str = "judge";

/// Default limit for one delegate call; generation can be slow.
pub const DEFAULT_DELEGATE_TIMEOUT_SECS: u64 = 600;

fn default_timeout() -> u64 {
    DEFAULT_DELEGATE_TIMEOUT_SECS
}

#[derive(Debug, Serialize)]
struct Envelope<'a, T: Serialize> {
    operation: &'a str,
    request: &'a T,
}

#[derive(Debug, Deserialize)]
struct DesignResponse {
    design: String,
}

/// How to reach the generator/judge delegate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DelegateConfig {
    /// Spawn `program args...` once per call.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default = "default_timeout")]
        timeout_secs: u64,
    },

    /// POST to `<endpoint>/<operation>`.
    Http {
        endpoint: String,
        /// Environment variable holding a bearer token, if the endpoint
        /// needs one.
        #[serde(default)]
        token_env: Option<String>,
        #[serde(default = "default_timeout")]
        timeout_secs: u64,
    },
}

impl DelegateConfig {
    /// Build the collaborator proxies backed by this delegate.
    pub fn build(&self, cancel: Option<CancelSignal>) -> Result<Collaborators> {
        match self {
            DelegateConfig::Command {
                program,
                args,
                timeout_secs,
            } => {
                let mut runner = ProcessRunner::new(*timeout_secs);
                if let Some(signal) = cancel {
                    runner = runner.with_cancel(signal);
                }
                let delegate =
                    CommandDelegate::new(CommandLine::new(program).args(args.iter().cloned()), runner);
                Ok(Collaborators::from_delegate(Arc::new(delegate)))
            }
            DelegateConfig::Http {
                endpoint,
                token_env,
                timeout_secs,
            } => {
                let token = token_env.as_ref().and_then(|var| std::env::var(var).ok());
                let delegate = HttpDelegate::new(endpoint, token, *timeout_secs)?;
                Ok(Collaborators::from_delegate(Arc::new(delegate)))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Command delegate
// ---------------------------------------------------------------------------

/// Delegate backed by an external program speaking JSON over stdio.
#[derive(Debug, Clone)]
pub struct CommandDelegate {
    command: CommandLine,
    runner: ProcessRunner,
}

impl CommandDelegate {
    pub fn new(command: CommandLine, runner: ProcessRunner) -> Self {
        Self { command, runner }
    }

    async fn call<Req, Resp>(&self, operation: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let input = serde_json::to_string(&Envelope { operation, request })?;
        let cmd = self.command.clone().stdin(input);
        debug!(operation, command = %cmd.display(), "calling command delegate");

        let verdict = self.runner.execute(&cmd).await;
        if !verdict.success {
            let detail = verdict
                .error_message
                .clone()
                .unwrap_or_else(|| verdict.stderr.trim().to_string());
            return Err(VeriloopError::Delegate(format!(
                "{operation}: delegate exited with {}: {detail}",
                verdict.returncode
            )));
        }

        serde_json::from_str(verdict.stdout.trim()).map_err(|e| {
            VeriloopError::Delegate(format!("{operation}: invalid delegate response: {e}"))
        })
    }
}

#[async_trait]
impl DesignGenerator for CommandDelegate {
    async fn generate_design(&self, request: &DesignRequest) -> Result<String> {
        let response: DesignResponse = self.call(OP_GENERATE_DESIGN, request).await?;
        Ok(response.design)
    }
}

#[async_trait]
impl TestbenchGenerator for CommandDelegate {
    async fn generate_testbench(&self, request: &TestbenchRequest) -> Result<TestbenchBundle> {
        self.call(OP_GENERATE_TESTBENCH, request).await
    }
}

#[async_trait]
impl FaultJudge for CommandDelegate {
    async fn judge(&self, request: &JudgeRequest) -> Result<RepairDirective> {
        self.call(OP_JUDGE, request).await
    }
}

// ---------------------------------------------------------------------------
// HTTP delegate
// ---------------------------------------------------------------------------

/// Delegate backed by an HTTP service.
#[derive(Debug, Clone)]
pub struct HttpDelegate {
    endpoint: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpDelegate {
    pub fn new(endpoint: &str, token: Option<String>, timeout_secs: u64) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("veriloop/", env!("CARGO_PKG_VERSION")));
        if timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(timeout_secs));
        }
        let client = builder
            .build()
            .map_err(|e| VeriloopError::Delegate(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    /// URL for one operation.
    pub fn url(&self, operation: &str) -> String {
        format!("{}/{operation}", self.endpoint)
    }

    async fn call<Req, Resp>(&self, operation: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = self.url(operation);
        debug!(operation, %url, "calling HTTP delegate");

        let mut req = self
            .client
            .post(&url)
            .json(&Envelope { operation, request });
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let response = req
            .send()
            .await
            .map_err(|e| VeriloopError::Delegate(format!("{operation}: request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VeriloopError::Delegate(format!(
                "{operation}: delegate returned {status}: {}",
                body.trim()
            )));
        }

        response.json::<Resp>().await.map_err(|e| {
            VeriloopError::Delegate(format!("{operation}: invalid delegate response: {e}"))
        })
    }
}

#[async_trait]
impl DesignGenerator for HttpDelegate {
    async fn generate_design(&self, request: &DesignRequest) -> Result<String> {
        let response: DesignResponse = self.call(OP_GENERATE_DESIGN, request).await?;
        Ok(response.design)
    }
}

#[async_trait]
impl TestbenchGenerator for HttpDelegate {
    async fn generate_testbench(&self, request: &TestbenchRequest) -> Result<TestbenchBundle> {
        self.call(OP_GENERATE_TESTBENCH, request).await
    }
}

#[async_trait]
impl FaultJudge for HttpDelegate {
    async fn judge(&self, request: &JudgeRequest) -> Result<RepairDirective> {
        self.call(OP_JUDGE, request).await
    }
}
