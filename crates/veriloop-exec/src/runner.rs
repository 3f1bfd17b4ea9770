//! External process execution.
//!
//! [`ProcessRunner::execute`] never returns an error: spawn failures,
//! timeouts and cancellation are all folded into a non-success [`Verdict`].

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use veriloop_core::{CancelSignal, Verdict};

/// A program invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLine {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory; inherits the caller's when unset.
    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// Text fed to the child's stdin, which is closed afterwards.
    #[serde(default)]
    pub stdin: Option<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Shell-like rendering for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Runs commands with an optional wall-clock limit and cancellation.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
    cancel: Option<CancelSignal>,
}

impl ProcessRunner {
    /// `timeout_secs == 0` disables the limit.
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run `cmd` to completion and capture its output.
    ///
    /// The child is killed if the timeout elapses or cancellation fires.
    pub async fn execute(&self, cmd: &CommandLine) -> Verdict {
        let start = Instant::now();
        let elapsed = || start.elapsed().as_millis() as u64;

        if self.cancel.as_ref().is_some_and(CancelSignal::is_cancelled) {
            return Verdict::faulted(format!("{} cancelled before start", cmd.program), 0);
        }

        let mut command = Command::new(&cmd.program);
        command
            .args(&cmd.args)
            .stdin(if cmd.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &cmd.cwd {
            command.current_dir(dir);
        }

        debug!(command = %cmd.display(), "spawning process");
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return Verdict::faulted(format!("failed to start {}: {e}", cmd.program), elapsed())
            }
        };

        if let (Some(input), Some(mut sink)) = (cmd.stdin.clone(), child.stdin.take()) {
            // Written concurrently so a chatty child cannot block on a full
            // stdout pipe while we are still writing.
            tokio::spawn(async move {
                if let Err(e) = sink.write_all(input.as_bytes()).await {
                    warn!(error = %e, "failed to write child stdin");
                }
            });
        }

        let waited = async {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                    .await
                    .map_err(|_| format!("timed out after {} seconds", limit.as_secs())),
                None => Ok(child.wait_with_output().await),
            }
        };
        let cancelled = async {
            match self.cancel.clone() {
                Some(mut signal) => signal.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };

        let result = tokio::select! {
            r = waited => r,
            _ = cancelled => Err("cancelled".to_string()),
        };

        match result {
            Ok(Ok(output)) => {
                let verdict = Verdict::completed(
                    output.status.code().unwrap_or(-1),
                    String::from_utf8_lossy(&output.stdout).to_string(),
                    String::from_utf8_lossy(&output.stderr).to_string(),
                    elapsed(),
                );
                debug!(
                    command = %cmd.program,
                    returncode = verdict.returncode,
                    duration_ms = verdict.duration_ms,
                    "process finished"
                );
                verdict
            }
            Ok(Err(e)) => {
                Verdict::faulted(format!("failed waiting on {}: {e}", cmd.program), elapsed())
            }
            Err(reason) => {
                warn!(command = %cmd.display(), %reason, "process interrupted");
                Verdict::faulted(format!("{} {reason}", cmd.program), elapsed())
            }
        }
    }
}
