//! Structured outcome of one external process invocation.

use serde::{Deserialize, Serialize};

use crate::classifier;

/// Result of running an external tool.
///
/// Produced by the process runner, never by throwing: spawn failures and
/// timeouts land in `error_message` with `success == false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether the process ran and exited with code 0.
    pub success: bool,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Exit code (-1 when the process never produced one).
    pub returncode: i32,

    /// Fault captured while starting or waiting on the process.
    pub error_message: Option<String>,

    /// Wall-clock duration in milliseconds.
    #[serde(default)]
    pub duration_ms: u64,
}

impl Verdict {
    /// A verdict for a process that exited normally.
    pub fn completed(returncode: i32, stdout: String, stderr: String, duration_ms: u64) -> Self {
        Self {
            success: returncode == 0,
            stdout,
            stderr,
            returncode,
            error_message: None,
            duration_ms,
        }
    }

    /// A verdict for a process that could not start or was interrupted.
    pub fn faulted(error_message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            returncode: -1,
            error_message: Some(error_message.into()),
            duration_ms,
        }
    }

    /// Chain a compile verdict with the execution that followed it.
    ///
    /// Success is the conjunction of both steps. When compilation failed the
    /// execution step never ran and the compile verdict is returned as is.
    pub fn sequence(compile: Verdict, run: Option<Verdict>) -> Verdict {
        let Some(run) = run else {
            return compile;
        };
        if !compile.success {
            return compile;
        }
        Verdict {
            success: run.success,
            stdout: format!("{}{}", compile.stdout, run.stdout),
            stderr: format!("{}{}", compile.stderr, run.stderr),
            returncode: run.returncode,
            error_message: run.error_message,
            duration_ms: compile.duration_ms + run.duration_ms,
        }
    }

    /// Number of `Mismatch` lines reported after `SIMULATION FAILED`.
    pub fn mismatch_count(&self) -> usize {
        classifier::extract_mismatch_count(&self.stdout)
    }

    /// All `WARNING` lines in stdout, in order.
    pub fn warning_lines(&self) -> Vec<String> {
        classifier::extract_warning_lines(&self.stdout)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "success: {}", self.success)?;
        writeln!(f, "returncode: {}", self.returncode)?;
        if let Some(msg) = &self.error_message {
            writeln!(f, "error_message: {msg}")?;
        }
        writeln!(f, "--- stdout ---")?;
        writeln!(f, "{}", self.stdout.trim_end())?;
        writeln!(f, "--- stderr ---")?;
        write!(f, "{}", self.stderr.trim_end())
    }
}
