//! Classification of raw simulator output.
//!
//! The generated testbench is required to print a small set of protocol
//! markers; everything the orchestrator decides is derived from them:
//! - `SIMULATION PASSED` / `SIMULATION FAILED` summary lines
//! - lines starting with `Mismatch` (one per failed comparison)
//! - lines starting with `WARNING`
//! - the compiler's `syntax error` marker
//!
//! Output that carries none of the expected markers is treated as a failure.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::{Stage, Verdict};

pub const SIMULATION_PASSED: &str = "SIMULATION PASSED";
pub const SIMULATION_FAILED: &str = "SIMULATION FAILED";
pub const MISMATCH_PREFIX: &str = "Mismatch";
pub const WARNING_PREFIX: &str = "WARNING";
pub const SYNTAX_ERROR_MARKER: &str = "syntax error";

/// Stderr lines the simulator emits for constructs it handles conservatively.
pub const DEFAULT_BENIGN_STDERR_PATTERNS: &[&str] = &[
    r"^\S+:\d+: sorry: constant selects in always_\* processes are not currently supported \(all bits will be included\)\.$",
];

/// Line-by-line allowlist for tolerated stderr output.
#[derive(Debug, Clone)]
pub struct BenignAllowlist {
    patterns: Vec<Regex>,
}

impl BenignAllowlist {
    /// Build an allowlist from regex sources.
    pub fn new<I, S>(patterns: I) -> std::result::Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// The default allowlist extended with extra patterns.
    pub fn with_extra<I, S>(extra: I) -> std::result::Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::default();
        for p in extra {
            list.patterns.push(Regex::new(p.as_ref())?);
        }
        Ok(list)
    }

    /// True if `line` matches any allowlisted pattern.
    pub fn is_benign_line(&self, line: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(line))
    }

    /// True if every line of `stderr` is benign.
    pub fn all_lines_benign(&self, stderr: &str) -> bool {
        stderr.lines().all(|line| self.is_benign_line(line))
    }

    /// Stderr is tolerated when empty or entirely benign.
    pub fn tolerates(&self, stderr: &str) -> bool {
        stderr.is_empty() || self.all_lines_benign(stderr)
    }
}

impl Default for BenignAllowlist {
    fn default() -> Self {
        static DEFAULT: OnceLock<Vec<Regex>> = OnceLock::new();
        let patterns = DEFAULT
            .get_or_init(|| {
                DEFAULT_BENIGN_STDERR_PATTERNS
                    .iter()
                    .filter_map(|p| Regex::new(p).ok())
                    .collect()
            })
            .clone();
        Self { patterns }
    }
}

/// Per-stage classification result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    pub stage: Stage,
    pub passed: bool,
    pub mismatch_count: usize,
    pub warning_lines: Vec<String>,
}

/// Stage-aware classifier over process verdicts.
#[derive(Debug, Clone, Default)]
pub struct OutputClassifier {
    allowlist: BenignAllowlist,
}

impl OutputClassifier {
    pub fn new(allowlist: BenignAllowlist) -> Self {
        Self { allowlist }
    }

    pub fn allowlist(&self) -> &BenignAllowlist {
        &self.allowlist
    }

    /// Syntax-only compile passed.
    pub fn classify_syntax_check(&self, verdict: &Verdict) -> bool {
        verdict.success
            && !verdict.stdout.contains(SYNTAX_ERROR_MARKER)
            && self.allowlist.tolerates(&verdict.stderr)
    }

    /// Simulation ran and reported `SIMULATION PASSED` with clean stderr.
    pub fn classify_execution_run(&self, verdict: &Verdict) -> bool {
        verdict.success
            && verdict.stdout.contains(SIMULATION_PASSED)
            && self.allowlist.tolerates(&verdict.stderr)
    }

    /// Process succeeded with clean stderr; functional results are ignored.
    pub fn runs_clean(&self, verdict: &Verdict) -> bool {
        verdict.success && self.allowlist.tolerates(&verdict.stderr)
    }

    /// Apply the pass rule of `stage` to `verdict`.
    pub fn assess(&self, stage: Stage, verdict: &Verdict) -> Assessment {
        let mismatch_count = extract_mismatch_count(&verdict.stdout);
        let passed = match stage {
            Stage::SyntaxCheck => self.classify_syntax_check(verdict),
            Stage::ExecutionCheck => self.runs_clean(verdict),
            Stage::MismatchCheck => {
                let pass = self.classify_execution_run(verdict);
                pass && mismatch_count == 0
            }
        };
        Assessment {
            stage,
            passed,
            mismatch_count,
            warning_lines: extract_warning_lines(&verdict.stdout),
        }
    }
}

/// `classify_syntax_check` with the default allowlist.
pub fn classify_syntax_check(verdict: &Verdict) -> bool {
    OutputClassifier::default().classify_syntax_check(verdict)
}

/// `classify_execution_run` with the default allowlist.
pub fn classify_execution_run(verdict: &Verdict) -> bool {
    OutputClassifier::default().classify_execution_run(verdict)
}

/// `Mismatch` lines, reported only when the run declared `SIMULATION FAILED`.
pub fn extract_mismatch_lines(stdout: &str) -> Vec<String> {
    if !stdout.contains(SIMULATION_FAILED) {
        return Vec::new();
    }
    stdout
        .trim()
        .lines()
        .filter(|line| line.starts_with(MISMATCH_PREFIX))
        .map(str::to_string)
        .collect()
}

/// Number of mismatch lines; 0 unless stdout contains `SIMULATION FAILED`.
pub fn extract_mismatch_count(stdout: &str) -> usize {
    extract_mismatch_lines(stdout).len()
}

/// All lines beginning with `WARNING`.
pub fn extract_warning_lines(stdout: &str) -> Vec<String> {
    stdout
        .trim()
        .lines()
        .filter(|line| line.starts_with(WARNING_PREFIX))
        .map(str::to_string)
        .collect()
}

/// Natural-language rendering of a verdict, used as repair context only.
pub fn explain(verdict: &Verdict) -> String {
    let mut parts = Vec::new();

    if verdict.returncode == 0 {
        parts.push("The command executed successfully.".to_string());
    } else {
        parts.push(format!(
            "The command failed with a return code of {}.",
            verdict.returncode
        ));
    }

    if let Some(msg) = &verdict.error_message {
        parts.push(format!(
            "An error occurred during the command execution phase: \"{msg}\"."
        ));
    }

    if !verdict.stderr.is_empty() {
        parts.push(
            "The simulator reported error statements during execution, indicated by messages in the standard error stream."
                .to_string(),
        );
        parts.push(format!("Standard error output:\n---\n{}\n---", verdict.stderr));
    }

    let mismatches = extract_mismatch_lines(&verdict.stdout);
    if !mismatches.is_empty() {
        parts.push(
            "The simulation reported the following mismatches when running the simulation with the given testbench and RTL code:"
                .to_string(),
        );
        parts.extend(mismatches.iter().map(|l| format!("- {l}")));
    }

    let warnings = extract_warning_lines(&verdict.stdout);
    if !warnings.is_empty() {
        parts.push(
            "The simulation reported the following WARNINGS when running the simulation with the given testbench and RTL code:"
                .to_string(),
        );
        parts.extend(warnings.iter().map(|l| format!("- {l}")));
    }

    parts.join("\n")
}

/// Prefix every line with its 1-based number.
pub fn add_line_numbers(text: &str) -> String {
    text.lines()
        .enumerate()
        .map(|(i, line)| format!("{}: {}", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}
