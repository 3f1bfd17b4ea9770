//! Icarus Verilog command lines.

use std::path::Path;

use serde::{Deserialize, Serialize};

use veriloop_core::{ArtifactKind, BenignAllowlist, OutputClassifier, Result, VeriloopError};
use veriloop_core::SIMULATION_IMAGE;

use crate::runner::{CommandLine, ProcessRunner};

/// Scratch output of the syntax-only compile, removed after each check.
pub const SYNTAX_SCRATCH: &str = "syntax_check.out";

/// Toolchain settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Compiler executable.
    pub iverilog: String,

    /// Simulation runtime executable.
    pub vvp: String,

    /// Flags shared by every compile.
    pub flags: Vec<String>,

    /// Extra flags for the syntax-only compile.
    pub syntax_flags: Vec<String>,

    pub vvp_flags: Vec<String>,

    /// Per-process limit in seconds; 0 disables it.
    pub timeout_secs: u64,

    /// Regexes for stderr lines that do not count as failures, on top of
    /// the built-in allowlist.
    pub extra_benign_patterns: Vec<String>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            iverilog: "iverilog".to_string(),
            vvp: "vvp".to_string(),
            flags: ["-Wall", "-Winfloop", "-Wno-timescale", "-g2012"]
                .map(String::from)
                .to_vec(),
            syntax_flags: ["-t", "null"].map(String::from).to_vec(),
            vvp_flags: vec!["-n".to_string()],
            timeout_secs: 120,
            extra_benign_patterns: Vec::new(),
        }
    }
}

impl ToolchainConfig {
    /// `iverilog -t null <flags> -o syntax_check.out rtl.sv`
    pub fn syntax_command(&self, dir: &Path) -> CommandLine {
        CommandLine::new(&self.iverilog)
            .args(self.syntax_flags.iter().cloned())
            .args(self.flags.iter().cloned())
            .args(["-o", SYNTAX_SCRATCH, ArtifactKind::Design.file_name()])
            .current_dir(dir)
    }

    /// `iverilog <flags> -o sim_output.vvp tb.sv rtl.sv`
    pub fn compile_command(&self, dir: &Path) -> CommandLine {
        CommandLine::new(&self.iverilog)
            .args(self.flags.iter().cloned())
            .args([
                "-o",
                SIMULATION_IMAGE,
                ArtifactKind::Testbench.file_name(),
                ArtifactKind::Design.file_name(),
            ])
            .current_dir(dir)
    }

    /// `vvp -n sim_output.vvp`
    pub fn run_command(&self, dir: &Path) -> CommandLine {
        CommandLine::new(&self.vvp)
            .args(self.vvp_flags.iter().cloned())
            .arg(SIMULATION_IMAGE)
            .current_dir(dir)
    }

    pub fn runner(&self) -> ProcessRunner {
        ProcessRunner::new(self.timeout_secs)
    }

    /// Classifier with the built-in allowlist plus `extra_benign_patterns`.
    pub fn classifier(&self) -> Result<OutputClassifier> {
        let allowlist = BenignAllowlist::with_extra(self.extra_benign_patterns.iter())
            .map_err(|e| VeriloopError::InvalidConfig(format!("benign stderr pattern: {e}")))?;
        Ok(OutputClassifier::new(allowlist))
    }
}
