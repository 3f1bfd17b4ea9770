//! TOML configuration file for the `veriloop` binary.
//!
//! ```toml
//! [loop]
//! max_iterations = 5
//! max_consecutive_deadlocks = 3
//!
//! [loop.budgets]
//! mismatch = 8
//!
//! [toolchain]
//! timeout_secs = 120
//!
//! [delegate]
//! kind = "command"
//! program = "python3"
//! args = ["agents.py"]
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use veriloop_core::{LoopConfig, VeriloopError};
use veriloop_exec::{DelegateConfig, ToolchainConfig};

/// Environment variable naming an HTTP delegate endpoint when the config
/// file has no `[delegate]` table.
pub const DELEGATE_URL_ENV: &str = "VERILOOP_DELEGATE_URL";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    #[serde(rename = "loop")]
    pub run: LoopConfig,
    pub toolchain: ToolchainConfig,
    pub delegate: Option<DelegateConfig>,
}

impl CliConfig {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|e| VeriloopError::ConfigParse(e.to_string()))
            .map_err(Into::into)
    }

    /// Load `path`, or defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// The configured delegate, falling back to `VERILOOP_DELEGATE_URL`.
    pub fn resolve_delegate(&self) -> Result<DelegateConfig> {
        if let Some(delegate) = &self.delegate {
            return Ok(delegate.clone());
        }
        match std::env::var(DELEGATE_URL_ENV) {
            Ok(endpoint) if !endpoint.trim().is_empty() => Ok(DelegateConfig::Http {
                endpoint,
                token_env: None,
                timeout_secs: veriloop_exec::delegate::DEFAULT_DELEGATE_TIMEOUT_SECS,
            }),
            _ => anyhow::bail!(
                "No delegate configured: add a [delegate] table to the config or set {}",
                DELEGATE_URL_ENV
            ),
        }
    }
}
