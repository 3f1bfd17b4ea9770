//! Veriloop Exec - toolchain and delegate backends
//!
//! Provides the production implementations of the core collaborator seams:
//! - A process runner that turns every invocation into a `Verdict`
//! - An Icarus Verilog simulator backend
//! - Command and HTTP delegates for design/testbench generation and judging

pub mod delegate;
pub mod runner;
pub mod simulator;
pub mod toolchain;

pub use delegate::{CommandDelegate, DelegateConfig, HttpDelegate};
pub use runner::{CommandLine, ProcessRunner};
pub use simulator::IverilogSimulator;
pub use toolchain::ToolchainConfig;
