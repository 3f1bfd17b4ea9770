//! Veriloop - verification-repair loop CLI
//!
//! ## Commands
//!
//! - `run`: generate (unless skipped) and verify design/testbench artifacts
//! - `check`: one-shot verification of existing artifacts
//! - `report`: show and verify the report of a finished run

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};

use veriloop_core::{
    cancel_pair, explain, read_run_report, ArtifactStore, LoopOutcome, Simulator, Stage,
    VerificationLoop,
};
use veriloop_exec::IverilogSimulator;

use crate::config::CliConfig;

#[derive(Parser)]
#[command(name = "veriloop")]
#[command(author = "Veriloop Developers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Verification-repair loop for generated HDL artifacts", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// TOML configuration file
    #[arg(long, global = true, env = "VERILOOP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate artifacts for a specification and verify them until they pass
    Run {
        /// Natural-language specification file
        #[arg(long)]
        spec: PathBuf,

        /// Artifact directory (created if missing)
        #[arg(long)]
        dir: PathBuf,

        /// Shared iteration ceiling for every stage
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Iteration ceiling for the syntax stage
        #[arg(long)]
        syntax_budget: Option<u32>,

        /// Iteration ceiling for the execution stage
        #[arg(long)]
        exec_budget: Option<u32>,

        /// Iteration ceiling for the mismatch stage
        #[arg(long)]
        mismatch_budget: Option<u32>,

        /// Stop after this many consecutive unattributable mismatches
        #[arg(long)]
        max_deadlocks: Option<u32>,

        /// Verify the artifacts already in --dir instead of generating them
        #[arg(long)]
        skip_bootstrap: bool,
    },

    /// Verify existing artifacts once, without repair
    Check {
        /// Artifact directory
        #[arg(long)]
        dir: PathBuf,

        /// Stage to check (syntax, exec, mismatch)
        #[arg(long, default_value = "mismatch")]
        stage: Stage,
    },

    /// Show the report of a finished run and verify its digest
    Report {
        /// Artifact directory of the run
        #[arg(long)]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    veriloop_core::init_tracing(cli.json, level);

    let config = CliConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            spec,
            dir,
            max_iterations,
            syntax_budget,
            exec_budget,
            mismatch_budget,
            max_deadlocks,
            skip_bootstrap,
        } => {
            let mut config = config;
            if let Some(n) = max_iterations {
                config.run.max_iterations = n;
            }
            if syntax_budget.is_some() {
                config.run.budgets.syntax = syntax_budget;
            }
            if exec_budget.is_some() {
                config.run.budgets.execution = exec_budget;
            }
            if mismatch_budget.is_some() {
                config.run.budgets.mismatch = mismatch_budget;
            }
            if max_deadlocks.is_some() {
                config.run.max_consecutive_deadlocks = max_deadlocks;
            }
            cmd_run(config, &spec, &dir, skip_bootstrap).await
        }
        Commands::Check { dir, stage } => cmd_check(&config, &dir, stage).await,
        Commands::Report { dir } => cmd_report(&dir),
    }
}

async fn cmd_run(config: CliConfig, spec_path: &Path, dir: &Path, skip_bootstrap: bool) -> Result<()> {
    config.run.validate()?;

    let spec = std::fs::read_to_string(spec_path)
        .with_context(|| format!("Failed to read spec {}", spec_path.display()))?;
    let store = ArtifactStore::open(dir)
        .with_context(|| format!("Failed to open artifact directory {}", dir.display()))?;

    let (handle, signal) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping at the next node boundary");
            handle.cancel();
        }
    });

    let classifier = config.toolchain.classifier()?;
    let simulator = IverilogSimulator::new(config.toolchain.clone()).with_cancel(signal.clone());
    let collaborators = config.resolve_delegate()?.build(Some(signal.clone()))?;

    info!(dir = %dir.display(), skip_bootstrap, "starting verification run");
    let runner = VerificationLoop::new(
        spec,
        store,
        Arc::new(simulator),
        collaborators,
        config.run.clone(),
    )
    .with_classifier(classifier)
    .with_cancel(signal);

    let outcome = if skip_bootstrap {
        runner.run().await
    } else {
        runner.generate_and_run().await
    };

    print_outcome(&outcome);
    if !outcome.overall_success {
        anyhow::bail!("Verification failed: {}", outcome.reason);
    }
    Ok(())
}

async fn cmd_check(config: &CliConfig, dir: &Path, stage: Stage) -> Result<()> {
    let store = ArtifactStore::open(dir)
        .with_context(|| format!("Failed to open artifact directory {}", dir.display()))?;
    let classifier = config.toolchain.classifier()?;
    let simulator = IverilogSimulator::new(config.toolchain.clone());

    let verdict = match stage {
        Stage::SyntaxCheck => simulator.syntax_check(&store).await?,
        Stage::ExecutionCheck | Stage::MismatchCheck => simulator.simulate(&store).await?,
    };
    let assessment = classifier.assess(stage, &verdict);

    println!("Stage: {}", stage);
    println!(
        "Status: {}",
        if assessment.passed { "✓ PASSED" } else { "✗ FAILED" }
    );
    println!("Return code: {}", verdict.returncode);
    println!("Duration: {}ms", verdict.duration_ms);
    if stage == Stage::MismatchCheck {
        println!("Mismatches: {}", assessment.mismatch_count);
    }
    println!();
    println!("{}", explain(&verdict));

    if !assessment.passed {
        anyhow::bail!("{} failed", stage);
    }
    Ok(())
}

fn cmd_report(dir: &Path) -> Result<()> {
    let outcome = read_run_report(dir)
        .with_context(|| format!("Failed to read run report in {}", dir.display()))?;
    print_outcome(&outcome);
    println!();
    println!("History:");
    for record in &outcome.history {
        let mismatches = record
            .mismatch_count
            .map(|n| format!(" mismatches={n}"))
            .unwrap_or_default();
        println!(
            "  {:>3}  {:<20} iter={} {}{}",
            record.seq,
            record.node.name(),
            record.iterations,
            if record.error { "error" } else { "ok" },
            mismatches
        );
    }
    println!();
    println!("Report digest verified");
    Ok(())
}

fn print_outcome(outcome: &LoopOutcome) {
    println!("Run: {}", outcome.run_id);
    println!(
        "Status: {}",
        if outcome.overall_success {
            "✓ PASSED"
        } else {
            "✗ FAILED"
        }
    );
    println!("Reason: {}", outcome.reason);
    println!("Last stage: {}", outcome.last_stage);
    println!("Iterations: {}", outcome.iterations);
    println!("Nodes executed: {}", outcome.history.len());
    println!("Duration: {}ms", outcome.duration_ms());
    if let Some(verdict) = &outcome.last_verdict {
        println!("Last return code: {}", verdict.returncode);
    }
}
