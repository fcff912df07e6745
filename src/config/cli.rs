//! CLI argument parsing using clap

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutionMode {
    /// Threads mode (default) - all ranks inside this process
    Threads,
    /// Launch mode - spawn one worker process per rank on localhost
    Launch,
    /// Worker mode - run a single rank (needs --rank)
    Worker,
}

/// Propagation engine backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EngineType {
    /// GMAT console subprocess
    Gmat,
    /// Synthetic reports, no external process
    Mock,
}

/// decaymc - Monte Carlo LEO decay study driver for GMAT
#[derive(Parser, Debug, Default)]
#[command(name = "decaymc")]
#[command(version, about, long_about = None)]
pub struct Cli {
    // === Experiment Options ===
    /// Total number of Monte Carlo trials across all ranks (default: 50)
    #[arg(long = "n")]
    pub n: Option<u64>,

    /// Satellite mass in kg (default: 200.0)
    #[arg(long)]
    pub mass: Option<f64>,

    /// Max days to propagate if no decay (default: 90.0)
    #[arg(long = "capDays")]
    pub cap_days: Option<f64>,

    /// Base seed; trial i is sampled from seed + i (default: 1234)
    #[arg(long)]
    pub seed: Option<u64>,

    // === Worker Options ===
    /// Number of ranks (default: number of CPUs)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Execution mode: threads, launch, or worker
    #[arg(long, value_enum)]
    pub mode: Option<ExecutionMode>,

    /// Rank of this process (worker mode only)
    #[arg(long)]
    pub rank: Option<usize>,

    /// Rank 0 address, bound by rank 0 and dialed by other ranks (worker mode only)
    #[arg(long)]
    pub coordinator: Option<String>,

    // === Engine Options ===
    /// Propagation engine backend
    #[arg(long, value_enum)]
    pub engine: Option<EngineType>,

    /// Path to the GMAT console executable (default: ../GmatConsole)
    #[arg(long, env = "GMAT_EXECUTABLE")]
    pub engine_path: Option<PathBuf>,

    /// Directory for per-trial script, log and report files (default: .)
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Parse the report even when the engine exits with a failure status
    #[arg(long)]
    pub accept_nonzero_exit: bool,

    // === Configuration File ===
    /// TOML configuration file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Dry run - validate configuration without executing
    #[arg(long)]
    pub dry_run: bool,

    /// Enable debug output (engine invocations, rank traffic)
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate flag combinations that do not depend on the config file
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rank.is_some() && self.mode.is_some() && self.mode != Some(ExecutionMode::Worker) {
            anyhow::bail!("--rank is only valid with --mode worker");
        }
        Ok(())
    }
}
