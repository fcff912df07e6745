//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.

pub mod cli;
pub mod cli_convert;
pub mod experiment;
pub mod toml;
pub mod validator;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
pub use experiment::*;

/// Complete run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub experiment: ExperimentConfig,
    #[serde(default)]
    pub ranges: ParameterRanges,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// Monte Carlo experiment parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Total number of trials across all ranks
    #[serde(default = "default_trials")]
    pub trials: u64,
    /// Spacecraft dry mass (kg)
    #[serde(default = "default_mass")]
    pub mass_kg: f64,
    /// Propagation cap if no decay (days)
    #[serde(default = "default_cap_days")]
    pub cap_days: f64,
    /// Base seed; trial `i` is seeded with `seed + i`
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_trials() -> u64 {
    50
}

fn default_mass() -> f64 {
    200.0
}

fn default_cap_days() -> f64 {
    90.0
}

fn default_seed() -> u64 {
    1234
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            trials: default_trials(),
            mass_kg: default_mass(),
            cap_days: default_cap_days(),
            seed: default_seed(),
        }
    }
}

/// Propagation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine backend
    #[serde(default)]
    pub kind: EngineKind,
    /// Engine executable (gmat backend)
    #[serde(default = "default_executable")]
    pub executable: PathBuf,
    /// Directory holding per-trial script, log and report files
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// Parse the report even when the engine exits non-zero
    #[serde(default)]
    pub accept_nonzero_exit: bool,
}

fn default_executable() -> PathBuf {
    PathBuf::from("../GmatConsole")
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::default(),
            executable: default_executable(),
            work_dir: default_work_dir(),
            accept_nonzero_exit: false,
        }
    }
}

/// Worker set configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of ranks
    #[serde(default = "default_workers")]
    pub count: usize,
    /// How ranks are realized
    #[serde(default)]
    pub mode: RunMode,
    /// This process's rank (worker mode only)
    #[serde(default)]
    pub rank: Option<usize>,
    /// Rank 0 address: bound by rank 0, dialed by the others (worker mode only)
    #[serde(default = "default_coordinator")]
    pub coordinator: String,
}

fn default_workers() -> usize {
    num_cpus::get().max(1)
}

fn default_coordinator() -> String {
    "127.0.0.1:9999".to_string()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_workers(),
            mode: RunMode::default(),
            rank: None,
            coordinator: default_coordinator(),
        }
    }
}

/// Runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Validate and print configuration, run nothing
    #[serde(default)]
    pub dry_run: bool,
    /// Enable debug diagnostics
    #[serde(default)]
    pub debug: bool,
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        writeln!(f, "  Experiment:")?;
        writeln!(f, "    Trials: {}", self.experiment.trials)?;
        writeln!(f, "    Mass: {} kg", self.experiment.mass_kg)?;
        writeln!(f, "    Cap: {} days", self.experiment.cap_days)?;
        writeln!(f, "    Seed: {}", self.experiment.seed)?;
        writeln!(f, "  Ranges:")?;
        writeln!(f, "    h0: {} km", self.ranges.altitude_km)?;
        writeln!(f, "    Cd: {}", self.ranges.drag_coefficient)?;
        writeln!(f, "    A2M: {} m^2/kg", self.ranges.area_to_mass)?;
        writeln!(f, "  Engine:")?;
        writeln!(f, "    Kind: {}", self.engine.kind)?;
        if self.engine.kind == EngineKind::Gmat {
            writeln!(f, "    Executable: {}", self.engine.executable.display())?;
        }
        writeln!(f, "    Work dir: {}", self.engine.work_dir.display())?;
        writeln!(f, "  Workers:")?;
        writeln!(f, "    Count: {}", self.workers.count)?;
        write!(f, "    Mode: {}", self.workers.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_experiment() {
        let config = Config::default();
        assert_eq!(config.experiment.trials, 50);
        assert_eq!(config.experiment.mass_kg, 200.0);
        assert_eq!(config.experiment.cap_days, 90.0);
        assert_eq!(config.experiment.seed, 1234);
        assert_eq!(config.engine.executable, PathBuf::from("../GmatConsole"));
        assert!(!config.engine.accept_nonzero_exit);
        assert!(config.workers.count >= 1);
    }

    #[test]
    fn test_display_mentions_sections() {
        let text = Config::default().to_string();
        assert!(text.contains("Trials: 50"));
        assert!(text.contains("Kind: gmat"));
        assert!(text.contains("Mode: threads"));
    }
}
