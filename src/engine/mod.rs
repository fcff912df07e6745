//! Propagation engine abstraction
//!
//! This module defines how one trial is turned into one result: emit the
//! mission script, run an engine against it, parse the report the engine
//! writes back.
//!
//! # Architecture
//!
//! The `Engine` trait covers only the invocation step, so the adapter around
//! it (script emission, stale-report cleanup, exit-status policy, report
//! parsing) is shared by every backend.
//!
//! # Engine Types
//!
//! - **gmat**: `GmatConsole -r <script>` as a child process
//! - **mock**: in-process stand-in writing synthetic reports (tests, dry runs)
//!
//! # File naming
//!
//! Every file a trial touches is named by its index:
//!
//! ```text
//! trajectory_<id>.script   mission script (written by the adapter)
//! traj_<id>.log            engine stdout and stderr
//! traj_<id>.csv            two-row report (written by the engine)
//! ```
//!
//! A trial index belongs to exactly one worker, so no two workers ever share
//! a file and no locking is needed.
//!
//! # Example
//!
//! ```
//! use decaymc::engine::{EngineAdapter, mock::MockEngine};
//! use decaymc::trial::Trial;
//!
//! let dir = tempfile::tempdir()?;
//! let adapter = EngineAdapter::new(Box::new(MockEngine::new()), dir.path(), 200.0, 90.0, false)?;
//!
//! let trial = Trial { h0_km: 550.0, cd: 2.2, a2m: 0.01 };
//! let result = adapter.run_trial(0, &trial)?;
//! assert!(result.ok);
//! assert!(result.lifetime_days > 0.0);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod gmat;
pub mod mock;
pub mod report;
pub mod script;

use crate::config::{Config, EngineKind};
use crate::error::TrialError;
use crate::stats::TrialResult;
use crate::trial::Trial;
use anyhow::Context;
use std::path::{Path, PathBuf};

/// Paths of every file one trial reads or writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialFiles {
    pub id: u64,
    pub script: PathBuf,
    pub log: PathBuf,
    pub report: PathBuf,
}

impl TrialFiles {
    pub fn new(work_dir: &Path, id: u64) -> Self {
        Self {
            id,
            script: work_dir.join(format!("trajectory_{}.script", id)),
            log: work_dir.join(format!("traj_{}.log", id)),
            report: work_dir.join(format!("traj_{}.csv", id)),
        }
    }
}

/// Completed engine run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Process reported success
    pub success: bool,
    /// Human-readable exit status
    pub status: String,
}

/// Propagation engine backend
///
/// Engines must be `Send + Sync`: in threads mode one engine is shared by
/// every rank. `invoke` blocks until the engine has finished.
pub trait Engine: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Run the engine against `files.script`
    ///
    /// The engine is expected to write `files.report`; its console output
    /// goes to `files.log`.
    fn invoke(&self, files: &TrialFiles) -> Result<Invocation, TrialError>;
}

/// Build the engine named by the configuration
pub fn create_engine(config: &Config) -> Box<dyn Engine> {
    match config.engine.kind {
        EngineKind::Gmat => Box::new(gmat::GmatEngine::new(config.engine.executable.clone())),
        EngineKind::Mock => Box::new(mock::MockEngine::new()),
    }
}

/// Trial-to-result adapter around an engine
pub struct EngineAdapter {
    engine: Box<dyn Engine>,

    /// Absolute work directory (the script embeds the absolute report path)
    work_dir: PathBuf,

    /// Spacecraft dry mass (kg)
    mass_kg: f64,

    /// Propagation cap (days)
    cap_days: f64,

    /// Parse the report even after a failed exit
    accept_nonzero_exit: bool,
}

impl EngineAdapter {
    /// Create an adapter, creating `work_dir` if needed
    pub fn new(
        engine: Box<dyn Engine>,
        work_dir: &Path,
        mass_kg: f64,
        cap_days: f64,
        accept_nonzero_exit: bool,
    ) -> anyhow::Result<Self> {
        std::fs::create_dir_all(work_dir)
            .with_context(|| format!("Failed to create work dir: {}", work_dir.display()))?;
        let work_dir = work_dir
            .canonicalize()
            .with_context(|| format!("Failed to resolve work dir: {}", work_dir.display()))?;

        Ok(Self {
            engine,
            work_dir,
            mass_kg,
            cap_days,
            accept_nonzero_exit,
        })
    }

    /// Create an adapter from configuration
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::new(
            create_engine(config),
            &config.engine.work_dir,
            config.experiment.mass_kg,
            config.experiment.cap_days,
            config.engine.accept_nonzero_exit,
        )
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    pub fn files(&self, id: u64) -> TrialFiles {
        TrialFiles::new(&self.work_dir, id)
    }

    /// Emit the script for trial `id` and return its path
    pub fn emit_script(&self, id: u64, trial: &Trial) -> Result<TrialFiles, TrialError> {
        let files = self.files(id);
        let content = script::render_script(trial, self.mass_kg, self.cap_days, &files.report);
        script::write_script(&files.script, &content)?;
        Ok(files)
    }

    /// Run one trial end to end
    ///
    /// A returned error means the trial is not ok; it never means the worker
    /// should stop.
    pub fn run_trial(&self, id: u64, trial: &Trial) -> Result<TrialResult, TrialError> {
        let files = self.emit_script(id, trial)?;

        // A report left over from an earlier run must not be scored
        match std::fs::remove_file(&files.report) {
            Ok(()) => tracing::debug!(trial = id, "removed stale report"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(TrialError::StaleReport {
                    path: files.report,
                    source,
                })
            }
        }

        let invocation = self.engine.invoke(&files)?;
        if !invocation.success {
            if !self.accept_nonzero_exit {
                return Err(TrialError::EngineFailed {
                    status: invocation.status,
                    log: files.log,
                });
            }
            tracing::debug!(
                trial = id,
                status = %invocation.status,
                "engine failed, parsing report anyway"
            );
        }

        let pair = report::parse_report(&files.report)?;
        Ok(TrialResult::success(id, pair.lifetime(), pair.end_alt, *trial))
    }
}
