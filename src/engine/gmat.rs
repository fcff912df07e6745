//! GMAT console engine
//!
//! Runs `<executable> -r "<script>"` with stdout and stderr captured in the
//! per-trial log. The call blocks for the whole propagation; there is no
//! timeout, so a hung engine blocks its worker.

use super::{Engine, Invocation, TrialFiles};
use crate::error::TrialError;
use std::fs::File;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// GMAT console subprocess engine
#[derive(Debug, Clone)]
pub struct GmatEngine {
    executable: PathBuf,
}

impl GmatEngine {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }
}

impl Engine for GmatEngine {
    fn name(&self) -> &str {
        "gmat"
    }

    fn invoke(&self, files: &TrialFiles) -> Result<Invocation, TrialError> {
        let spawn_err = |source| TrialError::EngineSpawn {
            program: self.executable.clone(),
            source,
        };

        let log = File::create(&files.log).map_err(spawn_err)?;
        let log_err = log.try_clone().map_err(spawn_err)?;

        tracing::debug!(
            trial = files.id,
            program = %self.executable.display(),
            script = %files.script.display(),
            "invoking engine"
        );

        let status = Command::new(&self.executable)
            .arg("-r")
            .arg(&files.script)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .status()
            .map_err(spawn_err)?;

        Ok(Invocation {
            success: status.success(),
            status: status.to_string(),
        })
    }
}
