//! Per-trial failure taxonomy
//!
//! A trial that fails never aborts its worker. The adapter turns each failure
//! into one of these kinds, the worker logs it and counts it, and the trial is
//! excluded from best-result comparison.

use std::path::PathBuf;
use thiserror::Error;

/// Why a single trial produced no usable result
#[derive(Debug, Error)]
pub enum TrialError {
    /// The engine script could not be written
    #[error("failed to write engine script {}: {source}", path.display())]
    ScriptWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A report from an earlier run could not be removed
    #[error("failed to remove stale report {}: {source}", path.display())]
    StaleReport {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The engine process could not be started
    #[error("failed to launch engine {}: {source}", program.display())]
    EngineSpawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The engine ran but exited unsuccessfully
    #[error("engine exited with {status} (log: {})", log.display())]
    EngineFailed { status: String, log: PathBuf },

    /// The report file does not exist or cannot be read
    #[error("could not read report {}: {source}", path.display())]
    ReportMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The report has fewer than two lines
    #[error("report {} has {lines} line(s), expected 2", path.display())]
    ReportTruncated { path: PathBuf, lines: usize },

    /// A report line does not hold two numeric tokens
    #[error("report {} line {line}: cannot parse {content:?}", path.display())]
    ReportMalformed {
        path: PathBuf,
        line: usize,
        content: String,
    },
}

/// Coarse failure class, used for run summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FailureKind {
    /// Script could not be emitted, stale report could not be removed, or
    /// engine could not be launched
    Setup,
    /// Engine exited non-zero
    Engine,
    /// Report missing, truncated, or malformed
    Report,
}

impl TrialError {
    pub fn kind(&self) -> FailureKind {
        match self {
            TrialError::ScriptWrite { .. }
            | TrialError::StaleReport { .. }
            | TrialError::EngineSpawn { .. } => FailureKind::Setup,
            TrialError::EngineFailed { .. } => FailureKind::Engine,
            TrialError::ReportMissing { .. }
            | TrialError::ReportTruncated { .. }
            | TrialError::ReportMalformed { .. } => FailureKind::Report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kinds() {
        let truncated = TrialError::ReportTruncated {
            path: PathBuf::from("traj_3.csv"),
            lines: 1,
        };
        assert_eq!(truncated.kind(), FailureKind::Report);

        let failed = TrialError::EngineFailed {
            status: "exit status: 1".to_string(),
            log: PathBuf::from("traj_3.log"),
        };
        assert_eq!(failed.kind(), FailureKind::Engine);

        let stale = TrialError::StaleReport {
            path: PathBuf::from("traj_3.csv"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert_eq!(stale.kind(), FailureKind::Setup);
    }

    #[test]
    fn test_error_message_names_file() {
        let err = TrialError::ReportMalformed {
            path: PathBuf::from("/work/traj_7.csv"),
            line: 2,
            content: "abc def".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("traj_7.csv"));
        assert!(msg.contains("line 2"));
    }
}
