//! Mock propagation engine for testing
//!
//! This module provides an in-process stand-in for GMAT. It reads the emitted
//! script back (the same channel the real engine uses), derives a synthetic
//! decay time from the spacecraft parameters, and writes a two-row report.
//! No physics is implied: the model only needs to be deterministic and spread
//! lifetimes across the parameter space.
//!
//! # Features
//!
//! - Deterministic reports from script contents
//! - Per-trial failure injection (non-zero exit, missing or broken report)
//! - Thread-safe record of every invoked trial id
//!
//! # Example
//!
//! ```
//! use decaymc::engine::mock::{MockEngine, MockFailure};
//!
//! let engine = MockEngine::new().with_failure(3, MockFailure::NoReport);
//! assert_eq!(engine.invocations().len(), 0);
//! ```

use super::script::DECAY_ALTITUDE_KM;
use super::{Engine, Invocation, TrialFiles};
use crate::error::TrialError;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// A1 modified Julian date of the script epoch (01 Jan 2025 12:00 UTC)
pub const MOCK_START_EPOCH: f64 = 30681.500_428_240_74;

/// Injected failure for one trial
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// Exit non-zero without writing a report
    ExitNonZero,
    /// Exit non-zero but still write a valid report
    ExitNonZeroWithReport,
    /// Exit zero, write nothing
    NoReport,
    /// Exit zero, write only the start row
    TruncatedReport,
    /// Exit zero, write unparseable rows
    GarbledReport,
}

/// Spacecraft values the mock reads back from a script
#[derive(Debug, Clone, PartialEq)]
struct ScriptValues {
    sma_km: f64,
    mass_kg: f64,
    cd: f64,
    drag_area_m2: f64,
    cap_days: f64,
    report: String,
}

/// Mock engine for testing and dry runs
#[derive(Clone, Default)]
pub struct MockEngine {
    /// Injected failures by trial id
    failures: HashMap<u64, MockFailure>,

    /// Trial ids in invocation order
    invoked: Arc<Mutex<Vec<u64>>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a failure for trial `id`
    pub fn with_failure(mut self, id: u64, failure: MockFailure) -> Self {
        self.failures.insert(id, failure);
        self
    }

    /// Trial ids invoked so far (shared across clones)
    pub fn invocations(&self) -> Vec<u64> {
        self.invoked.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Synthetic (lifetime_days, end_alt_km) for a spacecraft
    ///
    /// Decay time grows with ballistic coefficient and exponentially with
    /// altitude; runs that would outlive the cap stop at the cap.
    pub fn model(
        h0_km: f64,
        mass_kg: f64,
        cd: f64,
        drag_area_m2: f64,
        cap_days: f64,
    ) -> (f64, f64) {
        let ballistic = mass_kg / (cd * drag_area_m2);
        let decay_days = 0.05 * ballistic * ((h0_km - DECAY_ALTITUDE_KM) / 120.0).exp();

        if decay_days <= cap_days {
            (decay_days, DECAY_ALTITUDE_KM)
        } else {
            let fraction = cap_days / decay_days;
            (cap_days, h0_km - (h0_km - DECAY_ALTITUDE_KM) * fraction)
        }
    }

    fn write_report(path: &Path, rows: &str) -> Result<(), TrialError> {
        std::fs::write(path, rows).map_err(|source| TrialError::ReportMissing {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Engine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    fn invoke(&self, files: &TrialFiles) -> Result<Invocation, TrialError> {
        if let Ok(mut invoked) = self.invoked.lock() {
            invoked.push(files.id);
        }

        let spawn_err = |source| TrialError::EngineSpawn {
            program: "mock".into(),
            source,
        };
        let script = std::fs::read_to_string(&files.script).map_err(spawn_err)?;

        let failure = self.failures.get(&files.id).copied();
        let exit_ok = !matches!(
            failure,
            Some(MockFailure::ExitNonZero) | Some(MockFailure::ExitNonZeroWithReport)
        );
        let status = if exit_ok { "exit status: 0" } else { "exit status: 1" };
        std::fs::write(&files.log, format!("mock engine: trial {} {}\n", files.id, status))
            .map_err(spawn_err)?;

        let values = match parse_script(&script) {
            Some(v) => v,
            None => {
                return Ok(Invocation {
                    success: false,
                    status: "exit status: 2".to_string(),
                })
            }
        };
        let report = Path::new(&values.report);

        let h0 = values.sma_km - super::script::EARTH_RADIUS_KM;
        let (lifetime, end_alt) =
            Self::model(h0, values.mass_kg, values.cd, values.drag_area_m2, values.cap_days);
        let start_row = format!("{:.11} {:.12}\n", MOCK_START_EPOCH, h0);
        let end_row = format!("{:.11} {:.12}\n", MOCK_START_EPOCH + lifetime, end_alt);

        match failure {
            None | Some(MockFailure::ExitNonZeroWithReport) => {
                Self::write_report(report, &format!("{}{}", start_row, end_row))?;
            }
            Some(MockFailure::TruncatedReport) => Self::write_report(report, &start_row)?,
            Some(MockFailure::GarbledReport) => {
                Self::write_report(report, "Integrator failed to converge\n***\n")?
            }
            Some(MockFailure::ExitNonZero) | Some(MockFailure::NoReport) => {}
        }

        Ok(Invocation {
            success: exit_ok,
            status: status.to_string(),
        })
    }
}

fn parse_script(script: &str) -> Option<ScriptValues> {
    let mut values: HashMap<&str, &str> = HashMap::new();
    let mut cap_days = None;

    for line in script.lines() {
        let line = line.trim().trim_end_matches(';');
        if let Some((key, value)) = line.split_once(" = ") {
            values.insert(key.trim(), value.trim());
        }
        if let Some(rest) = line.split("S.ElapsedDays = ").nth(1) {
            cap_days = rest.trim_end_matches('}').trim().parse::<f64>().ok();
        }
    }

    let number = |key: &str| values.get(key).and_then(|v| v.parse::<f64>().ok());
    Some(ScriptValues {
        sma_km: number("S.SMA")?,
        mass_kg: number("S.DryMass")?,
        cd: number("S.Cd")?,
        drag_area_m2: number("S.DragArea")?,
        cap_days: cap_days?,
        report: values.get("R.Filename")?.trim_matches('\'').to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::report::parse_report;
    use crate::engine::script::{render_script, write_script};
    use crate::trial::Trial;

    fn prepare(dir: &Path, id: u64, trial: &Trial) -> TrialFiles {
        let files = TrialFiles::new(dir, id);
        let script = render_script(trial, 200.0, 90.0, &files.report);
        write_script(&files.script, &script).unwrap();
        files
    }

    fn low_trial() -> Trial {
        Trial {
            h0_km: 500.0,
            cd: 2.2,
            a2m: 0.02,
        }
    }

    #[test]
    fn test_parse_script_round_trip() {
        let script = render_script(&low_trial(), 200.0, 90.0, Path::new("/w/traj_0.csv"));
        let values = parse_script(&script).unwrap();
        assert_eq!(values.sma_km, 6878.0);
        assert_eq!(values.mass_kg, 200.0);
        assert_eq!(values.cd, 2.2);
        assert_eq!(values.cap_days, 90.0);
        assert_eq!(values.report, "/w/traj_0.csv");
    }

    #[test]
    fn test_model_decay_and_cap() {
        // Low orbit decays before the cap
        let (lifetime, end_alt) = MockEngine::model(500.0, 200.0, 2.2, 4.0, 90.0);
        assert!(lifetime < 90.0);
        assert_eq!(end_alt, DECAY_ALTITUDE_KM);

        // High orbit hits the cap above the decay altitude
        let (lifetime, end_alt) = MockEngine::model(1000.0, 200.0, 2.2, 4.0, 90.0);
        assert_eq!(lifetime, 90.0);
        assert!(end_alt > DECAY_ALTITUDE_KM && end_alt < 1000.0);
    }

    #[test]
    fn test_invoke_writes_parsable_report() {
        let dir = tempfile::tempdir().unwrap();
        let files = prepare(dir.path(), 0, &low_trial());

        let engine = MockEngine::new();
        let inv = engine.invoke(&files).unwrap();
        assert!(inv.success);

        let pair = parse_report(&files.report).unwrap();
        assert!(pair.lifetime() > 0.0);
        assert!((pair.start_alt - 500.0).abs() < 1e-9);
        assert_eq!(engine.invocations(), vec![0]);
    }

    #[test]
    fn test_injected_failures() {
        let dir = tempfile::tempdir().unwrap();
        let engine = MockEngine::new()
            .with_failure(1, MockFailure::ExitNonZero)
            .with_failure(2, MockFailure::TruncatedReport)
            .with_failure(3, MockFailure::ExitNonZeroWithReport);

        let f1 = prepare(dir.path(), 1, &low_trial());
        assert!(!engine.invoke(&f1).unwrap().success);
        assert!(!f1.report.exists());

        let f2 = prepare(dir.path(), 2, &low_trial());
        assert!(engine.invoke(&f2).unwrap().success);
        assert!(parse_report(&f2.report).is_err());

        let f3 = prepare(dir.path(), 3, &low_trial());
        assert!(!engine.invoke(&f3).unwrap().success);
        assert!(parse_report(&f3.report).is_ok());
    }

    #[test]
    fn test_unwritable_log_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let files = prepare(dir.path(), 5, &low_trial());
        std::fs::create_dir(&files.log).unwrap();

        let err = MockEngine::new().invoke(&files).unwrap_err();
        assert!(matches!(err, TrialError::EngineSpawn { .. }));
        assert!(!files.report.exists());
    }

    #[test]
    fn test_clones_share_invocation_log() {
        let dir = tempfile::tempdir().unwrap();
        let engine = MockEngine::new();
        let clone = engine.clone();
        let files = prepare(dir.path(), 5, &low_trial());
        clone.invoke(&files).unwrap();
        assert_eq!(engine.invocations(), vec![5]);
    }
}
