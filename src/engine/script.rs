//! GMAT script emission
//!
//! Renders the per-trial mission script. The output depends only on the
//! trial, mass, cap and report path, so the same trial always produces the
//! same bytes.

use crate::error::TrialError;
use crate::trial::Trial;
use std::fmt::Write as _;
use std::path::Path;

/// Earth radius used to turn altitude into semi-major axis (km)
pub const EARTH_RADIUS_KM: f64 = 6378.0;

/// Propagation stops when altitude drops to this value (km)
pub const DECAY_ALTITUDE_KM: f64 = 122.0;

/// Render the complete mission script for one trial
pub fn render_script(trial: &Trial, mass_kg: f64, cap_days: f64, report_path: &Path) -> String {
    let sma = EARTH_RADIUS_KM + trial.h0_km;
    let area_m2 = trial.a2m * mass_kg;

    let mut s = String::with_capacity(1536);

    // Spacecraft: circular orbit, only SMA varies
    s.push_str("Create Spacecraft S;\n");
    s.push_str("S.DateFormat = UTCGregorian;\n");
    s.push_str("S.Epoch = '01 Jan 2025 12:00:00.000';\n");
    s.push_str("S.CoordinateSystem = EarthMJ2000Eq;\n");
    s.push_str("S.DisplayStateType = Keplerian;\n");
    let _ = writeln!(s, "S.SMA = {};", sma);
    s.push_str("S.ECC = 0.0;\n");
    s.push_str("S.INC = 28.5;\n");
    s.push_str("S.RAAN = 0;\nS.AOP = 0;\nS.TA = 0;\n\n");

    let _ = writeln!(s, "S.DryMass = {};", mass_kg);
    let _ = writeln!(s, "S.Cd = {};", trial.cd);
    let _ = writeln!(s, "S.DragArea = {};\n", area_m2);

    // Earth point mass plus exponential drag, nothing else
    s.push_str("Create ForceModel FM;\n");
    s.push_str("FM.CentralBody = Earth;\n");
    s.push_str("FM.PrimaryBodies = {Earth};\n");
    s.push_str("FM.Drag = Exponential;\n");
    s.push_str("FM.SRP  = Off;\n\n");

    s.push_str("Create Propagator Prop;\n");
    s.push_str("Prop.FM = FM;\n");
    s.push_str("Prop.Type = RungeKutta89;\n");
    s.push_str("Prop.InitialStepSize = 60;\n");
    s.push_str("Prop.Accuracy = 1e-12;\n");
    s.push_str("Prop.MinStep = 0.001;\n");
    s.push_str("Prop.MaxStep = 600;\n\n");

    s.push_str("Create ReportFile R;\n");
    let _ = writeln!(s, "R.Filename = '{}';", report_path.display());
    s.push_str("R.Precision = 15;\n");
    s.push_str("R.WriteHeaders = false;\n\n");

    // Exactly two report rows: start, then decay or cap
    s.push_str("BeginMissionSequence;\n");
    s.push_str("Report R S.A1ModJulian S.Altitude;\n");
    let _ = writeln!(
        s,
        "Propagate Prop(S) {{ S.Altitude = {}, S.ElapsedDays = {} }};",
        DECAY_ALTITUDE_KM, cap_days
    );
    s.push_str("Report R S.A1ModJulian S.Altitude;\n");

    s
}

/// Write a rendered script to `path`
pub fn write_script(path: &Path, content: &str) -> Result<(), TrialError> {
    std::fs::write(path, content).map_err(|source| TrialError::ScriptWrite {
        path: path.to_path_buf(),
        source,
    })
}
