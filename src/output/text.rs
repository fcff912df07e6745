//! Console output
//!
//! Every line here is part of the run's console contract and goes to stdout
//! with `println!`. Diagnostics go through `tracing` instead.
//!
//! Numbers are printed with six significant digits and no trailing zeros
//! (`31.3308`, `121.999`, `0.0123457`), switching to exponent notation
//! outside `1e-4..1e6`.

use crate::config::Config;
use crate::stats::{RunCounters, TrialResult};
use std::time::Duration;

/// Significant digits in console numbers
const SIGNIFICANT_DIGITS: usize = 6;

/// Format a number with six significant digits
pub fn format_g(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    // Round first, then read the exponent: 999999.7 must become 1e+06
    let sci = format!("{:.*e}", SIGNIFICANT_DIGITS - 1, value);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => return sci,
    };

    if exp < -4 || exp >= SIGNIFICANT_DIGITS as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_zeros(mantissa), sign, exp.abs())
    } else {
        let decimals = (SIGNIFICANT_DIGITS as i32 - 1 - exp).max(0) as usize;
        trim_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

pub fn info_line(config: &Config, ranks: usize) -> String {
    format!(
        "[INFO] Monte Carlo LEO decay: n={} mass={} kg cap={} days, ranks={}",
        config.experiment.trials,
        format_g(config.experiment.mass_kg),
        format_g(config.experiment.cap_days),
        ranks
    )
}

pub fn trial_line(rank: usize, result: &TrialResult) -> String {
    format!(
        "[rank {}] run #{} lifetime_days={} end_alt_km={} | h0={} Cd={} A2M={}",
        rank,
        result.id,
        format_g(result.lifetime_days),
        format_g(result.end_alt_km),
        format_g(result.trial.h0_km),
        format_g(result.trial.cd),
        format_g(result.trial.a2m)
    )
}

pub fn result_line(best: Option<&TrialResult>) -> String {
    match best {
        Some(best) => format!(
            "[RESULT] Best run was #{} lifetime_days={} end_alt_km={} (h0={}, Cd={}, A2M={})",
            best.id,
            format_g(best.lifetime_days),
            format_g(best.end_alt_km),
            format_g(best.trial.h0_km),
            format_g(best.trial.cd),
            format_g(best.trial.a2m)
        ),
        None => "[RESULT] No successful runs parsed.".to_string(),
    }
}

pub fn summary_line(counters: &RunCounters) -> String {
    format!(
        "[SUMMARY] attempted={} ok={} failed={} (setup={} engine={} report={})",
        counters.attempted,
        counters.succeeded,
        counters.failed(),
        counters.failed_setup,
        counters.failed_engine,
        counters.failed_report
    )
}

pub fn timing_line(ranks: usize, elapsed: Duration) -> String {
    format!("[TIMING] ranks={} runtime={} s", ranks, format_g(elapsed.as_secs_f64()))
}

/// Print the run header (rank 0)
pub fn print_info(config: &Config, ranks: usize) {
    println!("{}", info_line(config, ranks));
}

/// Print one successful trial
pub fn print_trial(rank: usize, result: &TrialResult) {
    println!("{}", trial_line(rank, result));
}

/// Print the global best (rank 0)
pub fn print_result(best: Option<&TrialResult>) {
    println!("{}", result_line(best));
}

/// Print summed trial counts (rank 0)
pub fn print_summary(counters: &RunCounters) {
    println!("{}", summary_line(counters));
}

/// Print wall-clock runtime (rank 0)
pub fn print_timing(ranks: usize, elapsed: Duration) {
    println!("{}", timing_line(ranks, elapsed));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::trial::Trial;

    fn best() -> TrialResult {
        TrialResult::success(
            7,
            31.330765069,
            121.998877,
            Trial {
                h0_km: 622.123456,
                cd: 2.25,
                a2m: 0.0123456789,
            },
        )
    }

    #[test]
    fn test_format_g() {
        assert_eq!(format_g(200.0), "200");
        assert_eq!(format_g(90.0), "90");
        assert_eq!(format_g(2.25), "2.25");
        assert_eq!(format_g(31.330765069), "31.3308");
        assert_eq!(format_g(0.0123456789), "0.0123457");
        assert_eq!(format_g(0.0), "0");
        assert_eq!(format_g(-4.5), "-4.5");
        assert_eq!(format_g(1234567.0), "1.23457e+06");
        assert_eq!(format_g(999999.7), "1e+06");
        assert_eq!(format_g(0.0000012), "1.2e-06");
    }

    #[test]
    fn test_info_line() {
        let config = Config::default();
        assert_eq!(
            info_line(&config, 4),
            "[INFO] Monte Carlo LEO decay: n=50 mass=200 kg cap=90 days, ranks=4"
        );
    }

    #[test]
    fn test_trial_line() {
        assert_eq!(
            trial_line(2, &best()),
            "[rank 2] run #7 lifetime_days=31.3308 end_alt_km=121.999 | h0=622.123 Cd=2.25 A2M=0.0123457"
        );
    }

    #[test]
    fn test_result_lines() {
        assert_eq!(
            result_line(Some(&best())),
            "[RESULT] Best run was #7 lifetime_days=31.3308 end_alt_km=121.999 (h0=622.123, Cd=2.25, A2M=0.0123457)"
        );
        assert_eq!(result_line(None), "[RESULT] No successful runs parsed.");
    }

    #[test]
    fn test_summary_line() {
        let mut counters = RunCounters::default();
        counters.record_success();
        counters.record_failure(FailureKind::Engine);
        counters.record_failure(FailureKind::Report);
        assert_eq!(
            summary_line(&counters),
            "[SUMMARY] attempted=3 ok=1 failed=2 (setup=0 engine=1 report=1)"
        );
    }

    #[test]
    fn test_timing_line() {
        assert_eq!(
            timing_line(8, Duration::from_millis(12_345)),
            "[TIMING] ranks=8 runtime=12.345 s"
        );
    }
}
