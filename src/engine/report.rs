//! Two-line report parsing
//!
//! The engine writes one row at mission start and one at mission end, each
//! `<A1ModJulian> <Altitude>` separated by whitespace. Tokens after the first
//! two on a line are ignored, as are lines after the second.

use crate::error::TrialError;
use std::path::Path;

/// Start/end measurement pair from one report
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportPair {
    pub start_time: f64,
    pub start_alt: f64,
    pub end_time: f64,
    pub end_alt: f64,
}

impl ReportPair {
    /// Elapsed time between the two rows (days)
    pub fn lifetime(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Read and parse the report at `path`
pub fn parse_report(path: &Path) -> Result<ReportPair, TrialError> {
    let content = std::fs::read_to_string(path).map_err(|source| TrialError::ReportMissing {
        path: path.to_path_buf(),
        source,
    })?;
    parse_report_str(&content, path)
}

/// Parse report text; `path` is only used in error messages
pub fn parse_report_str(content: &str, path: &Path) -> Result<ReportPair, TrialError> {
    let mut lines = content.lines();

    let first = lines.next().ok_or_else(|| TrialError::ReportTruncated {
        path: path.to_path_buf(),
        lines: 0,
    })?;
    let (start_time, start_alt) = parse_row(first, 1, path)?;

    let second = lines.next().ok_or_else(|| TrialError::ReportTruncated {
        path: path.to_path_buf(),
        lines: 1,
    })?;
    let (end_time, end_alt) = parse_row(second, 2, path)?;

    Ok(ReportPair {
        start_time,
        start_alt,
        end_time,
        end_alt,
    })
}

fn parse_row(line: &str, line_no: usize, path: &Path) -> Result<(f64, f64), TrialError> {
    let malformed = || TrialError::ReportMalformed {
        path: path.to_path_buf(),
        line: line_no,
        content: line.to_string(),
    };

    let mut tokens = line.split_whitespace();
    let time = tokens.next().and_then(parse_number).ok_or_else(malformed)?;
    let alt = tokens.next().and_then(parse_number).ok_or_else(malformed)?;
    Ok((time, alt))
}

// NaN and infinities are not numbers an engine report can carry
fn parse_number(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}
