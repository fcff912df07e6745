//! Trial results and best-result tracking
//!
//! This module defines the per-trial result record, the comparator that
//! decides which of two results is "better", and the per-worker holder of the
//! best result seen so far.
//!
//! # Ordering
//!
//! `is_better(a, b)`:
//!
//! 1. An invalid `a` never wins.
//! 2. A valid `a` always beats an invalid `b`.
//! 3. Between valid results, the longer lifetime wins when the gap exceeds
//!    [`TIE_EPSILON`].
//! 4. Lifetimes within epsilon tie-break on strictly higher initial altitude.
//!
//! # Example
//!
//! ```
//! use decaymc::stats::{BestTracker, TrialResult};
//! use decaymc::trial::Trial;
//!
//! let trial = Trial { h0_km: 700.0, cd: 2.2, a2m: 0.01 };
//! let mut tracker = BestTracker::new();
//! assert!(!tracker.best().ok);
//!
//! assert!(tracker.offer(&TrialResult::success(3, 12.5, 121.9, trial)));
//! assert_eq!(tracker.best().id, 3);
//! ```

pub mod aggregator;

use crate::error::FailureKind;
use crate::trial::Trial;
use serde::{Deserialize, Serialize};

/// Lifetimes closer than this are considered equal
pub const TIE_EPSILON: f64 = 1e-9;

/// Outcome of one trial
///
/// When `ok` is false, `lifetime_days` and `end_alt_km` carry no meaning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    /// Trial index
    pub id: u64,
    /// End minus start epoch (A1 modified Julian days)
    pub lifetime_days: f64,
    /// Altitude at the final report row (km)
    pub end_alt_km: f64,
    /// Parameters the trial ran with
    pub trial: Trial,
    /// Report parsed successfully
    pub ok: bool,
}

impl TrialResult {
    /// The "nothing yet" sentinel a tracker starts from
    pub fn empty() -> Self {
        Self {
            id: 0,
            lifetime_days: 0.0,
            end_alt_km: 0.0,
            trial: Trial::default(),
            ok: false,
        }
    }

    pub fn success(id: u64, lifetime_days: f64, end_alt_km: f64, trial: Trial) -> Self {
        Self {
            id,
            lifetime_days,
            end_alt_km,
            trial,
            ok: true,
        }
    }

    pub fn failure(id: u64, trial: Trial) -> Self {
        Self {
            id,
            trial,
            ..Self::empty()
        }
    }
}

/// Whether `a` should replace `b` as the best result
#[inline]
pub fn is_better(a: &TrialResult, b: &TrialResult) -> bool {
    if !a.ok {
        return false;
    }
    if !b.ok {
        return true;
    }

    if a.lifetime_days > b.lifetime_days + TIE_EPSILON {
        return true;
    }
    if b.lifetime_days > a.lifetime_days + TIE_EPSILON {
        return false;
    }

    a.trial.h0_km > b.trial.h0_km
}

/// Per-worker best-result holder
///
/// Starts at the invalid sentinel; only a strictly better result replaces it.
#[derive(Debug, Clone, Copy)]
pub struct BestTracker {
    best: TrialResult,
}

impl BestTracker {
    pub fn new() -> Self {
        Self {
            best: TrialResult::empty(),
        }
    }

    /// Offer a result; returns true if it became the new best
    pub fn offer(&mut self, candidate: &TrialResult) -> bool {
        if is_better(candidate, &self.best) {
            self.best = *candidate;
            true
        } else {
            false
        }
    }

    pub fn best(&self) -> &TrialResult {
        &self.best
    }

    pub fn into_best(self) -> TrialResult {
        self.best
    }
}

impl Default for BestTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Trial counts for one worker (or merged across workers)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed_setup: u64,
    pub failed_engine: u64,
    pub failed_report: u64,
}

impl RunCounters {
    pub fn record_success(&mut self) {
        self.attempted += 1;
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, kind: FailureKind) {
        self.attempted += 1;
        match kind {
            FailureKind::Setup => self.failed_setup += 1,
            FailureKind::Engine => self.failed_engine += 1,
            FailureKind::Report => self.failed_report += 1,
        }
    }

    pub fn failed(&self) -> u64 {
        self.failed_setup + self.failed_engine + self.failed_report
    }

    pub fn merge(&mut self, other: &RunCounters) {
        self.attempted += other.attempted;
        self.succeeded += other.succeeded;
        self.failed_setup += other.failed_setup;
        self.failed_engine += other.failed_engine;
        self.failed_report += other.failed_report;
    }
}
