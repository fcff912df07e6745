//! Global best aggregation
//!
//! The coordinator seeds a [`GlobalBest`] with its own local best and folds in
//! each record received from the other ranks. Because [`is_better`] is a total
//! order, the final best does not depend on arrival order.
//!
//! # Example
//!
//! ```
//! use decaymc::stats::{RunCounters, TrialResult, aggregator::GlobalBest};
//! use decaymc::trial::Trial;
//!
//! let trial = Trial { h0_km: 800.0, cd: 2.1, a2m: 0.02 };
//! let mut global = GlobalBest::new(0, TrialResult::empty(), RunCounters::default());
//! global.fold(1, &TrialResult::success(5, 20.0, 122.0, trial), &RunCounters::default());
//!
//! assert!(global.best().ok);
//! assert_eq!(global.best().id, 5);
//! assert_eq!(global.ranks_folded(), 2);
//! ```

use super::{is_better, RunCounters, TrialResult};

/// Coordinator-side accumulator
#[derive(Debug, Clone)]
pub struct GlobalBest {
    /// Best result so far
    best: TrialResult,

    /// Rank that reported the current best
    best_rank: usize,

    /// Trial counts summed over all folded ranks
    counters: RunCounters,

    /// Number of ranks folded in, including the seed
    ranks_folded: usize,
}

impl GlobalBest {
    /// Seed with the coordinator's own local best
    pub fn new(rank: usize, local_best: TrialResult, counters: RunCounters) -> Self {
        Self {
            best: local_best,
            best_rank: rank,
            counters,
            ranks_folded: 1,
        }
    }

    /// Fold one rank's local best and counts
    pub fn fold(&mut self, rank: usize, record: &TrialResult, counters: &RunCounters) {
        if is_better(record, &self.best) {
            self.best = *record;
            self.best_rank = rank;
        }
        self.counters.merge(counters);
        self.ranks_folded += 1;
    }

    pub fn best(&self) -> &TrialResult {
        &self.best
    }

    /// The best result, or None if no rank had a successful trial
    pub fn outcome(&self) -> Option<&TrialResult> {
        self.best.ok.then_some(&self.best)
    }

    pub fn best_rank(&self) -> usize {
        self.best_rank
    }

    pub fn counters(&self) -> &RunCounters {
        &self.counters
    }

    pub fn ranks_folded(&self) -> usize {
        self.ranks_folded
    }
}

/// Fold a sequence of records from the invalid sentinel
pub fn fold_best<'a, I>(records: I) -> TrialResult
where
    I: IntoIterator<Item = &'a TrialResult>,
{
    records.into_iter().fold(TrialResult::empty(), |best, r| {
        if is_better(r, &best) {
            *r
        } else {
            best
        }
    })
}
