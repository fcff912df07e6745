//! Worker loop
//!
//! This module implements the Worker, the per-rank execution unit. Each rank
//! runs its strided share of the trial indices through the engine adapter
//! and keeps the best successful result it has seen.
//!
//! # Partitioning
//!
//! Rank `r` of `W` owns indices `{r, r+W, r+2W, ...} < N`. The shares are
//! disjoint and cover `0..N`, and no rank needs to know what any other rank
//! is doing. Within a rank indices are processed in increasing order.
//!
//! # Failures
//!
//! A failed trial is logged, counted by kind, and skipped. It is never
//! retried and never stops the loop.
//!
//! # Example
//!
//! ```
//! use decaymc::config::ParameterRanges;
//! use decaymc::engine::{EngineAdapter, mock::MockEngine};
//! use decaymc::trial::TrialGenerator;
//! use decaymc::worker::Worker;
//! use std::sync::Arc;
//!
//! let dir = tempfile::tempdir()?;
//! let adapter = EngineAdapter::new(Box::new(MockEngine::new()), dir.path(), 200.0, 90.0, false)?;
//! let generator = TrialGenerator::new(1234, ParameterRanges::default());
//!
//! let worker = Worker::new(1, 3, 10, generator, Arc::new(adapter));
//! let summary = worker.run();
//!
//! // Rank 1 of 3 owns trials 1, 4 and 7
//! assert_eq!(summary.counters.attempted, 3);
//! assert!(summary.local_best.ok);
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::engine::EngineAdapter;
use crate::output::text;
use crate::stats::{BestTracker, RunCounters, TrialResult};
use crate::trial::TrialGenerator;
use std::sync::Arc;

/// Trial indices owned by `rank` out of `size` ranks
pub fn assigned_indices(trials: u64, rank: usize, size: usize) -> impl Iterator<Item = u64> {
    let step = size.max(1);
    (rank as u64..trials).step_by(step)
}

/// What one rank hands to the reduction
#[derive(Debug, Clone, Copy)]
pub struct WorkerSummary {
    /// Best successful result, or the invalid sentinel
    pub local_best: TrialResult,
    pub counters: RunCounters,
}

/// One rank's trial loop
pub struct Worker {
    rank: usize,
    size: usize,
    trials: u64,
    generator: TrialGenerator,
    adapter: Arc<EngineAdapter>,
}

impl Worker {
    pub fn new(
        rank: usize,
        size: usize,
        trials: u64,
        generator: TrialGenerator,
        adapter: Arc<EngineAdapter>,
    ) -> Self {
        Self {
            rank,
            size,
            trials,
            generator,
            adapter,
        }
    }

    /// Run every owned trial once
    pub fn run(&self) -> WorkerSummary {
        let mut tracker = BestTracker::new();
        let mut counters = RunCounters::default();

        for index in assigned_indices(self.trials, self.rank, self.size) {
            let trial = self.generator.generate(index);
            tracing::debug!(
                rank = self.rank,
                trial = index,
                h0 = trial.h0_km,
                cd = trial.cd,
                a2m = trial.a2m,
                "starting trial"
            );

            match self.adapter.run_trial(index, &trial) {
                Ok(result) => {
                    counters.record_success();
                    text::print_trial(self.rank, &result);
                    if tracker.offer(&result) {
                        tracing::debug!(rank = self.rank, trial = index, "new local best");
                    }
                }
                Err(e) => {
                    counters.record_failure(e.kind());
                    tracing::warn!(rank = self.rank, trial = index, "trial failed: {}", e);
                }
            }
        }

        tracing::debug!(
            rank = self.rank,
            attempted = counters.attempted,
            ok = counters.succeeded,
            "worker finished"
        );

        WorkerSummary {
            local_best: tracker.into_best(),
            counters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParameterRanges;
    use crate::engine::mock::{MockEngine, MockFailure};
    use crate::stats::aggregator::fold_best;
    use std::collections::BTreeSet;

    fn worker_with(
        dir: &std::path::Path,
        engine: MockEngine,
        rank: usize,
        size: usize,
        trials: u64,
    ) -> Worker {
        let adapter = EngineAdapter::new(Box::new(engine), dir, 200.0, 90.0, false).unwrap();
        let generator = TrialGenerator::new(1234, ParameterRanges::default());
        Worker::new(rank, size, trials, generator, Arc::new(adapter))
    }

    #[test]
    fn test_assigned_indices_stride() {
        let owned: Vec<u64> = assigned_indices(10, 1, 3).collect();
        assert_eq!(owned, vec![1, 4, 7]);
        assert_eq!(assigned_indices(10, 0, 1).count(), 10);
        assert_eq!(assigned_indices(2, 5, 8).count(), 0);
        assert_eq!(assigned_indices(0, 0, 4).count(), 0);
    }

    #[test]
    fn test_partition_covers_every_index_once() {
        for size in 1..=20usize {
            let mut seen = BTreeSet::new();
            let mut total = 0;
            for rank in 0..size {
                let owned: Vec<u64> = assigned_indices(20, rank, size).collect();
                assert!(owned.windows(2).all(|w| w[0] < w[1]));
                total += owned.len();
                seen.extend(owned);
            }
            assert_eq!(total, 20, "size {}", size);
            assert_eq!(seen, (0..20).collect::<BTreeSet<u64>>());
        }
    }

    #[test]
    fn test_single_worker_matches_sequential_fold() {
        let dir = tempfile::tempdir().unwrap();
        let engine = MockEngine::new();
        let summary = worker_with(dir.path(), engine.clone(), 0, 1, 12).run();

        let generator = TrialGenerator::new(1234, ParameterRanges::default());
        let adapter =
            EngineAdapter::new(Box::new(engine.clone()), dir.path(), 200.0, 90.0, false).unwrap();
        let sequential: Vec<TrialResult> = (0..12)
            .map(|i| adapter.run_trial(i, &generator.generate(i)).unwrap())
            .collect();

        assert_eq!(summary.local_best, fold_best(&sequential));
        assert_eq!(summary.counters.succeeded, 12);
    }

    #[test]
    fn test_failures_counted_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let engine = MockEngine::new()
            .with_failure(0, MockFailure::ExitNonZero)
            .with_failure(2, MockFailure::GarbledReport)
            .with_failure(4, MockFailure::TruncatedReport);
        let summary = worker_with(dir.path(), engine.clone(), 0, 2, 8).run();

        // Rank 0 of 2 owns 0, 2, 4, 6; each is tried exactly once
        assert_eq!(engine.invocations(), vec![0, 2, 4, 6]);
        assert_eq!(summary.counters.attempted, 4);
        assert_eq!(summary.counters.succeeded, 1);
        assert_eq!(summary.counters.failed_engine, 1);
        assert_eq!(summary.counters.failed_report, 2);
        assert_eq!(summary.local_best.id, 6);
    }

    #[test]
    fn test_all_failed_keeps_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let engine =
            (0..3).fold(MockEngine::new(), |e, i| e.with_failure(i, MockFailure::NoReport));
        let summary = worker_with(dir.path(), engine, 0, 1, 3).run();
        assert!(!summary.local_best.ok);
        assert_eq!(summary.counters.failed(), 3);
    }

    #[test]
    fn test_setup_failure_counted() {
        let dir = tempfile::tempdir().unwrap();
        let worker = worker_with(dir.path(), MockEngine::new(), 0, 1, 2);

        // A directory where the script should go makes the write fail
        std::fs::create_dir(dir.path().join("trajectory_1.script")).unwrap();
        let summary = worker.run();
        assert_eq!(summary.counters.failed_setup, 1);
        assert_eq!(summary.counters.succeeded, 1);
    }
}
