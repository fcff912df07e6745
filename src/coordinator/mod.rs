//! Reduction and experiment driver
//!
//! Every rank calls [`run_experiment`] with its own communicator. The ranks
//! run their trials independently, then:
//!
//! 1. ranks `1..W` each send one local-best message (tag 42) to rank 0
//! 2. rank 0 receives exactly W-1 of them, from any source, and folds each
//!    into a [`GlobalBest`] seeded with its own local best
//! 3. rank 0 prints the result and summary
//! 4. all ranks meet at the barrier
//! 5. rank 0 prints the elapsed time, which therefore covers the slowest rank
//!
//! [`run_local`] and [`run_tcp`] wire a whole world together for the threads
//! and worker modes.

use crate::config::Config;
use crate::distributed::{Communicator, LocalBestMessage, LocalComm, TcpComm, RESULT_TAG};
use crate::engine::EngineAdapter;
use crate::output::text;
use crate::stats::aggregator::GlobalBest;
use crate::trial::TrialGenerator;
use crate::worker::{Worker, WorkerSummary};
use crate::Result;
use anyhow::Context;
use std::sync::Arc;
use std::time::Instant;

/// Collect every rank's local best at rank 0
///
/// Returns the folded result on rank 0 and `None` elsewhere.
pub fn reduce<C>(comm: &mut C, summary: &WorkerSummary) -> Result<Option<GlobalBest>>
where
    C: Communicator + ?Sized,
{
    let rank = comm.rank();

    if !comm.is_coordinator() {
        let msg = LocalBestMessage::new(rank, summary.local_best, summary.counters);
        comm.send(0, msg)
            .with_context(|| format!("Rank {} failed to send its local best", rank))?;
        return Ok(None);
    }

    let mut global = GlobalBest::new(rank, summary.local_best, summary.counters);
    for received in 1..comm.size() {
        let msg = comm.recv_any(RESULT_TAG).with_context(|| {
            format!("Failed to receive local best {} of {}", received, comm.size() - 1)
        })?;
        tracing::debug!(from = msg.rank, ok = msg.record.ok, "received local best");
        global.fold(msg.rank, &msg.record, &msg.counters);
    }

    Ok(Some(global))
}

/// Run this rank's share of the experiment end to end
pub fn run_experiment<C>(
    comm: &mut C,
    config: &Config,
    adapter: Arc<EngineAdapter>,
) -> Result<Option<GlobalBest>>
where
    C: Communicator + ?Sized,
{
    let rank = comm.rank();
    let size = comm.size();

    if comm.is_coordinator() {
        text::print_info(config, size);
    }

    let start = Instant::now();
    let generator = TrialGenerator::from_config(config);
    let worker = Worker::new(rank, size, config.experiment.trials, generator, adapter);
    let summary = worker.run();

    let global = reduce(comm, &summary)?;
    if let Some(global) = &global {
        tracing::debug!(
            best_rank = global.best_rank(),
            ranks = global.ranks_folded(),
            "reduction complete"
        );
        text::print_result(global.outcome());
        text::print_summary(global.counters());
    }

    comm.barrier().context("Closing barrier failed")?;

    if comm.is_coordinator() {
        text::print_timing(size, start.elapsed());
    }

    Ok(global)
}

/// Run all ranks as threads of this process
pub fn run_local(config: &Config, adapter: Arc<EngineAdapter>) -> Result<GlobalBest> {
    let comms = LocalComm::create(config.workers.count);

    let outcomes: Vec<Result<Option<GlobalBest>>> = std::thread::scope(|s| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|mut comm| {
                let adapter = Arc::clone(&adapter);
                s.spawn(move || run_experiment(&mut comm, config, adapter))
            })
            .collect();

        handles
            .into_iter()
            .enumerate()
            .map(|(rank, h)| {
                h.join()
                    .map_err(|_| anyhow::anyhow!("Rank {} thread panicked", rank))
                    .and_then(|r| r)
            })
            .collect()
    });

    let mut global = None;
    for outcome in outcomes {
        if let Some(g) = outcome? {
            global = Some(g);
        }
    }
    global.context("Rank 0 produced no result")
}

/// Run this process as one rank of a TCP world
pub fn run_tcp(config: &Config, adapter: Arc<EngineAdapter>) -> Result<Option<GlobalBest>> {
    let rank = config
        .workers
        .rank
        .context("Worker mode requires a rank")?;

    let mut comm = TcpComm::connect(rank, config.workers.count, &config.workers.coordinator)
        .with_context(|| format!("Rank {} could not join {}", rank, config.workers.coordinator))?;
    run_experiment(&mut comm, config, adapter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineKind;
    use crate::distributed::tcp::find_available_port;
    use crate::engine::mock::{MockEngine, MockFailure};
    use crate::stats::aggregator::fold_best;
    use crate::stats::TrialResult;

    fn mock_config(workers: usize, trials: u64) -> Config {
        let mut config = Config::default();
        config.engine.kind = EngineKind::Mock;
        config.experiment.trials = trials;
        config.workers.count = workers;
        config
    }

    fn adapter(dir: &std::path::Path, engine: MockEngine) -> Arc<EngineAdapter> {
        Arc::new(EngineAdapter::new(Box::new(engine), dir, 200.0, 90.0, false).unwrap())
    }

    fn sequential_best(dir: &std::path::Path, config: &Config) -> TrialResult {
        let generator = TrialGenerator::from_config(config);
        let adapter = adapter(dir, MockEngine::new());
        let results: Vec<TrialResult> = (0..config.experiment.trials)
            .map(|i| adapter.run_trial(i, &generator.generate(i)).unwrap())
            .collect();
        fold_best(&results)
    }

    #[test]
    fn test_every_index_runs_exactly_once() {
        for workers in 1..=20 {
            let dir = tempfile::tempdir().unwrap();
            let engine = MockEngine::new();
            let config = mock_config(workers, 20);

            let global = run_local(&config, adapter(dir.path(), engine.clone())).unwrap();

            let mut invoked = engine.invocations();
            invoked.sort_unstable();
            assert_eq!(invoked, (0..20).collect::<Vec<u64>>(), "workers {}", workers);
            assert_eq!(global.ranks_folded(), workers);
            assert_eq!(global.counters().attempted, 20);
        }
    }

    #[test]
    fn test_global_best_independent_of_worker_count() {
        let dir = tempfile::tempdir().unwrap();
        let expected = sequential_best(dir.path(), &mock_config(1, 24));

        for workers in [1, 2, 5, 24] {
            let run_dir = tempfile::tempdir().unwrap();
            let global =
                run_local(&mock_config(workers, 24), adapter(run_dir.path(), MockEngine::new()))
                    .unwrap();
            assert_eq!(global.outcome().copied(), Some(expected), "workers {}", workers);
        }
    }

    #[test]
    fn test_more_workers_than_trials() {
        let dir = tempfile::tempdir().unwrap();
        let global = run_local(&mock_config(6, 2), adapter(dir.path(), MockEngine::new())).unwrap();
        assert_eq!(global.ranks_folded(), 6);
        assert_eq!(global.counters().attempted, 2);
        assert!(global.outcome().is_some());
    }

    #[test]
    fn test_all_failed_reports_no_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let engine = (0..6).fold(MockEngine::new(), |e, i| {
            e.with_failure(i, MockFailure::ExitNonZero)
        });
        let global = run_local(&mock_config(3, 6), adapter(dir.path(), engine)).unwrap();

        assert!(global.outcome().is_none());
        assert_eq!(global.counters().failed_engine, 6);
    }

    #[test]
    fn test_zero_trials_is_an_empty_run() {
        let dir = tempfile::tempdir().unwrap();
        let global = run_local(&mock_config(2, 0), adapter(dir.path(), MockEngine::new())).unwrap();
        assert!(global.outcome().is_none());
        assert_eq!(global.counters().attempted, 0);
    }

    #[test]
    fn test_tcp_world_matches_local_world() {
        let dir = tempfile::tempdir().unwrap();
        let size = 3;
        let mut config = mock_config(size, 9);
        config.workers.coordinator = format!("127.0.0.1:{}", find_available_port().unwrap());

        let expected = sequential_best(dir.path(), &config);
        let shared = adapter(dir.path(), MockEngine::new());

        let members: Vec<_> = (1..size)
            .map(|rank| {
                let mut config = config.clone();
                config.workers.rank = Some(rank);
                let adapter = Arc::clone(&shared);
                std::thread::spawn(move || run_tcp(&config, adapter).unwrap())
            })
            .collect();

        config.workers.rank = Some(0);
        let global = run_tcp(&config, shared).unwrap().unwrap();
        for m in members {
            assert!(m.join().unwrap().is_none());
        }

        assert_eq!(global.outcome().copied(), Some(expected));
        assert_eq!(global.counters().attempted, 9);
    }
}
