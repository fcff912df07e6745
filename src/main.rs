//! decaymc CLI entry point

use anyhow::{Context, Result};
use decaymc::config::cli::Cli;
use decaymc::config::{toml, validator, Config, RunMode};
use decaymc::coordinator;
use decaymc::distributed::tcp::find_available_port;
use decaymc::engine::EngineAdapter;
use std::process::{Child, Command};
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    setup_logging(cli.debug);
    cli.validate()?;

    let config = toml::build_config(&cli)?;
    validator::validate_config(&config).context("Configuration validation failed")?;
    tracing::debug!(?config, "effective configuration");

    if config.runtime.dry_run {
        println!("{}", config);
        println!();
        println!("Dry run - configuration is valid, no trials run");
        return Ok(());
    }

    match config.workers.mode {
        RunMode::Threads => run_threads(&config),
        RunMode::Launch => run_launch(&cli, &config),
        RunMode::Worker => run_worker(&config),
    }
}

/// Diagnostics to stderr; `RUST_LOG` overrides the level chosen here
fn setup_logging(debug: bool) {
    let level = if debug { "debug" } else { "warn" };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// All ranks as threads of this process
fn run_threads(config: &Config) -> Result<()> {
    let adapter = Arc::new(EngineAdapter::from_config(config)?);
    tracing::debug!(
        engine = adapter.engine_name(),
        ranks = config.workers.count,
        "running in threads mode"
    );

    coordinator::run_local(config, adapter)?;
    Ok(())
}

/// One rank of a multi-process run
fn run_worker(config: &Config) -> Result<()> {
    let adapter = Arc::new(EngineAdapter::from_config(config)?);
    coordinator::run_tcp(config, adapter)?;
    Ok(())
}

/// Spawn one worker process per rank on localhost and wait for all of them
fn run_launch(cli: &Cli, config: &Config) -> Result<()> {
    let port = find_available_port()?;
    let coordinator = format!("127.0.0.1:{}", port);
    let ranks = config.workers.count;

    let mut children = Vec::with_capacity(ranks);
    for rank in 0..ranks {
        match launch_rank(rank, &coordinator, cli, config) {
            Ok(child) => children.push((rank, child)),
            Err(e) => {
                cleanup_ranks(children);
                return Err(e);
            }
        }
    }

    let mut failed = Vec::new();
    for (rank, mut child) in children {
        let status = child
            .wait()
            .with_context(|| format!("Failed to wait for rank {}", rank))?;
        tracing::debug!(rank, %status, "rank exited");
        if !status.success() {
            failed.push(format!("rank {} ({})", rank, status));
        }
    }

    if !failed.is_empty() {
        anyhow::bail!("Worker processes failed: {}", failed.join(", "));
    }
    Ok(())
}

/// Launch one rank of this binary in worker mode
///
/// The child gets the resolved experiment values as flags so it runs the same
/// experiment even when values came from the config file. Ranges have no
/// flags, so the config file is forwarded too.
fn launch_rank(rank: usize, coordinator: &str, cli: &Cli, config: &Config) -> Result<Child> {
    let exe_path = std::env::current_exe().context("Failed to get current executable path")?;

    let mut cmd = Command::new(&exe_path);
    cmd.arg("--mode").arg("worker");
    cmd.arg("--rank").arg(rank.to_string());
    cmd.arg("--workers").arg(config.workers.count.to_string());
    cmd.arg("--coordinator").arg(coordinator);

    if let Some(ref path) = cli.config {
        cmd.arg("--config").arg(path);
    }
    cmd.arg(format!("--n={}", config.experiment.trials));
    cmd.arg(format!("--mass={}", config.experiment.mass_kg));
    cmd.arg(format!("--capDays={}", config.experiment.cap_days));
    cmd.arg("--seed").arg(config.experiment.seed.to_string());

    cmd.arg("--engine").arg(config.engine.kind.to_string());
    cmd.arg("--engine-path").arg(&config.engine.executable);
    cmd.arg("--work-dir").arg(&config.engine.work_dir);
    if config.engine.accept_nonzero_exit {
        cmd.arg("--accept-nonzero-exit");
    }
    if config.runtime.debug {
        cmd.arg("--debug");
    }

    // Children share our stdout and stderr: rank lines stay on the console
    let child = cmd
        .spawn()
        .with_context(|| format!("Failed to spawn rank {}", rank))?;
    tracing::debug!(rank, pid = child.id(), coordinator, "rank launched");

    Ok(child)
}

/// Kill ranks that were already started when a launch fails
fn cleanup_ranks(children: Vec<(usize, Child)>) {
    for (rank, mut child) in children {
        match child.try_wait() {
            Ok(Some(status)) => tracing::debug!(rank, %status, "rank already exited"),
            _ => {
                tracing::debug!(rank, "killing rank");
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }
}
