//! TOML configuration file parsing

use super::*;
use crate::config::cli::Cli;
use crate::config::cli_convert;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Build the effective configuration: file (or defaults) overlaid with CLI flags
pub fn build_config(cli: &Cli) -> Result<Config> {
    let config = match cli.config {
        Some(ref path) => parse_toml_file(path)?,
        None => Config::default(),
    };
    Ok(merge_cli_with_config(cli, config))
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Config {
    if let Some(n) = cli.n {
        config.experiment.trials = n;
    }
    if let Some(mass) = cli.mass {
        config.experiment.mass_kg = mass;
    }
    if let Some(cap) = cli.cap_days {
        config.experiment.cap_days = cap;
    }
    if let Some(seed) = cli.seed {
        config.experiment.seed = seed;
    }

    if let Some(engine) = cli.engine {
        config.engine.kind = cli_convert::convert_engine_type(engine);
    }
    if let Some(ref path) = cli.engine_path {
        config.engine.executable = path.clone();
    }
    if let Some(ref dir) = cli.work_dir {
        config.engine.work_dir = dir.clone();
    }
    if cli.accept_nonzero_exit {
        config.engine.accept_nonzero_exit = true;
    }

    if let Some(count) = cli.workers {
        config.workers.count = count;
    }
    if let Some(mode) = cli.mode {
        config.workers.mode = cli_convert::convert_execution_mode(mode);
    }
    if cli.rank.is_some() {
        config.workers.rank = cli.rank;
    }
    if let Some(ref addr) = cli.coordinator {
        config.workers.coordinator = addr.clone();
    }

    if cli.dry_run {
        config.runtime.dry_run = true;
    }
    if cli.debug {
        config.runtime.debug = true;
    }

    config
}
