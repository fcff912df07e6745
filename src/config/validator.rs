//! Configuration validation

use super::*;
use anyhow::Result;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_experiment(&config.experiment)?;
    validate_ranges(&config.ranges)?;
    validate_engine(&config.engine)?;
    validate_workers(&config.workers)?;

    Ok(())
}

/// Validate experiment parameters
pub fn validate_experiment(experiment: &ExperimentConfig) -> Result<()> {
    if !experiment.mass_kg.is_finite() || experiment.mass_kg <= 0.0 {
        anyhow::bail!("mass must be a positive number of kg, got {}", experiment.mass_kg);
    }

    if !experiment.cap_days.is_finite() || experiment.cap_days <= 0.0 {
        anyhow::bail!("capDays must be a positive number of days, got {}", experiment.cap_days);
    }

    if experiment.trials.checked_add(experiment.seed).is_none() {
        tracing::warn!(
            seed = experiment.seed,
            trials = experiment.trials,
            "seed + trial index wraps around; late trials reuse early seeds"
        );
    }

    Ok(())
}

/// Validate sampling ranges
pub fn validate_ranges(ranges: &ParameterRanges) -> Result<()> {
    validate_range(&ranges.altitude_km, "altitude_km")?;
    validate_range(&ranges.drag_coefficient, "drag_coefficient")?;
    validate_range(&ranges.area_to_mass, "area_to_mass")?;

    if ranges.altitude_km.min <= crate::engine::script::DECAY_ALTITUDE_KM {
        anyhow::bail!(
            "altitude_km.min ({}) must be above the decay altitude ({} km)",
            ranges.altitude_km.min,
            crate::engine::script::DECAY_ALTITUDE_KM
        );
    }

    if ranges.area_to_mass.min <= 0.0 {
        anyhow::bail!("area_to_mass.min must be positive, got {}", ranges.area_to_mass.min);
    }

    Ok(())
}

fn validate_range(range: &ParameterRange, name: &str) -> Result<()> {
    if !range.min.is_finite() || !range.max.is_finite() {
        anyhow::bail!("{} bounds must be finite, got {}", name, range);
    }
    if range.min > range.max {
        anyhow::bail!("{}: min ({}) must not exceed max ({})", name, range.min, range.max);
    }
    Ok(())
}

/// Validate engine configuration
pub fn validate_engine(engine: &EngineConfig) -> Result<()> {
    if engine.kind == EngineKind::Gmat && engine.executable.as_os_str().is_empty() {
        anyhow::bail!("engine executable path must not be empty");
    }

    if engine.work_dir.exists() && !engine.work_dir.is_dir() {
        anyhow::bail!("work dir {} is not a directory", engine.work_dir.display());
    }

    Ok(())
}

/// Validate worker configuration
pub fn validate_workers(workers: &WorkerConfig) -> Result<()> {
    if workers.count == 0 {
        anyhow::bail!("worker count must be at least 1");
    }

    match workers.mode {
        RunMode::Worker => {
            let rank = workers
                .rank
                .ok_or_else(|| anyhow::anyhow!("worker mode requires --rank"))?;
            if rank >= workers.count {
                anyhow::bail!("rank {} out of range for {} workers", rank, workers.count);
            }
            if workers.coordinator.trim().is_empty() {
                anyhow::bail!("worker mode requires a coordinator address");
            }
        }
        RunMode::Threads | RunMode::Launch => {
            if workers.rank.is_some() {
                anyhow::bail!("rank is only meaningful in worker mode");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let mut config = Config::default();
        config.workers.count = 4;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_zero_trials_is_valid() {
        let mut config = Config::default();
        config.experiment.trials = 0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_mass() {
        let mut experiment = ExperimentConfig::default();
        experiment.mass_kg = 0.0;
        assert!(validate_experiment(&experiment).is_err());

        experiment.mass_kg = f64::NAN;
        assert!(validate_experiment(&experiment).is_err());
    }

    #[test]
    fn test_invalid_cap() {
        let mut experiment = ExperimentConfig::default();
        experiment.cap_days = -1.0;
        assert!(validate_experiment(&experiment).is_err());
    }

    #[test]
    fn test_inverted_range() {
        let mut ranges = ParameterRanges::default();
        ranges.drag_coefficient = ParameterRange::new(2.6, 2.0);
        let err = validate_ranges(&ranges).unwrap_err();
        assert!(err.to_string().contains("drag_coefficient"));
    }

    #[test]
    fn test_degenerate_range_is_valid() {
        let mut ranges = ParameterRanges::default();
        ranges.drag_coefficient = ParameterRange::new(2.2, 2.2);
        assert!(validate_ranges(&ranges).is_ok());
    }

    #[test]
    fn test_altitude_below_decay_threshold() {
        let mut ranges = ParameterRanges::default();
        ranges.altitude_km = ParameterRange::new(100.0, 600.0);
        assert!(validate_ranges(&ranges).is_err());
    }

    #[test]
    fn test_zero_workers() {
        let workers = WorkerConfig {
            count: 0,
            ..Default::default()
        };
        assert!(validate_workers(&workers).is_err());
    }

    #[test]
    fn test_worker_mode_rank_checks() {
        let mut workers = WorkerConfig {
            count: 4,
            mode: RunMode::Worker,
            ..Default::default()
        };
        assert!(validate_workers(&workers).is_err());

        workers.rank = Some(4);
        assert!(validate_workers(&workers).is_err());

        workers.rank = Some(3);
        assert!(validate_workers(&workers).is_ok());
    }
}
