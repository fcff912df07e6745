//! Experiment definition structures

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed interval a trial parameter is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    pub min: f64,
    pub max: f64,
}

impl ParameterRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Map a unit sample `u` in [0,1) affinely onto this range
    #[inline]
    pub fn map(&self, u: f64) -> f64 {
        self.min + (self.max - self.min) * u
    }
}

impl fmt::Display for ParameterRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.min, self.max)
    }
}

/// Sampling ranges for the three varied trial parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterRanges {
    /// Initial altitude (km)
    #[serde(default = "default_altitude")]
    pub altitude_km: ParameterRange,
    /// Drag coefficient
    #[serde(default = "default_drag")]
    pub drag_coefficient: ParameterRange,
    /// Area-to-mass ratio (m^2/kg)
    #[serde(default = "default_area_to_mass")]
    pub area_to_mass: ParameterRange,
}

fn default_altitude() -> ParameterRange {
    ParameterRange::new(500.0, 1000.0)
}

fn default_drag() -> ParameterRange {
    ParameterRange::new(2.0, 2.6)
}

fn default_area_to_mass() -> ParameterRange {
    ParameterRange::new(0.005, 0.05)
}

impl Default for ParameterRanges {
    fn default() -> Self {
        Self {
            altitude_km: default_altitude(),
            drag_coefficient: default_drag(),
            area_to_mass: default_area_to_mass(),
        }
    }
}

/// Propagation engine backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// GMAT console subprocess
    Gmat,
    /// In-process stand-in that writes synthetic reports
    Mock,
}

impl Default for EngineKind {
    fn default() -> Self {
        Self::Gmat
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Gmat => write!(f, "gmat"),
            EngineKind::Mock => write!(f, "mock"),
        }
    }
}

/// How the worker set is realized
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// All ranks as threads of this process
    Threads,
    /// Spawn one child process per rank on localhost
    Launch,
    /// This process is a single rank of a multi-process run
    Worker,
}

impl Default for RunMode {
    fn default() -> Self {
        Self::Threads
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Threads => write!(f, "threads"),
            RunMode::Launch => write!(f, "launch"),
            RunMode::Worker => write!(f, "worker"),
        }
    }
}
