//! decaymc - Monte Carlo LEO decay study driver
//!
//! decaymc samples random low-Earth-orbit spacecraft, propagates each one
//! with an external engine (GMAT) until it decays or hits a time cap, and
//! reports the longest-lived configuration across a fixed set of ranks.
//!
//! # Architecture
//!
//! - **Deterministic trials**: trial `i` is a pure function of `seed + i`
//! - **Engine adapter**: script emission, subprocess run, two-line report parsing
//! - **Strided workers**: rank `r` of `W` runs indices `r, r+W, ...` with no coordination
//! - **Reduction**: local bests folded at rank 0, then one barrier
//! - **Backends**: threads in one process, or one process per rank over TCP

pub mod config;
pub mod coordinator;
pub mod distributed;
pub mod engine;
pub mod error;
pub mod output;
pub mod stats;
pub mod trial;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use engine::Engine;
pub use error::TrialError;

/// Result type used throughout decaymc
pub type Result<T> = anyhow::Result<T>;
