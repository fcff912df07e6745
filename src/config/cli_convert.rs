//! CLI to Config conversion utilities

use crate::config::cli;
use crate::config::experiment;

/// Convert CLI EngineType to experiment EngineKind
pub fn convert_engine_type(cli_type: cli::EngineType) -> experiment::EngineKind {
    match cli_type {
        cli::EngineType::Gmat => experiment::EngineKind::Gmat,
        cli::EngineType::Mock => experiment::EngineKind::Mock,
    }
}

/// Convert CLI ExecutionMode to experiment RunMode
pub fn convert_execution_mode(mode: cli::ExecutionMode) -> experiment::RunMode {
    match mode {
        cli::ExecutionMode::Threads => experiment::RunMode::Threads,
        cli::ExecutionMode::Launch => experiment::RunMode::Launch,
        cli::ExecutionMode::Worker => experiment::RunMode::Worker,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_engine_type() {
        assert_eq!(convert_engine_type(cli::EngineType::Gmat), experiment::EngineKind::Gmat);
        assert_eq!(convert_engine_type(cli::EngineType::Mock), experiment::EngineKind::Mock);
    }

    #[test]
    fn test_convert_execution_mode() {
        assert_eq!(
            convert_execution_mode(cli::ExecutionMode::Worker),
            experiment::RunMode::Worker
        );
    }
}
