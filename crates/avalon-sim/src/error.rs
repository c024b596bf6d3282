//! Simulator error types.

use avalon_core::error::DomainError;
use thiserror::Error;

/// Startup and runtime errors for the simulator.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// A game could not be created or driven to its end.
    #[error("game error: {0}")]
    Domain(#[from] DomainError),
}

impl AppError {
    /// Process exit code for this error.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Domain(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_exit_with_usage_code() {
        assert_eq!(AppError::Config("AVALON_GAMES".into()).exit_code(), 2);
    }

    #[test]
    fn test_domain_errors_convert_and_keep_their_message() {
        let err: AppError = DomainError::Protocol("stuck".into()).into();
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.to_string(), "game error: protocol error: stuck");
    }
}
