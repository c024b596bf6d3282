//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type.
///
/// `Config` aborts game creation, `Validation` rejects a single action and
/// leaves state untouched, `Protocol` signals a caller or programming bug.
#[derive(Debug, Error)]
pub enum DomainError {
    /// No game is registered under the identifier.
    #[error("game not found: {0}")]
    GameNotFound(Uuid),

    /// The game configuration cannot produce a legal game.
    #[error("configuration error: {0}")]
    Config(String),

    /// A player action was rejected; the caller should re-prompt.
    #[error("validation error: {0}")]
    Validation(String),

    /// The caller broke the pull protocol or the content tables reference
    /// state that does not exist.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Returns `true` for errors the caller recovers from by re-submitting.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
