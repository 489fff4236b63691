//! Top-level error surfaced by the binary.

use super::{ConfigError, EngineError, QueueStoreError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("audio engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("queue persistence error: {0}")]
    QueueStore(#[from] QueueStoreError),

    /// The orchestrator actor is gone.
    #[error("player is not running")]
    PlayerClosed,

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(err.to_string().contains("I/O error"));
        assert_eq!(AppError::PlayerClosed.to_string(), "player is not running");
    }

    #[test]
    fn test_error_chain() {
        use std::error::Error;
        let err = AppError::from(ConfigError::UnknownKey("nope".to_owned()));
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.source().is_some());

        assert!(AppError::PlayerClosed.source().is_none());
    }
}
