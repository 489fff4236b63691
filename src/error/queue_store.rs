//! Queue persistence errors.

#[derive(Debug, thiserror::Error)]
pub enum QueueStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The slot was written by an incompatible schema.
    #[error("incompatible snapshot version: expected {expected}, found {found}")]
    IncompatibleVersion { expected: u8, found: u8 },

    /// Moving the temp file into place failed.
    #[error("failed to replace snapshot: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl QueueStoreError {
    /// A missing slot is the normal first-start case, not corruption.
    pub fn is_missing(&self) -> bool {
        matches!(self, QueueStoreError::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_missing() {
        let err = QueueStoreError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "x"));
        assert!(err.is_missing());

        let err = QueueStoreError::IncompatibleVersion {
            expected: 1,
            found: 9,
        };
        assert!(!err.is_missing());
        assert!(err.to_string().contains("expected 1, found 9"));
    }

    #[test]
    fn test_from_serde_error() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
        let err = QueueStoreError::from(serde_err);
        assert!(matches!(err, QueueStoreError::Serde(_)));
    }
}
