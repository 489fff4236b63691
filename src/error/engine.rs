//! Audio engine errors.

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The output device or engine instance could not be created.
    #[error("failed to create audio engine: {0}")]
    Init(String),

    /// Opening or decoding the media item failed.
    #[error("failed to load '{item_id}': {reason}")]
    Load { item_id: String, reason: String },

    #[error("seek to {position_ms}ms failed: {reason}")]
    Seek { position_ms: u64, reason: String },

    /// The instance was used after `release`.
    #[error("audio engine already released")]
    Released,
}

impl EngineError {
    pub fn load(item_id: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        EngineError::Load {
            item_id: item_id.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_display() {
        let err = EngineError::load("abc", "no such file");
        assert_eq!(err.to_string(), "failed to load 'abc': no such file");
    }
}
