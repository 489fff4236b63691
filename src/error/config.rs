//! Configuration store errors.

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("unknown config key: {0}")]
    UnknownKey(String),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("{0} lock poisoned")]
    Poisoned(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_value_display() {
        let err = ConfigError::InvalidValue {
            key: "player_volume".to_owned(),
            value: "loud".to_owned(),
        };
        assert_eq!(err.to_string(), "invalid value for player_volume: loud");
    }
}
