//! Store errors.

/// Errors from the key-value layer and the typed stores above it.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to connect to key-value store: {0}")]
    Connect(String),

    #[error("key-value operation failed: {0}")]
    Kv(String),

    #[error("no row for key {key}")]
    Missing { key: String },

    #[error("failed to encode row: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        Self::Kv(err.to_string())
    }
}
