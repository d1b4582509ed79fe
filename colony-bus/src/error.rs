//! Bus errors.

/// Errors from the event bus.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("failed to connect to broker: {0}")]
    Connect(String),

    #[error("failed to provision stream {subject}: {message}")]
    Stream { subject: String, message: String },

    #[error("failed to publish to {subject}: {message}")]
    Publish { subject: String, message: String },

    #[error("failed to subscribe to {subject}: {message}")]
    Subscribe { subject: String, message: String },

    #[error("event serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("bus is closed")]
    Closed,
}
