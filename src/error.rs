//! Error types for the sender.

use apn_config::ConfigError;
use apn_push::PushError;
use thiserror::Error;

/// Result type for sender operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Sender errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Encoding or delivery failed.
    #[error(transparent)]
    Push(#[from] PushError),

    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No application is registered under this name.
    #[error("Unknown application: {0}")]
    UnknownApplication(String),

    /// The job queue refused a notification.
    #[error("Queue error: {0}")]
    Queue(String),

    /// A job could not be (de)serialized.
    #[error("Job serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Check if the device behind this failure should be forgotten.
    pub fn should_remove_device(&self) -> bool {
        matches!(self, Self::Push(e) if e.should_remove_device())
    }
}
