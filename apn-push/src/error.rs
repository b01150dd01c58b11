//! Push notification error types.

use thiserror::Error;

use crate::frame::GatewayStatus;

/// Result type for push operations.
pub type Result<T> = std::result::Result<T, PushError>;

/// Push notification errors.
#[derive(Debug, Error)]
pub enum PushError {
    /// Device token is not 64 hex digits.
    #[error("Invalid device token: {0}")]
    InvalidToken(String),

    /// Notification has none of alert, badge or sound, or carries a reserved key.
    #[error("Invalid notification: {0}")]
    InvalidNotification(String),

    /// Encoded payload does not fit, even after truncation.
    #[error("Payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge {
        /// Actual size.
        size: usize,
        /// Maximum allowed size.
        limit: usize,
    },

    /// TCP connect or TLS handshake failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Recoverable socket fault while talking to the gateway.
    #[error("Transient send error: {0}")]
    Transient(#[source] std::io::Error),

    /// Retry budget exhausted.
    #[error("Delivery failed after {attempts} attempts: {source}")]
    DeliveryFailed {
        /// Number of attempts made (initial attempt included).
        attempts: u32,
        /// The error from the final attempt.
        #[source]
        source: Box<PushError>,
    },

    /// Gateway answered with an error-response frame.
    #[error("Gateway rejected notification: {status} (command {command}, identifier {identifier})")]
    GatewayRejected {
        /// Command byte of the error response.
        command: u8,
        /// Decoded status code.
        status: GatewayStatus,
        /// Notification identifier echoed by the gateway.
        identifier: u32,
    },

    /// No pool slot became available in time.
    #[error("Timed out after {0:?} waiting for a pooled connection")]
    PoolTimeout(std::time::Duration),

    /// The pool has been shut down.
    #[error("Connection pool is shut down")]
    PoolClosed,

    /// Certificate or private key could not be loaded.
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PushError {
    /// Check if this error indicates the device should be removed.
    pub fn should_remove_device(&self) -> bool {
        match self {
            Self::InvalidToken(_) => true,
            Self::GatewayRejected { status, .. } => *status == GatewayStatus::InvalidToken,
            _ => false,
        }
    }

    /// Check if this error is retryable on a fresh connection.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Transient(_))
    }

    /// Check if this error came from encoding the notification.
    ///
    /// Encoding errors are deterministic and are never retried.
    pub fn is_encoding_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidToken(_) | Self::InvalidNotification(_) | Self::PayloadTooLarge { .. }
        )
    }
}

impl From<serde_json::Error> for PushError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_retryable_classification() {
        assert!(PushError::Connection("refused".into()).is_retryable());
        assert!(PushError::Transient(io::Error::from(io::ErrorKind::BrokenPipe)).is_retryable());
        assert!(!PushError::InvalidToken("abc".into()).is_retryable());
        assert!(!PushError::PoolClosed.is_retryable());
    }

    #[test]
    fn test_should_remove_device() {
        let rejected = PushError::GatewayRejected {
            command: 8,
            status: GatewayStatus::InvalidToken,
            identifier: 0,
        };
        assert!(rejected.should_remove_device());

        let shutdown = PushError::GatewayRejected {
            command: 8,
            status: GatewayStatus::Shutdown,
            identifier: 0,
        };
        assert!(!shutdown.should_remove_device());
    }

    #[test]
    fn test_delivery_failed_message() {
        let err = PushError::DeliveryFailed {
            attempts: 3,
            source: Box::new(PushError::Transient(io::Error::from(io::ErrorKind::BrokenPipe))),
        };
        assert!(err.to_string().starts_with("Delivery failed after 3 attempts"));
    }
}
