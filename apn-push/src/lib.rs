//! # APN Push
//!
//! Apple push notifications over the binary gateway protocol.
//!
//! ## Features
//!
//! - **Payload encoding**: validated JSON payloads with optional alert truncation
//! - **Frame codec**: legacy (1-byte length) and extended (2-byte length) frames
//! - **Persistent connections**: a bounded pool of mutually-authenticated TLS connections
//! - **Retries**: transport faults rebuild the connection and resend, a bounded number of times
//! - **Feedback**: read and cache the list of devices to prune
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use apn_push::{GatewayConfig, NotificationOptions, PushService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GatewayConfig::new("/etc/apn/apn_production.pem");
//!     let service = PushService::from_config(&config)?;
//!
//!     let options = NotificationOptions::alert_only("Hello!").badge(1).default_sound();
//!     service
//!         .notify("2589b1aa 363d23d8 d7f16695 1a9e3ff4 1fb0130a 637d6997 a2080d88 1b2a19b5", options)
//!         .await?;
//!
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Feedback
//!
//! ```rust,ignore
//! for item in service.fetch_feedback(false).await? {
//!     println!("{} unregistered at {}", item.token, item.timestamp);
//! }
//! ```

mod client;
mod config;
mod connection;
mod error;
mod feedback;
mod frame;
mod notification;
mod payload;
mod pool;
mod service;
mod tls;
mod token;

pub use client::{DEFAULT_ERROR_READ_TIMEOUT, DEFAULT_MAX_RETRIES, Delivery, DeliveryClient};
pub use config::{CertificateSource, Environment, GatewayConfig};
pub use connection::{Connection, ConnectionState, Connector, GatewayStream};
pub use error::{PushError, Result};
pub use feedback::{FEEDBACK_RECORD_LEN, FeedbackItem, FeedbackReader};
pub use frame::{
    ERROR_RESPONSE_LEN, EncodedFrame, ErrorResponse, GatewayStatus, NOTIFICATION_COMMAND,
    ProtocolVersion,
};
pub use notification::{Alert, Notification, NotificationOptions, Sound};
pub use payload::PayloadEncoder;
pub use pool::{ConnectionPool, PoolConfig, PooledConnection};
pub use service::PushService;
pub use tls::{ClientIdentity, TlsConnector, client_config};
pub use token::{DeviceToken, TOKEN_LEN, normalize as normalize_token};

/// Prelude for common imports.
///
/// ```
/// use apn_push::prelude::*;
/// ```
pub mod prelude {
    pub use crate::client::{Delivery, DeliveryClient};
    pub use crate::config::{Environment, GatewayConfig};
    pub use crate::error::{PushError, Result};
    pub use crate::feedback::FeedbackItem;
    pub use crate::frame::{EncodedFrame, ProtocolVersion};
    pub use crate::notification::{Alert, Notification, NotificationOptions, Sound};
    pub use crate::payload::PayloadEncoder;
    pub use crate::service::PushService;
    pub use crate::token::DeviceToken;
}
