//! # APN Sender
//!
//! Apple push notifications over the binary gateway protocol, with pooled
//! persistent TLS connections, several applications per process and a choice
//! of dispatch strategy.
//!
//! ## Crates
//!
//! | Crate | Purpose |
//! |-------|---------|
//! | `apn-push` | Payload encoding, frame codec, connection pool, delivery, feedback |
//! | `apn-config` | File and environment configuration |
//! | `apn-log` | `tracing` subscriber setup |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use apn_sender::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     apn_sender::log::init();
//!
//!     let config = SenderConfig::load("apn.toml")?;
//!     let apps = Arc::new(Applications::from_config(&config)?);
//!     let dispatcher = Dispatcher::from_kind(config.dispatcher, apps.clone(), None)?;
//!
//!     dispatcher
//!         .notify("<2589b1aa 363d23d8 ...>", NotificationOptions::alert_only("Hello!"))
//!         .await?;
//!
//!     apps.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Queue workers
//!
//! With `dispatcher = "queued"` the dispatcher hands each notification to a
//! [`NotificationQueue`]. Workers decode the job and run it:
//!
//! ```rust,ignore
//! let job = NotificationJob::from_json(&payload)?;
//! job.perform(&apps).await?;
//! ```

pub mod apps;
pub mod dispatch;
pub mod error;
pub mod job;

pub use apps::{Application, Applications};
pub use dispatch::{Dispatched, Dispatcher, NotificationQueue};
pub use error::{Error, Result};
pub use job::{APP_KEY, JobId, NotificationJob};

pub use apn_config as config;
pub use apn_push as push;

#[cfg(feature = "log")]
pub use apn_log as log;

/// Prelude for common imports.
///
/// ```
/// use apn_sender::prelude::*;
/// ```
pub mod prelude {
    pub use crate::apps::{Application, Applications};
    pub use crate::dispatch::{Dispatched, Dispatcher, NotificationQueue};
    pub use crate::error::{Error, Result};
    pub use crate::job::NotificationJob;

    pub use apn_config::{DispatcherKind, SenderConfig};
    pub use apn_push::prelude::*;
}
