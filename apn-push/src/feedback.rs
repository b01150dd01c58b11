//! Feedback service reader.
//!
//! The feedback service streams fixed-size records naming devices that no
//! longer accept notifications, then closes the connection:
//!
//! ```text
//! [4 bytes timestamp, big-endian][2 bytes token length][32 bytes token]
//! ```
//!
//! Results are cached. Forcing a refetch discards the cached list, and the
//! service only reports each device once, so callers must process a batch
//! before asking for the next.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::Result;
use crate::connection::{Connector, GatewayStream};
use crate::token::TOKEN_LEN;

/// Size of one feedback record.
pub const FEEDBACK_RECORD_LEN: usize = 6 + TOKEN_LEN;

/// Default idle time after which the feedback stream is considered drained.
pub const DEFAULT_FEEDBACK_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// A device reported by the feedback service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackItem {
    /// When the gateway decided the token was invalid.
    pub timestamp: DateTime<Utc>,
    /// Lowercase hex token.
    pub token: String,
}

impl FeedbackItem {
    /// Decode one record.
    pub fn decode(record: &[u8; FEEDBACK_RECORD_LEN]) -> Self {
        let seconds = u32::from_be_bytes([record[0], record[1], record[2], record[3]]);
        let token_len = u16::from_be_bytes([record[4], record[5]]) as usize;
        let token = &record[6..6 + token_len.min(TOKEN_LEN)];

        Self {
            timestamp: DateTime::from_timestamp(i64::from(seconds), 0).unwrap_or_default(),
            token: hex::encode(token),
        }
    }
}

/// Reads and caches the feedback list.
pub struct FeedbackReader {
    connector: Arc<dyn Connector>,
    read_timeout: Duration,
    cache: Mutex<Option<Vec<FeedbackItem>>>,
}

impl std::fmt::Debug for FeedbackReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackReader")
            .field("endpoint", &self.connector.endpoint())
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

impl FeedbackReader {
    /// Create a reader for the feedback endpoint behind `connector`.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            read_timeout: DEFAULT_FEEDBACK_READ_TIMEOUT,
            cache: Mutex::new(None),
        }
    }

    /// Set the idle timeout that ends a read.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Feedback items, read from the service on first call or when `force` is set.
    pub async fn fetch(&self, force: bool) -> Result<Vec<FeedbackItem>> {
        let mut cache = self.cache.lock().await;
        if !force && let Some(items) = cache.as_ref() {
            return Ok(items.clone());
        }

        *cache = None;
        let mut stream = self.connector.connect().await?;
        let items = self.read_records(&mut stream).await;
        info!(
            endpoint = %self.connector.endpoint(),
            count = items.len(),
            "Read feedback"
        );

        *cache = Some(items.clone());
        Ok(items)
    }

    /// Just the tokens of [`fetch`](Self::fetch).
    pub async fn tokens(&self, force: bool) -> Result<Vec<String>> {
        Ok(self
            .fetch(force)
            .await?
            .into_iter()
            .map(|item| item.token)
            .collect())
    }

    /// Read records until the peer closes, goes quiet, or fails.
    async fn read_records(&self, stream: &mut Box<dyn GatewayStream>) -> Vec<FeedbackItem> {
        let mut items = Vec::new();
        let mut record = [0u8; FEEDBACK_RECORD_LEN];

        loop {
            match tokio::time::timeout(self.read_timeout, stream.read_exact(&mut record)).await {
                Ok(Ok(_)) => items.push(FeedbackItem::decode(&record)),
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Ok(Err(e)) => {
                    warn!(error = %e, "Feedback read failed, keeping records read so far");
                    break;
                }
                Err(_) => {
                    debug!("Feedback stream idle, stopping");
                    break;
                }
            }
        }
        items
    }
}
