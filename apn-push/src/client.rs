//! Frame delivery over pooled gateway connections.
//!
//! The gateway never acknowledges success. After each write the client waits
//! briefly for a six-byte error response; silence means the notification was
//! accepted. Socket faults break the connection, and the same frame is retried
//! on a connection checked out afresh, up to `max_retries` times.

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::connection::Connection;
use crate::frame::{ERROR_RESPONSE_LEN, EncodedFrame, ErrorResponse};
use crate::pool::ConnectionPool;
use crate::{PushError, Result};

/// Default retries after the initial attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default wait for an error response after each write.
pub const DEFAULT_ERROR_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Outcome of a successful delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// Attempts made, the successful one included.
    pub attempts: u32,
    /// Connections rebuilt after a failed attempt.
    pub reconnects: u32,
}

/// What the gateway sent back within the error-read window.
enum Reply {
    Silence,
    Closed(std::io::Error),
    Partial(usize),
    Response([u8; ERROR_RESPONSE_LEN]),
}

/// Sends encoded frames through a [`ConnectionPool`].
#[derive(Debug, Clone)]
pub struct DeliveryClient {
    pool: ConnectionPool,
    max_retries: u32,
    error_read_timeout: Duration,
}

impl DeliveryClient {
    /// Create a client with default retry settings.
    pub fn new(pool: ConnectionPool) -> Self {
        Self {
            pool,
            max_retries: DEFAULT_MAX_RETRIES,
            error_read_timeout: DEFAULT_ERROR_READ_TIMEOUT,
        }
    }

    /// Set the number of retries after the initial attempt.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set how long to wait for an error response.
    pub fn with_error_read_timeout(mut self, timeout: Duration) -> Self {
        self.error_read_timeout = timeout;
        self
    }

    /// The underlying pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Retries after the initial attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Deliver `frame`, checking out a connection for each attempt.
    ///
    /// A broken connection is discarded when its attempt ends, so a retry
    /// runs on a newly established one. Connect failures and socket faults
    /// use up the retry budget; any other error is returned at once.
    pub async fn deliver(&self, frame: &EncodedFrame) -> Result<Delivery> {
        let max_attempts = self.max_retries + 1;
        let mut reconnects = 0;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let outcome = match self.pool.acquire().await {
                Ok(mut conn) => {
                    if attempt > 1 && conn.is_fresh() {
                        reconnects += 1;
                    }
                    self.push(&mut conn, frame).await.map(|()| conn.id())
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok(connection) => {
                    debug!(
                        connection,
                        token = %frame.token(),
                        attempt,
                        bytes = frame.total_size(),
                        "Notification delivered"
                    );
                    return Ok(Delivery {
                        attempts: attempt,
                        reconnects,
                    });
                }
                Err(e) if e.is_retryable() => {
                    warn!(
                        attempt,
                        max_attempts,
                        error = %e,
                        "Transient delivery failure"
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(PushError::DeliveryFailed {
            attempts: max_attempts,
            source: Box::new(last_error.unwrap_or_else(|| {
                PushError::Connection("no delivery attempt was made".into())
            })),
        })
    }

    /// Write `frame` once on a connection the caller holds and wait for an
    /// error response.
    ///
    /// Any failure leaves the connection broken.
    pub async fn push(&self, conn: &mut Connection, frame: &EncodedFrame) -> Result<()> {
        conn.ensure_established().await?;

        let stream = conn.stream()?;
        let written = async {
            stream.write_all(frame.as_bytes()).await?;
            stream.flush().await
        }
        .await;
        if let Err(e) = written {
            conn.mark_broken();
            return Err(PushError::Transient(e));
        }

        match self.read_reply(conn).await? {
            Reply::Silence => Ok(()),
            Reply::Response(bytes) => {
                // The gateway closes the socket after an error response.
                conn.mark_broken();
                let response = ErrorResponse::decode(&bytes);
                error!(
                    connection = conn.id(),
                    token = %frame.token(),
                    command = response.command,
                    status = %response.status,
                    identifier = response.identifier,
                    "Gateway rejected notification"
                );
                Err(PushError::GatewayRejected {
                    command: response.command,
                    status: response.status,
                    identifier: response.identifier,
                })
            }
            Reply::Closed(e) => {
                conn.mark_broken();
                warn!(
                    connection = conn.id(),
                    error = %e,
                    "Gateway closed the connection without an error response"
                );
                Ok(())
            }
            Reply::Partial(received) => {
                // The rest of the response would corrupt the next read.
                conn.mark_broken();
                warn!(
                    connection = conn.id(),
                    token = %frame.token(),
                    received,
                    "Truncated gateway error response"
                );
                Err(PushError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("gateway sent {received} of {ERROR_RESPONSE_LEN} error response bytes"),
                )))
            }
        }
    }

    /// Collect up to one error response before the read window closes.
    ///
    /// Bytes are accumulated across reads, so a timeout never loses data
    /// already taken off the stream.
    async fn read_reply(&self, conn: &mut Connection) -> Result<Reply> {
        let deadline = Instant::now() + self.error_read_timeout;
        let stream = conn.stream()?;
        let mut response = [0u8; ERROR_RESPONSE_LEN];
        let mut filled = 0;

        while filled < ERROR_RESPONSE_LEN {
            let read = tokio::time::timeout_at(deadline, stream.read(&mut response[filled..])).await;
            match read {
                Err(_) if filled == 0 => return Ok(Reply::Silence),
                Err(_) => return Ok(Reply::Partial(filled)),
                Ok(Ok(0)) if filled == 0 => {
                    return Ok(Reply::Closed(std::io::ErrorKind::UnexpectedEof.into()));
                }
                Ok(Ok(0)) => return Ok(Reply::Partial(filled)),
                Ok(Ok(n)) => filled += n,
                Ok(Err(e)) if filled == 0 => return Ok(Reply::Closed(e)),
                Ok(Err(_)) => return Ok(Reply::Partial(filled)),
            }
        }

        Ok(Reply::Response(response))
    }
}
