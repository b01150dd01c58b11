//! Gateway connections and their lifecycle.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::{PushError, Result};

/// A bidirectional byte stream to the gateway, TLS in production.
pub trait GatewayStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> GatewayStream for T {}

/// Establishes streams to one endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new stream, handshake included.
    async fn connect(&self) -> Result<Box<dyn GatewayStream>>;

    /// `host:port` for logging.
    fn endpoint(&self) -> String;
}

/// Lifecycle of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never connected.
    Unconnected,
    /// Handshake in progress.
    Connecting,
    /// Ready for writes.
    Established,
    /// Failed; must be rebuilt before the next use.
    Broken,
}

/// One pool slot's connection to the gateway.
///
/// A broken connection is never written to again: its stream is dropped as
/// soon as a fault is seen and a fresh one is opened on the next use.
pub struct Connection {
    id: u64,
    state: ConnectionState,
    stream: Option<Box<dyn GatewayStream>>,
    connector: Arc<dyn Connector>,
    establish_count: u32,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("endpoint", &self.connector.endpoint())
            .field("establish_count", &self.establish_count)
            .finish()
    }
}

impl Connection {
    /// Create an unconnected slot.
    pub fn new(id: u64, connector: Arc<dyn Connector>) -> Self {
        Self {
            id,
            state: ConnectionState::Unconnected,
            stream: None,
            connector,
            establish_count: 0,
        }
    }

    /// Slot identifier, stable across reconnects.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the stream is usable.
    pub fn is_established(&self) -> bool {
        self.state == ConnectionState::Established
    }

    /// How many times a stream has been opened for this slot.
    pub fn establish_count(&self) -> u32 {
        self.establish_count
    }

    /// Open the stream unless it is already established.
    ///
    /// Returns whether a new stream was opened.
    pub async fn ensure_established(&mut self) -> Result<bool> {
        if self.is_established() && self.stream.is_some() {
            return Ok(false);
        }
        self.establish().await.map(|()| true)
    }

    /// Tear down any existing stream and open a new one.
    pub async fn establish(&mut self) -> Result<()> {
        self.stream = None;
        self.state = ConnectionState::Connecting;

        match self.connector.connect().await {
            Ok(stream) => {
                self.stream = Some(stream);
                self.state = ConnectionState::Established;
                self.establish_count += 1;
                info!(
                    connection = self.id,
                    endpoint = %self.connector.endpoint(),
                    "Connection established"
                );
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Broken;
                warn!(
                    connection = self.id,
                    endpoint = %self.connector.endpoint(),
                    error = %e,
                    "Failed to establish connection"
                );
                Err(match e {
                    PushError::Connection(_) | PushError::Certificate(_) => e,
                    other => PushError::Connection(other.to_string()),
                })
            }
        }
    }

    /// Drop the stream after a fault.
    pub fn mark_broken(&mut self) {
        if self.stream.take().is_some() {
            debug!(connection = self.id, "Connection marked broken");
        }
        self.state = ConnectionState::Broken;
    }

    /// Shut the stream down cleanly.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!(connection = self.id, error = %e, "Error closing connection");
            }
            info!(connection = self.id, "Connection closed");
        }
        self.state = ConnectionState::Unconnected;
    }

    /// The live stream.
    pub fn stream(&mut self) -> Result<&mut (dyn GatewayStream + 'static)> {
        match (self.state, self.stream.as_deref_mut()) {
            (ConnectionState::Established, Some(stream)) => Ok(stream),
            _ => Err(PushError::Connection(format!(
                "connection {} is not established",
                self.id
            ))),
        }
    }
}
