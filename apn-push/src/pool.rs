//! Bounded pool of persistent gateway connections.
//!
//! Built on `bb8`. Each slot holds one [`Connection`] and is checked out
//! exclusively, so at most one notification is in flight per connection.
//! Callers that find every slot busy wait up to the configured timeout and
//! then fail with [`PushError::PoolTimeout`].
//!
//! Slots are handed out established. The stream is opened on first checkout;
//! a slot whose connection broke is discarded on return and replaced by a
//! fresh one on the next checkout.

use bb8::{ManageConnection, Pool, RunError};
use futures::future::BoxFuture;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::connection::{Connection, ConnectionState, Connector};
use crate::{PushError, Result};

/// Pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of connection slots.
    pub size: usize,
    /// Maximum wait for a free slot.
    pub timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: 1,
            timeout: Duration::from_secs(5),
        }
    }
}

/// `bb8` manager for gateway connection slots.
///
/// New slots start unconnected. [`ConnectionPool::acquire`] establishes them,
/// so a refused connect or failed handshake reaches the caller as
/// [`PushError::Connection`] instead of ending up in the pool's error sink.
pub struct GatewayManager {
    connector: Arc<dyn Connector>,
    next_id: AtomicU64,
}

impl GatewayManager {
    /// Create a manager for the endpoint behind `connector`.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            next_id: AtomicU64::new(1),
        }
    }
}

impl ManageConnection for GatewayManager {
    type Connection = Connection;
    type Error = PushError;

    async fn connect(&self) -> Result<Connection> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(connection = id, "Creating pooled connection");
        Ok(Connection::new(id, self.connector.clone()))
    }

    async fn is_valid(&self, conn: &mut Connection) -> Result<()> {
        match conn.state() {
            ConnectionState::Broken => Err(PushError::Connection(format!(
                "connection {} is broken",
                conn.id()
            ))),
            _ => Ok(()),
        }
    }

    fn has_broken(&self, conn: &mut Connection) -> bool {
        conn.state() == ConnectionState::Broken
    }
}

struct PoolInner {
    endpoint: String,
    config: PoolConfig,
    pool: RwLock<Option<Pool<GatewayManager>>>,
}

/// A fixed-size pool of gateway connections.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("endpoint", &self.inner.endpoint)
            .field("config", &self.inner.config)
            .field("available", &self.available())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ConnectionPool {
    /// Create a pool. No connection is opened until first use.
    pub fn new(connector: Arc<dyn Connector>, config: PoolConfig) -> Result<Self> {
        if config.size == 0 {
            return Err(PushError::Config("pool size must be at least 1".into()));
        }
        if config.timeout.is_zero() {
            return Err(PushError::Config("pool timeout must be positive".into()));
        }
        let max_size = u32::try_from(config.size)
            .map_err(|_| PushError::Config(format!("pool size {} is too large", config.size)))?;

        let endpoint = connector.endpoint();
        // Gateway connections are persistent: no lifetime or idle reaping.
        let pool = Pool::builder()
            .max_size(max_size)
            .connection_timeout(config.timeout)
            .max_lifetime(None)
            .idle_timeout(None)
            .build_unchecked(GatewayManager::new(connector));

        info!(
            endpoint = %endpoint,
            size = config.size,
            timeout_ms = config.timeout.as_millis() as u64,
            "Created gateway connection pool"
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                endpoint,
                config,
                pool: RwLock::new(Some(pool)),
            }),
        })
    }

    /// Pool configuration.
    pub fn config(&self) -> PoolConfig {
        self.inner.config
    }

    /// Slots not currently checked out.
    pub fn available(&self) -> usize {
        let Ok(pool) = self.pool() else {
            return 0;
        };
        let state = pool.state();
        let in_use = state.connections.saturating_sub(state.idle_connections) as usize;
        self.inner.config.size.saturating_sub(in_use)
    }

    /// Connections parked in the pool.
    pub fn idle_count(&self) -> usize {
        self.pool()
            .map(|pool| pool.state().idle_connections as usize)
            .unwrap_or(0)
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_closed(&self) -> bool {
        self.pool().is_err()
    }

    fn pool(&self) -> Result<Pool<GatewayManager>> {
        self.inner
            .pool
            .read()
            .ok()
            .and_then(|pool| pool.as_ref().cloned())
            .ok_or(PushError::PoolClosed)
    }

    /// Check out an established connection.
    ///
    /// Waits up to the pool timeout for a free slot, then opens the slot's
    /// stream if it has none. The slot goes back to the pool when the guard
    /// is dropped; a broken one is replaced.
    pub async fn acquire(&self) -> Result<PooledConnection> {
        let pool = self.pool()?;
        let mut conn = pool.get_owned().await.map_err(|e| match e {
            RunError::User(e) => e,
            RunError::TimedOut => {
                warn!(
                    endpoint = %self.inner.endpoint,
                    timeout_ms = self.inner.config.timeout.as_millis() as u64,
                    "Timed out waiting for a pooled connection"
                );
                PushError::PoolTimeout(self.inner.config.timeout)
            }
        })?;

        // On failure the slot is left broken and discarded when `conn` drops.
        let fresh = conn.ensure_established().await?;
        Ok(PooledConnection { conn, fresh })
    }

    /// Run `f` with exclusive use of an established connection.
    ///
    /// The slot is released when `f` completes, whether it succeeded or not.
    pub async fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c mut Connection) -> BoxFuture<'c, Result<T>>,
    {
        let mut conn = self.acquire().await?;
        f(&mut *conn).await
    }

    /// Stop handing out connections and close the idle ones.
    ///
    /// Connections checked out at this point are dropped when they come back.
    pub async fn shutdown(&self) {
        let pool = match self.inner.pool.write() {
            Ok(mut pool) => pool.take(),
            Err(_) => None,
        };
        let Some(pool) = pool else {
            return;
        };

        let mut idle = Vec::new();
        for _ in 0..pool.state().idle_connections {
            match pool.get_owned().await {
                Ok(conn) => idle.push(conn),
                Err(_) => break,
            }
        }
        for conn in &mut idle {
            conn.close().await;
        }

        info!(
            endpoint = %self.inner.endpoint,
            closed = idle.len(),
            "Gateway connection pool shut down"
        );
    }
}

/// Exclusive access to one established pooled connection.
pub struct PooledConnection {
    conn: bb8::PooledConnection<'static, GatewayManager>,
    fresh: bool,
}

impl PooledConnection {
    /// Whether the stream was opened by this checkout.
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("connection", &*self.conn)
            .field("fresh", &self.fresh)
            .finish()
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}
