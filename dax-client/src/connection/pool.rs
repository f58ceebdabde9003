//! Connection pool with round-robin endpoint fan-out.
//!
//! The pool hands out exclusive leases. A `get` scans held connections in
//! insertion order and returns the first healthy, unoccupied one, which
//! biases traffic onto the earliest-created sockets; only when none is
//! available does it dial the next endpoint in round-robin order, bounded
//! per endpoint. Connections reported bad sit in quarantine for a grace
//! window before their sockets are dropped.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, OwnedMutexGuard};

use dax_core::{DaxError, Result};

use crate::config::Config;
use crate::endpoint::Endpoint;
use crate::signer::RequestSigner;

use super::connection::{Connection, ConnectionId, ConnectionSettings};

/// How long a bad connection is quarantined before disposal.
const BAD_CONNECTION_WINDOW: Duration = Duration::from_secs(30);

struct PooledEntry {
    id: ConnectionId,
    endpoint: Endpoint,
    conn: Arc<Mutex<Connection>>,
}

struct PoolInner {
    /// Insertion-ordered; the scan in `get` depends on it.
    active: Vec<PooledEntry>,
    quarantined: Vec<(PooledEntry, Instant)>,
}

/// An exclusive lease on one pooled connection.
///
/// Holding the lease is what guarantees a single operation per connection
/// at a time; auth frames and their follow-up request run under one lease.
pub struct PoolLease {
    guard: OwnedMutexGuard<Connection>,
    id: ConnectionId,
    endpoint: Endpoint,
}

impl std::fmt::Debug for PoolLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolLease")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl PoolLease {
    /// Returns the leased connection's id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the endpoint the leased connection is attached to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl Deref for PoolLease {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.guard
    }
}

impl DerefMut for PoolLease {
    fn deref_mut(&mut self) -> &mut Connection {
        &mut self.guard
    }
}

/// Pool of connections across the configured endpoints.
pub struct ConnectionPool {
    endpoints: Vec<Endpoint>,
    settings: ConnectionSettings,
    signer: Arc<dyn RequestSigner>,
    max_per_endpoint: usize,
    inner: Mutex<PoolInner>,
    round_robin: AtomicUsize,
    closed: AtomicBool,
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("endpoints", &self.endpoints)
            .field("max_per_endpoint", &self.max_per_endpoint)
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish()
    }
}

impl ConnectionPool {
    /// Creates a pool over the configuration's endpoints.
    pub fn new(config: &Config) -> Self {
        Self {
            endpoints: config.endpoints().to_vec(),
            settings: ConnectionSettings {
                connect_timeout: config.connect_timeout(),
                request_timeout: config.request_timeout(),
                idle_timeout: config.idle_timeout(),
                skip_hostname_verification: config.skip_hostname_verification(),
                user_agent: config.user_agent().to_string(),
            },
            signer: config.signer(),
            max_per_endpoint: config.max_pending_connections_per_host(),
            inner: Mutex::new(PoolInner {
                active: Vec::new(),
                quarantined: Vec::new(),
            }),
            round_robin: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Leases a healthy connection, creating one when necessary.
    ///
    /// Fails with `PoolClosed` after [`close`](Self::close), `NoEndpoints`
    /// when none are configured, and `PoolExhausted` when the chosen
    /// endpoint is at its connection cap.
    pub async fn get(&self) -> Result<PoolLease> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DaxError::PoolClosed);
        }

        let mut inner = self.inner.lock().await;
        inner
            .quarantined
            .retain(|(_, since)| since.elapsed() < BAD_CONNECTION_WINDOW);

        // Dispose of connections that died or idled out, keeping the scan
        // below cheap and the insertion order meaningful.
        let mut index = 0;
        while index < inner.active.len() {
            let usable = match inner.active[index].conn.clone().try_lock_owned() {
                Ok(guard) => guard.is_connected() && !guard.is_idle(),
                // Locked means in use, which is as healthy as it gets.
                Err(_) => true,
            };
            if usable {
                index += 1;
            } else {
                inner.active.remove(index);
            }
        }

        for entry in &inner.active {
            if let Ok(guard) = entry.conn.clone().try_lock_owned() {
                return Ok(PoolLease {
                    guard,
                    id: entry.id,
                    endpoint: entry.endpoint.clone(),
                });
            }
        }

        if self.endpoints.is_empty() {
            return Err(DaxError::NoEndpoints);
        }

        // The cursor advances even when the connect below fails, so a dead
        // endpoint does not capture the rotation.
        let cursor = self.round_robin.fetch_add(1, Ordering::AcqRel);
        let endpoint = self.endpoints[cursor % self.endpoints.len()].clone();

        let live = inner
            .active
            .iter()
            .filter(|entry| entry.endpoint == endpoint)
            .count();
        if live >= self.max_per_endpoint {
            return Err(DaxError::PoolExhausted(endpoint.to_string()));
        }

        let connection =
            Connection::connect(endpoint.clone(), &self.settings, Arc::clone(&self.signer))
                .await?;
        let id = connection.id();
        tracing::debug!(id = %id, endpoint = %endpoint, "pool created connection");

        let conn = Arc::new(Mutex::new(connection));
        let guard = conn
            .clone()
            .try_lock_owned()
            .expect("freshly created connection has no other users");
        inner.active.push(PooledEntry {
            id,
            endpoint: endpoint.clone(),
            conn,
        });

        Ok(PoolLease {
            guard,
            id,
            endpoint,
        })
    }

    /// Quarantines a connection whose wire state is no longer trusted.
    ///
    /// The lease is consumed; the connection will not be handed out again
    /// and its socket is dropped once the grace window lapses (or at pool
    /// close).
    pub async fn mark_bad(&self, lease: PoolLease) {
        let id = lease.id;
        let endpoint = lease.endpoint.clone();
        drop(lease);

        let mut inner = self.inner.lock().await;
        if let Some(position) = inner.active.iter().position(|entry| entry.id == id) {
            let entry = inner.active.remove(position);
            inner.quarantined.push((entry, Instant::now()));
            tracing::warn!(id = %id, endpoint = %endpoint, "connection marked bad");
        }
    }

    /// Returns the number of active connections to `endpoint`.
    pub async fn connection_count_to(&self, endpoint: &Endpoint) -> usize {
        self.inner
            .lock()
            .await
            .active
            .iter()
            .filter(|entry| entry.endpoint == *endpoint)
            .count()
    }

    /// Returns the total number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.inner.lock().await.active.len()
    }

    /// Returns `true` once the pool has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Closes the pool and every connection it holds. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut inner = self.inner.lock().await;
        let mut drained: Vec<PooledEntry> = inner.active.drain(..).collect();
        drained.extend(inner.quarantined.drain(..).map(|(entry, _)| entry));
        drop(inner);

        for entry in drained {
            let mut conn = entry.conn.lock().await;
            conn.close().await;
        }
        tracing::debug!("connection pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::{Credentials, SigV4Signer};
    use tokio::net::TcpListener;

    async fn spawn_listener() -> (Endpoint, tokio::task::JoinHandle<usize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let mut sockets = Vec::new();
            loop {
                match listener.accept().await {
                    Ok((socket, _)) => sockets.push(socket),
                    Err(_) => break,
                }
            }
            sockets.len()
        });
        (
            Endpoint::new(crate::endpoint::Scheme::Plain, "127.0.0.1", port),
            handle,
        )
    }

    fn config_for(endpoints: &[Endpoint], max_per_host: usize) -> Config {
        let urls: Vec<String> = endpoints.iter().map(|e| e.to_string()).collect();
        Config::builder()
            .endpoints(urls)
            .credentials(Arc::new(SigV4Signer::new(
                Credentials::new("AKID", "secret"),
                "us-east-1",
            )))
            .max_pending_connections_per_host(max_per_host)
            .connect_timeout(Duration::from_secs(1))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_creates_then_reuses() {
        let (endpoint, _server) = spawn_listener().await;
        let pool = ConnectionPool::new(&config_for(&[endpoint.clone()], 10));

        let first_id = {
            let lease = pool.get().await.unwrap();
            lease.id()
        };
        assert_eq!(pool.connection_count().await, 1);

        // The lease was dropped; the same connection is reused.
        let lease = pool.get().await.unwrap();
        assert_eq!(lease.id(), first_id);
        assert_eq!(pool.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_leases_spawn_new_connections() {
        let (endpoint, _server) = spawn_listener().await;
        let pool = ConnectionPool::new(&config_for(&[endpoint.clone()], 10));

        let a = pool.get().await.unwrap();
        let b = pool.get().await.unwrap();

        assert_ne!(a.id(), b.id());
        assert_eq!(pool.connection_count_to(&endpoint).await, 2);
    }

    #[tokio::test]
    async fn test_per_endpoint_cap() {
        let (endpoint, _server) = spawn_listener().await;
        let pool = ConnectionPool::new(&config_for(&[endpoint.clone()], 2));

        let _a = pool.get().await.unwrap();
        let _b = pool.get().await.unwrap();
        let err = pool.get().await.unwrap_err();

        assert!(matches!(err, DaxError::PoolExhausted(_)));
        assert_eq!(pool.connection_count_to(&endpoint).await, 2);
    }

    #[tokio::test]
    async fn test_round_robin_fairness() {
        let (a, _sa) = spawn_listener().await;
        let (b, _sb) = spawn_listener().await;
        let (c, _sc) = spawn_listener().await;
        let endpoints = [a.clone(), b.clone(), c.clone()];
        let pool = ConnectionPool::new(&config_for(&endpoints, 10));

        // Hold every lease so each get dials a fresh endpoint.
        let mut leases = Vec::new();
        for _ in 0..6 {
            leases.push(pool.get().await.unwrap());
        }

        for endpoint in &endpoints {
            assert_eq!(pool.connection_count_to(endpoint).await, 2, "{}", endpoint);
        }
    }

    #[tokio::test]
    async fn test_no_endpoints() {
        let config = Config::builder()
            .endpoints(["dax://unused.example.com"])
            .credentials(Arc::new(SigV4Signer::new(
                Credentials::new("AKID", "secret"),
                "us-east-1",
            )))
            .build()
            .unwrap();
        let mut pool = ConnectionPool::new(&config);
        pool.endpoints.clear();

        let err = pool.get().await.unwrap_err();
        assert!(matches!(err, DaxError::NoEndpoints));
    }

    #[tokio::test]
    async fn test_mark_bad_removes_from_rotation() {
        let (endpoint, _server) = spawn_listener().await;
        let pool = ConnectionPool::new(&config_for(&[endpoint.clone()], 10));

        let lease = pool.get().await.unwrap();
        let bad_id = lease.id();
        pool.mark_bad(lease).await;

        assert_eq!(pool.connection_count().await, 0);
        let lease = pool.get().await.unwrap();
        assert_ne!(lease.id(), bad_id);
    }

    #[tokio::test]
    async fn test_close_then_get_fails() {
        let (endpoint, _server) = spawn_listener().await;
        let pool = ConnectionPool::new(&config_for(&[endpoint.clone()], 10));

        let lease = pool.get().await.unwrap();
        drop(lease);

        pool.close().await;
        pool.close().await;
        assert!(pool.is_closed());
        assert_eq!(pool.connection_count().await, 0);

        let err = pool.get().await.unwrap_err();
        assert!(matches!(err, DaxError::PoolClosed));
    }

    #[tokio::test]
    async fn test_dead_connection_is_swept() {
        let (endpoint, _server) = spawn_listener().await;
        let pool = ConnectionPool::new(&config_for(&[endpoint.clone()], 10));

        {
            let mut lease = pool.get().await.unwrap();
            lease.close().await;
        }
        assert_eq!(pool.connection_count().await, 1);

        // The sweep inside get drops the closed connection and dials anew.
        let lease = pool.get().await.unwrap();
        assert!(lease.is_connected());
        assert_eq!(pool.connection_count().await, 1);
    }

    #[test]
    fn test_pool_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ConnectionPool>();
    }
}
