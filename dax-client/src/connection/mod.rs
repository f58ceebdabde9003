//! Cluster connections and their pool.

#[allow(clippy::module_inception)]
mod connection;
mod pool;

pub use connection::{Connection, ConnectionId, AUTH_REFRESH_INTERVAL};
pub(crate) use connection::ConnectionSettings;
pub use pool::{ConnectionPool, PoolLease};
