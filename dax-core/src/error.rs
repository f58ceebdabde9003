//! Error types for DAX client operations.

use std::io;
use std::sync::Arc;
use thiserror::Error;

/// The main error type for DAX operations.
///
/// Covers configuration and validation failures raised before any bytes go
/// on the wire, transport and codec failures from the connection layer, and
/// errors reported by the cluster in a reply's error descriptor.
#[derive(Debug, Error, Clone)]
pub enum DaxError {
    /// Invalid client configuration (bad endpoint scheme, missing or
    /// contradictory endpoint settings, missing credentials).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Corrupt or unsupported bytes in a CBOR stream.
    #[error("malformed encoding: {0}")]
    MalformedEncoding(String),

    /// An I/O operation exceeded its deadline. The connection involved is
    /// unusable afterwards because its wire state is undefined.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The TCP or TLS connection could not be established.
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// The connection dropped mid-stream.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// The signer failed or the cluster rejected the auth frame.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// A non-zero status in a reply's error descriptor.
    #[error("server error ({status}): {message}")]
    Server {
        /// Status code from the error descriptor.
        status: i64,
        /// Error message from the server.
        message: String,
        /// Request id echoed by the server, when present.
        request_id: Option<String>,
    },

    /// A key attribute required by the cached table schema is absent.
    #[error("missing key attribute: {0}")]
    MissingKey(String),

    /// A key attribute not part of the cached table schema is present.
    #[error("extra key attribute: {0}")]
    ExtraKey(String),

    /// A parameter required by the operation is absent.
    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    /// The operation name is not part of the protocol.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// The per-endpoint connection cap was reached.
    #[error("connection pool exhausted for endpoint {0}")]
    PoolExhausted(String),

    /// The pool has no endpoints configured.
    #[error("no endpoints configured")]
    NoEndpoints,

    /// The pool has been closed.
    #[error("connection pool is closed")]
    PoolClosed,

    /// Operation on an already-closed client, pool, or connection.
    #[error("closed: {0}")]
    Closed(String),

    /// A transport or codec failure surfaced from the request path. The
    /// connection it occurred on has been marked bad.
    #[error("request failed: {0}")]
    RequestFailed(#[source] Box<DaxError>),

    /// I/O errors from the standard library (wrapped in `Arc` for `Clone`).
    #[error("I/O error: {0}")]
    Io(Arc<io::Error>),
}

impl From<io::Error> for DaxError {
    fn from(err: io::Error) -> Self {
        DaxError::Io(Arc::new(err))
    }
}

impl DaxError {
    /// Wraps a transport or codec error for propagation out of the request
    /// path. Validation errors are surfaced unchanged.
    pub fn into_request_failure(self) -> Self {
        match self {
            Self::MissingKey(_)
            | Self::ExtraKey(_)
            | Self::MissingRequiredField(_)
            | Self::UnsupportedOperation(_)
            | Self::InvalidConfig(_)
            | Self::AuthFailed(_)
            | Self::Server { .. }
            | Self::Closed(_)
            | Self::PoolExhausted(_)
            | Self::NoEndpoints
            | Self::PoolClosed
            | Self::RequestFailed(_) => self,
            other => Self::RequestFailed(Box::new(other)),
        }
    }

    /// Returns `true` if this error left its connection in an undefined
    /// wire state, meaning the connection must not be reused.
    pub fn poisons_connection(&self) -> bool {
        match self {
            Self::Timeout(_)
            | Self::ConnectionRefused(_)
            | Self::ConnectionLost(_)
            | Self::MalformedEncoding(_)
            | Self::Io(_) => true,
            Self::RequestFailed(inner) => inner.poisons_connection(),
            _ => false,
        }
    }

    /// Returns the server status code if this is a server error.
    pub fn server_status(&self) -> Option<i64> {
        match self {
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A specialized `Result` type for DAX operations.
pub type Result<T> = std::result::Result<T, DaxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_display() {
        let err = DaxError::Server {
            status: 1,
            message: "throttle".to_string(),
            request_id: None,
        };
        assert_eq!(err.to_string(), "server error (1): throttle");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused");
        let err: DaxError = io_err.into();
        assert!(matches!(err, DaxError::Io(_)));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_request_failure_wraps_transport_errors() {
        let err = DaxError::Timeout("read".to_string()).into_request_failure();
        assert!(matches!(err, DaxError::RequestFailed(_)));
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_request_failure_leaves_validation_errors() {
        let err = DaxError::MissingKey("sort".to_string()).into_request_failure();
        assert!(matches!(err, DaxError::MissingKey(_)));

        let err = DaxError::Server {
            status: 4,
            message: "bad".to_string(),
            request_id: None,
        }
        .into_request_failure();
        assert!(matches!(err, DaxError::Server { .. }));
    }

    #[test]
    fn test_poisons_connection() {
        assert!(DaxError::Timeout("t".into()).poisons_connection());
        assert!(DaxError::ConnectionLost("c".into()).poisons_connection());
        assert!(DaxError::MalformedEncoding("m".into()).poisons_connection());
        assert!(
            DaxError::RequestFailed(Box::new(DaxError::Timeout("t".into()))).poisons_connection()
        );

        assert!(!DaxError::MissingKey("k".into()).poisons_connection());
        assert!(!DaxError::PoolClosed.poisons_connection());
        let server = DaxError::Server {
            status: 1,
            message: "m".into(),
            request_id: None,
        };
        assert!(!server.poisons_connection());
    }

    #[test]
    fn test_server_status() {
        let err = DaxError::Server {
            status: 7,
            message: "m".into(),
            request_id: Some("rid".into()),
        };
        assert_eq!(err.server_status(), Some(7));
        assert_eq!(DaxError::NoEndpoints.server_status(), None);
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DaxError>();
    }

    #[test]
    fn test_error_is_clone() {
        let err = DaxError::ConnectionLost("mid-stream".to_string());
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }
}
