//! Cluster endpoint addresses and their URL forms.

use std::fmt;
use std::str::FromStr;

use dax_core::{DaxError, Result};
use url::Url;

/// Default port for plaintext (`dax://`) endpoints.
pub const DEFAULT_PLAIN_PORT: u16 = 8111;
/// Default port for TLS (`daxs://`) endpoints.
pub const DEFAULT_TLS_PORT: u16 = 9111;

/// Transport scheme of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Plain TCP, `dax://`.
    Plain,
    /// TLS, `daxs://`.
    Tls,
}

impl Scheme {
    /// Returns the URL scheme string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Plain => "dax",
            Scheme::Tls => "daxs",
        }
    }

    /// Returns the default port for this scheme.
    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Plain => DEFAULT_PLAIN_PORT,
            Scheme::Tls => DEFAULT_TLS_PORT,
        }
    }
}

/// A single cluster node address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    scheme: Scheme,
    host: String,
    port: u16,
}

impl Endpoint {
    /// Creates an endpoint from its parts.
    pub fn new(scheme: Scheme, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme,
            host: host.into(),
            port,
        }
    }

    /// Parses a `dax://` or `daxs://` URL.
    ///
    /// Any other scheme is rejected with `InvalidConfig`. A missing port
    /// falls back to the scheme default (8111 plain, 9111 TLS).
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input)
            .map_err(|e| DaxError::InvalidConfig(format!("invalid endpoint URL {:?}: {}", input, e)))?;

        let scheme = match url.scheme() {
            "dax" => Scheme::Plain,
            "daxs" => Scheme::Tls,
            other => {
                return Err(DaxError::InvalidConfig(format!(
                    "unsupported endpoint scheme {:?} (expected dax:// or daxs://)",
                    other
                )))
            }
        };
        let host = url
            .host_str()
            .ok_or_else(|| {
                DaxError::InvalidConfig(format!("endpoint URL {:?} has no host", input))
            })?
            .to_string();
        let port = url.port().unwrap_or_else(|| scheme.default_port());

        Ok(Self { scheme, host, port })
    }

    /// Returns the transport scheme.
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Returns the host name.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns `true` if this endpoint uses TLS.
    pub fn is_tls(&self) -> bool {
        self.scheme == Scheme::Tls
    }

    /// Returns the `host:port` form used for socket connects.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = DaxError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme.as_str(), self.host, self.port)
    }
}
