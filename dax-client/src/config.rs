//! Client configuration and its builder.

use std::sync::Arc;
use std::time::Duration;

use dax_core::{DaxError, Result};

use crate::endpoint::Endpoint;
use crate::signer::RequestSigner;

/// Default connection establishment timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(1000);
/// Default per-read request timeout.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(60_000);
/// Default cap on live sockets per endpoint.
const DEFAULT_MAX_PENDING_CONNECTIONS_PER_HOST: usize = 10;
/// Default (future) multiplexing bound per connection.
const DEFAULT_MAX_CONCURRENT_REQUESTS_PER_CONNECTION: usize = 1000;
/// Default idle threshold for connection health.
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(30_000);
/// Default key schema cache capacity.
const DEFAULT_KEY_CACHE_SIZE: usize = 1000;
/// Default key schema cache TTL.
const DEFAULT_KEY_CACHE_TTL: Duration = Duration::from_millis(60_000);
/// Default attribute list cache capacity.
const DEFAULT_ATTR_CACHE_SIZE: usize = 1000;

/// Client configuration.
///
/// Built through [`ConfigBuilder`]; validation happens at build time so a
/// constructed `Config` is always usable.
#[derive(Clone)]
pub struct Config {
    endpoints: Vec<Endpoint>,
    region: String,
    signer: Arc<dyn RequestSigner>,
    connect_timeout: Duration,
    request_timeout: Duration,
    max_pending_connections_per_host: usize,
    max_concurrent_requests_per_connection: usize,
    idle_timeout: Duration,
    skip_hostname_verification: bool,
    key_cache_size: usize,
    key_cache_ttl: Duration,
    attr_cache_size: usize,
    debug_logging: bool,
    user_agent: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("endpoints", &self.endpoints)
            .field("region", &self.region)
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field(
                "max_pending_connections_per_host",
                &self.max_pending_connections_per_host,
            )
            .field("idle_timeout", &self.idle_timeout)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Starts a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Returns the configured endpoints.
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Returns the region the signer scopes to.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Returns the signer handle.
    pub fn signer(&self) -> Arc<dyn RequestSigner> {
        Arc::clone(&self.signer)
    }

    /// Returns the connection establishment timeout.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Returns the per-read request timeout.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Returns the cap on live sockets per endpoint.
    pub fn max_pending_connections_per_host(&self) -> usize {
        self.max_pending_connections_per_host
    }

    /// Returns the per-connection multiplexing bound.
    ///
    /// Accepted for forward compatibility; the enforced semantics remain
    /// one request at a time per connection.
    pub fn max_concurrent_requests_per_connection(&self) -> usize {
        self.max_concurrent_requests_per_connection
    }

    /// Returns the idle threshold for connection health.
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Returns `true` if TLS hostname verification is disabled.
    pub fn skip_hostname_verification(&self) -> bool {
        self.skip_hostname_verification
    }

    /// Returns the key schema cache capacity.
    pub fn key_cache_size(&self) -> usize {
        self.key_cache_size
    }

    /// Returns the key schema cache TTL.
    pub fn key_cache_ttl(&self) -> Duration {
        self.key_cache_ttl
    }

    /// Returns the attribute list cache capacity.
    pub fn attr_cache_size(&self) -> usize {
        self.attr_cache_size
    }

    /// Returns `true` if verbose per-request logging is enabled.
    pub fn debug_logging(&self) -> bool {
        self.debug_logging
    }

    /// Returns the user agent carried in the handshake and auth frames.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

/// Builder for [`Config`].
#[derive(Default)]
pub struct ConfigBuilder {
    endpoint_url: Option<String>,
    endpoints: Option<Vec<String>>,
    region: Option<String>,
    signer: Option<Arc<dyn RequestSigner>>,
    connect_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    max_pending_connections_per_host: Option<usize>,
    max_concurrent_requests_per_connection: Option<usize>,
    idle_timeout: Option<Duration>,
    skip_hostname_verification: bool,
    key_cache_size: Option<usize>,
    key_cache_ttl: Option<Duration>,
    attr_cache_size: Option<usize>,
    debug_logging: bool,
    user_agent: Option<String>,
}

impl ConfigBuilder {
    /// Sets the single cluster endpoint URL. Mutually exclusive with
    /// [`endpoints`](Self::endpoints).
    pub fn endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }

    /// Sets the cluster endpoint URLs. Mutually exclusive with
    /// [`endpoint_url`](Self::endpoint_url).
    pub fn endpoints<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints = Some(urls.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the signing region.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sets the request signer (the credentials handle).
    pub fn credentials(mut self, signer: Arc<dyn RequestSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Sets the connection establishment timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the per-read request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the cap on live sockets per endpoint.
    pub fn max_pending_connections_per_host(mut self, max: usize) -> Self {
        self.max_pending_connections_per_host = Some(max);
        self
    }

    /// Sets the per-connection multiplexing bound.
    pub fn max_concurrent_requests_per_connection(mut self, max: usize) -> Self {
        self.max_concurrent_requests_per_connection = Some(max);
        self
    }

    /// Sets the idle threshold for connection health.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Disables TLS hostname verification.
    pub fn skip_hostname_verification(mut self, skip: bool) -> Self {
        self.skip_hostname_verification = skip;
        self
    }

    /// Sets the key schema cache capacity.
    pub fn key_cache_size(mut self, size: usize) -> Self {
        self.key_cache_size = Some(size);
        self
    }

    /// Sets the key schema cache TTL.
    pub fn key_cache_ttl(mut self, ttl: Duration) -> Self {
        self.key_cache_ttl = Some(ttl);
        self
    }

    /// Sets the attribute list cache capacity.
    pub fn attr_cache_size(mut self, size: usize) -> Self {
        self.attr_cache_size = Some(size);
        self
    }

    /// Enables verbose per-request logging.
    pub fn debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = enabled;
        self
    }

    /// Overrides the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when neither or both of
    /// `endpoint_url`/`endpoints` are set, when any URL fails to parse,
    /// when the endpoint list is empty, or when no credentials are
    /// configured.
    pub fn build(self) -> Result<Config> {
        let urls = match (self.endpoint_url, self.endpoints) {
            (Some(url), None) => vec![url],
            (None, Some(urls)) => urls,
            (Some(_), Some(_)) => {
                return Err(DaxError::InvalidConfig(
                    "endpoint_url and endpoints are mutually exclusive".to_string(),
                ))
            }
            (None, None) => {
                return Err(DaxError::InvalidConfig(
                    "one of endpoint_url or endpoints is required".to_string(),
                ))
            }
        };
        if urls.is_empty() {
            return Err(DaxError::InvalidConfig(
                "endpoints list is empty".to_string(),
            ));
        }
        let endpoints = urls
            .iter()
            .map(|url| Endpoint::parse(url))
            .collect::<Result<Vec<_>>>()?;

        let signer = self.signer.ok_or_else(|| {
            DaxError::InvalidConfig("credentials are required".to_string())
        })?;

        Ok(Config {
            endpoints,
            region: self.region.unwrap_or_else(|| "us-east-1".to_string()),
            signer,
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            max_pending_connections_per_host: self
                .max_pending_connections_per_host
                .unwrap_or(DEFAULT_MAX_PENDING_CONNECTIONS_PER_HOST),
            max_concurrent_requests_per_connection: self
                .max_concurrent_requests_per_connection
                .unwrap_or(DEFAULT_MAX_CONCURRENT_REQUESTS_PER_CONNECTION),
            idle_timeout: self.idle_timeout.unwrap_or(DEFAULT_IDLE_TIMEOUT),
            skip_hostname_verification: self.skip_hostname_verification,
            key_cache_size: self.key_cache_size.unwrap_or(DEFAULT_KEY_CACHE_SIZE),
            key_cache_ttl: self.key_cache_ttl.unwrap_or(DEFAULT_KEY_CACHE_TTL),
            attr_cache_size: self.attr_cache_size.unwrap_or(DEFAULT_ATTR_CACHE_SIZE),
            debug_logging: self.debug_logging,
            user_agent: self
                .user_agent
                .unwrap_or_else(|| format!("DaxRustClient-{}", env!("CARGO_PKG_VERSION"))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::{Credentials, SigV4Signer};

    fn test_signer() -> Arc<dyn RequestSigner> {
        Arc::new(SigV4Signer::new(Credentials::new("AKID", "secret"), "us-east-1"))
    }

    #[test]
    fn test_defaults() {
        let config = Config::builder()
            .endpoint_url("dax://cluster.example.com")
            .credentials(test_signer())
            .build()
            .unwrap();

        assert_eq!(config.endpoints().len(), 1);
        assert_eq!(config.connect_timeout(), Duration::from_millis(1000));
        assert_eq!(config.request_timeout(), Duration::from_millis(60_000));
        assert_eq!(config.max_pending_connections_per_host(), 10);
        assert_eq!(config.max_concurrent_requests_per_connection(), 1000);
        assert_eq!(config.idle_timeout(), Duration::from_millis(30_000));
        assert!(!config.skip_hostname_verification());
        assert_eq!(config.key_cache_size(), 1000);
        assert_eq!(config.key_cache_ttl(), Duration::from_millis(60_000));
        assert_eq!(config.attr_cache_size(), 1000);
        assert!(!config.debug_logging());
        assert!(config.user_agent().starts_with("DaxRustClient-"));
    }

    #[test]
    fn test_endpoint_url_and_endpoints_are_exclusive() {
        let err = Config::builder()
            .endpoint_url("dax://a.example.com")
            .endpoints(["dax://b.example.com"])
            .credentials(test_signer())
            .build()
            .unwrap_err();
        assert!(matches!(err, DaxError::InvalidConfig(_)));
    }

    #[test]
    fn test_one_endpoint_source_is_required() {
        let err = Config::builder().credentials(test_signer()).build().unwrap_err();
        assert!(matches!(err, DaxError::InvalidConfig(_)));

        let err = Config::builder()
            .endpoints(Vec::<String>::new())
            .credentials(test_signer())
            .build()
            .unwrap_err();
        assert!(matches!(err, DaxError::InvalidConfig(_)));
    }

    #[test]
    fn test_credentials_are_required() {
        let err = Config::builder()
            .endpoint_url("dax://cluster.example.com")
            .build()
            .unwrap_err();
        assert!(matches!(err, DaxError::InvalidConfig(msg) if msg.contains("credentials")));
    }

    #[test]
    fn test_bad_endpoint_url_fails_build() {
        let err = Config::builder()
            .endpoint_url("https://cluster.example.com")
            .credentials(test_signer())
            .build()
            .unwrap_err();
        assert!(matches!(err, DaxError::InvalidConfig(_)));
    }

    #[test]
    fn test_multiple_endpoints() {
        let config = Config::builder()
            .endpoints(["dax://a.example.com", "daxs://b.example.com:9300"])
            .credentials(test_signer())
            .region("eu-west-1")
            .build()
            .unwrap();

        assert_eq!(config.endpoints().len(), 2);
        assert_eq!(config.region(), "eu-west-1");
        assert!(config.endpoints()[1].is_tls());
    }

    #[test]
    fn test_overrides() {
        let config = Config::builder()
            .endpoint_url("dax://cluster.example.com")
            .credentials(test_signer())
            .connect_timeout(Duration::from_millis(250))
            .request_timeout(Duration::from_secs(5))
            .max_pending_connections_per_host(3)
            .idle_timeout(Duration::from_secs(10))
            .key_cache_size(10)
            .key_cache_ttl(Duration::from_secs(1))
            .attr_cache_size(5)
            .user_agent("test-agent")
            .debug_logging(true)
            .skip_hostname_verification(true)
            .build()
            .unwrap();

        assert_eq!(config.connect_timeout(), Duration::from_millis(250));
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_pending_connections_per_host(), 3);
        assert_eq!(config.idle_timeout(), Duration::from_secs(10));
        assert_eq!(config.key_cache_size(), 10);
        assert_eq!(config.attr_cache_size(), 5);
        assert_eq!(config.user_agent(), "test-agent");
        assert!(config.debug_logging());
        assert!(config.skip_hostname_verification());
    }
}
