//! A single authenticated connection to one cluster node.
//!
//! Each connection owns one socket and serves one request at a time. After
//! the TCP (or TLS) connect it sends the five-value opening handshake, and
//! on the request path it re-asserts identity with an in-band signed auth
//! frame whenever the freshness window has lapsed. Auth is deliberately
//! not a background task: sampling the threshold on the request path means
//! the auth frame and its follow-up request cannot race on the socket.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bytes::BytesMut;
use rand::Rng;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use dax_core::cbor::{write_value, CborValue};
use dax_core::protocol::constants::{HANDSHAKE_MAGIC, METHOD_AUTHORIZE_CONNECTION, SERVICE_ID};
use dax_core::protocol::{check_error_descriptor, reply_length};
use dax_core::{DaxError, Result};

use crate::endpoint::Endpoint;
use crate::signer::RequestSigner;

/// How long signed auth material stays fresh on a connection.
pub const AUTH_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// Socket read chunk size while accumulating a reply.
const READ_CHUNK_SIZE: usize = 1024;

/// Per-connection knobs, extracted from the client configuration.
#[derive(Debug, Clone)]
pub(crate) struct ConnectionSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub idle_timeout: Duration,
    pub skip_hostname_verification: bool,
    pub user_agent: String,
}

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generates a new unique connection ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw ID value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

enum ConnStream {
    Tcp(TcpStream),
    #[cfg(feature = "tls")]
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl ConnStream {
    async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        match self {
            ConnStream::Tcp(stream) => stream.write_all(buf).await,
            #[cfg(feature = "tls")]
            ConnStream::Tls(stream) => stream.write_all(buf).await,
        }
    }

    async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            ConnStream::Tcp(stream) => stream.read(buf).await,
            #[cfg(feature = "tls")]
            ConnStream::Tls(stream) => stream.read(buf).await,
        }
    }

    async fn shutdown(&mut self) -> std::io::Result<()> {
        match self {
            ConnStream::Tcp(stream) => stream.shutdown().await,
            #[cfg(feature = "tls")]
            ConnStream::Tls(stream) => stream.shutdown().await,
        }
    }
}

/// A connection to a single cluster node.
pub struct Connection {
    id: ConnectionId,
    endpoint: Endpoint,
    stream: ConnStream,
    read_buffer: BytesMut,
    session_id: u64,
    user_agent: String,
    signer: Arc<dyn RequestSigner>,
    request_timeout: Duration,
    idle_timeout: Duration,
    last_activity: Instant,
    last_auth: Option<Instant>,
    request_count: u64,
    connected: bool,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("session_id", &self.session_id)
            .field("request_count", &self.request_count)
            .field("connected", &self.connected)
            .finish()
    }
}

impl Connection {
    /// Establishes a connection to `endpoint` and performs the opening
    /// handshake.
    pub(crate) async fn connect(
        endpoint: Endpoint,
        settings: &ConnectionSettings,
        signer: Arc<dyn RequestSigner>,
    ) -> Result<Self> {
        let address = endpoint.address();
        let tcp = timeout(settings.connect_timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| {
                DaxError::Timeout(format!(
                    "connect to {} timed out after {:?}",
                    endpoint, settings.connect_timeout
                ))
            })?
            .map_err(|e| {
                DaxError::ConnectionRefused(format!("failed to connect to {}: {}", endpoint, e))
            })?;
        tcp.set_nodelay(true).map_err(|e| {
            DaxError::ConnectionRefused(format!("failed to set TCP_NODELAY: {}", e))
        })?;

        let stream = if endpoint.is_tls() {
            Self::wrap_tls(tcp, &endpoint, settings).await?
        } else {
            ConnStream::Tcp(tcp)
        };

        let mut connection = Self {
            id: ConnectionId::new(),
            endpoint,
            stream,
            read_buffer: BytesMut::with_capacity(4 * READ_CHUNK_SIZE),
            session_id: generate_session_id(),
            user_agent: settings.user_agent.clone(),
            signer,
            request_timeout: settings.request_timeout,
            idle_timeout: settings.idle_timeout,
            last_activity: Instant::now(),
            last_auth: None,
            request_count: 0,
            connected: true,
        };
        connection.send_handshake().await?;

        tracing::debug!(
            id = %connection.id,
            endpoint = %connection.endpoint,
            session_id = connection.session_id,
            "established connection"
        );
        Ok(connection)
    }

    #[cfg(feature = "tls")]
    async fn wrap_tls(
        tcp: TcpStream,
        endpoint: &Endpoint,
        settings: &ConnectionSettings,
    ) -> Result<ConnStream> {
        let connector = tls::connector(settings.skip_hostname_verification);
        let server_name = rustls::pki_types::ServerName::try_from(endpoint.host().to_string())
            .map_err(|e| {
                DaxError::InvalidConfig(format!("invalid TLS server name {:?}: {}", endpoint.host(), e))
            })?;
        let stream = connector.connect(server_name, tcp).await.map_err(|e| {
            DaxError::ConnectionRefused(format!("TLS handshake with {} failed: {}", endpoint, e))
        })?;
        Ok(ConnStream::Tls(Box::new(stream)))
    }

    #[cfg(not(feature = "tls"))]
    async fn wrap_tls(
        _tcp: TcpStream,
        endpoint: &Endpoint,
        _settings: &ConnectionSettings,
    ) -> Result<ConnStream> {
        Err(DaxError::InvalidConfig(format!(
            "endpoint {} requires TLS but the client was built without the `tls` feature",
            endpoint
        )))
    }

    /// Sends the five opening values: magic, layering marker, session id,
    /// user agent map, client mode. No acknowledgement is read.
    async fn send_handshake(&mut self) -> Result<()> {
        let mut buf = BytesMut::with_capacity(64);
        write_value(&mut buf, &CborValue::text(HANDSHAKE_MAGIC));
        write_value(&mut buf, &CborValue::Unsigned(0));
        write_value(&mut buf, &CborValue::text(self.session_id.to_string()));
        write_value(
            &mut buf,
            &CborValue::map([("UserAgent", CborValue::text(self.user_agent.clone()))]),
        );
        write_value(&mut buf, &CborValue::Unsigned(0));

        self.write_all(&buf).await
    }

    /// Returns the connection's unique identifier.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the endpoint this connection is attached to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Returns the session id picked at connect time.
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Returns the number of requests served, auth frames included.
    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    /// Returns `true` while the connection is usable.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Returns `true` once the connection has sat unused past the idle
    /// threshold.
    pub fn is_idle(&self) -> bool {
        self.last_activity.elapsed() > self.idle_timeout
    }

    /// Returns `true` when the next request must be preceded by an auth
    /// frame.
    pub fn auth_due(&self) -> bool {
        match self.last_auth {
            Some(at) => at.elapsed() >= AUTH_REFRESH_INTERVAL,
            None => true,
        }
    }

    /// Sends a serialised request and returns the raw reply bytes.
    ///
    /// Re-authenticates first when the freshness window has lapsed; the
    /// caller holds this connection exclusively, so nothing can slip in
    /// between the auth frame and the request.
    pub async fn invoke(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        if !self.connected {
            return Err(DaxError::Closed(format!("connection {} is closed", self.id)));
        }
        self.maybe_authorize().await?;
        self.send_and_receive(request).await
    }

    /// Emits the authorize-connection frame when due.
    async fn maybe_authorize(&mut self) -> Result<()> {
        if !self.auth_due() {
            return Ok(());
        }

        let signed = self
            .signer
            .sign()
            .await
            .map_err(|e| DaxError::AuthFailed(format!("signer failed: {}", e)))?;

        let mut frame = BytesMut::with_capacity(256);
        write_value(&mut frame, &CborValue::Unsigned(SERVICE_ID));
        write_value(&mut frame, &CborValue::Unsigned(METHOD_AUTHORIZE_CONNECTION));
        write_value(&mut frame, &CborValue::Text(signed.access_key));
        write_value(&mut frame, &CborValue::Text(signed.signature));
        write_value(&mut frame, &CborValue::Bytes(signed.string_to_sign));
        write_value(
            &mut frame,
            &signed.token.map_or(CborValue::Null, CborValue::Text),
        );
        write_value(&mut frame, &CborValue::text(self.user_agent.clone()));

        let reply = self.send_and_receive(&frame).await?;
        let (descriptor, _) = dax_core::cbor::decode(&reply)?;
        check_error_descriptor(&descriptor).map_err(|e| match e {
            DaxError::Server { status, message, .. } => DaxError::AuthFailed(format!(
                "cluster rejected auth frame ({}): {}",
                status, message
            )),
            other => other,
        })?;

        self.last_auth = Some(Instant::now());
        tracing::debug!(id = %self.id, endpoint = %self.endpoint, "connection authorized");
        Ok(())
    }

    /// Writes a message and accumulates its two-value reply.
    async fn send_and_receive(&mut self, message: &[u8]) -> Result<Vec<u8>> {
        self.write_all(message).await?;

        loop {
            match reply_length(&self.read_buffer) {
                Ok(Some(len)) => {
                    let reply = self.read_buffer.split_to(len).to_vec();
                    self.last_activity = Instant::now();
                    self.request_count += 1;
                    return Ok(reply);
                }
                Ok(None) => {}
                Err(e) => {
                    self.connected = false;
                    return Err(e);
                }
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match timeout(self.request_timeout, self.stream.read(&mut chunk)).await {
                Err(_) => {
                    self.connected = false;
                    return Err(DaxError::Timeout(format!(
                        "read from {} timed out after {:?}",
                        self.endpoint, self.request_timeout
                    )));
                }
                Ok(Err(e)) => {
                    self.connected = false;
                    return Err(DaxError::ConnectionLost(format!(
                        "read from {} failed: {}",
                        self.endpoint, e
                    )));
                }
                Ok(Ok(n)) => n,
            };
            if read == 0 {
                self.connected = false;
                return Err(DaxError::ConnectionLost(format!(
                    "{} closed the connection mid-reply",
                    self.endpoint
                )));
            }
            self.read_buffer.extend_from_slice(&chunk[..read]);
        }
    }

    async fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        match self.stream.write_all(bytes).await {
            Ok(()) => {
                self.last_activity = Instant::now();
                Ok(())
            }
            Err(e) => {
                self.connected = false;
                Err(DaxError::ConnectionLost(format!(
                    "write to {} failed: {}",
                    self.endpoint, e
                )))
            }
        }
    }

    /// Closes the connection. Idempotent.
    pub async fn close(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;
        let _ = self.stream.shutdown().await;
        tracing::debug!(id = %self.id, endpoint = %self.endpoint, "connection closed");
    }
}

/// Session ids fold a millisecond timestamp with a sub-millisecond random
/// component so concurrent connects stay distinguishable server-side.
fn generate_session_id() -> u64 {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    now_ms * 1000 + rand::thread_rng().gen_range(0..1000)
}

#[cfg(feature = "tls")]
mod tls {
    //! TLS plumbing: a standard root store by default, with an opt-out
    //! verifier when hostname verification is disabled.

    use std::sync::Arc;

    use rustls::client::danger::{
        HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
    };
    use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
    use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
    use tokio_rustls::TlsConnector;

    pub(super) fn connector(skip_hostname_verification: bool) -> TlsConnector {
        let config = if skip_hostname_verification {
            ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(SkipVerification::new())
                .with_no_client_auth()
        } else {
            let mut roots = RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth()
        };
        TlsConnector::from(Arc::new(config))
    }

    /// Accepts any server certificate. Signature checks still run so the
    /// session itself is sound; only the peer's identity goes unverified.
    #[derive(Debug)]
    struct SkipVerification(Arc<rustls::crypto::CryptoProvider>);

    impl SkipVerification {
        fn new() -> Arc<Self> {
            Arc::new(Self(Arc::new(rustls::crypto::ring::default_provider())))
        }
    }

    impl ServerCertVerifier for SkipVerification {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> std::result::Result<ServerCertVerified, rustls::Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
            rustls::crypto::verify_tls12_signature(
                message,
                cert,
                dss,
                &self.0.signature_verification_algorithms,
            )
        }

        fn verify_tls13_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
            rustls::crypto::verify_tls13_signature(
                message,
                cert,
                dss,
                &self.0.signature_verification_algorithms,
            )
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            self.0.signature_verification_algorithms.supported_schemes()
        }
    }
}
