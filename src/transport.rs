// ABOUTME: Transport abstraction — a byte stream with per-operation deadlines, plain or TLS
// ABOUTME: Grounded in the RelpDialer interface: dial once, then read/write/close the same connection

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::{client::TlsStream, TlsConnector};

/// Failures from the byte-stream layer: timeouts and the underlying I/O
/// error kinds, kept distinct from protocol-level [`crate::session::RelpError`]
/// variants so the session can decide how to wrap them (e.g. into `AckError`).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("operation timed out")]
    Timeout,
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TLS handshake failed: {0}")]
    Tls(#[from] rustls::Error),
}

/// A connected byte stream, plain or TLS, with deadline-bounded reads and
/// writes. One instance wraps exactly one connection; reconnecting means
/// dialing a new one via [`Dialer::dial`].
pub trait Transport: Send {
    /// Sets the deadline for the next [`Transport::read`] call, as a
    /// duration from now. Mirrors the reference dialer's
    /// `SetReadDeadline(add time.Duration)`.
    fn set_read_deadline(&mut self, timeout: Duration);

    /// Sets the deadline for the next [`Transport::write_all`] call.
    fn set_write_deadline(&mut self, timeout: Duration);

    fn read(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<usize, TransportError>> + Send;

    fn write_all(&mut self, src: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Whether this transport negotiated TLS. Surfaced in [`crate::session::ConnectError`]
    /// for diagnostics; the session otherwise treats both kinds identically.
    fn is_encrypted(&self) -> bool;
}

/// Something that can dial a host:port pair and hand back a connected
/// [`Transport`]. A session holds one dialer for its whole lifetime so that
/// reconnecting after [`crate::session::RelpSession::tear_down`] reuses the
/// same TLS configuration.
pub trait Dialer: Send + Sync {
    type Transport: Transport;

    fn dial(
        &self,
        host: &str,
        port: u16,
    ) -> impl Future<Output = Result<Self::Transport, TransportError>> + Send;

    /// Whether this dialer negotiates TLS. Used only for diagnostics before
    /// a transport exists (e.g. a failed dial still reports the attempted
    /// protocol); once connected, prefer [`Transport::is_encrypted`].
    fn is_tls(&self) -> bool {
        false
    }
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr, TransportError> {
    tokio::net::lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| {
            TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no address found for {host}:{port}"),
            ))
        })
}

/// Plain, unencrypted TCP transport.
pub struct PlainTransport {
    stream: TcpStream,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl PlainTransport {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
        }
    }
}

impl Transport for PlainTransport {
    fn set_read_deadline(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    fn set_write_deadline(&mut self, timeout: Duration) {
        self.write_timeout = timeout;
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let n = tokio::time::timeout(self.read_timeout, self.stream.read(buf))
            .await
            .map_err(|_| TransportError::Timeout)??;
        Ok(n)
    }

    async fn write_all(&mut self, src: &[u8]) -> Result<(), TransportError> {
        tokio::time::timeout(self.write_timeout, self.stream.write_all(src))
            .await
            .map_err(|_| TransportError::Timeout)??;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.stream.shutdown().await?;
        Ok(())
    }

    fn is_encrypted(&self) -> bool {
        false
    }
}

/// Dials plain TCP connections. The zero-configuration default.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainDialer;

impl Dialer for PlainDialer {
    type Transport = PlainTransport;

    async fn dial(&self, host: &str, port: u16) -> Result<Self::Transport, TransportError> {
        let addr = resolve(host, port).await?;
        let stream = TcpStream::connect(addr).await?;
        tracing::info!(host, port, "dialed plain RELP transport");
        Ok(PlainTransport::new(stream))
    }
}

/// TLS-wrapped transport, negotiated during [`Dialer::dial`].
pub struct TlsTransport {
    stream: TlsStream<TcpStream>,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl TlsTransport {
    fn new(stream: TlsStream<TcpStream>) -> Self {
        Self {
            stream,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
        }
    }
}

impl Transport for TlsTransport {
    fn set_read_deadline(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    fn set_write_deadline(&mut self, timeout: Duration) {
        self.write_timeout = timeout;
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let n = tokio::time::timeout(self.read_timeout, self.stream.read(buf))
            .await
            .map_err(|_| TransportError::Timeout)??;
        Ok(n)
    }

    async fn write_all(&mut self, src: &[u8]) -> Result<(), TransportError> {
        tokio::time::timeout(self.write_timeout, self.stream.write_all(src))
            .await
            .map_err(|_| TransportError::Timeout)??;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.stream.shutdown().await?;
        Ok(())
    }

    fn is_encrypted(&self) -> bool {
        true
    }
}

/// Wraps an `rustls::ClientConfig` for use by [`TlsDialer`]. Kept as a
/// newtype (rather than exposing `rustls` types directly in the session
/// API) the way the teacher keeps `tracing`/`bytes` types at its public
/// edges but wraps anything with an opinionated construction story.
#[derive(Clone)]
pub struct TlsClientConfig {
    inner: Arc<ClientConfig>,
}

impl TlsClientConfig {
    pub fn new(inner: Arc<ClientConfig>) -> Self {
        Self { inner }
    }

    /// Builds a config that accepts any server certificate without
    /// verification. Grounded in the reference client's
    /// `InsecureSkipVerify: true`, used there only against lab collectors
    /// presenting self-signed certificates — never appropriate for a
    /// production peer.
    pub fn insecure() -> Self {
        let config = ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerify))
            .with_no_client_auth();
        Self::new(Arc::new(config))
    }
}

#[derive(Debug)]
struct NoVerify;

impl ServerCertVerifier for NoVerify {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &rustls::crypto::ring::default_provider().signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &rustls::crypto::ring::default_provider().signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Dials TLS connections using a pre-built [`TlsClientConfig`].
#[derive(Clone)]
pub struct TlsDialer {
    config: TlsClientConfig,
}

impl TlsDialer {
    pub fn new(config: TlsClientConfig) -> Self {
        Self { config }
    }
}

impl Dialer for TlsDialer {
    type Transport = TlsTransport;

    async fn dial(&self, host: &str, port: u16) -> Result<Self::Transport, TransportError> {
        let addr = resolve(host, port).await?;
        let tcp = TcpStream::connect(addr).await?;
        let connector = TlsConnector::from(self.config.inner.clone());
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("'{host}' is not a valid DNS name or IP address"),
            )))?;
        let stream = connector.connect(server_name, tcp).await?;
        tracing::info!(host, port, "dialed TLS RELP transport");
        Ok(TlsTransport::new(stream))
    }

    fn is_tls(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn plain_dialer_connects_to_a_local_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 5];
            sock.read_exact(&mut buf).await.unwrap();
            sock.write_all(b"world").await.unwrap();
        });

        let dialer = PlainDialer;
        let mut transport = dialer.dial(&addr.ip().to_string(), addr.port()).await.unwrap();
        assert!(!transport.is_encrypted());
        transport.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        let n = transport.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"world");

        accept.await.unwrap();
    }

    #[tokio::test]
    async fn tls_dialer_connects_with_insecure_verifier() {
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let cert_der = cert.der().clone();
        let key_der = rustls::pki_types::PrivateKeyDer::try_from(key_pair.serialize_der()).unwrap();

        let server_config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![cert_der], key_der)
            .unwrap();
        let acceptor = tokio_rustls::TlsAcceptor::from(Arc::new(server_config));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            let mut tls = acceptor.accept(sock).await.unwrap();
            let mut buf = [0u8; 5];
            tls.read_exact(&mut buf).await.unwrap();
            tls.write_all(b"world").await.unwrap();
        });

        let dialer = TlsDialer::new(TlsClientConfig::insecure());
        assert!(dialer.is_tls());
        let mut transport = dialer.dial(&addr.ip().to_string(), addr.port()).await.unwrap();
        assert!(transport.is_encrypted());
        transport.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        let n = transport.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"world");

        accept.await.unwrap();
    }

    #[tokio::test]
    async fn read_deadline_times_out_with_no_data() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            drop(sock);
        });

        let dialer = PlainDialer;
        let mut transport = dialer.dial(&addr.ip().to_string(), addr.port()).await.unwrap();
        transport.set_read_deadline(Duration::from_millis(50));
        let mut buf = [0u8; 16];
        let err = transport.read(&mut buf).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout));

        accept.abort();
    }
}
