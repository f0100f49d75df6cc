// ABOUTME: Convenience constructors that dial and open a session in one call
// ABOUTME: Mirrors the teacher's ClientBuilder::transmitter/quick_transmitter pattern

use crate::session::engine::RelpSession;
use crate::session::error::RelpError;
use crate::session::types::SessionOptions;
use crate::transport::{PlainDialer, TlsClientConfig, TlsDialer};

/// Factory for the common ways to obtain an already-open [`RelpSession`].
pub struct SessionBuilder;

impl SessionBuilder {
    /// Connects over plain TCP with default [`SessionOptions`].
    pub async fn connect(
        host: impl Into<String>,
        port: u16,
    ) -> Result<RelpSession<PlainDialer>, RelpError> {
        Self::connect_with_options(host, port, SessionOptions::default()).await
    }

    /// Connects over plain TCP with caller-supplied options.
    pub async fn connect_with_options(
        host: impl Into<String>,
        port: u16,
        options: SessionOptions,
    ) -> Result<RelpSession<PlainDialer>, RelpError> {
        let mut session = RelpSession::with_options(PlainDialer, options);
        session.connect(host, port).await?;
        Ok(session)
    }

    /// Connects over TLS with default [`SessionOptions`].
    pub async fn connect_tls(
        host: impl Into<String>,
        port: u16,
        tls_config: TlsClientConfig,
    ) -> Result<RelpSession<TlsDialer>, RelpError> {
        Self::connect_tls_with_options(host, port, tls_config, SessionOptions::default()).await
    }

    /// Connects over TLS with caller-supplied options.
    pub async fn connect_tls_with_options(
        host: impl Into<String>,
        port: u16,
        tls_config: TlsClientConfig,
        options: SessionOptions,
    ) -> Result<RelpSession<TlsDialer>, RelpError> {
        let mut session = RelpSession::with_options(TlsDialer::new(tls_config), options);
        session.connect(host, port).await?;
        Ok(session)
    }
}
