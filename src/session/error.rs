// ABOUTME: Session-level error types — ack failures and connect failures the caller is expected to act on
// ABOUTME: Grounded in the reference client's AckReadingError/ConnectionEstablishmentError

use crate::codec::ParseError;
use crate::transport::TransportError;
use thiserror::Error;

/// Why a [`crate::session::RelpSession::commit`] failed to drain the
/// transaction window. Always a reason to tear the session down and
/// reconnect; the batch itself is left exactly as it was so the caller can
/// retry once a new session is open.
#[derive(Debug, Error)]
pub enum AckError {
    #[error("timed out waiting for acknowledgement")]
    Timeout,
    #[error("connection closed before all acknowledgements were received")]
    Eof,
    #[error("transport error while reading acknowledgements: {0}")]
    Transport(#[source] TransportError),
    #[error("malformed acknowledgement frame: {0}")]
    Parse(#[from] ParseError),
}

impl From<TransportError> for AckError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => AckError::Timeout,
            other => AckError::Transport(other),
        }
    }
}

/// Why [`crate::session::RelpSession::connect`] failed to reach or
/// negotiate with a collector.
#[derive(Debug, Error)]
pub struct ConnectError {
    pub host: String,
    pub port: u16,
    pub encrypted: bool,
    pub protocol: &'static str,
    pub reason: String,
}

impl std::fmt::Display for ConnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let encrypted = if self.encrypted { "encrypted" } else { "unencrypted" };
        write!(
            f,
            "could not establish {encrypted} {} connection to {}:{}: {}",
            self.protocol, self.host, self.port, self.reason
        )
    }
}

/// The top-level error returned by fallible session operations.
#[derive(Debug, Error)]
pub enum RelpError {
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error(transparent)]
    Ack(#[from] AckError),
}
