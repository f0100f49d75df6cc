// ABOUTME: Session construction-time configuration, analogous to the teacher's ClientOptions
// ABOUTME: Defaults mirror the reference connection's Init(): 512/262144-byte buffers, 30s timeouts

use std::time::Duration;

/// Tunables recognized at session construction. Defaults match the
/// reference implementation exactly.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub(crate) rx_buffer_size: usize,
    pub(crate) tx_buffer_size: usize,
    pub(crate) ack_timeout: Duration,
    pub(crate) write_timeout: Duration,
    pub(crate) relp_software: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            rx_buffer_size: 512,
            tx_buffer_size: 262_144,
            ack_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            relp_software: format!("{}-{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        }
    }
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rx_buffer_size(mut self, size: usize) -> Self {
        self.rx_buffer_size = size;
        self
    }

    pub fn with_tx_buffer_size(mut self, size: usize) -> Self {
        self.tx_buffer_size = size;
        self
    }

    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Sets the `relp_software` field advertised in the OPEN offer.
    /// Defaults to this crate's name and version.
    pub fn with_relp_software(mut self, software: impl Into<String>) -> Self {
        self.relp_software = software.into();
        self
    }

    /// Renders the OPEN offer payload for these options:
    /// `\nrelp_version=0\nrelp_software=<software>\ncommands=syslog\n`.
    pub(crate) fn offer(&self) -> String {
        format!(
            "\nrelp_version=0\nrelp_software={}\ncommands=syslog\n",
            self.relp_software
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_connection() {
        let opts = SessionOptions::default();
        assert_eq!(opts.rx_buffer_size, 512);
        assert_eq!(opts.tx_buffer_size, 262_144);
        assert_eq!(opts.ack_timeout, Duration::from_secs(30));
        assert_eq!(opts.write_timeout, Duration::from_secs(30));
    }

    #[test]
    fn offer_has_expected_shape() {
        let opts = SessionOptions::default().with_relp_software("test-1.0");
        assert_eq!(opts.offer(), "\nrelp_version=0\nrelp_software=test-1.0\ncommands=syslog\n");
    }

    #[test]
    fn builder_methods_override_defaults() {
        let opts = SessionOptions::new()
            .with_rx_buffer_size(1024)
            .with_ack_timeout(Duration::from_secs(5));
        assert_eq!(opts.rx_buffer_size, 1024);
        assert_eq!(opts.ack_timeout, Duration::from_secs(5));
    }
}
