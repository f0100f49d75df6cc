// ABOUTME: RELP frame model — the in-memory record shared by the TX and RX paths
// ABOUTME: Pure data plus the wire-grammar vocabulary (recognized commands); no parsing here

use bytes::Bytes;

/// Maximum length, in bytes, of a command token that is not one of the
/// [`RECOGNIZED_COMMANDS`]. Commands at or under this length are accepted
/// for forward compatibility with collectors speaking a newer RELP dialect.
pub const MAX_CMD_LEN: usize = 11;

/// The RELP commands this crate understands by name.
///
/// Any other command longer than [`MAX_CMD_LEN`] is rejected by the parser;
/// anything else (including unknown short commands) is accepted.
pub const RECOGNIZED_COMMANDS: &[&str] =
    &["open", "close", "abort", "serverclose", "syslog", "rsp"];

pub fn is_recognized_command(command: &str) -> bool {
    RECOGNIZED_COMMANDS.contains(&command)
}

/// A single RELP frame: `txn_id SP command SP payload_length SP payload LF`.
///
/// Created by the caller for outbound (TX) frames or by the parser for
/// inbound (RX) frames; owned by whoever created it. References into a
/// [`crate::batch::RelpBatch`] are always by request id, never by pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub txn_id: u64,
    pub command: String,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(txn_id: u64, command: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            txn_id,
            command: command.into(),
            payload: payload.into(),
        }
    }

    pub fn payload_length(&self) -> usize {
        self.payload.len()
    }

    /// Convenience constructor for a `syslog` request frame. The transaction
    /// id is a placeholder until the session engine assigns the real one.
    pub fn syslog(payload: impl Into<Bytes>) -> Self {
        Self::new(0, "syslog", payload)
    }

    /// Convenience constructor for the pre-negotiation OPEN frame carrying
    /// the offer payload.
    pub fn open(offer: impl Into<Bytes>) -> Self {
        Self::new(0, "open", offer)
    }

    /// Convenience constructor for the zero-length CLOSE frame.
    pub fn close() -> Self {
        Self::new(0, "close", Bytes::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_all_spec_commands() {
        for cmd in RECOGNIZED_COMMANDS {
            assert!(is_recognized_command(cmd));
        }
        assert!(!is_recognized_command("frobnicate"));
    }

    #[test]
    fn syslog_frame_carries_payload_and_placeholder_txn() {
        let frame = Frame::syslog(Bytes::from_static(b"hello"));
        assert_eq!(frame.txn_id, 0);
        assert_eq!(frame.command, "syslog");
        assert_eq!(frame.payload_length(), 5);
    }
}
