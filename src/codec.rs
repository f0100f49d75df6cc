// ABOUTME: RELP wire codec — serializer for outgoing frames and a byte-driven incremental parser for inbound ones
// ABOUTME: The parser consumes one byte at a time so it tolerates arbitrarily fragmented reads from the transport

use crate::frame::{is_recognized_command, Frame, MAX_CMD_LEN};
use bytes::{BufMut, BytesMut};
use thiserror::Error;

const SP: u8 = 0x20;
const LF: u8 = 0x0A;

/// Serializes `frame` onto the wire grammar
/// `txn_id SP command SP payload_length SP payload LF` and returns the
/// number of bytes written. Performs no validation — the caller is
/// responsible for handing this a well-formed [`Frame`]; malformed commands
/// or lengths are a caller bug, not a runtime condition this layer guards
/// against.
pub fn encode(frame: &Frame, buf: &mut BytesMut) -> usize {
    let start = buf.len();
    buf.put_slice(itoa(frame.txn_id).as_bytes());
    buf.put_u8(SP);
    buf.put_slice(frame.command.as_bytes());
    buf.put_u8(SP);
    buf.put_slice(itoa(frame.payload_length() as u64).as_bytes());
    buf.put_u8(SP);
    buf.put_slice(&frame.payload);
    buf.put_u8(LF);
    buf.len() - start
}

fn itoa(n: u64) -> String {
    n.to_string()
}

/// Where in the frame a [`ParseError`] was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsePosition {
    Txn,
    Cmd,
    Len,
}

impl std::fmt::Display for ParsePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ParsePosition::Txn => "txn",
            ParsePosition::Cmd => "cmd",
            ParsePosition::Len => "len",
        };
        f.write_str(s)
    }
}

/// A malformed inbound frame. Fatal to the session: once the byte stream's
/// framing is lost, there is no way to resynchronize on the next frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at {position}: {reason}")]
pub struct ParseError {
    pub position: ParsePosition,
    pub reason: String,
}

impl ParseError {
    fn new(position: ParsePosition, reason: impl Into<String>) -> Self {
        Self {
            position,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Txn,
    Cmd,
    Len,
    Data,
    Nl,
}

/// A small automaton that decodes one frame from an arbitrary stream of
/// bytes fed one at a time. One instance decodes exactly one frame; discard
/// it once [`FrameParser::is_complete`] is true and construct a fresh one
/// for the next frame.
pub struct FrameParser {
    state: State,
    txn_digits: String,
    command: String,
    len_digits: String,
    txn_id: u64,
    length: i64,
    remaining: usize,
    payload: BytesMut,
    complete: bool,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    pub fn new() -> Self {
        Self {
            state: State::Txn,
            txn_digits: String::new(),
            command: String::new(),
            len_digits: String::new(),
            txn_id: 0,
            length: 0,
            remaining: 0,
            payload: BytesMut::new(),
            complete: false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Feed a single byte to the parser. Call [`FrameParser::is_complete`]
    /// after each call; once it returns true, no further bytes should be fed
    /// to this instance.
    pub fn feed(&mut self, b: u8) -> Result<(), ParseError> {
        match self.state {
            State::Txn => {
                if b == SP {
                    self.txn_id = self.txn_digits.parse().map_err(|_| {
                        ParseError::new(
                            ParsePosition::Txn,
                            format!("could not parse '{}' as a transaction id", self.txn_digits),
                        )
                    })?;
                    self.state = State::Cmd;
                } else if b.is_ascii_digit() {
                    self.txn_digits.push(b as char);
                } else {
                    return Err(ParseError::new(
                        ParsePosition::Txn,
                        format!("non-digit byte {b:#04x} in transaction id"),
                    ));
                }
            }
            State::Cmd => {
                if b == SP {
                    if self.command.len() > MAX_CMD_LEN && !is_recognized_command(&self.command) {
                        return Err(ParseError::new(
                            ParsePosition::Cmd,
                            format!("command '{}' is not recognized", self.command),
                        ));
                    }
                    self.state = State::Len;
                } else {
                    self.command.push(b as char);
                }
            }
            State::Len => {
                if b == SP || b == LF {
                    let n: i64 = self.len_digits.parse().map_err(|_| {
                        ParseError::new(
                            ParsePosition::Len,
                            format!("could not parse '{}' as a length", self.len_digits),
                        )
                    })?;
                    if n < 0 {
                        return Err(ParseError::new(
                            ParsePosition::Len,
                            "frame length must be 0 or larger",
                        ));
                    }
                    self.length = n;
                    self.remaining = n as usize;
                    self.payload = BytesMut::with_capacity(self.remaining);
                    if n == 0 {
                        self.state = State::Nl;
                        if b == LF {
                            self.complete = true;
                        }
                    } else {
                        self.state = State::Data;
                    }
                } else if b.is_ascii_digit() {
                    self.len_digits.push(b as char);
                } else {
                    return Err(ParseError::new(
                        ParsePosition::Len,
                        format!("non-digit byte {b:#04x} in length"),
                    ));
                }
            }
            State::Data => {
                if self.remaining > 0 {
                    self.payload.put_u8(b);
                    self.remaining -= 1;
                }
                if self.remaining == 0 {
                    self.state = State::Nl;
                }
            }
            State::Nl => {
                self.complete = true;
                if b != LF {
                    tracing::warn!("RELP frame terminator was not LF, completing anyway");
                }
            }
        }
        Ok(())
    }

    /// Consume the parser, returning the decoded frame. Panics if called
    /// before [`FrameParser::is_complete`] returns true — a programming
    /// error by the caller, not a runtime condition.
    pub fn into_frame(self) -> Frame {
        assert!(self.complete, "into_frame() called before parser completed");
        Frame {
            txn_id: self.txn_id,
            command: self.command,
            payload: self.payload.freeze(),
        }
    }
}

/// Three ASCII decimal digits followed by SP, as used in `rsp` response
/// payloads. Distinct from [`ParseError`]: a malformed response code is not
/// a framing failure, just a failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("response code error: {reason}")]
pub struct ResponseCodeError {
    pub reason: String,
}

/// Parses the leading `DDD SP` response code out of an RX frame's payload.
pub fn parse_response_code(payload: &[u8]) -> Result<u16, ResponseCodeError> {
    if payload.len() < 3 {
        return Err(ResponseCodeError {
            reason: "payload shorter than 3 bytes".to_string(),
        });
    }
    let mut code: u16 = 0;
    for &b in &payload[..3] {
        if !b.is_ascii_digit() {
            return Err(ResponseCodeError {
                reason: format!("non-digit byte {b:#04x} in response code"),
            });
        }
        code = code * 10 + (b - b'0') as u16;
    }
    if let Some(&fourth) = payload.get(3)
        && fourth != SP
    {
        return Err(ResponseCodeError {
            reason: "byte after response code was not SP".to_string(),
        });
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn feed_all(parser: &mut FrameParser, bytes: &[u8]) {
        for &b in bytes {
            parser.feed(b).expect("feed should not fail on well-formed input");
        }
    }

    #[test]
    fn encode_decode_round_trip() {
        let frame = Frame::new(42, "syslog", Bytes::from_static(b"HelloThisIsAMessage"));
        let mut buf = BytesMut::new();
        let n = encode(&frame, &mut buf);
        assert_eq!(n, buf.len());

        let mut parser = FrameParser::new();
        feed_all(&mut parser, &buf);
        assert!(parser.is_complete());
        let decoded = parser.into_frame();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn encode_emits_sp_before_empty_payload() {
        let frame = Frame::close();
        let mut buf = BytesMut::new();
        encode(&frame, &mut buf);
        assert_eq!(&buf[..], b"0 close 0 \n");
    }

    #[test]
    fn parser_tolerates_lf_instead_of_sp_for_zero_length() {
        let mut parser = FrameParser::new();
        feed_all(&mut parser, b"1 rsp 0\n");
        assert!(parser.is_complete());
        let frame = parser.into_frame();
        assert_eq!(frame.txn_id, 1);
        assert_eq!(frame.command, "rsp");
        assert_eq!(frame.payload_length(), 0);
    }

    #[test]
    fn parser_is_fragmentation_insensitive() {
        let frame = Frame::new(7, "syslog", Bytes::from_static(b"abcdef"));
        let mut buf = BytesMut::new();
        encode(&frame, &mut buf);
        let bytes = buf.freeze();

        for chunk_size in 1..=bytes.len() {
            let mut parser = FrameParser::new();
            for chunk in bytes.chunks(chunk_size) {
                feed_all(&mut parser, chunk);
            }
            assert!(parser.is_complete());
            assert_eq!(parser.into_frame(), frame);
        }
    }

    #[test]
    fn parser_rejects_non_digit_txn() {
        let mut parser = FrameParser::new();
        let err = parser.feed(b'x').unwrap_err();
        assert_eq!(err.position, ParsePosition::Txn);
    }

    #[test]
    fn parser_rejects_unrecognized_long_command() {
        let mut parser = FrameParser::new();
        feed_all(&mut parser, b"1 ");
        for b in b"reallylongcommandname" {
            parser.feed(*b).unwrap();
        }
        let err = parser.feed(b' ').unwrap_err();
        assert_eq!(err.position, ParsePosition::Cmd);
    }

    #[test]
    fn parser_accepts_short_unrecognized_command() {
        let mut parser = FrameParser::new();
        feed_all(&mut parser, b"1 xy 0\n");
        assert!(parser.is_complete());
        assert_eq!(parser.into_frame().command, "xy");
    }

    #[test]
    fn parser_rejects_negative_length() {
        let mut parser = FrameParser::new();
        feed_all(&mut parser, b"1 syslog ");
        let err = parser.feed(b'-').unwrap_err();
        assert_eq!(err.position, ParsePosition::Len);
    }

    #[test]
    fn response_code_parses_200() {
        assert_eq!(parse_response_code(b"200 OK").unwrap(), 200);
    }

    #[test]
    fn response_code_rejects_short_payload() {
        assert!(parse_response_code(b"20").is_err());
    }

    #[test]
    fn response_code_rejects_missing_separator() {
        assert!(parse_response_code(b"200X").is_err());
    }

    #[test]
    fn response_code_rejects_non_digits() {
        assert!(parse_response_code(b"2a0 x").is_err());
    }

    #[test]
    fn response_code_accepts_empty_reason() {
        assert_eq!(parse_response_code(b"200 ").unwrap(), 200);
    }
}
