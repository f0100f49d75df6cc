// ABOUTME: The session engine — lifecycle state machine, id allocation, send/ack pipeline
// ABOUTME: Grounded in the reference RelpConnection: Connect/Commit/Disconnect/TearDown/SendBatch/ReadAcks

use crate::batch::RelpBatch;
use crate::codec::{encode, FrameParser};
use crate::frame::Frame;
use crate::session::error::{AckError, ConnectError, RelpError};
use crate::session::types::SessionOptions;
use crate::transport::{Dialer, Transport};
use crate::window::TransactionWindow;
use bytes::BytesMut;

const MAX_TXN_ID: u64 = 999_999_999;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    Commit,
}

/// A RELP session over a single transport, generic over how that transport
/// is dialed. One instance corresponds to one `RelpConnection` lifetime:
/// CLOSED → OPEN → COMMIT → OPEN → ... → CLOSED.
pub struct RelpSession<D: Dialer> {
    dialer: D,
    transport: Option<D::Transport>,
    state: State,
    options: SessionOptions,
    next_txn_id: u64,
    window: TransactionWindow,
    tx_buf: BytesMut,
    rx_buf: Vec<u8>,
    last_host: Option<String>,
    last_port: u16,
}

impl<D: Dialer> RelpSession<D> {
    pub fn new(dialer: D) -> Self {
        Self::with_options(dialer, SessionOptions::default())
    }

    pub fn with_options(dialer: D, options: SessionOptions) -> Self {
        let tx_buf = BytesMut::with_capacity(options.tx_buffer_size);
        let rx_buf = vec![0u8; options.rx_buffer_size];
        Self {
            dialer,
            transport: None,
            state: State::Closed,
            next_txn_id: 0,
            window: TransactionWindow::new(),
            tx_buf,
            rx_buf,
            options,
            last_host: None,
            last_port: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == State::Open
    }

    /// Dials `host:port` and negotiates the OPEN handshake. The session must
    /// be CLOSED; calling this from any other state is a programming error.
    pub async fn connect(&mut self, host: impl Into<String>, port: u16) -> Result<(), RelpError> {
        assert_eq!(
            self.state,
            State::Closed,
            "connect() called while the session was not closed"
        );

        let host = host.into();
        self.next_txn_id = 0;
        self.window.reset();

        let encrypted = self.dialer.is_tls();
        let transport = self.dialer.dial(&host, port).await.map_err(|err| ConnectError {
            host: host.clone(),
            port,
            encrypted,
            protocol: "tcp",
            reason: err.to_string(),
        })?;
        self.transport = Some(transport);
        self.last_host = Some(host.clone());
        self.last_port = port;

        let mut opener = RelpBatch::new();
        let req_id = opener.put_request(Frame::open(self.options.offer()));
        self.send_batch(&mut opener).await.map_err(|err| ConnectError {
            host: host.clone(),
            port,
            encrypted,
            protocol: "tcp",
            reason: err.to_string(),
        })?;

        if opener.verify(req_id) {
            tracing::info!(host, port, "successfully opened RELP session");
            self.state = State::Open;
            Ok(())
        } else {
            tracing::warn!(host, port, "RELP open transaction could not be verified");
            Err(RelpError::Connect(ConnectError {
                host,
                port,
                encrypted,
                protocol: "tcp",
                reason: "initial OPEN transaction could not be verified".to_string(),
            }))
        }
    }

    /// Reconnects to the host and port used by the last successful
    /// [`RelpSession::connect`]. Panics if `connect` has never succeeded.
    pub async fn reconnect(&mut self) -> Result<(), RelpError> {
        let host = self
            .last_host
            .clone()
            .expect("reconnect() called before connect() ever succeeded");
        let port = self.last_port;
        if self.state != State::Closed {
            self.tear_down().await;
        }
        self.connect(host, port).await
    }

    /// Sends `batch` to the server and blocks until every frame in it has
    /// either been acknowledged or the commit has failed. The session
    /// transitions OPEN → COMMIT → OPEN around the call; on error it is
    /// still restored to OPEN, per the propagation policy (I/O failures are
    /// returned to the caller, not fatal to the session itself).
    pub async fn commit(&mut self, batch: &mut RelpBatch) -> Result<(), RelpError> {
        assert_eq!(
            self.state,
            State::Open,
            "commit() called while the session was not open"
        );
        self.state = State::Commit;
        let result = self.send_batch(batch).await;
        self.state = State::Open;
        result.map_err(RelpError::from)
    }

    /// Sends a CLOSE frame and, if the server acknowledges it with a
    /// zero-length response, tears the transport down. Returns whether the
    /// graceful close was acknowledged.
    pub async fn disconnect(&mut self) -> Result<bool, RelpError> {
        assert_eq!(
            self.state,
            State::Open,
            "disconnect() called while the session was not open"
        );
        let mut closer = RelpBatch::new();
        let req_id = closer.put_request(Frame::close());
        self.send_batch(&mut closer).await.map_err(RelpError::from)?;

        let success = closer
            .get_response(req_id)
            .map(|response| response.payload_length() == 0)
            .unwrap_or(false);

        if success {
            self.tear_down().await;
        }
        Ok(success)
    }

    /// Unconditionally closes the transport and marks the session CLOSED,
    /// regardless of current state. The escape hatch for abandoning a
    /// session that can't be gracefully disconnected.
    pub async fn tear_down(&mut self) {
        if let Some(mut transport) = self.transport.take()
            && let Err(err) = transport.close().await
        {
            tracing::warn!(%err, "error closing RELP transport");
        }
        self.state = State::Closed;
    }

    async fn send_batch(&mut self, batch: &mut RelpBatch) -> Result<(), AckError> {
        tracing::debug!(
            work_queue_len = batch.work_queue_len(),
            window_size = self.window.size(),
            "send_batch entry"
        );
        while batch.work_queue_len() > 0 {
            let req_id = batch.pop_work_queue();
            let mut frame = batch
                .get_request(req_id)
                .cloned()
                .expect("work queue id without a matching request");

            self.next_txn_id = if self.next_txn_id >= MAX_TXN_ID {
                1
            } else {
                self.next_txn_id + 1
            };
            frame.txn_id = self.next_txn_id;

            self.window.put_pending(self.next_txn_id, req_id);
            tracing::trace!(txn_id = self.next_txn_id, req_id, "sending request");

            self.send_frame(&frame).await?;
            self.read_acks(batch).await?;
        }
        Ok(())
    }

    async fn send_frame(&mut self, frame: &Frame) -> Result<(), AckError> {
        self.tx_buf.clear();
        encode(frame, &mut self.tx_buf);

        let transport = self
            .transport
            .as_mut()
            .expect("send_frame() called without an active transport");
        transport.set_write_deadline(self.options.write_timeout);
        transport.write_all(&self.tx_buf).await?;
        Ok(())
    }

    /// Drains the transaction window, reading and parsing acknowledgement
    /// frames until it is empty. Unlike the reference implementation, a
    /// fresh [`FrameParser`] is always started for the next frame
    /// immediately once one completes, even mid-buffer, so that trailing
    /// bytes from the same read never corrupt the following frame.
    async fn read_acks(&mut self, batch: &mut RelpBatch) -> Result<(), AckError> {
        if self.window.size() == 0 {
            return Ok(());
        }

        let mut parser = FrameParser::new();

        while self.window.size() > 0 {
            let transport = self
                .transport
                .as_mut()
                .expect("read_acks() called without an active transport");
            transport.set_read_deadline(self.options.ack_timeout);
            let n = transport.read(&mut self.rx_buf).await?;
            if n == 0 {
                return Err(AckError::Eof);
            }

            for &byte in &self.rx_buf[..n] {
                parser.feed(byte)?;
                if parser.is_complete() {
                    let completed = std::mem::take(&mut parser);
                    let frame = completed.into_frame();
                    let txn_id = frame.txn_id;
                    if let Some(req_id) = self.window.get_pending(txn_id) {
                        batch.put_response(req_id, frame);
                        self.window.remove_pending(txn_id);
                    } else {
                        tracing::warn!(txn_id, "received ack for a transaction that is not pending");
                    }
                }
            }
        }
        Ok(())
    }
}
