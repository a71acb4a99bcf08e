//! Per-connection socket task.
//!
//! Each open connection is driven by one tokio task that owns the
//! WebSocket stream. The task:
//!
//! - Connects and publishes `Opened` through the event bridge
//! - Executes send / ping / close commands from the registry
//! - Republishes data frames into the connection's inbound queue
//! - Resolves pending pings when their pongs arrive
//! - Publishes `Closed` once the read side ends
//!
//! The inbound queue is bounded. The task only reads the next frame once it
//! holds a slot in the queue, so a peer cannot outrun the consumer; while
//! nobody receives, unread frames stay in the socket.
//!
//! Cancelling the task's token drops the socket immediately.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, WebSocketConfig};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_with_config};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result, is_terminal_ws_error};
use crate::identifiers::ConnectionId;
use crate::protocol::event::close_status;
use crate::protocol::{CloseCode, InboundMessage, OutboundMessage, RequestDescriptor};

use super::bridge::EventSink;

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;

/// Reply channel for a socket command.
type Reply = oneshot::Sender<Result<()>>;

/// Sender half of a connection's inbound queue.
pub(crate) type InboundSender = mpsc::Sender<Result<InboundMessage>>;

/// Receiver half of a connection's inbound queue.
pub(crate) type InboundReceiver = mpsc::Receiver<Result<InboundMessage>>;

/// Reserved slot in the inbound queue.
type InboundPermit = mpsc::OwnedPermit<Result<InboundMessage>>;

/// Pong payload length: one big-endian `u64` sequence number.
const PING_PAYLOAD_LEN: usize = 8;

// ============================================================================
// SocketCommand
// ============================================================================

/// Commands executed by the socket task.
pub(crate) enum SocketCommand {
    /// Send a data message.
    Send { message: OutboundMessage, reply: Reply },
    /// Send a ping and resolve on the matching pong.
    Ping { reply: Reply },
    /// Start the close handshake.
    Close { frame: CloseFrame, reply: Reply },
}

// ============================================================================
// SocketObserver
// ============================================================================

/// Lifecycle callbacks from the socket task to its owner.
pub(crate) trait SocketObserver: Send + Sync + 'static {
    /// Handshake completed.
    fn opened(&self);

    /// Task is about to exit. Runs before `Closed` is published.
    fn finished(&self);
}

// ============================================================================
// SocketConfig
// ============================================================================

/// Transport settings applied to every connection.
#[derive(Debug, Clone)]
pub(crate) struct SocketConfig {
    /// tungstenite limits.
    pub websocket: WebSocketConfig,
    /// Set `TCP_NODELAY` on the socket.
    pub disable_nagle: bool,
    /// Default `User-Agent` header.
    pub user_agent: Option<String>,
    /// Time allowed for the peer to answer our close frame.
    pub close_timeout: Duration,
}

// ============================================================================
// SocketTask
// ============================================================================

/// Everything the socket task needs, moved into the spawned future.
pub(crate) struct SocketTask {
    pub id: ConnectionId,
    pub target: RequestDescriptor,
    pub subprotocols: Vec<String>,
    pub config: Arc<SocketConfig>,
    pub commands: mpsc::UnboundedReceiver<SocketCommand>,
    pub inbound: InboundSender,
    pub events: EventSink,
    pub cancel: CancellationToken,
    pub observer: Arc<dyn SocketObserver>,
}

impl SocketTask {
    /// Spawns the task on the current tokio runtime.
    pub(crate) fn spawn(self) {
        tokio::spawn(self.run());
    }

    async fn run(self) {
        let Self {
            id,
            target,
            subprotocols,
            config,
            commands,
            inbound,
            events,
            cancel,
            observer,
        } = self;

        let driver = Driver::new(&id, &config, &events, observer.as_ref(), inbound);

        let outcome = tokio::select! {
            _ = cancel.cancelled() => None,
            closed = driver.drive(target, subprotocols, commands) => Some(closed),
        };

        // Registry cleanup happens before `Closed` is observable.
        observer.finished();

        match outcome {
            Some((code, reason)) => {
                debug!(id = %id, %code, "Connection closed");
                events.closed(code, reason);
            }
            None => debug!(id = %id, "Socket cancelled"),
        }
    }
}

// ============================================================================
// Driver
// ============================================================================

/// State of one connection while its socket is alive.
struct Driver<'a> {
    id: &'a ConnectionId,
    config: &'a SocketConfig,
    events: &'a EventSink,
    observer: &'a dyn SocketObserver,
    inbound: InboundSender,
    /// Slot reserved for the next inbound item.
    permit: Option<InboundPermit>,
    /// Set once every inbound receiver is gone; frames are then dropped.
    discard: bool,
    /// Sequence number of the next ping.
    next_ping: u64,
    /// Pings awaiting a pong, oldest first.
    pending_pings: VecDeque<(u64, Reply)>,
    /// Close frame we sent, with the deadline for the peer's answer.
    local_close: Option<(CloseFrame, Instant)>,
    /// Close frame the peer sent.
    remote_close: Option<Option<CloseFrame>>,
}

impl<'a> Driver<'a> {
    fn new(
        id: &'a ConnectionId,
        config: &'a SocketConfig,
        events: &'a EventSink,
        observer: &'a dyn SocketObserver,
        inbound: InboundSender,
    ) -> Self {
        Self {
            id,
            config,
            events,
            observer,
            inbound,
            permit: None,
            discard: false,
            next_ping: 0,
            pending_pings: VecDeque::new(),
            local_close: None,
            remote_close: None,
        }
    }
}

impl Driver<'_> {
    /// Runs the connection to completion and returns its close status.
    async fn drive(
        mut self,
        target: RequestDescriptor,
        subprotocols: Vec<String>,
        mut commands: mpsc::UnboundedReceiver<SocketCommand>,
    ) -> (CloseCode, Option<Bytes>) {
        let Some(ws_stream) = self.connect(target, &subprotocols).await else {
            return (CloseCode::ABNORMAL, None);
        };

        let (mut ws_write, mut ws_read) = ws_stream.split();
        let mut commands_open = true;

        loop {
            let close_deadline = self.local_close.as_ref().map(|(_, deadline)| *deadline);
            let can_read = self.can_read();
            let wants_permit = self.permit.is_none() && !self.discard;

            tokio::select! {
                reserved = self.inbound.clone().reserve_owned(), if wants_permit => {
                    match reserved {
                        Ok(permit) => self.permit = Some(permit),
                        Err(_) => {
                            trace!(id = %self.id, "Inbound queue dropped, discarding frames");
                            self.discard = true;
                        }
                    }
                }

                frame = ws_read.next(), if can_read => {
                    if !self.handle_frame(frame) {
                        break;
                    }
                }

                command = commands.recv(), if commands_open => {
                    match command {
                        Some(command) => self.handle_command(command, &mut ws_write).await,
                        // Handle deregistered; keep reading until the peer closes.
                        None => commands_open = false,
                    }
                }

                () = sleep_until(close_deadline.unwrap_or_else(Instant::now)), if close_deadline.is_some() => {
                    warn!(id = %self.id, "Close handshake timed out");
                    break;
                }
            }
        }

        drop(ws_read);
        drop(ws_write);
        self.finish()
    }

    /// Whether the next frame may be read.
    ///
    /// Reading waits for a queue slot, except while closing: the peer's
    /// close frame must still get through when nobody drains the queue.
    fn can_read(&self) -> bool {
        self.permit.is_some() || self.discard || self.local_close.is_some()
    }

    /// Performs the opening handshake and publishes `Opened`.
    async fn connect(&self, target: RequestDescriptor, subprotocols: &[String]) -> Option<WsStream> {
        let request = match target.into_client_request(subprotocols, self.config.user_agent.as_deref()) {
            Ok(request) => request,
            Err(e) => {
                warn!(id = %self.id, error = %e, "Invalid handshake request");
                return None;
            }
        };

        debug!(id = %self.id, uri = %request.uri(), "Connecting");

        let (ws_stream, response) = match connect_async_with_config(
            request,
            Some(self.config.websocket),
            self.config.disable_nagle,
        )
        .await
        {
            Ok(pair) => pair,
            Err(e) => {
                warn!(id = %self.id, error = %e, "WebSocket connect failed");
                return None;
            }
        };

        let subprotocol = response
            .headers()
            .get(SEC_WEBSOCKET_PROTOCOL)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        debug!(id = %self.id, ?subprotocol, "WebSocket connection established");

        self.observer.opened();
        self.events.opened(subprotocol);

        Some(ws_stream)
    }

    /// Handles one read result. Returns `false` once the read side has ended.
    fn handle_frame(
        &mut self,
        frame: Option<std::result::Result<Message, tokio_tungstenite::tungstenite::Error>>,
    ) -> bool {
        match frame {
            // tungstenite queues the pong reply itself
            Some(Ok(Message::Ping(_))) => {
                trace!(id = %self.id, "Ping received");
            }

            Some(Ok(Message::Pong(payload))) => self.resolve_pong(&payload),

            Some(Ok(Message::Close(frame))) => {
                debug!(id = %self.id, ?frame, "Close frame received");
                self.remote_close = Some(frame);
            }

            Some(Ok(message)) => {
                trace!(id = %self.id, len = message.len(), "Data frame");
                self.publish(InboundMessage::try_from(message));
            }

            // tokio-tungstenite ends the stream after any read error
            Some(Err(e)) => {
                if is_terminal_ws_error(&e) {
                    debug!(id = %self.id, error = %e, "WebSocket read ended");
                } else {
                    warn!(id = %self.id, error = %e, "WebSocket read error");
                }
                self.publish(Err(Error::Transport(e)));
                return false;
            }

            None => {
                debug!(id = %self.id, "WebSocket stream ended");
                return false;
            }
        }

        true
    }

    /// Resolves the ping a pong answers, along with every older one.
    ///
    /// Peers may answer only the latest of several pings. Pongs that match
    /// no pending ping are ignored.
    fn resolve_pong(&mut self, payload: &[u8]) {
        let sequence = <[u8; PING_PAYLOAD_LEN]>::try_from(payload)
            .ok()
            .map(u64::from_be_bytes);

        let Some(position) = sequence.and_then(|sequence| {
            self.pending_pings
                .iter()
                .position(|(pending, _)| *pending == sequence)
        }) else {
            trace!(id = %self.id, len = payload.len(), "Unsolicited pong");
            return;
        };

        for (_, reply) in self.pending_pings.drain(..=position) {
            let _ = reply.send(Ok(()));
        }
    }

    /// Executes one registry command.
    async fn handle_command(&mut self, command: SocketCommand, ws_write: &mut WsWrite) {
        match command {
            SocketCommand::Send { message, reply } => {
                trace!(id = %self.id, len = message.len(), "Sending message");
                let result = ws_write.send(message.into()).await.map_err(Error::from);
                let _ = reply.send(result);
            }

            SocketCommand::Ping { reply } => {
                let sequence = self.next_ping;
                self.next_ping = self.next_ping.wrapping_add(1);

                let payload = Bytes::copy_from_slice(&sequence.to_be_bytes());
                match ws_write.send(Message::Ping(payload)).await {
                    Ok(()) => self.pending_pings.push_back((sequence, reply)),
                    Err(e) => {
                        let _ = reply.send(Err(Error::from(e)));
                    }
                }
            }

            SocketCommand::Close { frame, reply } => {
                debug!(id = %self.id, code = u16::from(frame.code), "Sending close frame");
                let result = ws_write
                    .send(Message::Close(Some(frame.clone())))
                    .await
                    .map_err(Error::from);
                if result.is_ok() {
                    self.local_close = Some((frame, Instant::now() + self.config.close_timeout));
                }
                let _ = reply.send(result);
            }
        }
    }

    /// Forwards one read outcome to the inbound queue.
    ///
    /// Uses the reserved slot when there is one. While closing without a
    /// slot, an item that does not fit is dropped.
    fn publish(&mut self, item: Result<InboundMessage>) {
        if let Some(permit) = self.permit.take() {
            let _ = permit.send(item);
        } else if !self.discard && self.inbound.try_send(item).is_err() {
            trace!(id = %self.id, "Inbound queue full while closing, item dropped");
        }
    }

    /// Fails pending pings and picks the final close status.
    ///
    /// The peer's close frame wins, then the one we sent, then 1006.
    fn finish(self) -> (CloseCode, Option<Bytes>) {
        let pending = self.pending_pings.len();
        for (_, reply) in self.pending_pings {
            let _ = reply.send(Err(Error::ConnectionClosed));
        }
        if pending > 0 {
            debug!(id = %self.id, count = pending, "Failed pending pings on close");
        }

        match (self.remote_close, self.local_close) {
            (Some(frame), _) => close_status(frame),
            (None, Some((frame, _))) => close_status(Some(frame)),
            (None, None) => (CloseCode::ABNORMAL, None),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Builds a close frame, validating the reason.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if the reason is not UTF-8 or does not
/// fit in a control frame (123 bytes).
pub(crate) fn close_frame(code: CloseCode, reason: Option<Bytes>) -> Result<CloseFrame> {
    const MAX_REASON_LEN: usize = 123;

    let reason = match reason {
        Some(reason) if reason.len() > MAX_REASON_LEN => {
            return Err(Error::invalid_argument(format!(
                "Close reason is {} bytes, maximum is {MAX_REASON_LEN}",
                reason.len()
            )));
        }
        Some(reason) => String::from_utf8(reason.to_vec())
            .map_err(|_| Error::invalid_argument("Close reason must be valid UTF-8"))?,
        None => String::new(),
    };

    Ok(CloseFrame {
        code: code.as_u16().into(),
        reason: reason.into(),
    })
}

// ============================================================================
// Tests
// ============================================================================
