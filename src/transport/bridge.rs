//! Event bridge from socket callbacks to a lazy event sequence.
//!
//! The socket task pushes lifecycle notifications into an [`EventSink`];
//! the caller pulls them from the matching [`ConnectionEvents`] stream.
//!
//! ```text
//! socket task ── opened() ──► EventSink ──► ConnectionEvents ──► caller
//!             ── closed() ──►  (consumed)    (terminates)
//! ```
//!
//! Cancelling or dropping [`ConnectionEvents`] runs its on-cancel hook
//! exactly once.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use tokio::sync::mpsc;
use tracing::trace;

use crate::identifiers::ConnectionId;
use crate::protocol::{CloseCode, ConnectionEvent};

// ============================================================================
// Types
// ============================================================================

/// Hook run when the consumer abandons the event sequence.
pub(crate) type OnCancel = Box<dyn FnOnce() + Send + Sync>;

/// Creates a connected sink/stream pair.
pub(crate) fn channel(id: ConnectionId, on_cancel: OnCancel) -> (EventSink, ConnectionEvents) {
    let (tx, rx) = mpsc::unbounded_channel();

    let sink = EventSink { tx };
    let events = ConnectionEvents {
        id,
        rx,
        on_cancel: Some(on_cancel),
    };

    (sink, events)
}

// ============================================================================
// EventSink
// ============================================================================

/// Producer side of the bridge, owned by the socket task.
///
/// `closed` consumes the sink, so at most one `Closed` event can be sent.
/// Dropping the sink without calling `closed` ends the sequence silently.
pub(crate) struct EventSink {
    tx: mpsc::UnboundedSender<ConnectionEvent>,
}

impl EventSink {
    /// Publishes `Opened`.
    pub(crate) fn opened(&self, subprotocol: Option<String>) {
        let _ = self.tx.send(ConnectionEvent::Opened { subprotocol });
    }

    /// Publishes `Closed` and terminates the sequence.
    pub(crate) fn closed(self, code: CloseCode, reason: Option<Bytes>) {
        let _ = self.tx.send(ConnectionEvent::Closed { code, reason });
    }
}

// ============================================================================
// ConnectionEvents
// ============================================================================

/// Lifecycle events for one connection, returned by `open`.
///
/// Yields at most one [`ConnectionEvent::Opened`], then at most one
/// [`ConnectionEvent::Closed`], then ends.
///
/// Dropping this stream (or calling [`cancel`](Self::cancel)) cancels the
/// connection's socket and removes it from the registry.
pub struct ConnectionEvents {
    /// Connection this sequence belongs to.
    id: ConnectionId,
    /// Events published by the socket task.
    rx: mpsc::UnboundedReceiver<ConnectionEvent>,
    /// Teardown hook, taken on first cancellation.
    on_cancel: Option<OnCancel>,
}

impl ConnectionEvents {
    /// Returns the connection ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Returns `true` once the sequence has been cancelled.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.on_cancel.is_none()
    }

    /// Stops the sequence and tears the connection down.
    ///
    /// Repeated calls are no-ops. No events are yielded afterwards.
    pub fn cancel(&mut self) {
        if let Some(on_cancel) = self.on_cancel.take() {
            trace!(id = %self.id, "Event sequence cancelled");
            self.rx.close();
            on_cancel();
        }
    }
}

impl Stream for ConnectionEvents {
    type Item = ConnectionEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.is_cancelled() {
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}

impl fmt::Debug for ConnectionEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionEvents")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl Drop for ConnectionEvents {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ============================================================================
// Tests
// ============================================================================
