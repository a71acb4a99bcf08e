//! Receive loop and the message sequence returned by `receive`.
//!
//! A receive loop is a background task that repeatedly awaits one item from
//! a connection's inbound queue and republishes it to the consumer.
//!
//! # Error Policy
//!
//! A failed item does not stop the loop. The loop ends only when:
//!
//! - the consumer cancels or drops the [`MessageStream`]
//! - the registry replaces it with a newer loop for the same connection
//! - the socket task has exited and the queue is drained, in which case a
//!   final [`Error::ConnectionClosed`] is yielded
//!
//! Deciding how many failures mean "give up" is left to the caller.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;
use crate::protocol::InboundMessage;

use super::socket::InboundReceiver;

// ============================================================================
// Types
// ============================================================================

/// Inbound queue shared between successive receive loops of one connection.
pub(crate) type SharedInbound = Arc<AsyncMutex<InboundReceiver>>;

// ============================================================================
// Spawn
// ============================================================================

/// Starts a receive loop and returns the consumer side.
///
/// `token` stops the loop; the caller keeps a clone to stop it from outside.
pub(crate) fn spawn(
    id: ConnectionId,
    inbound: SharedInbound,
    token: CancellationToken,
    buffer: usize,
) -> MessageStream {
    let (tx, rx) = mpsc::channel(buffer);

    tokio::spawn(run_receive_loop(id.clone(), inbound, tx, token.clone()));

    MessageStream { id, rx, token }
}

/// Receive loop body.
async fn run_receive_loop(
    id: ConnectionId,
    inbound: SharedInbound,
    tx: mpsc::Sender<Result<InboundMessage>>,
    token: CancellationToken,
) {
    // A replaced loop may still hold the queue for a moment.
    let mut inbound = tokio::select! {
        _ = token.cancelled() => {
            trace!(id = %id, "Receive loop cancelled before start");
            return;
        }
        guard = inbound.lock() => guard,
    };

    debug!(id = %id, "Receive loop started");

    loop {
        let next = tokio::select! {
            _ = token.cancelled() => break,
            next = inbound.recv() => next,
        };

        let (item, last) = match next {
            Some(item) => (item, false),
            None => (Err(Error::ConnectionClosed), true),
        };

        tokio::select! {
            _ = token.cancelled() => break,
            sent = tx.send(item) => {
                if sent.is_err() {
                    break;
                }
            }
        }

        if last {
            break;
        }
    }

    debug!(id = %id, "Receive loop stopped");
}

// ============================================================================
// MessageStream
// ============================================================================

/// Inbound messages for one connection, returned by `receive`.
///
/// Each item is either a message or the transport error that a read
/// produced. Dropping this stream (or calling [`cancel`](Self::cancel))
/// stops the receive loop; the connection itself stays open.
pub struct MessageStream {
    /// Connection this sequence belongs to.
    id: ConnectionId,
    /// Items published by the receive loop.
    rx: mpsc::Receiver<Result<InboundMessage>>,
    /// Stops the receive loop.
    token: CancellationToken,
}

impl MessageStream {
    /// Returns the connection ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Returns `true` once the loop has been cancelled, by the consumer or
    /// by a newer `receive` on the same connection.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stops the receive loop.
    ///
    /// Repeated calls are no-ops. No items are yielded afterwards.
    pub fn cancel(&mut self) {
        if !self.token.is_cancelled() {
            trace!(id = %self.id, "Message sequence cancelled");
            self.token.cancel();
        }
        self.rx.close();
    }
}

impl Stream for MessageStream {
    type Item = Result<InboundMessage>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.token.is_cancelled() {
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}

impl fmt::Debug for MessageStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageStream")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl Drop for MessageStream {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

// ============================================================================
// Tests
// ============================================================================
