//! Connection handles and their teardown routine.
//!
//! A [`ConnectionHandle`] is the registry's private record for one
//! registered connection. Its [`Lifecycle`] is shared with the socket task
//! and the event sequence so that every termination path (explicit close,
//! consumer cancellation, remote close, replacement, shutdown) ends in the
//! same [`Lifecycle::teardown`], which runs at most once per generation.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::identifiers::ConnectionId;
use crate::transport::receiver::SharedInbound;
use crate::transport::socket::{InboundReceiver, SocketCommand, SocketObserver};

use super::core::Registry;

// ============================================================================
// TeardownCause
// ============================================================================

/// What triggered a teardown. Only used for logging and reader policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TeardownCause {
    /// `close` was called before the handshake completed.
    Closed,
    /// The consumer cancelled or dropped the event sequence.
    Cancelled,
    /// The socket task exited (peer close, failure, or finished handshake).
    Finished,
    /// A newer `open` reused the ID.
    Replaced,
    /// The registry was shut down.
    Shutdown,
}

impl TeardownCause {
    /// Whether the active receive loop is stopped right away.
    ///
    /// After the socket finishes, the loop drains what is already queued
    /// and stops on its own.
    fn stops_reader(self) -> bool {
        !matches!(self, Self::Finished)
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

/// State shared by a handle, its socket task, and its event sequence.
pub(crate) struct Lifecycle {
    /// Owning registry; weak so handles never keep it alive.
    registry: Weak<Registry>,
    /// Registered ID.
    id: ConnectionId,
    /// Distinguishes successive registrations of the same ID.
    generation: u64,
    /// Cancels the socket task.
    cancel: CancellationToken,
    /// Set once the handshake completes.
    opened: AtomicBool,
    /// Set by the first teardown.
    torn_down: AtomicBool,
}

impl Lifecycle {
    pub(crate) fn new(registry: Weak<Registry>, id: ConnectionId, generation: u64) -> Self {
        Self {
            registry,
            id,
            generation,
            cancel: CancellationToken::new(),
            opened: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
        }
    }

    #[inline]
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Token observed by the socket task.
    #[inline]
    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[inline]
    pub(crate) fn is_opened(&self) -> bool {
        self.opened.load(Ordering::Acquire)
    }

    /// Stops the reader, cancels the socket and deregisters this generation.
    ///
    /// Only the first call has any effect. Never blocks.
    pub(crate) fn teardown(&self, cause: TeardownCause) {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            trace!(id = %self.id, generation = self.generation, ?cause, "Teardown already ran");
            return;
        }

        let removed = self
            .registry
            .upgrade()
            .and_then(|registry| registry.deregister(&self.id, self.generation));

        if let Some(mut handle) = removed
            && cause.stops_reader()
        {
            handle.stop_reader();
        }

        self.cancel.cancel();

        debug!(id = %self.id, generation = self.generation, ?cause, "Connection torn down");
    }
}

impl SocketObserver for Lifecycle {
    fn opened(&self) {
        self.opened.store(true, Ordering::Release);
    }

    fn finished(&self) {
        self.teardown(TeardownCause::Finished);
    }
}

// ============================================================================
// ConnectionHandle
// ============================================================================

/// Registry record for one connection.
///
/// Never leaves the registry; operations clone what they need out of it
/// while holding the map lock and release the lock before awaiting.
pub(crate) struct ConnectionHandle {
    /// Shared lifecycle state.
    pub(crate) lifecycle: Arc<Lifecycle>,
    /// Commands to the socket task.
    pub(crate) commands: mpsc::UnboundedSender<SocketCommand>,
    /// Frames published by the socket task.
    pub(crate) inbound: SharedInbound,
    /// Stops the active receive loop, if any.
    reader: Option<CancellationToken>,
}

impl ConnectionHandle {
    pub(crate) fn new(
        lifecycle: Arc<Lifecycle>,
        commands: mpsc::UnboundedSender<SocketCommand>,
        inbound: InboundReceiver,
    ) -> Self {
        Self {
            lifecycle,
            commands,
            inbound: Arc::new(AsyncMutex::new(inbound)),
            reader: None,
        }
    }

    /// Installs the token of a new receive loop, stopping the previous one.
    pub(crate) fn replace_reader(&mut self, token: CancellationToken) {
        if let Some(previous) = self.reader.replace(token) {
            previous.cancel();
            debug!(id = %self.lifecycle.id, "Previous receive loop replaced");
        }
    }

    /// Stops the active receive loop.
    pub(crate) fn stop_reader(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.cancel();
        }
    }

    /// Returns `true` if a receive loop is running.
    #[inline]
    pub(crate) fn has_reader(&self) -> bool {
        self.reader.as_ref().is_some_and(|reader| !reader.is_cancelled())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn detached(id: &str) -> Arc<Lifecycle> {
        Arc::new(Lifecycle::new(Weak::new(), ConnectionId::new(id), 1))
    }

    #[test]
    fn test_teardown_cancels_socket_once() {
        let lifecycle = detached("a");
        let token = lifecycle.cancel_token();

        lifecycle.teardown(TeardownCause::Cancelled);
        assert!(token.is_cancelled());

        // Second call is a no-op
        lifecycle.teardown(TeardownCause::Shutdown);
        assert!(lifecycle.torn_down.load(Ordering::SeqCst));
    }

    #[test]
    fn test_observer_marks_opened() {
        let lifecycle = detached("a");
        assert!(!lifecycle.is_opened());
        SocketObserver::opened(lifecycle.as_ref());
        assert!(lifecycle.is_opened());
    }

    #[test]
    fn test_replace_reader_cancels_previous() {
        let (commands, _) = mpsc::unbounded_channel();
        let (_, inbound) = mpsc::channel(1);
        let mut handle = ConnectionHandle::new(detached("a"), commands, inbound);

        let first = CancellationToken::new();
        handle.replace_reader(first.clone());
        assert!(handle.has_reader());

        let second = CancellationToken::new();
        handle.replace_reader(second.clone());
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());

        handle.stop_reader();
        assert!(second.is_cancelled());
        assert!(!handle.has_reader());
    }

    #[test]
    fn test_only_finished_keeps_reader() {
        assert!(!TeardownCause::Finished.stops_reader());
        assert!(TeardownCause::Cancelled.stops_reader());
        assert!(TeardownCause::Replaced.stops_reader());
    }
}
