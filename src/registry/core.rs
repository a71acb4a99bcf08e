//! Connection registry.
//!
//! The [`Registry`] is the single owner of the `ConnectionId → handle`
//! mapping. Every read and write of the map goes through one lock, and the
//! lock is never held across an `.await`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │               Registry                  │
//! │  ┌─────────────────────────────────┐    │
//! │  │ "chat"  (gen 1) → handle ──► socket task
//! │  │ "feed"  (gen 2) → handle ──► socket task
//! │  │ <uuid>  (gen 5) → handle ──► socket task
//! │  └─────────────────────────────────┘    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Each `open` gets a new generation number. Teardown only removes the
//! entry if the generation still matches, so a stale handle can never
//! deregister its replacement.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;
use crate::protocol::{CloseCode, OutboundMessage, RequestDescriptor};
use crate::transport::socket::{SocketCommand, SocketConfig, SocketTask, close_frame};
use crate::transport::{ConnectionEvents, MessageStream, bridge, receiver};

use super::builder::RegistryBuilder;
use super::handle::{ConnectionHandle, Lifecycle, TeardownCause};
use super::options::RegistryOptions;

// ============================================================================
// Registry
// ============================================================================

/// Owner of all open connections.
///
/// Thread-safe; share it as `Arc<Registry>`. Operations on different IDs
/// never interfere, and a failure on one ID never affects another.
///
/// # Example
///
/// ```no_run
/// use futures_util::StreamExt;
/// use websocket_mux::{ConnectionId, OutboundMessage, Registry, RequestDescriptor};
///
/// # async fn example() -> websocket_mux::Result<()> {
/// let registry = Registry::new();
/// let id = ConnectionId::new("chat");
///
/// let mut events = registry.open(id.clone(), RequestDescriptor::parse("ws://127.0.0.1:9001")?, &[]);
/// let opened = events.next().await;
///
/// registry.send(&id, OutboundMessage::text("hello")).await?;
/// let mut messages = registry.receive(&id)?;
/// let reply = messages.next().await;
/// # Ok(())
/// # }
/// ```
pub struct Registry {
    /// Validated options.
    options: RegistryOptions,

    /// Transport settings shared by every socket task.
    socket_config: Arc<SocketConfig>,

    /// Registered connections.
    connections: RwLock<FxHashMap<ConnectionId, ConnectionHandle>>,

    /// Source of handle generations.
    next_generation: AtomicU64,
}

// ============================================================================
// Registry - Constructor
// ============================================================================

impl Registry {
    /// Creates a registry with default options.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::from_validated(RegistryOptions::default())
    }

    /// Creates a registry with custom options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the options are invalid.
    pub fn with_options(options: RegistryOptions) -> Result<Arc<Self>> {
        options.validate()?;
        Ok(Self::from_validated(options))
    }

    /// Returns a builder for a configured registry.
    #[inline]
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    fn from_validated(options: RegistryOptions) -> Arc<Self> {
        let socket_config = Arc::new(options.socket_config());

        debug!(?options, "Registry created");

        Arc::new(Self {
            options,
            socket_config,
            connections: RwLock::new(FxHashMap::default()),
            next_generation: AtomicU64::new(1),
        })
    }
}

// ============================================================================
// Registry - Public API
// ============================================================================

impl Registry {
    /// Opens a connection and returns its lifecycle events.
    ///
    /// The handle is registered before the handshake completes, so `send`
    /// and `receive` may be called right away; sends queue until the socket
    /// is open. Connection failures never surface here: the sequence yields
    /// `Closed` with [`CloseCode::ABNORMAL`] instead.
    ///
    /// An ID that is already registered is torn down first.
    ///
    /// Must be called within a tokio runtime.
    pub fn open(
        self: &Arc<Self>,
        id: ConnectionId,
        target: RequestDescriptor,
        subprotocols: &[String],
    ) -> ConnectionEvents {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let lifecycle = Arc::new(Lifecycle::new(Arc::downgrade(self), id.clone(), generation));

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::channel(self.options.receive_buffer);

        let on_cancel = {
            let lifecycle = Arc::clone(&lifecycle);
            Box::new(move || lifecycle.teardown(TeardownCause::Cancelled))
        };
        let (sink, events) = bridge::channel(id.clone(), on_cancel);

        let handle = ConnectionHandle::new(Arc::clone(&lifecycle), commands_tx, inbound_rx);

        let previous = {
            let mut connections = self.connections.write();
            connections.insert(id.clone(), handle)
        };

        if let Some(mut previous) = previous {
            warn!(
                id = %id,
                previous = previous.lifecycle.generation(),
                generation,
                "ID reopened, tearing down previous connection"
            );
            previous.stop_reader();
            previous.lifecycle.teardown(TeardownCause::Replaced);
        }

        SocketTask {
            id: id.clone(),
            target,
            subprotocols: subprotocols.to_vec(),
            config: Arc::clone(&self.socket_config),
            commands: commands_rx,
            inbound: inbound_tx,
            events: sink,
            cancel: lifecycle.cancel_token(),
            observer: lifecycle,
        }
        .spawn();

        info!(id = %id, generation, "Connection opened");

        events
    }

    /// Starts a receive loop and returns its message sequence.
    ///
    /// A previous receive loop on the same connection is stopped and its
    /// sequence ends. Read errors are yielded as failed items and do not
    /// stop the loop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if `id` is not registered; no task
    /// is spawned in that case.
    pub fn receive(&self, id: &ConnectionId) -> Result<MessageStream> {
        let token = CancellationToken::new();

        let inbound = {
            let mut connections = self.connections.write();
            let handle = connections
                .get_mut(id)
                .ok_or_else(|| Error::not_connected(id))?;
            handle.replace_reader(token.clone());
            Arc::clone(&handle.inbound)
        };

        Ok(receiver::spawn(
            id.clone(),
            inbound,
            token,
            self.options.receive_buffer,
        ))
    }

    /// Sends a message.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if `id` is not registered
    /// - [`Error::Transport`] if the write fails
    /// - [`Error::ConnectionClosed`] if the socket task has exited
    pub async fn send(&self, id: &ConnectionId, message: OutboundMessage) -> Result<()> {
        let commands = self.commands(id)?;
        let (reply, response) = oneshot::channel();

        commands
            .send(SocketCommand::Send { message, reply })
            .map_err(|_| Error::ConnectionClosed)?;

        response.await?
    }

    /// Sends a ping and waits for the pong.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if `id` is not registered
    /// - [`Error::Transport`] if the write fails
    /// - [`Error::ConnectionClosed`] if the socket closes before the pong
    pub async fn send_ping(&self, id: &ConnectionId) -> Result<()> {
        let commands = self.commands(id)?;
        let (reply, response) = oneshot::channel();

        commands
            .send(SocketCommand::Ping { reply })
            .map_err(|_| Error::ConnectionClosed)?;

        response.await?
    }

    /// Closes a connection.
    ///
    /// The entry is removed unconditionally, so a second `close` fails with
    /// [`Error::NotConnected`] instead of closing the socket twice. The
    /// event sequence still yields `Closed` once the peer answers.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if `id` is not registered, whatever the reason
    /// - [`Error::InvalidArgument`] if the reason is not UTF-8 or exceeds 123 bytes
    pub async fn close(
        &self,
        id: &ConnectionId,
        code: CloseCode,
        reason: Option<Bytes>,
    ) -> Result<()> {
        let (mut handle, frame) = {
            let mut connections = self.connections.write();
            if !connections.contains_key(id) {
                return Err(Error::not_connected(id));
            }
            // An invalid reason leaves the connection registered.
            let frame = close_frame(code, reason)?;
            let handle = connections
                .remove(id)
                .ok_or_else(|| Error::not_connected(id))?;
            (handle, frame)
        };

        info!(id = %id, %code, generation = handle.lifecycle.generation(), "Closing connection");

        if !handle.lifecycle.is_opened() {
            handle.stop_reader();
            handle.lifecycle.teardown(TeardownCause::Closed);
            return Ok(());
        }

        let (reply, response) = oneshot::channel();
        let sent = handle
            .commands
            .send(SocketCommand::Close { frame, reply })
            .is_ok();
        drop(handle);

        if sent {
            match response.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(id = %id, error = %e, "Close frame not sent"),
                Err(_) => debug!(id = %id, "Socket exited before close"),
            }
        }

        Ok(())
    }

    /// Returns the number of registered connections.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    /// Returns `true` if `id` is registered.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.read().contains_key(id)
    }

    /// Returns `true` if `id` is registered and has a running receive loop.
    #[must_use]
    pub fn is_receiving(&self, id: &ConnectionId) -> bool {
        self.connections
            .read()
            .get(id)
            .is_some_and(ConnectionHandle::has_reader)
    }

    /// Returns the registry options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }
}

// ============================================================================
// Registry - Lifecycle
// ============================================================================

impl Registry {
    /// Releases every connection.
    ///
    /// Cancels all socket tasks and receive loops. Event sequences end
    /// without a `Closed` event. The registry stays usable.
    pub fn shutdown(&self) {
        let drained: Vec<_> = {
            let mut connections = self.connections.write();
            connections.drain().collect()
        };

        let count = drained.len();
        for (_, mut handle) in drained {
            handle.stop_reader();
            handle.lifecycle.teardown(TeardownCause::Shutdown);
        }

        info!(count, "Registry shut down");
    }

    /// Removes `id` if it is still registered under `generation`.
    pub(crate) fn deregister(&self, id: &ConnectionId, generation: u64) -> Option<ConnectionHandle> {
        let mut connections = self.connections.write();

        match connections.get(id) {
            Some(handle) if handle.lifecycle.generation() == generation => {
                debug!(id = %id, generation, "Connection deregistered");
                connections.remove(id)
            }
            _ => None,
        }
    }

    /// Clones the command channel for `id` out of the map.
    fn commands(&self, id: &ConnectionId) -> Result<mpsc::UnboundedSender<SocketCommand>> {
        self.connections
            .read()
            .get(id)
            .map(|handle| handle.commands.clone())
            .ok_or_else(|| Error::not_connected(id))
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        let connections = self.connections.get_mut();
        for (_, mut handle) in connections.drain() {
            handle.stop_reader();
            handle.lifecycle.teardown(TeardownCause::Shutdown);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
