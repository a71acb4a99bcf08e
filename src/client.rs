//! Public client contract.
//!
//! [`WebSocketClient`] is a thin, cheaply cloneable façade over a shared
//! [`Registry`]. Caller layers that want to swap in a test double should
//! depend on the [`WebSocketApi`] trait instead of the concrete type.
//!
//! # Example
//!
//! ```no_run
//! use futures_util::StreamExt;
//! use websocket_mux::{
//!     CloseCode, ConnectionEvent, OutboundMessage, RequestDescriptor, WebSocketClient,
//! };
//!
//! # async fn example() -> websocket_mux::Result<()> {
//! let client = WebSocketClient::new();
//!
//! let mut events = client.open("chat", RequestDescriptor::parse("ws://127.0.0.1:9001")?, &[]);
//! if let Some(ConnectionEvent::Opened { .. }) = events.next().await {
//!     let mut messages = client.receive(&"chat".into())?;
//!     client.send(&"chat".into(), OutboundMessage::text("hello")).await?;
//!     let reply = messages.next().await;
//! }
//!
//! client.close(&"chat".into(), CloseCode::NORMAL, None).await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::identifiers::ConnectionId;
use crate::protocol::{CloseCode, OutboundMessage, RequestDescriptor};
use crate::registry::Registry;
use crate::transport::{ConnectionEvents, MessageStream};

// ============================================================================
// WebSocketApi
// ============================================================================

/// The five operations offered to callers.
#[async_trait]
pub trait WebSocketApi: Send + Sync {
    /// Opens a connection and returns its lifecycle events.
    ///
    /// Never fails: connection errors are reported as a `Closed` event.
    fn open(
        &self,
        id: ConnectionId,
        target: RequestDescriptor,
        subprotocols: &[String],
    ) -> ConnectionEvents;

    /// Starts receiving messages on an open connection.
    fn receive(&self, id: &ConnectionId) -> Result<MessageStream>;

    /// Sends one message.
    async fn send(&self, id: &ConnectionId, message: OutboundMessage) -> Result<()>;

    /// Sends a ping and waits for the pong.
    async fn send_ping(&self, id: &ConnectionId) -> Result<()>;

    /// Closes a connection and removes it.
    async fn close(&self, id: &ConnectionId, code: CloseCode, reason: Option<Bytes>)
    -> Result<()>;
}

// ============================================================================
// WebSocketClient
// ============================================================================

/// Cloneable handle to a shared [`Registry`].
///
/// Clones share the same connections.
#[derive(Clone)]
pub struct WebSocketClient {
    registry: Arc<Registry>,
}

impl Default for WebSocketClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WebSocketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketClient")
            .field("connections", &self.registry.connection_count())
            .finish()
    }
}

impl WebSocketClient {
    /// Creates a client over a fresh registry with default options.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
        }
    }

    /// Creates a client over an existing registry.
    #[inline]
    #[must_use]
    pub fn from_registry(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Returns the underlying registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Opens a connection under `id`.
    ///
    /// See [`Registry::open`].
    pub fn open(
        &self,
        id: impl Into<ConnectionId>,
        target: RequestDescriptor,
        subprotocols: &[String],
    ) -> ConnectionEvents {
        self.registry.open(id.into(), target, subprotocols)
    }

    /// Starts a receive loop on `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`](crate::Error::NotConnected) if `id`
    /// is not registered.
    #[inline]
    pub fn receive(&self, id: &ConnectionId) -> Result<MessageStream> {
        self.registry.receive(id)
    }

    /// Sends one message on `id`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`](crate::Error::NotConnected) if `id` is not registered
    /// - [`Error::Transport`](crate::Error::Transport) if the write fails
    #[inline]
    pub async fn send(&self, id: &ConnectionId, message: OutboundMessage) -> Result<()> {
        self.registry.send(id, message).await
    }

    /// Pings `id` and waits for the pong.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send), plus
    /// [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) if the
    /// socket ends before the pong arrives.
    #[inline]
    pub async fn send_ping(&self, id: &ConnectionId) -> Result<()> {
        self.registry.send_ping(id).await
    }

    /// Closes `id` and removes it from the registry.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`](crate::Error::NotConnected) if `id` is not registered
    /// - [`Error::InvalidArgument`](crate::Error::InvalidArgument) if the reason is not
    ///   valid UTF-8 or longer than 123 bytes
    #[inline]
    pub async fn close(
        &self,
        id: &ConnectionId,
        code: CloseCode,
        reason: Option<Bytes>,
    ) -> Result<()> {
        self.registry.close(id, code, reason).await
    }

    /// Tears down every connection.
    #[inline]
    pub fn shutdown(&self) {
        self.registry.shutdown();
    }
}

#[async_trait]
impl WebSocketApi for WebSocketClient {
    fn open(
        &self,
        id: ConnectionId,
        target: RequestDescriptor,
        subprotocols: &[String],
    ) -> ConnectionEvents {
        self.registry.open(id, target, subprotocols)
    }

    fn receive(&self, id: &ConnectionId) -> Result<MessageStream> {
        self.registry.receive(id)
    }

    async fn send(&self, id: &ConnectionId, message: OutboundMessage) -> Result<()> {
        self.registry.send(id, message).await
    }

    async fn send_ping(&self, id: &ConnectionId) -> Result<()> {
        self.registry.send_ping(id).await
    }

    async fn close(
        &self,
        id: &ConnectionId,
        code: CloseCode,
        reason: Option<Bytes>,
    ) -> Result<()> {
        self.registry.close(id, code, reason).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::Error;

    async fn ping_through(api: &dyn WebSocketApi, id: &ConnectionId) -> Result<()> {
        api.send_ping(id).await
    }

    #[tokio::test]
    async fn test_clones_share_registry() {
        let client = WebSocketClient::new();
        let clone = client.clone();

        let target = RequestDescriptor::parse("ws://127.0.0.1:9").unwrap();
        let _events = client.open("shared", target, &[]);

        assert!(clone.registry().contains(&ConnectionId::new("shared")));
        assert!(Arc::ptr_eq(client.registry(), clone.registry()));
    }

    #[tokio::test]
    async fn test_trait_object_reports_not_connected() {
        let client = WebSocketClient::new();
        let id = ConnectionId::new("missing");

        let err = ping_through(&client, &id).await.unwrap_err();
        assert!(err.is_not_connected());

        let err = WebSocketApi::receive(&client, &id).unwrap_err();
        assert!(matches!(err, Error::NotConnected { .. }));
    }

    #[tokio::test]
    async fn test_shutdown_empties_registry() {
        let client = WebSocketClient::default();
        let target = RequestDescriptor::parse("ws://127.0.0.1:9").unwrap();
        let _a = client.open("a", target.clone(), &[]);
        let _b = client.open("b", target, &[]);
        assert_eq!(client.registry().connection_count(), 2);

        client.shutdown();
        assert_eq!(client.registry().connection_count(), 0);
    }
}
