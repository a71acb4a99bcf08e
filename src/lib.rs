//! WebSocket Mux - keyed WebSocket client connections over one registry.
//!
//! This library lets any number of callers open, use, and close client
//! WebSocket connections identified by caller-chosen [`ConnectionId`]s.
//!
//! # Architecture
//!
//! The library is built around a single coordination point:
//!
//! - **Registry**: owns the `ConnectionId → handle` map; every operation
//!   looks the ID up there and fails with [`Error::NotConnected`] if absent
//! - **Socket task**: one background task per connection drives the
//!   handshake, writes, and reads
//! - **Event bridge**: turns socket callbacks into a lazy
//!   [`ConnectionEvents`] sequence
//! - **Receive loop**: turns inbound frames into a lazy [`MessageStream`]
//!
//! Key design principles:
//!
//! - One lock, never held across an `.await`
//! - Every termination path runs the same idempotent teardown
//! - Dropping a sequence is the same as cancelling it
//! - A failure on one ID never affects another
//!
//! # Quick Start
//!
//! ```no_run
//! use futures_util::StreamExt;
//! use websocket_mux::{
//!     CloseCode, ConnectionEvent, ConnectionId, OutboundMessage, RequestDescriptor, Result,
//!     WebSocketClient,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = WebSocketClient::new();
//!     let id = ConnectionId::new("echo");
//!
//!     // Open and wait for the handshake
//!     let target = RequestDescriptor::parse("ws://127.0.0.1:9001")?;
//!     let mut events = client.open(id.clone(), target, &[]);
//!     if let Some(ConnectionEvent::Opened { subprotocol }) = events.next().await {
//!         println!("Opened with {subprotocol:?}");
//!     }
//!
//!     // Receive and send
//!     let mut messages = client.receive(&id)?;
//!     client.send(&id, OutboundMessage::text("hello")).await?;
//!     println!("Got {:?}", messages.next().await);
//!
//!     client.close(&id, CloseCode::NORMAL, None).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Public contract: [`WebSocketClient`], [`WebSocketApi`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Connection identifiers |
//! | [`protocol`] | Messages, events, and request descriptors |
//! | [`registry`] | [`Registry`] and its configuration |
//! | [`transport`] | Event and message sequences |
//!
//! # Features
//!
//! - **rustls**: `wss://` support through `rustls` with webpki roots

// ============================================================================
// Modules
// ============================================================================

/// Public client contract.
///
/// Use [`WebSocketClient::new()`] for a client over a private registry.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Connection identifiers.
pub mod identifiers;

/// Messages, events, and request descriptors.
pub mod protocol;

/// Connection registry.
///
/// Use [`Registry::builder()`] to create a configured registry.
pub mod registry;

/// WebSocket transport layer.
///
/// Exposes the sequences returned by `open` and `receive`; the socket task
/// itself is internal.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{WebSocketApi, WebSocketClient};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ConnectionId, ConnectionKey};

// Protocol types
pub use protocol::{CloseCode, ConnectionEvent, InboundMessage, OutboundMessage, RequestDescriptor};

// Registry types
pub use registry::{Registry, RegistryBuilder, RegistryOptions};

// Transport types
pub use transport::{ConnectionEvents, MessageStream};
