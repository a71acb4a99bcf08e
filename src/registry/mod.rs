//! Connection registry module.
//!
//! The registry maps caller-chosen [`ConnectionId`](crate::ConnectionId)s to
//! live WebSocket connections and serializes every access to that mapping.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Registry`] | Owner of all open connections |
//! | [`RegistryBuilder`] | Fluent configuration builder |
//! | [`RegistryOptions`] | Transport settings applied to every connection |
//!
//! # Example
//!
//! ```no_run
//! use futures_util::StreamExt;
//! use websocket_mux::{CloseCode, ConnectionId, Registry, RequestDescriptor};
//!
//! # async fn example() -> websocket_mux::Result<()> {
//! let registry = Registry::builder().disable_nagle(true).build()?;
//! let id = ConnectionId::new("feed");
//!
//! let mut events = registry.open(id.clone(), RequestDescriptor::parse("ws://127.0.0.1:9001")?, &[]);
//! while let Some(event) = events.next().await {
//!     println!("{event:?}");
//! }
//!
//! registry.close(&id, CloseCode::NORMAL, None).await.ok();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for registry configuration.
pub mod builder;

/// Core registry implementation.
pub mod core;

/// Connection handles and teardown.
pub(crate) mod handle;

/// Registry options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::RegistryBuilder;
pub use core::Registry;
pub use options::RegistryOptions;
