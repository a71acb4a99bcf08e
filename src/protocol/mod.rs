//! Message, event and request types.
//!
//! # Overview
//!
//! | Type | Direction | Purpose |
//! |------|-----------|---------|
//! | [`RequestDescriptor`] | Local → Remote | Handshake target and headers |
//! | [`OutboundMessage`] | Local → Remote | Data sent by `send` |
//! | [`InboundMessage`] | Remote → Local | Data yielded by `receive` |
//! | [`ConnectionEvent`] | Remote → Local | Opened / Closed notifications |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `event` | Lifecycle events and close codes |
//! | `message` | Inbound and outbound data messages |
//! | `request` | Handshake request descriptor |

// ============================================================================
// Submodules
// ============================================================================

/// Lifecycle events and close codes.
pub mod event;

/// Inbound and outbound data messages.
pub mod message;

/// Handshake request descriptor.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::{CloseCode, ConnectionEvent};
pub use message::{InboundMessage, OutboundMessage};
pub use request::RequestDescriptor;
