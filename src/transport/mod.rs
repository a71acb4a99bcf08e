//! WebSocket transport layer.
//!
//! This module owns everything that touches a live socket. The registry
//! creates these pieces per connection and never lets them escape.
//!
//! # Architecture
//!
//! ```text
//!                  commands                      frames
//! Registry ─────────────────► SocketTask ◄──────────────────► peer
//!                                 │  │
//!             opened / closed     │  │  inbound queue
//!        ┌────────────────────────┘  └───────────────┐
//!        ▼                                           ▼
//!   EventSink ──► ConnectionEvents          receive loop ──► MessageStream
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `bridge` | Event bridge: socket callbacks to [`ConnectionEvents`] |
//! | `receiver` | Receive loop and [`MessageStream`] |
//! | `socket` | Per-connection socket task |

// ============================================================================
// Submodules
// ============================================================================

/// Event bridge from socket callbacks to a lazy event sequence.
pub mod bridge;

/// Receive loop and message sequence.
pub mod receiver;

/// Per-connection socket task.
pub(crate) mod socket;

// ============================================================================
// Re-exports
// ============================================================================

pub use bridge::ConnectionEvents;
pub use receiver::MessageStream;
