//! Error types for the WebSocket multiplexer.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use websocket_mux::{ConnectionId, OutboundMessage, Result, WebSocketClient};
//!
//! async fn example(client: &WebSocketClient, id: &ConnectionId) -> Result<()> {
//!     client.send(id, OutboundMessage::text("hello")).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Registry | [`Error::NotConnected`] |
//! | Transport | [`Error::Transport`], [`Error::ConnectionClosed`], [`Error::UnsupportedFrame`] |
//! | Configuration | [`Error::Config`], [`Error::InvalidArgument`] |
//! | External | [`Error::Url`], [`Error::Json`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::ConnectionId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// A failure on one connection never affects any other connection.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Registry Errors
    // ========================================================================
    /// No connection is registered under the given ID.
    ///
    /// Returned when the ID was never opened, was already closed, or was
    /// removed after its event sequence was cancelled.
    #[error("Not connected: {id}")]
    NotConnected {
        /// The unregistered connection ID.
        id: ConnectionId,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// The socket task for this connection is gone.
    ///
    /// Returned when the transport permanently refuses further operations.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Failure raised by the underlying WebSocket library.
    #[error("Transport error: {0}")]
    Transport(#[from] WsError),

    /// Inbound frame that neither text nor binary messages can represent.
    #[error("Unsupported frame: {kind}")]
    UnsupportedFrame {
        /// Frame kind that was received.
        kind: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid argument passed by the caller.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    /// Configuration error.
    ///
    /// Returned when registry options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// JSON deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Conversions
// ============================================================================

impl From<RecvError> for Error {
    /// A dropped reply channel means the socket task exited.
    fn from(_: RecvError) -> Self {
        Self::ConnectionClosed
    }
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a not connected error.
    #[inline]
    pub fn not_connected(id: &ConnectionId) -> Self {
        Self::NotConnected { id: id.clone() }
    }

    /// Creates an unsupported frame error.
    #[inline]
    pub fn unsupported_frame(kind: impl Into<String>) -> Self {
        Self::UnsupportedFrame { kind: kind.into() }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if the ID had no registered connection.
    #[inline]
    #[must_use]
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::NotConnected { .. })
    }

    /// Returns `true` if this error came from the underlying transport.
    #[inline]
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::ConnectionClosed | Self::UnsupportedFrame { .. }
        )
    }

    /// Returns `true` if the connection can no longer be used.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::NotConnected { .. } | Self::ConnectionClosed => true,
            Self::Transport(e) => is_terminal_ws_error(e),
            _ => false,
        }
    }
}

/// Returns `true` if tungstenite cannot read from the stream after `err`.
pub(crate) fn is_terminal_ws_error(err: &WsError) -> bool {
    matches!(
        err,
        WsError::ConnectionClosed | WsError::AlreadyClosed | WsError::Io(_) | WsError::Protocol(_)
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_connected_display() {
        let err = Error::not_connected(&ConnectionId::new("chat"));
        assert_eq!(err.to_string(), "Not connected: chat");
        assert!(err.is_not_connected());
        assert!(err.is_connection_error());
        assert!(!err.is_transport_error());
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("receive_buffer must be greater than zero");
        assert_eq!(
            err.to_string(),
            "Configuration error: receive_buffer must be greater than zero"
        );
        assert!(!err.is_connection_error());
    }

    #[test]
    fn test_unsupported_frame() {
        let err = Error::unsupported_frame("ping");
        assert_eq!(err.to_string(), "Unsupported frame: ping");
        assert!(err.is_transport_error());
    }

    #[test]
    fn test_terminal_ws_errors() {
        let closed: Error = WsError::ConnectionClosed.into();
        assert!(matches!(closed, Error::Transport(_)));
        assert!(closed.is_connection_error());

        let attack: Error = WsError::AttackAttempt.into();
        assert!(attack.is_transport_error());
        assert!(!attack.is_connection_error());
    }

    #[tokio::test]
    async fn test_from_recv_error() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        drop(tx);
        let err: Error = rx.await.unwrap_err().into();
        assert!(matches!(err, Error::ConnectionClosed));
    }

    #[test]
    fn test_from_url_error() {
        let err: Error = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, Error::Url(_)));
    }
}
