//! Connection lifecycle events.
//!
//! Each connection produces at most one [`ConnectionEvent::Opened`] followed
//! by at most one [`ConnectionEvent::Closed`], after which its event
//! sequence terminates.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;

// ============================================================================
// CloseCode
// ============================================================================

/// WebSocket close status code (RFC 6455 Section 7.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CloseCode(pub u16);

impl CloseCode {
    /// Normal closure.
    pub const NORMAL: Self = Self(1000);
    /// Endpoint is going away.
    pub const GOING_AWAY: Self = Self(1001);
    /// Protocol error.
    pub const PROTOCOL_ERROR: Self = Self(1002);
    /// Data type cannot be accepted.
    pub const UNSUPPORTED_DATA: Self = Self(1003);
    /// Close frame carried no status code.
    pub const NO_STATUS: Self = Self(1005);
    /// Connection dropped without a close frame.
    pub const ABNORMAL: Self = Self(1006);
    /// Payload inconsistent with message type.
    pub const INVALID_PAYLOAD: Self = Self(1007);
    /// Policy violation.
    pub const POLICY_VIOLATION: Self = Self(1008);
    /// Message too big to process.
    pub const MESSAGE_TOO_BIG: Self = Self(1009);
    /// Client expected an extension the server did not negotiate.
    pub const MANDATORY_EXTENSION: Self = Self(1010);
    /// Unexpected server condition.
    pub const INTERNAL_ERROR: Self = Self(1011);
    /// TLS handshake failure.
    pub const TLS_HANDSHAKE: Self = Self(1015);

    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns `true` for [`CloseCode::NORMAL`].
    #[inline]
    #[must_use]
    pub const fn is_normal(self) -> bool {
        self.0 == Self::NORMAL.0
    }
}

impl Default for CloseCode {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.0
    }
}

// ============================================================================
// ConnectionEvent
// ============================================================================

/// Lifecycle notification for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Handshake completed.
    Opened {
        /// Sub-protocol selected by the peer, if any.
        subprotocol: Option<String>,
    },

    /// Connection closed. Always the last event.
    Closed {
        /// Close status code.
        code: CloseCode,
        /// Close reason, `None` when the peer sent none.
        reason: Option<Bytes>,
    },
}

impl ConnectionEvent {
    /// Returns `true` for the terminal `Closed` event.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }
}

/// Extracts the status code and reason from a close frame.
///
/// Empty reasons are reported as `None`; a missing frame maps to
/// [`CloseCode::NO_STATUS`].
pub(crate) fn close_status(frame: Option<CloseFrame>) -> (CloseCode, Option<Bytes>) {
    match frame {
        Some(frame) => {
            let reason = Bytes::from(frame.reason.as_str().to_owned());
            (
                CloseCode(frame.code.into()),
                (!reason.is_empty()).then_some(reason),
            )
        }
        None => (CloseCode::NO_STATUS, None),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio_tungstenite::tungstenite::Utf8Bytes;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;

    #[test]
    fn test_close_code_constants() {
        assert_eq!(CloseCode::NORMAL.as_u16(), 1000);
        assert_eq!(CloseCode::ABNORMAL.as_u16(), 1006);
        assert!(CloseCode::NORMAL.is_normal());
        assert!(!CloseCode::GOING_AWAY.is_normal());
        assert_eq!(CloseCode::default(), CloseCode::NORMAL);
    }

    #[test]
    fn test_status_from_frame() {
        let frame = CloseFrame {
            code: WsCloseCode::Normal,
            reason: Utf8Bytes::from_static(""),
        };
        assert_eq!(close_status(Some(frame)), (CloseCode::NORMAL, None));
    }

    #[test]
    fn test_status_from_frame_with_reason() {
        let frame = CloseFrame {
            code: WsCloseCode::Away,
            reason: Utf8Bytes::from_static("maintenance"),
        };
        assert_eq!(
            close_status(Some(frame)),
            (CloseCode::GOING_AWAY, Some(Bytes::from_static(b"maintenance")))
        );
    }

    #[test]
    fn test_status_without_frame() {
        assert_eq!(close_status(None), (CloseCode::NO_STATUS, None));
    }

    #[test]
    fn test_is_closed() {
        let closed = ConnectionEvent::Closed {
            code: CloseCode::NORMAL,
            reason: None,
        };
        assert!(closed.is_closed());
        assert!(!ConnectionEvent::Opened { subprotocol: None }.is_closed());
    }
}
