//! Data messages exchanged over a connection.
//!
//! | Type | Direction | Variants |
//! |------|-----------|----------|
//! | [`OutboundMessage`] | Local → Remote | `Text`, `Binary` |
//! | [`InboundMessage`] | Remote → Local | `Text`, `Binary` |
//!
//! Control frames never surface as messages; the socket task consumes
//! pings, pongs and close frames itself.

// ============================================================================
// Imports
// ============================================================================

use bytes::Bytes;
use tokio_tungstenite::tungstenite::Message;

use crate::error::{Error, Result};

// ============================================================================
// OutboundMessage
// ============================================================================

/// A message sent to the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Bytes),
}

impl OutboundMessage {
    /// Creates a text message.
    #[inline]
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Creates a binary message.
    #[inline]
    #[must_use]
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::Binary(data.into())
    }

    /// Returns the payload length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(data) => data.len(),
        }
    }

    /// Returns `true` if the payload is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<OutboundMessage> for Message {
    fn from(message: OutboundMessage) -> Self {
        match message {
            OutboundMessage::Text(text) => Message::text(text),
            OutboundMessage::Binary(data) => Message::Binary(data),
        }
    }
}

// ============================================================================
// InboundMessage
// ============================================================================

/// A message received from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Bytes),
}

impl InboundMessage {
    /// Returns the text payload, if this is a text message.
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    /// Returns the binary payload, if this is a binary message.
    #[inline]
    #[must_use]
    pub fn as_binary(&self) -> Option<&Bytes> {
        match self {
            Self::Binary(data) => Some(data),
            Self::Text(_) => None,
        }
    }
}

impl TryFrom<Message> for InboundMessage {
    type Error = Error;

    /// Converts a data frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFrame`] for control and raw frames.
    fn try_from(message: Message) -> Result<Self> {
        match message {
            Message::Text(text) => Ok(Self::Text(text.as_str().to_owned())),
            Message::Binary(data) => Ok(Self::Binary(data)),
            Message::Ping(_) => Err(Error::unsupported_frame("ping")),
            Message::Pong(_) => Err(Error::unsupported_frame("pong")),
            Message::Close(_) => Err(Error::unsupported_frame("close")),
            Message::Frame(_) => Err(Error::unsupported_frame("raw frame")),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_into_ws_message() {
        let message: Message = OutboundMessage::text("ping").into();
        assert_eq!(message, Message::text("ping"));

        let message: Message = OutboundMessage::binary(vec![1u8, 2, 3]).into();
        assert_eq!(message, Message::Binary(Bytes::from_static(&[1, 2, 3])));
    }

    #[test]
    fn test_outbound_len() {
        assert_eq!(OutboundMessage::text("four").len(), 4);
        assert!(OutboundMessage::binary(Bytes::new()).is_empty());
    }

    #[test]
    fn test_inbound_from_data_frames() {
        let text = InboundMessage::try_from(Message::text("hello")).unwrap();
        assert_eq!(text.as_text(), Some("hello"));
        assert!(text.as_binary().is_none());

        let binary = InboundMessage::try_from(Message::Binary(Bytes::from_static(b"\x00\x01")))
            .unwrap();
        assert_eq!(binary.as_binary().map(|b| b.as_ref()), Some(&b"\x00\x01"[..]));
    }

    #[test]
    fn test_inbound_rejects_control_frames() {
        let err = InboundMessage::try_from(Message::Ping(Bytes::new())).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFrame { ref kind } if kind == "ping"));

        let err = InboundMessage::try_from(Message::Close(None)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFrame { .. }));
    }
}
