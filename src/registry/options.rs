//! Registry configuration.
//!
//! [`RegistryOptions`] holds the transport settings applied to every
//! connection the registry opens. All fields have defaults, so a JSON
//! document only needs the keys it wants to change.
//!
//! # Example
//!
//! ```
//! use websocket_mux::RegistryOptions;
//!
//! # fn example() -> websocket_mux::Result<()> {
//! let options = RegistryOptions::from_json_str(r#"{ "receive_buffer": 64 }"#)?;
//! assert_eq!(options.receive_buffer, 64);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

use crate::error::{Error, Result};
use crate::transport::socket::SocketConfig;

// ============================================================================
// Constants
// ============================================================================

/// Default maximum message size (64 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 << 20;

/// Default maximum frame size (16 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 << 20;

/// Default capacity of each receive sequence.
pub const DEFAULT_RECEIVE_BUFFER: usize = 32;

/// Default time the peer gets to answer our close frame.
pub const DEFAULT_CLOSE_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// RegistryOptions
// ============================================================================

/// Transport settings applied to every connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryOptions {
    /// Largest inbound message accepted, `None` for unlimited.
    pub max_message_size: Option<usize>,

    /// Largest inbound frame accepted, `None` for unlimited.
    pub max_frame_size: Option<usize>,

    /// Set `TCP_NODELAY` on every socket.
    pub disable_nagle: bool,

    /// Items buffered between a receive loop and its consumer.
    pub receive_buffer: usize,

    /// Milliseconds the peer gets to answer our close frame.
    pub close_timeout_ms: u64,

    /// `User-Agent` sent when the request does not set one.
    pub user_agent: Option<String>,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            max_message_size: Some(DEFAULT_MAX_MESSAGE_SIZE),
            max_frame_size: Some(DEFAULT_MAX_FRAME_SIZE),
            disable_nagle: false,
            receive_buffer: DEFAULT_RECEIVE_BUFFER,
            close_timeout_ms: DEFAULT_CLOSE_TIMEOUT_MS,
            user_agent: None,
        }
    }
}

impl RegistryOptions {
    /// Parses and validates options from JSON.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the document is malformed
    /// - [`Error::Config`] if a value is out of range
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.receive_buffer == 0 {
            return Err(Error::config("receive_buffer must be greater than zero"));
        }
        if self.max_message_size == Some(0) {
            return Err(Error::config("max_message_size must be greater than zero"));
        }
        if self.max_frame_size == Some(0) {
            return Err(Error::config("max_frame_size must be greater than zero"));
        }
        if let (Some(message), Some(frame)) = (self.max_message_size, self.max_frame_size)
            && frame > message
        {
            return Err(Error::config(format!(
                "max_frame_size ({frame}) exceeds max_message_size ({message})"
            )));
        }
        if self.close_timeout_ms == 0 {
            return Err(Error::config("close_timeout_ms must be greater than zero"));
        }
        Ok(())
    }

    /// Returns the close handshake timeout.
    #[inline]
    #[must_use]
    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    /// Builds the per-socket transport settings.
    pub(crate) fn socket_config(&self) -> SocketConfig {
        SocketConfig {
            websocket: WebSocketConfig::default()
                .max_message_size(self.max_message_size)
                .max_frame_size(self.max_frame_size),
            disable_nagle: self.disable_nagle,
            user_agent: self.user_agent.clone(),
            close_timeout: self.close_timeout(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
