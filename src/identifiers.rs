//! Type-safe identifiers.
//!
//! A [`ConnectionId`] is the only key used to address a connection. It is
//! opaque to the registry: equality and hashing are all that matter. The
//! key keeps its type, so `42` and `"42"` address different connections.
//!
//! # Example
//!
//! ```
//! use websocket_mux::ConnectionId;
//!
//! let named = ConnectionId::new("chat");
//! let numbered = ConnectionId::from(42u64);
//! let unique = ConnectionId::generate();
//!
//! assert_eq!(named, ConnectionId::from("chat"));
//! assert_ne!(numbered, ConnectionId::from("42"));
//! assert_ne!(numbered, unique);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// ConnectionKey
// ============================================================================

/// Typed value behind a [`ConnectionId`].
///
/// Serialized externally tagged: `{"str":"chat"}`, `{"int":42}`,
/// `{"uuid":"…"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKey {
    /// Caller-chosen string key.
    Str(Arc<str>),
    /// Caller-chosen integer key.
    Int(u64),
    /// UUID key, as produced by [`ConnectionId::generate`].
    Uuid(Uuid),
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(key) => f.write_str(key),
            Self::Int(key) => write!(f, "{key}"),
            Self::Uuid(key) => write!(f, "{key}"),
        }
    }
}

// ============================================================================
// ConnectionId
// ============================================================================

/// Opaque key addressing one logical connection.
///
/// Cloning is cheap. Uniqueness across concurrently open connections is the
/// caller's responsibility; [`ConnectionId::generate`] produces a fresh value
/// when the caller has no natural key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(ConnectionKey);

impl ConnectionId {
    /// Creates an ID from a caller-supplied string key.
    #[inline]
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(ConnectionKey::Str(Arc::from(key.into())))
    }

    /// Generates a new unique ID (UUID v4).
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self::from(Uuid::new_v4())
    }

    /// Returns the typed key.
    #[inline]
    #[must_use]
    pub fn key(&self) -> &ConnectionKey {
        &self.0
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            ConnectionKey::Str(key) => write!(f, "ConnectionId({key:?})"),
            key => write!(f, "ConnectionId({key})"),
        }
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<ConnectionKey> for ConnectionId {
    fn from(key: ConnectionKey) -> Self {
        Self(key)
    }
}

impl From<&str> for ConnectionId {
    fn from(key: &str) -> Self {
        Self(ConnectionKey::Str(Arc::from(key)))
    }
}

impl From<String> for ConnectionId {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

impl From<&String> for ConnectionId {
    fn from(key: &String) -> Self {
        Self::from(key.as_str())
    }
}

impl From<u64> for ConnectionId {
    fn from(key: u64) -> Self {
        Self(ConnectionKey::Int(key))
    }
}

impl From<Uuid> for ConnectionId {
    fn from(key: Uuid) -> Self {
        Self(ConnectionKey::Uuid(key))
    }
}

// ============================================================================
// Tests
// ============================================================================
