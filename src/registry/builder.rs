//! Builder pattern for registry configuration.
//!
//! Provides a fluent API for configuring and creating [`Registry`] instances.
//!
//! # Example
//!
//! ```no_run
//! use websocket_mux::Registry;
//!
//! # fn example() -> websocket_mux::Result<()> {
//! let registry = Registry::builder()
//!     .receive_buffer(128)
//!     .disable_nagle(true)
//!     .user_agent("my-app/1.0")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

use super::core::Registry;
use super::options::RegistryOptions;

// ============================================================================
// RegistryBuilder
// ============================================================================

/// Builder for configuring a [`Registry`] instance.
///
/// Use [`Registry::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct RegistryBuilder {
    /// Options collected so far.
    options: RegistryOptions,
}

// ============================================================================
// RegistryBuilder Implementation
// ============================================================================

impl RegistryBuilder {
    /// Creates a builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all options at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: RegistryOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the largest inbound message accepted (`None` for unlimited).
    #[inline]
    #[must_use]
    pub fn max_message_size(mut self, size: Option<usize>) -> Self {
        self.options.max_message_size = size;
        self
    }

    /// Sets the largest inbound frame accepted (`None` for unlimited).
    #[inline]
    #[must_use]
    pub fn max_frame_size(mut self, size: Option<usize>) -> Self {
        self.options.max_frame_size = size;
        self
    }

    /// Sets `TCP_NODELAY` on every socket.
    #[inline]
    #[must_use]
    pub fn disable_nagle(mut self, disable: bool) -> Self {
        self.options.disable_nagle = disable;
        self
    }

    /// Sets the capacity of each receive sequence.
    #[inline]
    #[must_use]
    pub fn receive_buffer(mut self, capacity: usize) -> Self {
        self.options.receive_buffer = capacity;
        self
    }

    /// Sets how long the peer gets to answer our close frame.
    #[inline]
    #[must_use]
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.options.close_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the default `User-Agent` header.
    #[inline]
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.options.user_agent = Some(agent.into());
        self
    }

    /// Validates the options and builds the registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if an option is out of range.
    pub fn build(self) -> Result<Arc<Registry>> {
        Registry::with_options(self.options)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_defaults() {
        let builder = RegistryBuilder::new();
        assert_eq!(builder.options, RegistryOptions::default());
    }

    #[test]
    fn test_setters() {
        let builder = RegistryBuilder::new()
            .max_message_size(None)
            .max_frame_size(Some(1024))
            .disable_nagle(true)
            .receive_buffer(8)
            .close_timeout(Duration::from_millis(1500))
            .user_agent("agent");

        assert_eq!(builder.options.max_message_size, None);
        assert_eq!(builder.options.max_frame_size, Some(1024));
        assert!(builder.options.disable_nagle);
        assert_eq!(builder.options.receive_buffer, 8);
        assert_eq!(builder.options.close_timeout_ms, 1500);
        assert_eq!(builder.options.user_agent.as_deref(), Some("agent"));
    }

    #[test]
    fn test_build_fails_with_zero_buffer() {
        let result = RegistryBuilder::new().receive_buffer(0).build();
        let err = result.err().unwrap();
        assert!(err.to_string().contains("receive_buffer"));
    }

    #[tokio::test]
    async fn test_build_succeeds() {
        let registry = RegistryBuilder::new().receive_buffer(4).build().unwrap();
        assert_eq!(registry.options().receive_buffer, 4);
        assert_eq!(registry.connection_count(), 0);
    }
}
