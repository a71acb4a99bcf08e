//! Handshake request description.
//!
//! A [`RequestDescriptor`] carries the target URL and any extra handshake
//! headers. It is converted into a tungstenite client request when the
//! socket task starts connecting.
//!
//! # Example
//!
//! ```
//! use websocket_mux::RequestDescriptor;
//!
//! # fn example() -> websocket_mux::Result<()> {
//! let target = RequestDescriptor::parse("ws://127.0.0.1:9001/feed")?
//!     .header("Authorization", "Bearer token")?;
//! assert_eq!(target.url().path(), "/feed");
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::{
    HeaderMap, HeaderName, HeaderValue, SEC_WEBSOCKET_PROTOCOL, USER_AGENT,
};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// RequestDescriptor
// ============================================================================

/// Target URL plus handshake headers.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// WebSocket URL (`ws` or `wss`).
    url: Url,
    /// Extra headers sent with the upgrade request.
    headers: HeaderMap,
}

impl RequestDescriptor {
    /// Creates a descriptor for a WebSocket URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the scheme is not `ws` or `wss`.
    pub fn new(url: Url) -> Result<Self> {
        match url.scheme() {
            "ws" | "wss" => Ok(Self {
                url,
                headers: HeaderMap::new(),
            }),
            scheme => Err(Error::invalid_argument(format!(
                "Unsupported URL scheme '{scheme}', expected ws or wss"
            ))),
        }
    }

    /// Parses a URL string into a descriptor.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if the string is not a valid URL
    /// - [`Error::InvalidArgument`] if the scheme is not `ws` or `wss`
    pub fn parse(url: &str) -> Result<Self> {
        Self::new(Url::parse(url)?)
    }

    /// Adds a handshake header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the name or value is not a
    /// valid HTTP header.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::invalid_argument(format!("Invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::invalid_argument(format!("Invalid header value: {e}")))?;

        self.headers.append(name, value);
        Ok(self)
    }

    /// Returns the target URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the extra handshake headers.
    #[inline]
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Builds the client upgrade request.
    ///
    /// Sub-protocols are offered via `Sec-WebSocket-Protocol`. The user agent
    /// is only applied when the caller did not set one.
    pub(crate) fn into_client_request(
        self,
        subprotocols: &[String],
        user_agent: Option<&str>,
    ) -> Result<Request> {
        let mut request = self.url.as_str().into_client_request()?;
        let headers = request.headers_mut();

        for (name, value) in &self.headers {
            headers.append(name.clone(), value.clone());
        }

        if !subprotocols.is_empty() {
            let offered = HeaderValue::from_str(&subprotocols.join(", "))
                .map_err(|e| Error::invalid_argument(format!("Invalid sub-protocol: {e}")))?;
            headers.insert(SEC_WEBSOCKET_PROTOCOL, offered);
        }

        if let Some(agent) = user_agent
            && !headers.contains_key(USER_AGENT)
        {
            let agent = HeaderValue::from_str(agent)
                .map_err(|e| Error::invalid_argument(format!("Invalid user agent: {e}")))?;
            headers.insert(USER_AGENT, agent);
        }

        Ok(request)
    }
}

impl TryFrom<&str> for RequestDescriptor {
    type Error = Error;

    fn try_from(url: &str) -> Result<Self> {
        Self::parse(url)
    }
}

impl TryFrom<Url> for RequestDescriptor {
    type Error = Error;

    fn try_from(url: Url) -> Result<Self> {
        Self::new(url)
    }
}

// ============================================================================
// Tests
// ============================================================================
