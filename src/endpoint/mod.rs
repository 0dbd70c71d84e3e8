//! # Endpoint Module
//!
//! This module defines the immutable connection target.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::{Result, SessionError};

/// WebSocket schemes accepted for a connection target
const SCHEME_PLAIN: &str = "ws";
const SCHEME_SECURE: &str = "wss";

/// Immutable connection target for a session
///
/// An `Endpoint` is created once at startup, validated on construction, and
/// never mutated afterwards. Credentials, if any, travel embedded in the URI
/// and are treated as opaque.
#[derive(Debug, Clone)]
pub struct Endpoint {
    uri: String,
}

impl Endpoint {
    /// Create an endpoint from a `ws://` or `wss://` URI
    pub fn new(uri: impl Into<String>) -> Result<Self> {
        let uri = uri.into();

        let (scheme, rest) = uri
            .split_once("://")
            .ok_or_else(|| SessionError::InvalidEndpoint(format!("missing scheme: {}", uri)))?;

        if scheme != SCHEME_PLAIN && scheme != SCHEME_SECURE {
            return Err(SessionError::InvalidEndpoint(format!(
                "unsupported scheme '{}': expected ws or wss",
                scheme
            )));
        }

        let host = rest.split('/').next().unwrap_or_default();
        if host.is_empty() {
            return Err(SessionError::InvalidEndpoint(format!("missing host: {}", uri)));
        }

        Ok(Self { uri })
    }

    /// Full URI string
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// URI scheme ("ws" or "wss")
    pub fn scheme(&self) -> &str {
        self.uri.split("://").next().unwrap_or(SCHEME_SECURE)
    }

    /// Host portion (including port if present), without path or query
    pub fn host(&self) -> &str {
        self.uri
            .split("://")
            .nth(1)
            .and_then(|rest| rest.split('/').next())
            .unwrap_or_default()
    }

    /// Check if the connection is TLS-protected
    pub fn is_secure(&self) -> bool {
        self.scheme() == SCHEME_SECURE
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri)
    }
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}

impl Eq for Endpoint {}

impl Hash for Endpoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uri.hash(state);
    }
}
