//! Configuration structures

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::endpoint::Endpoint;
use crate::session::SessionConfig;
use crate::transport::TransportConfig;
use crate::{consts, Result, SessionError};

/// File-loadable session settings
///
/// All durations are integer milliseconds so the file format stays flat;
/// use the `*_duration()` helpers for typed access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Connection target URI (`ws://` or `wss://`)
    pub uri: String,
    /// Connection dial timeout (ms)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    /// Liveness probe timeout (ms)
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: u64,
    /// Failure display window before the status reverts (ms)
    #[serde(default = "default_status_revert")]
    pub status_revert: u64,
    /// Outbound frame queue length
    #[serde(default = "default_send_queue_len")]
    pub send_queue_len: usize,
}

fn default_connect_timeout() -> u64 {
    consts::DEFAULT_CONNECT_TIMEOUT
}
fn default_probe_timeout() -> u64 {
    consts::DEFAULT_PROBE_TIMEOUT
}
fn default_status_revert() -> u64 {
    consts::DEFAULT_STATUS_REVERT
}
fn default_send_queue_len() -> usize {
    consts::DEFAULT_SEND_QUEUE_LEN
}

impl SessionSettings {
    /// Parse settings from a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| SessionError::Config(e.to_string()))
    }

    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.connect_timeout)
    }

    pub fn probe_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.probe_timeout)
    }

    pub fn status_revert_duration(&self) -> Duration {
        Duration::from_millis(self.status_revert)
    }

    /// Validated endpoint for the configured URI
    pub fn endpoint(&self) -> Result<Endpoint> {
        Endpoint::new(self.uri.clone())
    }

    /// Typed session configuration derived from these settings
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::default()
            .with_probe_timeout(self.probe_timeout_duration())
            .with_status_revert_after(self.status_revert_duration())
            .with_transport(
                TransportConfig::default()
                    .with_connect_timeout(self.connect_timeout_duration())
                    .with_send_queue_len(self.send_queue_len),
            )
    }
}
