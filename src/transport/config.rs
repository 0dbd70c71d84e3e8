//! Transport configuration structures

use std::time::Duration;

use crate::consts;

/// Client transport configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Connection dial timeout
    pub connect_timeout: Duration,
    /// Outbound frame queue length
    pub send_queue_len: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(consts::DEFAULT_CONNECT_TIMEOUT),
            send_queue_len: consts::DEFAULT_SEND_QUEUE_LEN,
        }
    }
}

impl TransportConfig {
    /// Set connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set outbound queue length
    pub fn with_send_queue_len(mut self, len: usize) -> Self {
        self.send_queue_len = len;
        self
    }
}
