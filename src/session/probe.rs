//! Liveness probe bookkeeping
//!
//! One probe per session: a protocol ping carrying a monotonic token, matched
//! against the pong that echoes it. The round trip is the only evidence that
//! the remote endpoint is responsive at the application layer.

use std::time::Duration;

use once_cell::sync::Lazy;
use tokio::time::Instant;

/// Generate a probe token from monotonic nanoseconds
pub(crate) fn probe_token() -> Vec<u8> {
    static EPOCH: Lazy<std::time::Instant> = Lazy::new(std::time::Instant::now);
    let elapsed_ns = EPOCH.elapsed().as_nanos() as u64;
    elapsed_ns.to_be_bytes().to_vec()
}

struct Outstanding {
    token: Vec<u8>,
    sent_at: Instant,
    deadline: Instant,
}

/// Tracks the at-most-one outstanding liveness probe
#[derive(Default)]
pub(crate) struct ProbeState {
    outstanding: Option<Outstanding>,
}

impl ProbeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the probe; returns the token to carry in the ping frame
    pub fn arm(&mut self, timeout: Duration) -> Vec<u8> {
        let token = probe_token();
        let now = Instant::now();
        self.outstanding = Some(Outstanding {
            token: token.clone(),
            sent_at: now,
            deadline: now + timeout,
        });
        token
    }

    /// Whether a probe is awaiting its pong
    pub fn is_outstanding(&self) -> bool {
        self.outstanding.is_some()
    }

    /// Deadline of the outstanding probe, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.outstanding.as_ref().map(|o| o.deadline)
    }

    /// Match a pong payload against the outstanding probe.
    ///
    /// Returns the round-trip time when the payload answers it; an unknown
    /// or repeated token leaves the state untouched and returns `None`.
    pub fn match_pong(&mut self, payload: &[u8]) -> Option<Duration> {
        match &self.outstanding {
            Some(o) if o.token == payload => {
                let rtt = o.sent_at.elapsed();
                self.outstanding = None;
                Some(rtt)
            }
            _ => None,
        }
    }

    /// Forget the outstanding probe (timeout, write failure, or teardown)
    pub fn clear(&mut self) {
        self.outstanding = None;
    }
}
