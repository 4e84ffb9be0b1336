//! # Pub/sub transport seam and reconnect policy.
//!
//! [`Transport`] is the contract the supervisor loop drives each iteration:
//! a (re)connect, a best-effort publish, and a **bounded, non-blocking**
//! poll that drains whatever inbound messages are ready. The poll never
//! parks the loop — an empty broker simply yields an empty batch.
//!
//! Reconnection is governed by [`RetryPolicy`]: a fixed delay and a fixed
//! attempt budget. No exponential growth, no jitter — when the budget is
//! spent the loop escalates to a supervised restart instead of looping
//! disconnected forever.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;

/// An inbound message delivered by [`Transport::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    /// Full topic the message arrived on.
    pub topic: String,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

/// Connect/publish/poll contract of the pub/sub transport.
///
/// Implementations are driven behind an async mutex, so `Send` suffices.
#[async_trait]
pub trait Transport: Send {
    /// Establishes (or re-establishes) the connection and subscriptions.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Publishes one payload. Best-effort: callers swallow failures.
    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError>;

    /// Drains currently-ready inbound messages without blocking.
    ///
    /// Returns an empty batch when nothing is pending. An `Err` means the
    /// connection is unusable and the reconnect path should run.
    async fn poll(&mut self) -> Result<Vec<Inbound>, TransportError>;
}

/// Bounded fixed-delay retry policy for reconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts before escalating to restart.
    pub max_attempts: u32,
    /// Fixed delay before each attempt.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    /// Three attempts, five seconds apart.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_bounded_and_fixed() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(5));
    }
}
