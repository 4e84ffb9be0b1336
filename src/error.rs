//! Error types used by the agent.
//!
//! Each external seam gets its own enum:
//!
//! - [`TransportError`] — failures of the pub/sub transport (connect, publish, poll).
//! - [`StoreError`] — persistence failures of the record stores.
//! - [`ScheduleError`] — rejected schedule payloads.
//! - [`UpdateError`] — failures reported by the update collaborator.
//!
//! None of these ever aborts the supervisor loop directly; the loop degrades
//! (skip, keep previous value, treat as absent) or escalates to a supervised
//! restart via [`RestartReason`].

use thiserror::Error;

/// Failures of the pub/sub transport.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connecting (or reconnecting) to the broker failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Publishing a payload failed; delivery is best-effort and never retried.
    #[error("publish to {topic} failed: {reason}")]
    Publish {
        /// Full topic the publish was addressed to.
        topic: String,
        /// Underlying failure message.
        reason: String,
    },

    /// Polling for inbound messages failed; triggers the reconnect path.
    #[error("poll failed: {0}")]
    Poll(String),

    /// Operation attempted before a successful connect.
    #[error("transport not connected")]
    NotConnected,
}

/// Persistence failures of a [`RecordStore`](crate::store::RecordStore).
///
/// Readers treat any error as "no prior state"; writers log and continue.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store i/o: {0}")]
    Io(#[from] std::io::Error),
}

/// A schedule payload that cannot be accepted.
///
/// Acceptance is all-or-nothing: any of these leaves both the persisted and
/// the in-memory schedule untouched.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ScheduleError {
    /// Payload is not valid JSON or misses `start_time`/`zones`.
    #[error("malformed schedule payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// `start_time` is not a valid `HH:MM` wall-clock time.
    #[error("bad start_time {0:?}")]
    BadStartTime(String),

    /// A zone carries a non-positive hold duration.
    #[error("zone {zone_id} has zero duration")]
    ZeroDuration {
        /// Offending zone id.
        zone_id: u8,
    },
}

/// Failure reported by the update collaborator during the maintenance window.
#[derive(Error, Debug)]
#[error("update check failed: {0}")]
pub struct UpdateError(pub String);

/// Why the supervisor loop is escalating to a full device restart.
///
/// Restart is the sole unbounded-failure escalation primitive: the loop never
/// keeps running disconnected forever, and remote `reboot`/`reset_wifi`
/// commands funnel through the same exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    /// The reconnect attempt budget was exhausted.
    ReconnectExhausted,
    /// A remote `reboot` command was received.
    RebootCommand,
    /// A remote `reset_wifi` command was received (credentials already cleared).
    WifiReset,
}

impl RestartReason {
    /// Short stable label (snake_case) for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RestartReason::ReconnectExhausted => "reconnect_exhausted",
            RestartReason::RebootCommand => "reboot_command",
            RestartReason::WifiReset => "wifi_reset",
        }
    }
}
