//! # Liveness extender (watchdog) seam.
//!
//! An external supervisor forces an uncontrolled restart unless it is
//! periodically told the process is alive. Every wait in the agent is bounded
//! so feeds happen at intervals strictly below the external timeout — holding
//! a zone open for minutes is decomposed into short slices with a feed
//! between each (see the sequencer).

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::warn;

/// External watchdog timeout the agent budgets its waits against.
pub const WATCHDOG_TIMEOUT: Duration = Duration::from_secs(60);

/// Liveness extender: call [`feed`](Watchdog::feed) before the external
/// timeout elapses or the device is forcibly reset.
pub trait Watchdog: Send + Sync {
    fn feed(&self);
}

/// Software watchdog stand-in that warns when a feed arrives late.
///
/// Cannot reset the device; it exists to make a missed deadline visible in
/// logs on host targets where the real watchdog is absent.
pub struct SoftWatchdog {
    timeout: Duration,
    last_feed: Mutex<Instant>,
}

impl SoftWatchdog {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_feed: Mutex::new(Instant::now()),
        }
    }
}

impl Default for SoftWatchdog {
    fn default() -> Self {
        Self::new(WATCHDOG_TIMEOUT)
    }
}

impl Watchdog for SoftWatchdog {
    fn feed(&self) {
        let mut last = self.last_feed.lock().expect("watchdog poisoned");
        let gap = last.elapsed();
        if gap > self.timeout {
            warn!(?gap, timeout = ?self.timeout, "watchdog deadline missed");
        }
        *last = Instant::now();
    }
}

/// Waits for `total`, decomposed into slices no longer than `slice`, feeding
/// the watchdog after each slice.
///
/// This is how any hold longer than the external timeout stays safe: the
/// slice must be chosen well below [`WATCHDOG_TIMEOUT`].
pub async fn sliced_wait(total: Duration, slice: Duration, watchdog: &dyn Watchdog) {
    let slice = slice.max(Duration::from_millis(1));
    let mut remaining = total;
    while remaining > Duration::ZERO {
        let step = remaining.min(slice);
        tokio::time::sleep(step).await;
        watchdog.feed();
        remaining -= step;
    }
}
