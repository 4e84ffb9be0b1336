//! # Sequencer: ordered, crash-resilient zone execution.
//!
//! Runs a schedule's zones strictly in order, one active output at a time.
//! Before each actuation the progress ledger is persisted, so an abrupt
//! restart resumes at the interrupted zone without repeating or skipping
//! completed ones.
//!
//! ## Per-run protocol
//! ```text
//! run(schedule, start_index):
//!   ├─► report irrigation_started (zones_completed = start_index)
//!   ├─► for i in [start_index, N):
//!   │     ├─ unknown zone id ──► log, skip (non-fatal)
//!   │     ├─ ledger.save(zone_index = i, in_progress = true)   ◄─ BEFORE actuation
//!   │     ├─ output on
//!   │     ├─ hold duration_secs in watchdog-safe slices
//!   │     ├─ output off, brief settle
//!   │     └─ report zone_completed (zone_id, i+1, N, started_at)
//!   ├─► ledger.clear()  (in_progress = false)
//!   └─► report irrigation_completed (N, N)
//! ```
//!
//! ## Rules
//! - Exactly one output is active at any instant.
//! - Zones below `start_index` are never re-actuated.
//! - No internal re-entrancy guard: the supervisor's daily flag ensures at
//!   most one outstanding `run` per day.
//! - Ledger write failures are logged and the run continues; resumption is
//!   an optimization, not a prerequisite for watering.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::clock::{date_string, timestamp_parts, Clock};
use crate::ledger::{ProgressLedger, ProgressRecord};
use crate::relay::RelayBank;
use crate::report::Reporter;
use crate::schedule::ScheduleConfig;
use crate::watchdog::{sliced_wait, Watchdog};

/// Executes one schedule at a time, persisting progress ahead of actuation.
pub struct Sequencer {
    relays: Arc<dyn RelayBank>,
    ledger: ProgressLedger,
    reporter: Arc<Reporter>,
    watchdog: Arc<dyn Watchdog>,
    clock: Arc<dyn Clock>,
    /// Upper bound on any single uninterrupted wait; must be well below the
    /// external watchdog timeout.
    slice: Duration,
    /// Pause after deactivating a zone before reporting completion.
    settle: Duration,
}

impl Sequencer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        relays: Arc<dyn RelayBank>,
        ledger: ProgressLedger,
        reporter: Arc<Reporter>,
        watchdog: Arc<dyn Watchdog>,
        clock: Arc<dyn Clock>,
        slice: Duration,
        settle: Duration,
    ) -> Self {
        Self {
            relays,
            ledger,
            reporter,
            watchdog,
            clock,
            slice,
            settle,
        }
    }

    /// Runs zones `[start_index, N)` of `schedule` in order.
    ///
    /// `start_index = 0` is a fresh daily run; a positive index resumes an
    /// interrupted one. The schedule is the caller's snapshot: config updates
    /// arriving mid-run do not affect it.
    pub async fn run(&self, schedule: &ScheduleConfig, start_index: usize) {
        let total = schedule.zones.len();
        self.reporter.irrigation_started(start_index, total).await;

        for (i, zone) in schedule.zones.iter().enumerate().skip(start_index) {
            if !self.relays.contains(zone.id) {
                warn!(zone = zone.id, name = %zone.name, "unknown zone id, skipping");
                self.reporter
                    .log_line(&format!("skipping unknown zone {} ({})", zone.id, zone.name))
                    .await;
                continue;
            }

            let today = date_string(self.clock.now());
            if let Err(e) = self.ledger.save(&ProgressRecord::active(i, total, today)) {
                warn!(zone = zone.id, "progress save failed: {e}");
            }

            self.reporter
                .log_line(&format!(
                    "activating {} for {}s",
                    zone.name, zone.duration_secs
                ))
                .await;
            let started_at = timestamp_parts(self.clock.now());

            self.relays.set(zone.id, true);
            sliced_wait(
                Duration::from_secs(u64::from(zone.duration_secs)),
                self.slice,
                self.watchdog.as_ref(),
            )
            .await;
            self.relays.set(zone.id, false);
            tokio::time::sleep(self.settle).await;

            self.reporter
                .zone_completed(zone.id, i + 1, total, started_at)
                .await;
        }

        if let Err(e) = self.ledger.clear() {
            warn!("progress clear failed: {e}");
        }
        self.reporter.irrigation_completed(total).await;
    }
}
