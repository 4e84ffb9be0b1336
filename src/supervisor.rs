//! # Supervisor loop: the agent's single control loop.
//!
//! One loop owns everything: inbound control messages, the daily trigger,
//! resumption after an abrupt restart, heartbeats, the maintenance window,
//! and watchdog feeding. There is no task-per-concern fan-out — sequencing a
//! run happens inline, which is what makes "exactly one output at a time"
//! and "exactly one run per day" trivially true.
//!
//! ```text
//!                       ┌─────────────────────────────┐
//!                       │          Agent::run         │
//!                       └──────────────┬──────────────┘
//!              startup: outputs off ── │ ── resume interrupted run
//!                                      ▼
//!            ┌───────────────── loop iteration ─────────────────┐
//!            │ feed watchdog                                     │
//!            │ poll transport ──► config update / command        │
//!            │      └─ poll error ──► bounded reconnect          │
//!            │ heartbeat when due                                │
//!            │ maintenance window? ──► update check, pause       │
//!            │ else: re-arm on date change, trigger when due     │
//!            │ sleep(loop interval) | cancelled                  │
//!            └───────────────────────────────────────────────────┘
//!                                      │
//!                exit: [`ExitCause::Cancelled`] (shutdown) or
//!                      [`ExitCause::Restart`]  (supervised reset)
//! ```
//!
//! ## Rules
//! - Every wait is bounded; the watchdog is fed at least once per iteration
//!   and inside every long hold.
//! - The daily run fires at most once per calendar date: the phase flag
//!   blocks re-trigger and is re-armed only when the date string changes.
//! - A run executes against a snapshot of the schedule; config updates
//!   arriving mid-run apply to the next one.
//! - The loop never runs disconnected forever: a spent reconnect budget,
//!   like a remote `reboot`/`reset_wifi`, exits with [`ExitCause::Restart`]
//!   and the process supervisor (or hardware) restarts the device.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDateTime, Timelike};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::clock::{date_string, ticks_diff, Clock};
use crate::error::RestartReason;
use crate::handler::{CommandAction, CommandHandler};
use crate::identity::{DeviceIdentity, TopicKind};
use crate::ledger::ProgressLedger;
use crate::platform::Platform;
use crate::relay::RelayBank;
use crate::report::Reporter;
use crate::schedule::{ScheduleConfig, ScheduleStore, StartTime};
use crate::sequencer::Sequencer;
use crate::transport::{RetryPolicy, Transport};
use crate::updater::Updater;
use crate::watchdog::{sliced_wait, Watchdog};

/// Tunables of the supervisor loop.
///
/// Defaults:
/// - `heartbeat_interval`: 60s
/// - `loop_interval`: 20s
/// - `reconnect`: [`RetryPolicy::default`] (3 attempts, 5s apart)
/// - `command_grace`: 2s to let restart acknowledgments flush
/// - `watchdog_slice`: 1s, the upper bound on any uninterrupted wait
/// - `zone_settle`: 500ms between deactivation and the completion report
/// - `update_window`: 21:50, `None` disables the maintenance window
/// - `update_pause`: 60s of quiet time after an update check
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub heartbeat_interval: Duration,
    pub loop_interval: Duration,
    pub reconnect: RetryPolicy,
    pub command_grace: Duration,
    pub watchdog_slice: Duration,
    pub zone_settle: Duration,
    pub update_window: Option<StartTime>,
    pub update_pause: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(60),
            loop_interval: Duration::from_secs(20),
            reconnect: RetryPolicy::default(),
            command_grace: Duration::from_secs(2),
            watchdog_slice: Duration::from_secs(1),
            zone_settle: Duration::from_millis(500),
            update_window: Some(StartTime {
                hour: 21,
                minute: 50,
            }),
            update_pause: Duration::from_secs(60),
        }
    }
}

/// Where today's run stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DayPhase {
    /// Armed; the trigger fires when the start time comes up.
    Idle,
    /// A run is executing right now.
    Running,
    /// Today's run happened (or was resumed to completion).
    Done,
}

/// Why [`Agent::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCause {
    /// Graceful shutdown was requested.
    Cancelled,
    /// The device must restart; outputs are already off.
    Restart(RestartReason),
}

/// Everything the agent is wired to. Collected in one struct so the
/// constructor stays readable at the call site.
pub struct AgentParts {
    pub config: AgentConfig,
    pub identity: DeviceIdentity,
    pub clock: Arc<dyn Clock>,
    pub watchdog: Arc<dyn Watchdog>,
    pub relays: Arc<dyn RelayBank>,
    pub platform: Arc<dyn Platform>,
    pub updater: Arc<dyn Updater>,
    pub transport: Arc<Mutex<dyn Transport>>,
    pub schedule_store: ScheduleStore,
    pub ledger: ProgressLedger,
    /// Wall-clock boot instant, `None` when time sync failed at boot.
    pub boot_at: Option<NaiveDateTime>,
}

/// The irrigation agent: owns the control loop and all collaborators.
pub struct Agent {
    config: AgentConfig,
    identity: DeviceIdentity,
    clock: Arc<dyn Clock>,
    watchdog: Arc<dyn Watchdog>,
    relays: Arc<dyn RelayBank>,
    platform: Arc<dyn Platform>,
    updater: Arc<dyn Updater>,
    transport: Arc<Mutex<dyn Transport>>,
    reporter: Arc<Reporter>,
    handler: CommandHandler,
    sequencer: Sequencer,
    schedule_store: ScheduleStore,
    ledger: ProgressLedger,
    schedule: Option<ScheduleConfig>,
    phase: DayPhase,
    armed_date: String,
    last_heartbeat: u32,
}

impl Agent {
    pub fn new(parts: AgentParts) -> Self {
        let reporter = Arc::new(Reporter::new(
            parts.identity.clone(),
            parts.transport.clone(),
            parts.clock.clone(),
            parts.boot_at,
        ));
        let handler = CommandHandler::new(
            parts.schedule_store.clone(),
            reporter.clone(),
            parts.platform.clone(),
        );
        let sequencer = Sequencer::new(
            parts.relays.clone(),
            parts.ledger.clone(),
            reporter.clone(),
            parts.watchdog.clone(),
            parts.clock.clone(),
            parts.config.watchdog_slice,
            parts.config.zone_settle,
        );
        Self {
            config: parts.config,
            identity: parts.identity,
            clock: parts.clock,
            watchdog: parts.watchdog,
            relays: parts.relays,
            platform: parts.platform,
            updater: parts.updater,
            transport: parts.transport,
            reporter,
            handler,
            sequencer,
            schedule_store: parts.schedule_store,
            ledger: parts.ledger,
            schedule: None,
            phase: DayPhase::Idle,
            armed_date: String::new(),
            last_heartbeat: 0,
        }
    }

    /// Runs the control loop until cancelled or a restart is required.
    ///
    /// Outputs are switched off before the first iteration and again on
    /// every exit path.
    pub async fn run(&mut self, cancel: CancellationToken) -> ExitCause {
        self.relays.all_off();

        let connected = { self.transport.lock().await.connect().await };
        if let Err(e) = connected {
            warn!("initial connect failed: {e}");
            if !self.reconnect().await {
                self.relays.all_off();
                return ExitCause::Restart(RestartReason::ReconnectExhausted);
            }
        }

        self.schedule = self.schedule_store.load();
        self.armed_date = date_string(self.clock.now());
        self.last_heartbeat = self.clock.ticks_ms();
        self.resume_interrupted().await;

        loop {
            if cancel.is_cancelled() {
                self.relays.all_off();
                return ExitCause::Cancelled;
            }
            self.watchdog.feed();

            if let Some(reason) = self.poll_inbound().await {
                self.reporter
                    .log_line(&format!("restarting: {}", reason.as_label()))
                    .await;
                tokio::time::sleep(self.config.command_grace).await;
                self.relays.all_off();
                return ExitCause::Restart(reason);
            }

            self.maybe_heartbeat().await;

            if self.in_update_window() {
                self.run_update_window().await;
            } else {
                self.rearm_if_new_day();
                self.maybe_trigger().await;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.loop_interval) => {}
                _ = cancel.cancelled() => {
                    self.relays.all_off();
                    return ExitCause::Cancelled;
                }
            }
        }
    }

    /// Picks up a run that was interrupted by an abrupt restart.
    ///
    /// Stale records (other date, index out of range for the current
    /// schedule) are cleared without running. A resumable record with no
    /// schedule on disk is left in place: the config may arrive shortly and
    /// a later restart can still resume.
    async fn resume_interrupted(&mut self) {
        let Some(record) = self.ledger.load() else {
            return;
        };
        if !record.in_progress {
            return;
        }
        let today = date_string(self.clock.now());
        if !record.resumable_on(&today) {
            info!(date = %record.date, "stale progress record, clearing");
            if let Err(e) = self.ledger.clear() {
                warn!("progress clear failed: {e}");
            }
            return;
        }
        let Some(schedule) = self.schedule.clone() else {
            warn!("interrupted run recorded but no schedule loaded, leaving record");
            return;
        };
        if record.zone_index >= schedule.zones.len() {
            warn!(
                index = record.zone_index,
                zones = schedule.zones.len(),
                "progress index beyond current schedule, clearing"
            );
            if let Err(e) = self.ledger.clear() {
                warn!("progress clear failed: {e}");
            }
            return;
        }
        self.reporter
            .log_line(&format!(
                "resuming irrigation from zone {}",
                record.zone_index + 1
            ))
            .await;
        self.phase = DayPhase::Running;
        self.sequencer.run(&schedule, record.zone_index).await;
        self.phase = DayPhase::Done;
    }

    /// Drains inbound messages and dispatches them. A returned reason means
    /// the loop must exit and restart.
    async fn poll_inbound(&mut self) -> Option<RestartReason> {
        let polled = { self.transport.lock().await.poll().await };
        let batch = match polled {
            Ok(batch) => batch,
            Err(e) => {
                warn!("poll failed: {e}");
                return if self.reconnect().await {
                    None
                } else {
                    Some(RestartReason::ReconnectExhausted)
                };
            }
        };
        for msg in batch {
            match self.identity.classify(&msg.topic) {
                TopicKind::Config => {
                    self.handler
                        .apply_config(&msg.payload, &mut self.schedule)
                        .await;
                }
                TopicKind::Command => match self.handler.apply_command(&msg.payload).await {
                    CommandAction::None => {}
                    CommandAction::Restart(reason) => return Some(reason),
                },
                TopicKind::Unknown => {
                    warn!(topic = %msg.topic, "message on unexpected topic, ignoring");
                }
            }
        }
        None
    }

    /// Bounded fixed-delay reconnect. `false` means the budget is spent.
    async fn reconnect(&mut self) -> bool {
        let policy = self.config.reconnect;
        for attempt in 1..=policy.max_attempts {
            tokio::time::sleep(policy.delay).await;
            self.watchdog.feed();
            let result = { self.transport.lock().await.connect().await };
            match result {
                Ok(()) => {
                    info!(attempt, "reconnected");
                    return true;
                }
                Err(e) => warn!(attempt, max = policy.max_attempts, "reconnect failed: {e}"),
            }
        }
        false
    }

    /// Emits a heartbeat when the interval elapsed on the tick clock.
    async fn maybe_heartbeat(&mut self) {
        let now = self.clock.ticks_ms();
        let due = self.config.heartbeat_interval.as_millis() as i32;
        if ticks_diff(now, self.last_heartbeat) >= due {
            self.reporter.heartbeat(self.platform.free_ram()).await;
            self.last_heartbeat = now;
        }
    }

    fn in_update_window(&self) -> bool {
        let Some(window) = self.config.update_window else {
            return false;
        };
        let now = self.clock.now();
        window.matches(now.hour(), now.minute())
    }

    /// Maintenance window: delegate to the updater, then hold off scheduling
    /// for the pause (watchdog-safe). A successful install typically never
    /// returns here; it restarts the device.
    async fn run_update_window(&self) {
        self.reporter
            .log_line("maintenance window open, checking for updates")
            .await;
        if let Err(e) = self.updater.check_and_install().await {
            warn!("update check failed: {e}");
        }
        sliced_wait(
            self.config.update_pause,
            self.config.watchdog_slice,
            self.watchdog.as_ref(),
        )
        .await;
    }

    /// Re-arms the daily trigger when the calendar date changes. Comparing
    /// date strings (not observing midnight) re-arms correctly even when an
    /// iteration, or a whole run, straddles midnight.
    fn rearm_if_new_day(&mut self) {
        let today = date_string(self.clock.now());
        if today != self.armed_date {
            info!(date = %today, "new day, re-arming daily trigger");
            self.armed_date = today;
            self.phase = DayPhase::Idle;
        }
    }

    /// Starts the daily run when armed and the start time is current.
    ///
    /// The run executes against a clone of the schedule: an update arriving
    /// mid-run does not change the zones being watered.
    async fn maybe_trigger(&mut self) {
        if self.phase != DayPhase::Idle {
            return;
        }
        let Some(schedule) = self.schedule.clone() else {
            return;
        };
        let now = self.clock.now();
        if !schedule.start_time.matches(now.hour(), now.minute()) {
            return;
        }
        self.phase = DayPhase::Running;
        self.sequencer.run(&schedule, 0).await;
        self.phase = DayPhase::Done;
    }
}
