//! # Status reports, heartbeats, and the remote log mirror.
//!
//! Two message classes leave the device:
//!
//! - **StatusReports** — emitted synchronously at sequencing transitions
//!   (`irrigation_started`, `zone_completed`, `irrigation_completed`) and on
//!   explicit status queries (`status_requested`);
//! - **Heartbeat** — periodic liveness telemetry with uptime and free memory.
//!
//! Delivery is best-effort, at-most-once: a publish failure is logged and
//! swallowed, never retried or queued, and never blocks the caller. The
//! reporter also mirrors log lines to the `logs` topic as
//! `[HH:MM:SS] message`.

use std::sync::Arc;

use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::clock::{timestamp_parts, Clock};
use crate::identity::DeviceIdentity;
use crate::transport::Transport;

/// Lifecycle status carried by a [`StatusReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    IrrigationStarted,
    ZoneCompleted,
    IrrigationCompleted,
    StatusRequested,
}

/// One status report as published on the `status` topic.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub device_id: String,
    pub mac: String,
    pub status: StatusKind,
    /// `[year, month, day, hour, minute, second]`, local time.
    pub timestamp: [i32; 6],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zones_completed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_zones: Option<usize>,
    /// Wall-clock instant the zone's actuation began.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<[i32; 6]>,
}

/// Periodic liveness message as published on the `heartbeat` topic.
#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatMessage {
    pub device_id: String,
    pub mac: String,
    pub uptime_sec: u64,
    pub status: &'static str,
    pub free_ram: u64,
}

/// Emits lifecycle and liveness telemetry through the shared transport.
pub struct Reporter {
    identity: DeviceIdentity,
    transport: Arc<Mutex<dyn Transport>>,
    clock: Arc<dyn Clock>,
    /// Wall-clock boot instant; `None` when time sync never succeeded, in
    /// which case uptime falls back to the tick counter.
    boot_at: Option<NaiveDateTime>,
}

impl Reporter {
    pub fn new(
        identity: DeviceIdentity,
        transport: Arc<Mutex<dyn Transport>>,
        clock: Arc<dyn Clock>,
        boot_at: Option<NaiveDateTime>,
    ) -> Self {
        Self {
            identity,
            transport,
            clock,
            boot_at,
        }
    }

    /// Run begins (possibly resumed): `zones_completed` is the start index.
    pub async fn irrigation_started(&self, zones_completed: usize, total_zones: usize) {
        self.status(StatusKind::IrrigationStarted, |r| {
            r.zones_completed = Some(zones_completed);
            r.total_zones = Some(total_zones);
        })
        .await;
    }

    /// One zone finished its hold.
    pub async fn zone_completed(
        &self,
        zone_id: u8,
        zones_completed: usize,
        total_zones: usize,
        started_at: [i32; 6],
    ) {
        self.status(StatusKind::ZoneCompleted, |r| {
            r.zone_id = Some(zone_id);
            r.zones_completed = Some(zones_completed);
            r.total_zones = Some(total_zones);
            r.started_at = Some(started_at);
        })
        .await;
    }

    /// The whole run finished.
    pub async fn irrigation_completed(&self, total_zones: usize) {
        self.status(StatusKind::IrrigationCompleted, |r| {
            r.zones_completed = Some(total_zones);
            r.total_zones = Some(total_zones);
        })
        .await;
    }

    /// Reply to an explicit `status` command.
    pub async fn status_requested(&self) {
        self.status(StatusKind::StatusRequested, |_| {}).await;
    }

    async fn status(&self, kind: StatusKind, fill: impl FnOnce(&mut StatusReport)) {
        let mut report = StatusReport {
            device_id: self.identity.device_id.clone(),
            mac: self.identity.mac.clone(),
            status: kind,
            timestamp: timestamp_parts(self.clock.now()),
            zone_id: None,
            zones_completed: None,
            total_zones: None,
            started_at: None,
        };
        fill(&mut report);
        self.publish_json(&self.identity.status_topic(), &report)
            .await;
    }

    /// Emits one heartbeat with the current uptime and free memory.
    pub async fn heartbeat(&self, free_ram: u64) {
        let msg = HeartbeatMessage {
            device_id: self.identity.device_id.clone(),
            mac: self.identity.mac.clone(),
            uptime_sec: self.uptime_secs(),
            status: "alive",
            free_ram,
        };
        self.publish_json(&self.identity.heartbeat_topic(), &msg)
            .await;
    }

    /// Seconds since boot: wall clock when synced, tick counter otherwise.
    pub fn uptime_secs(&self) -> u64 {
        match self.boot_at {
            Some(boot) => (self.clock.now() - boot).num_seconds().max(0) as u64,
            None => u64::from(self.clock.ticks_ms()) / 1000,
        }
    }

    /// Logs locally and mirrors the line to the `logs` topic, best-effort.
    pub async fn log_line(&self, msg: &str) {
        let now = self.clock.now();
        let line = format!(
            "[{:02}:{:02}:{:02}] {msg}",
            now.hour(),
            now.minute(),
            now.second()
        );
        info!("{msg}");
        let topic = self.identity.logs_topic();
        let mut transport = self.transport.lock().await;
        if let Err(e) = transport.publish(&topic, line.as_bytes()).await {
            warn!("log mirror dropped: {e}");
        }
    }

    async fn publish_json<T: Serialize>(&self, topic: &str, value: &T) {
        let payload = match serde_json::to_vec(value) {
            Ok(p) => p,
            Err(e) => {
                warn!("report serialization failed: {e}");
                return;
            }
        };
        let mut transport = self.transport.lock().await;
        if let Err(e) = transport.publish(topic, &payload).await {
            warn!("report dropped: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{FakeTransport, SimClock};
    use chrono::NaiveDate;

    fn setup() -> (Reporter, Arc<FakeTransport>, Arc<SimClock>) {
        let transport = Arc::new(FakeTransport::new());
        let clock = Arc::new(SimClock::at(2026, 8, 23, 18, 30, 5));
        let boot = NaiveDate::from_ymd_opt(2026, 8, 23)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap();
        let reporter = Reporter::new(
            DeviceIdentity::new("dev1", "a0b1c2d3e4f5"),
            transport.clone().as_shared(),
            clock.clone(),
            Some(boot),
        );
        (reporter, transport, clock)
    }

    #[tokio::test]
    async fn zone_completed_report_shape() {
        let (reporter, transport, _) = setup();
        reporter
            .zone_completed(2, 1, 2, [2026, 8, 23, 18, 30, 0])
            .await;

        let (topic, payload) = transport.published().pop().unwrap();
        assert_eq!(topic, "irrigation/v1/dev1/status");
        let v: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(v["status"], "zone_completed");
        assert_eq!(v["zone_id"], 2);
        assert_eq!(v["zones_completed"], 1);
        assert_eq!(v["total_zones"], 2);
        assert_eq!(v["timestamp"], serde_json::json!([2026, 8, 23, 18, 30, 5]));
        assert_eq!(v["started_at"], serde_json::json!([2026, 8, 23, 18, 30, 0]));
    }

    #[tokio::test]
    async fn status_requested_omits_optional_fields() {
        let (reporter, transport, _) = setup();
        reporter.status_requested().await;

        let (_, payload) = transport.published().pop().unwrap();
        let v: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(v["status"], "status_requested");
        assert!(v.get("zone_id").is_none());
        assert!(v.get("zones_completed").is_none());
        assert!(v.get("started_at").is_none());
    }

    #[tokio::test]
    async fn heartbeat_uses_wall_clock_uptime_when_synced() {
        let (reporter, transport, _) = setup();
        reporter.heartbeat(48 * 1024).await;

        let (topic, payload) = transport.published().pop().unwrap();
        assert_eq!(topic, "irrigation/v1/dev1/heartbeat");
        let v: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(v["status"], "alive");
        assert_eq!(v["uptime_sec"], 30 * 60 + 5); // 18:00:00 -> 18:30:05
        assert_eq!(v["free_ram"], 48 * 1024);
    }

    #[tokio::test]
    async fn uptime_falls_back_to_ticks_without_time_sync() {
        let transport = Arc::new(FakeTransport::new());
        let clock = Arc::new(SimClock::at(2026, 8, 23, 12, 0, 0));
        clock.set_ticks_ms(90_000);
        let reporter = Reporter::new(
            DeviceIdentity::new("dev1", "a0b1c2d3e4f5"),
            transport.as_shared(),
            clock,
            None,
        );
        assert_eq!(reporter.uptime_secs(), 90);
    }

    #[tokio::test]
    async fn publish_failure_is_swallowed() {
        let (reporter, transport, _) = setup();
        transport.fail_next_publishes(1);
        reporter.status_requested().await; // must not panic or propagate
        assert!(transport.published().is_empty());
    }

    #[tokio::test]
    async fn log_line_is_time_prefixed() {
        let (reporter, transport, _) = setup();
        reporter.log_line("resuming from zone 3").await;

        let (topic, payload) = transport.published().pop().unwrap();
        assert_eq!(topic, "irrigation/v1/dev1/logs");
        assert_eq!(
            String::from_utf8(payload).unwrap(),
            "[18:30:05] resuming from zone 3"
        );
    }
}
