//! # Watering schedule: zones, start time, durable store.
//!
//! A [`ScheduleConfig`] is the single active schedule: one daily start time
//! and an ordered zone list. Zone order **is** execution order and is
//! preserved exactly as received.
//!
//! The schedule is only ever replaced whole, by a fully valid config-update
//! payload; see [`ScheduleConfig::from_payload`]. [`ScheduleStore`] persists
//! it through a [`RecordStore`], failing soft on reads the same way the
//! progress ledger does.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ScheduleError, StoreError};
use crate::store::RecordStore;

/// One independently controllable irrigation output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Actuator key the relay bank is addressed with.
    pub id: u8,
    /// Display name, free-form.
    pub name: String,
    /// Hold duration in seconds. Must be positive.
    #[serde(rename = "value_seconds", alias = "value")]
    pub duration_secs: u32,
}

/// Daily trigger time, wall clock `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StartTime {
    pub hour: u8,
    pub minute: u8,
}

impl StartTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self, ScheduleError> {
        if hour > 23 || minute > 59 {
            return Err(ScheduleError::BadStartTime(format!("{hour:02}:{minute:02}")));
        }
        Ok(Self { hour, minute })
    }

    /// Whether the given wall-clock hour/minute is exactly this start time.
    pub fn matches(&self, hour: u32, minute: u32) -> bool {
        u32::from(self.hour) == hour && u32::from(self.minute) == minute
    }
}

impl FromStr for StartTime {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ScheduleError::BadStartTime(s.to_string());
        let (h, m) = s.split_once(':').ok_or_else(bad)?;
        let hour: u8 = h.parse().map_err(|_| bad())?;
        let minute: u8 = m.parse().map_err(|_| bad())?;
        StartTime::new(hour, minute).map_err(|_| bad())
    }
}

impl fmt::Display for StartTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl TryFrom<String> for StartTime {
    type Error = ScheduleError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<StartTime> for String {
    fn from(t: StartTime) -> String {
        t.to_string()
    }
}

/// The active watering schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Daily trigger time.
    pub start_time: StartTime,
    /// Zones in execution order.
    pub zones: Vec<Zone>,
}

impl ScheduleConfig {
    /// Parses and validates a config-update payload.
    ///
    /// Acceptance is all-or-nothing: missing `start_time` or `zones`, a bad
    /// time string, or any zone with a zero duration rejects the whole
    /// payload.
    pub fn from_payload(payload: &[u8]) -> Result<Self, ScheduleError> {
        let cfg: ScheduleConfig = serde_json::from_slice(payload)?;
        for zone in &cfg.zones {
            if zone.duration_secs == 0 {
                return Err(ScheduleError::ZeroDuration { zone_id: zone.id });
            }
        }
        Ok(cfg)
    }
}

/// Durable store for the active schedule.
#[derive(Clone)]
pub struct ScheduleStore {
    store: Arc<dyn RecordStore>,
}

impl ScheduleStore {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Loads the persisted schedule; `None` on absence or malformed content.
    pub fn load(&self) -> Option<ScheduleConfig> {
        let raw = match self.store.get() {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("schedule read failed, starting without one: {e}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                warn!("persisted schedule malformed, ignoring: {e}");
                None
            }
        }
    }

    /// Persists `config`, replacing the previous record.
    pub fn save(&self, config: &ScheduleConfig) -> Result<(), StoreError> {
        let raw = serde_json::to_string(config).expect("schedule serializes");
        self.store.put(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn start_time_parses_and_displays() {
        let t: StartTime = "18:30".parse().unwrap();
        assert_eq!((t.hour, t.minute), (18, 30));
        assert_eq!(t.to_string(), "18:30");
        assert!(t.matches(18, 30));
        assert!(!t.matches(18, 31));
    }

    #[test]
    fn start_time_rejects_garbage() {
        assert!("1830".parse::<StartTime>().is_err());
        assert!("25:00".parse::<StartTime>().is_err());
        assert!("12:61".parse::<StartTime>().is_err());
        assert!("aa:bb".parse::<StartTime>().is_err());
    }

    #[test]
    fn payload_roundtrip_preserves_zone_order() {
        let payload = br#"{"start_time":"06:15","zones":[
            {"id":3,"name":"Bed C","value_seconds":40},
            {"id":1,"name":"Bed A","value_seconds":20}
        ]}"#;
        let cfg = ScheduleConfig::from_payload(payload).unwrap();
        assert_eq!(cfg.start_time.to_string(), "06:15");
        let ids: Vec<u8> = cfg.zones.iter().map(|z| z.id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn payload_accepts_legacy_value_field() {
        let payload = br#"{"start_time":"18:30","zones":[{"id":1,"name":"Bed A","value":5}]}"#;
        let cfg = ScheduleConfig::from_payload(payload).unwrap();
        assert_eq!(cfg.zones[0].duration_secs, 5);
    }

    #[test]
    fn payload_missing_start_time_is_rejected() {
        let payload = br#"{"zones":[{"id":1,"name":"A","value_seconds":5}]}"#;
        assert!(matches!(
            ScheduleConfig::from_payload(payload),
            Err(ScheduleError::Malformed(_))
        ));
    }

    #[test]
    fn payload_missing_zones_is_rejected() {
        let payload = br#"{"start_time":"18:30"}"#;
        assert!(matches!(
            ScheduleConfig::from_payload(payload),
            Err(ScheduleError::Malformed(_))
        ));
    }

    #[test]
    fn payload_zero_duration_is_rejected() {
        let payload = br#"{"start_time":"18:30","zones":[{"id":7,"name":"A","value_seconds":0}]}"#;
        assert!(matches!(
            ScheduleConfig::from_payload(payload),
            Err(ScheduleError::ZeroDuration { zone_id: 7 })
        ));
    }

    #[test]
    fn store_roundtrip_and_fail_soft() {
        let store = ScheduleStore::new(Arc::new(MemoryStore::new()));
        assert!(store.load().is_none());

        let cfg = ScheduleConfig::from_payload(
            br#"{"start_time":"18:30","zones":[{"id":1,"name":"Bed A","value_seconds":5}]}"#,
        )
        .unwrap();
        store.save(&cfg).unwrap();
        assert_eq!(store.load(), Some(cfg));

        let broken = ScheduleStore::new(Arc::new(MemoryStore::seeded("]]")));
        assert!(broken.load().is_none());
    }
}
