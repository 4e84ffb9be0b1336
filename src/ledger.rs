//! # Progress ledger: crash-resilient sequencing state.
//!
//! One durable record tracks the in-flight irrigation run. The sequencer
//! persists it **before** actuating each zone, so an abrupt restart can
//! resume at the interrupted zone without repeating completed ones.
//!
//! ## Rules
//! - `save` overwrites the whole record.
//! - `load` fails soft: absence, I/O failure, or malformed content all yield
//!   `None` — a corrupt ledger is indistinguishable from no ledger.
//! - `clear` does not delete; it persists `in_progress = false`, the only
//!   terminal value. A cleared record is never resumed.
//! - Staleness (record date ≠ today) is the **caller's** check, not the
//!   ledger's.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::StoreError;
use crate::store::RecordStore;

/// Persisted sequencing progress.
///
/// Invariant while `in_progress`: `zone_index < total_zones`. Loaders that
/// see this violated treat the record as stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// Calendar date of the run, `YYYY-MM-DD`.
    #[serde(default)]
    pub date: String,
    /// Index of the zone that was about to actuate.
    #[serde(default)]
    pub zone_index: usize,
    /// Zones fully completed before `zone_index`.
    #[serde(default)]
    pub zones_completed: usize,
    /// Zone count of the schedule the run was started against.
    #[serde(default)]
    pub total_zones: usize,
    /// `false` is the terminal value; only `true` records are resumption
    /// candidates.
    pub in_progress: bool,
}

impl ProgressRecord {
    /// Record persisted just before actuating zone `zone_index`.
    pub fn active(zone_index: usize, total_zones: usize, date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            zone_index,
            zones_completed: zone_index,
            total_zones,
            in_progress: true,
        }
    }

    /// Whether this record warrants resuming a run dated `today`.
    ///
    /// Requires `in_progress`, a matching date, and a structurally sane
    /// index; anything else is a no.
    pub fn resumable_on(&self, today: &str) -> bool {
        self.in_progress && self.date == today && self.zone_index < self.total_zones
    }
}

/// Durable single-record ledger over a [`RecordStore`].
#[derive(Clone)]
pub struct ProgressLedger {
    store: Arc<dyn RecordStore>,
}

impl ProgressLedger {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Persists `record`, replacing whatever was there.
    pub fn save(&self, record: &ProgressRecord) -> Result<(), StoreError> {
        let raw = serde_json::to_string(record).expect("progress record serializes");
        self.store.put(&raw)
    }

    /// Loads the record; `None` on absence, I/O failure, or malformed content.
    pub fn load(&self) -> Option<ProgressRecord> {
        let raw = match self.store.get() {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("ledger read failed, treating as absent: {e}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(rec) => Some(rec),
            Err(e) => {
                warn!("ledger malformed, treating as absent: {e}");
                None
            }
        }
    }

    /// Persists the terminal value (`in_progress = false`).
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.put(r#"{"in_progress":false}"#)
    }
}
