//! # Wall clock and monotonic tick sources.
//!
//! The supervisor loop makes two kinds of time decisions:
//!
//! - **wall clock** (`HH:MM`, calendar date) — daily trigger, midnight re-arm,
//!   ledger staleness, report timestamps;
//! - **monotonic ticks** — heartbeat pacing, uptime fallback.
//!
//! Both sit behind the [`Clock`] trait so tests can drive simulated time.
//! Tick deltas use [`ticks_diff`], which is wraparound-safe: the counter may
//! roll over `u32::MAX` without producing a bogus interval.

use std::time::Instant;

use chrono::NaiveDateTime;

/// Source of local wall-clock time and monotonic millisecond ticks.
pub trait Clock: Send + Sync {
    /// Current local wall-clock time.
    fn now(&self) -> NaiveDateTime;

    /// Monotonic millisecond tick counter. May wrap; compare with [`ticks_diff`].
    fn ticks_ms(&self) -> u32;
}

/// Production clock: local time from the OS, ticks from process start.
pub struct SystemClock {
    started: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }

    fn ticks_ms(&self) -> u32 {
        // Wrapping cast: the counter is only ever compared via ticks_diff.
        self.started.elapsed().as_millis() as u32
    }
}

/// Wraparound-safe tick delta: milliseconds elapsed from `older` to `newer`.
///
/// Valid for intervals shorter than `u32::MAX / 2` ms (~24 days), which
/// covers every interval the agent measures.
pub fn ticks_diff(newer: u32, older: u32) -> i32 {
    newer.wrapping_sub(older) as i32
}

/// Calendar date of `t` as `YYYY-MM-DD`, the form persisted in the ledger.
pub fn date_string(t: NaiveDateTime) -> String {
    t.format("%Y-%m-%d").to_string()
}

/// `[year, month, day, hour, minute, second]` — the wire timestamp shape.
pub fn timestamp_parts(t: NaiveDateTime) -> [i32; 6] {
    use chrono::{Datelike, Timelike};
    [
        t.year(),
        t.month() as i32,
        t.day() as i32,
        t.hour() as i32,
        t.minute() as i32,
        t.second() as i32,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn ticks_diff_plain() {
        assert_eq!(ticks_diff(1500, 500), 1000);
        assert_eq!(ticks_diff(500, 500), 0);
    }

    #[test]
    fn ticks_diff_across_wraparound() {
        // Counter wrapped: old sample near u32::MAX, new sample just past zero.
        let older = u32::MAX - 100;
        let newer = 400u32;
        assert_eq!(ticks_diff(newer, older), 501);
    }

    #[test]
    fn date_string_zero_pads() {
        assert_eq!(date_string(at(2026, 3, 7, 18, 30, 0)), "2026-03-07");
    }

    #[test]
    fn timestamp_parts_order() {
        assert_eq!(
            timestamp_parts(at(2026, 8, 23, 18, 30, 5)),
            [2026, 8, 23, 18, 30, 5]
        );
    }

    #[test]
    fn system_clock_ticks_are_monotonic() {
        let clock = SystemClock::new();
        let a = clock.ticks_ms();
        let b = clock.ticks_ms();
        assert!(ticks_diff(b, a) >= 0);
    }
}
