//! Shared fakes for unit tests: scripted transport, recording relays,
//! simulated clock, feed-recording watchdog, canned platform/updater.

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use crate::clock::Clock;
use crate::error::{StoreError, TransportError, UpdateError};
use crate::platform::Platform;
use crate::relay::RelayBank;
use crate::transport::{Inbound, Transport};
use crate::updater::Updater;
use crate::watchdog::Watchdog;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Manually driven clock: tests set wall time and ticks explicitly.
pub struct SimClock {
    now: Mutex<NaiveDateTime>,
    ticks: AtomicU32,
}

impl SimClock {
    pub fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> Self {
        Self {
            now: Mutex::new(datetime(y, mo, d, h, mi, s)),
            ticks: AtomicU32::new(0),
        }
    }

    pub fn set(&self, y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) {
        *self.now.lock().unwrap() = datetime(y, mo, d, h, mi, s);
    }

    pub fn set_ticks_ms(&self, ticks: u32) {
        self.ticks.store(ticks, Ordering::Relaxed);
    }

    pub fn advance_ticks_ms(&self, ms: u32) {
        self.ticks.fetch_add(ms, Ordering::Relaxed);
    }
}

pub fn datetime(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, mo, d)
        .unwrap()
        .and_hms_opt(h, mi, s)
        .unwrap()
}

impl Clock for SimClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap()
    }

    fn ticks_ms(&self) -> u32 {
        self.ticks.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Scripted transport: tests enqueue inbound messages and failure budgets,
/// then inspect what was published.
#[derive(Default)]
pub struct FakeTransport {
    inbound: Mutex<VecDeque<Inbound>>,
    published: Mutex<Vec<(String, Vec<u8>)>>,
    fail_publishes: AtomicU32,
    fail_polls: AtomicU32,
    fail_connects: AtomicU32,
    connects: AtomicU32,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps this fake in the shared handle the agent expects.
    pub fn as_shared(self: Arc<Self>) -> Arc<tokio::sync::Mutex<dyn Transport>> {
        Arc::new(tokio::sync::Mutex::new(SharedFake(self)))
    }

    pub fn push_inbound(&self, topic: impl Into<String>, payload: impl Into<Vec<u8>>) {
        self.inbound.lock().unwrap().push_back(Inbound {
            topic: topic.into(),
            payload: payload.into(),
        });
    }

    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().unwrap().clone()
    }

    /// Topics of all publishes, in order.
    pub fn published_topics(&self) -> Vec<String> {
        self.published().into_iter().map(|(t, _)| t).collect()
    }

    /// Parsed `status` field of every publish on the given topic.
    pub fn statuses_on(&self, topic: &str) -> Vec<String> {
        self.published()
            .into_iter()
            .filter(|(t, _)| t == topic)
            .filter_map(|(_, p)| serde_json::from_slice::<serde_json::Value>(&p).ok())
            .filter_map(|v| v["status"].as_str().map(str::to_string))
            .collect()
    }

    pub fn fail_next_publishes(&self, n: u32) {
        self.fail_publishes.store(n, Ordering::Relaxed);
    }

    pub fn fail_next_polls(&self, n: u32) {
        self.fail_polls.store(n, Ordering::Relaxed);
    }

    pub fn fail_next_connects(&self, n: u32) {
        self.fail_connects.store(n, Ordering::Relaxed);
    }

    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::Relaxed)
    }

    fn take_budget(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }
}

struct SharedFake(Arc<FakeTransport>);

#[async_trait]
impl Transport for SharedFake {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.0.connects.fetch_add(1, Ordering::Relaxed);
        if FakeTransport::take_budget(&self.0.fail_connects) {
            return Err(TransportError::Connect("scripted failure".into()));
        }
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        if FakeTransport::take_budget(&self.0.fail_publishes) {
            return Err(TransportError::Publish {
                topic: topic.to_string(),
                reason: "scripted failure".into(),
            });
        }
        self.0
            .published
            .lock()
            .unwrap()
            .push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    async fn poll(&mut self) -> Result<Vec<Inbound>, TransportError> {
        if FakeTransport::take_budget(&self.0.fail_polls) {
            return Err(TransportError::Poll("scripted failure".into()));
        }
        Ok(self.0.inbound.lock().unwrap().drain(..).collect())
    }
}

// ---------------------------------------------------------------------------
// Relays
// ---------------------------------------------------------------------------

/// Recording relay bank: keeps the full switch history and tracks how many
/// outputs were ever on at once.
pub struct FakeRelays {
    known: BTreeSet<u8>,
    events: Mutex<Vec<(u8, bool)>>,
    active: Mutex<BTreeSet<u8>>,
    max_active: AtomicU32,
}

impl FakeRelays {
    pub fn new(zone_ids: impl IntoIterator<Item = u8>) -> Self {
        Self {
            known: zone_ids.into_iter().collect(),
            events: Mutex::new(Vec::new()),
            active: Mutex::new(BTreeSet::new()),
            max_active: AtomicU32::new(0),
        }
    }

    /// Full `(zone_id, on)` history in actuation order.
    pub fn events(&self) -> Vec<(u8, bool)> {
        self.events.lock().unwrap().clone()
    }

    /// Zone ids switched on, in order.
    pub fn activations(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter(|(_, on)| *on)
            .map(|(id, _)| id)
            .collect()
    }

    /// Highest number of simultaneously-on outputs observed.
    pub fn max_simultaneous(&self) -> u32 {
        self.max_active.load(Ordering::Relaxed)
    }
}

impl RelayBank for FakeRelays {
    fn contains(&self, zone_id: u8) -> bool {
        self.known.contains(&zone_id)
    }

    fn set(&self, zone_id: u8, on: bool) {
        self.events.lock().unwrap().push((zone_id, on));
        let mut active = self.active.lock().unwrap();
        if on {
            active.insert(zone_id);
        } else {
            active.remove(&zone_id);
        }
        self.max_active
            .fetch_max(active.len() as u32, Ordering::Relaxed);
    }

    fn all_off(&self) {
        self.active.lock().unwrap().clear();
    }
}

// ---------------------------------------------------------------------------
// Watchdog
// ---------------------------------------------------------------------------

/// Records the (tokio) instant of every feed so tests can assert the gaps.
#[derive(Default)]
pub struct FakeWatchdog {
    feeds: Mutex<Vec<tokio::time::Instant>>,
}

impl FakeWatchdog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed_count(&self) -> usize {
        self.feeds.lock().unwrap().len()
    }

    /// Largest gap between consecutive feeds, if at least two happened.
    pub fn max_gap(&self) -> Option<Duration> {
        let feeds = self.feeds.lock().unwrap();
        feeds
            .windows(2)
            .map(|w| w[1].duration_since(w[0]))
            .max()
    }
}

impl Watchdog for FakeWatchdog {
    fn feed(&self) {
        self.feeds.lock().unwrap().push(tokio::time::Instant::now());
    }
}

// ---------------------------------------------------------------------------
// Platform / updater
// ---------------------------------------------------------------------------

pub struct FakePlatform {
    pub credential_clears: AtomicU32,
    pub ram: u64,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            credential_clears: AtomicU32::new(0),
            ram: 32 * 1024,
        }
    }
}

impl Platform for FakePlatform {
    fn clear_credentials(&self) -> Result<(), StoreError> {
        self.credential_clears.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn free_ram(&self) -> u64 {
        self.ram
    }
}

#[derive(Default)]
pub struct FakeUpdater {
    pub checks: AtomicU32,
}

#[async_trait]
impl Updater for FakeUpdater {
    async fn check_and_install(&self) -> Result<(), UpdateError> {
        self.checks.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
