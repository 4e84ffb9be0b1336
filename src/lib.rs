//! # aquavisor
//!
//! **Aquavisor** is a network-connected irrigation agent: one supervised
//! control loop that waters a set of zones on a daily schedule, reports over
//! an MQTT control plane, and survives abrupt power loss mid-run.
//!
//! The crate targets the awkward middle ground of field devices: the process
//! can die at any instant (power cut, watchdog reset, remote reboot), yet a
//! zone must never be watered twice in a day and never left running.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!               MQTT broker (irrigation/v1/...)
//!        ▲ status / heartbeat / logs      │ update / command
//!        │                                ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │  Agent (supervisor loop)                                  │
//! │  - Transport (connect / publish / bounded poll)           │
//! │  - CommandHandler (config updates, remote commands)       │
//! │  - Reporter (status, heartbeat, log mirror)               │
//! │  - daily trigger + maintenance window                     │
//! └──────┬──────────────────────────────────────┬─────────────┘
//!        ▼                                      ▼
//! ┌──────────────────────────┐   ┌──────────────────────────────┐
//! │  Sequencer               │   │  Durable state (RecordStore) │
//! │  - one zone at a time    │──►│  - ProgressLedger            │
//! │  - persist-then-actuate  │   │  - ScheduleStore             │
//! │  - watchdog-safe holds   │   └──────────────────────────────┘
//! └──────┬───────────────────┘
//!        ▼
//!   RelayBank (physical outputs)
//! ```
//!
//! ### Crash resilience
//! ```text
//! sequencer, per zone i:
//!   ├─► ledger.save{ date, zone_index: i, in_progress: true }   (durable)
//!   ├─► output i on ── hold ── output i off
//!   └─► report zone_completed
//! after the last zone:
//!   └─► ledger.clear{ in_progress: false }
//!
//! agent, at startup:
//!   ├─ no record / in_progress = false ──► nothing to do
//!   ├─ record from another date ──► clear, wait for today's trigger
//!   └─ today's record ──► resume run at zone_index (zones before it
//!                         are never re-actuated)
//! ```
//!
//! ## Seams
//! | Seam          | Trait        | Production impl      |
//! |---------------|--------------|----------------------|
//! | Wall clock    | [`Clock`]    | [`SystemClock`]      |
//! | Persistence   | [`RecordStore`] | [`FileStore`]     |
//! | Outputs       | [`RelayBank`] | [`LogRelays`] (host demo) |
//! | Liveness      | [`Watchdog`] | [`SoftWatchdog`]     |
//! | Pub/sub       | [`Transport`] | [`MqttTransport`]   |
//! | Host services | [`Platform`] | [`HostPlatform`]     |
//! | Updates       | [`Updater`]  | [`NoopUpdater`]      |

mod clock;
mod error;
mod handler;
mod identity;
mod ledger;
mod mqtt;
mod platform;
mod relay;
mod report;
mod schedule;
mod sequencer;
mod store;
mod supervisor;
mod transport;
mod updater;
mod watchdog;

#[cfg(test)]
mod testutil;

// ---- Public re-exports ----

pub use clock::{date_string, ticks_diff, timestamp_parts, Clock, SystemClock};
pub use error::{RestartReason, ScheduleError, StoreError, TransportError, UpdateError};
pub use handler::{CommandAction, CommandHandler};
pub use identity::{DeviceIdentity, TopicKind, TOPIC_PREFIX};
pub use ledger::{ProgressLedger, ProgressRecord};
pub use mqtt::MqttTransport;
pub use platform::{HostPlatform, Platform};
pub use relay::{LogRelays, RelayBank};
pub use report::{HeartbeatMessage, Reporter, StatusKind, StatusReport};
pub use schedule::{ScheduleConfig, ScheduleStore, StartTime, Zone};
pub use sequencer::Sequencer;
pub use store::{FileStore, MemoryStore, RecordStore};
pub use supervisor::{Agent, AgentConfig, AgentParts, ExitCause};
pub use transport::{Inbound, RetryPolicy, Transport};
pub use updater::{NoopUpdater, Updater};
pub use watchdog::{sliced_wait, SoftWatchdog, Watchdog, WATCHDOG_TIMEOUT};
