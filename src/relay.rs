//! # Relay actuation seam.
//!
//! The agent only needs three things from the relay hardware: does a zone id
//! exist, switch it, and force everything off. Actuation faults are the
//! board's problem, not ours — the trait is infallible by design of the
//! surrounding system (outputs re-initialize to off on restart).

use std::collections::BTreeSet;

use tracing::info;

/// Capability to drive zone outputs, addressed by integer zone id.
pub trait RelayBank: Send + Sync {
    /// Whether `zone_id` maps to a physical output.
    fn contains(&self, zone_id: u8) -> bool;

    /// Switches the zone output on or off.
    fn set(&self, zone_id: u8, on: bool);

    /// Forces every output off (known-safe state).
    fn all_off(&self);
}

/// Relay bank that logs transitions instead of driving GPIO.
///
/// Stands in for real hardware on host targets; the zone-id set mirrors the
/// board's wiring map.
pub struct LogRelays {
    zone_ids: BTreeSet<u8>,
}

impl LogRelays {
    pub fn new(zone_ids: impl IntoIterator<Item = u8>) -> Self {
        Self {
            zone_ids: zone_ids.into_iter().collect(),
        }
    }
}

impl RelayBank for LogRelays {
    fn contains(&self, zone_id: u8) -> bool {
        self.zone_ids.contains(&zone_id)
    }

    fn set(&self, zone_id: u8, on: bool) {
        info!(zone = zone_id, on, "relay");
    }

    fn all_off(&self) {
        info!("all relays off");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_relays_know_their_zone_map() {
        let relays = LogRelays::new(1..=16);
        assert!(relays.contains(1));
        assert!(relays.contains(16));
        assert!(!relays.contains(17));
        assert!(!relays.contains(0));
    }
}
