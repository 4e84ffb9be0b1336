//! # Inbound control-plane handling: config updates and remote commands.
//!
//! Two inbound channels feed the agent. The config channel replaces the
//! active schedule atomically: a payload is parsed and validated first, then
//! persisted, then swapped in — a rejected or unpersistable payload leaves
//! the previous schedule fully in effect. The command channel carries small
//! JSON envelopes (`{"command": "..."}`); unknown commands are logged and
//! ignored so newer cloud software can address mixed fleets safely.
//!
//! ## Rules
//! - Config acceptance is all-or-nothing; no partial application.
//! - A handled command never executes inline work beyond its acknowledgment;
//!   restarts are escalated to the supervisor via [`CommandAction`].
//! - Malformed payloads on either channel are non-fatal.

use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use crate::error::RestartReason;
use crate::platform::Platform;
use crate::report::Reporter;
use crate::schedule::{ScheduleConfig, ScheduleStore};

/// What the supervisor must do after a command was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    /// Nothing further; the command was fully handled here.
    None,
    /// Exit the loop and restart the device.
    Restart(RestartReason),
}

/// Inbound command envelope.
///
/// `command` stays a free string rather than a closed enum so unrecognized
/// commands deserialize fine and land in the logged-and-ignored branch.
#[derive(Debug, Deserialize)]
struct CommandMessage {
    command: String,
}

/// Applies config updates and remote commands.
pub struct CommandHandler {
    schedule_store: ScheduleStore,
    reporter: Arc<Reporter>,
    platform: Arc<dyn Platform>,
}

impl CommandHandler {
    pub fn new(
        schedule_store: ScheduleStore,
        reporter: Arc<Reporter>,
        platform: Arc<dyn Platform>,
    ) -> Self {
        Self {
            schedule_store,
            reporter,
            platform,
        }
    }

    /// Handles a config-update payload, replacing `active` on success.
    ///
    /// Parse, persist, then swap: if persistence fails the new schedule is
    /// not applied either, so a restart always reloads what is running now.
    pub async fn apply_config(&self, payload: &[u8], active: &mut Option<ScheduleConfig>) {
        let config = match ScheduleConfig::from_payload(payload) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("config update rejected: {e}");
                self.reporter
                    .log_line(&format!("config update rejected: {e}"))
                    .await;
                return;
            }
        };
        if let Err(e) = self.schedule_store.save(&config) {
            warn!("config update not persisted, keeping previous: {e}");
            self.reporter
                .log_line("config update could not be persisted, keeping previous")
                .await;
            return;
        }
        self.reporter
            .log_line(&format!(
                "config updated: start {}, {} zones",
                config.start_time,
                config.zones.len()
            ))
            .await;
        *active = Some(config);
    }

    /// Handles a command payload and reports what the supervisor must do.
    pub async fn apply_command(&self, payload: &[u8]) -> CommandAction {
        let msg: CommandMessage = match serde_json::from_slice(payload) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("command payload malformed, ignoring: {e}");
                return CommandAction::None;
            }
        };
        match msg.command.as_str() {
            "status" => {
                self.reporter.status_requested().await;
                CommandAction::None
            }
            "reboot" => {
                self.reporter.log_line("reboot command received").await;
                CommandAction::Restart(RestartReason::RebootCommand)
            }
            "reset_wifi" => {
                self.reporter
                    .log_line("clearing network credentials and restarting")
                    .await;
                if let Err(e) = self.platform.clear_credentials() {
                    warn!("credential clear failed: {e}");
                }
                CommandAction::Restart(RestartReason::WifiReset)
            }
            other => {
                warn!(command = other, "unknown command, ignoring");
                self.reporter
                    .log_line(&format!("unknown command: {other}"))
                    .await;
                CommandAction::None
            }
        }
    }
}
