//! Agent entry point for host targets.
//!
//! Wiring is environment-driven:
//! - `MQTT_HOST` / `MQTT_PORT` — broker address (default `localhost:1883`)
//! - `MQTT_USERNAME` / `MQTT_PASSWORD` — broker credentials (optional)
//! - `DEVICE_ID` / `DEVICE_MAC` — stable identity for the topic namespace
//! - `STATE_DIR` — directory for the schedule, progress ledger, and
//!   credential files (default `.`)
//!
//! On a restart exit the process terminates with a non-zero code; the
//! process supervisor (systemd, runit, ...) restarting it is the host
//! analogue of a device reset.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use aquavisor::{
    Agent, AgentConfig, AgentParts, Clock, DeviceIdentity, ExitCause, FileStore, HostPlatform,
    LogRelays, MqttTransport, NoopUpdater, ProgressLedger, RelayBank, ScheduleStore, SoftWatchdog,
    SystemClock, Transport,
};

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let host = env_or("MQTT_HOST", "localhost");
    let port: u16 = env_or("MQTT_PORT", "1883")
        .parse()
        .context("MQTT_PORT must be a port number")?;
    let device_id = env_or("DEVICE_ID", "aquavisor-dev");
    let mac = env_or("DEVICE_MAC", "000000000000");
    let state_dir = PathBuf::from(env_or("STATE_DIR", "."));

    let identity = DeviceIdentity::new(device_id.clone(), mac);
    let mut transport = MqttTransport::new(&device_id, &host, port, &identity);
    if let (Ok(user), Ok(pass)) = (
        std::env::var("MQTT_USERNAME"),
        std::env::var("MQTT_PASSWORD"),
    ) {
        transport = transport.with_credentials(&user, &pass);
    }
    let transport: Arc<Mutex<dyn Transport>> = Arc::new(Mutex::new(transport));

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let boot_at = Some(clock.now());
    let relays: Arc<dyn RelayBank> = Arc::new(LogRelays::new(1..=16));

    let mut agent = Agent::new(AgentParts {
        config: AgentConfig::default(),
        identity,
        clock,
        watchdog: Arc::new(SoftWatchdog::default()),
        relays: relays.clone(),
        platform: Arc::new(HostPlatform::new(state_dir.join("config.json"))),
        updater: Arc::new(NoopUpdater),
        transport,
        schedule_store: ScheduleStore::new(Arc::new(FileStore::new(
            state_dir.join("zone_config.json"),
        ))),
        ledger: ProgressLedger::new(Arc::new(FileStore::new(state_dir.join("progress.json")))),
        boot_at,
    });

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            signal_cancel.cancel();
        }
    });

    info!(%host, port, "agent starting");
    match agent.run(cancel).await {
        ExitCause::Cancelled => {
            info!("agent stopped");
            Ok(())
        }
        ExitCause::Restart(reason) => {
            warn!(reason = reason.as_label(), "agent requested restart");
            relays.all_off();
            // Brief pause so the warning flushes before the supervisor kills us.
            tokio::time::sleep(Duration::from_millis(100)).await;
            std::process::exit(1);
        }
    }
}
