//! kiosklock - Main entry point
//!
//! Wires the credential store, the serial trigger channel and the lock
//! controller together and runs the dispatch loop until ctrl-c. Input comes
//! from stdin and overlay commands are logged (headless mode).

mod config;
mod console;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::KioskConfig;
use console::ConsolePresenter;
use kiosklock_controller::{LockController, LockEvent};
use kiosklock_hardware::{SerialTriggerPort, TriggerChannel, TriggerChannelHandle, available_ports};
use kiosklock_storage::{CredentialCheck, CredentialStore};

/// Capacity of the controller's event queue
const EVENT_QUEUE_CAPACITY: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "kiosklock=info,kiosklock_controller=info,kiosklock_hardware=info,kiosklock_storage=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting kiosklock v{}", env!("CARGO_PKG_VERSION"));

    // Load or create config
    let config_path = KioskConfig::path_from_env();
    let (config, created) = KioskConfig::load_or_create(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    if created {
        info!("Created default config at {:?}", config_path);
    }
    config.validate().context("invalid configuration")?;

    // Credentials (sample written if absent)
    let store = CredentialStore::open(&config.credentials_path);
    info!(
        path = %store.path().display(),
        count = store.credential_count(),
        "Credential source ready"
    );

    let (tx, mut rx) = mpsc::channel::<LockEvent>(EVENT_QUEUE_CAPACITY);
    let mut controller = LockController::new(config.controller_config(), store, tx.clone());

    let trigger = start_trigger_channel(&config, tx.clone())?;
    let input = tokio::spawn(console::read_commands(tx));

    info!("kiosklock started");

    let mut presenter = ConsolePresenter::default();
    kiosklock_controller::run(&mut controller, &mut rx, &mut presenter, shutdown_signal()).await;

    input.abort();
    // Unblocks a trigger thread parked on a full queue
    drop(rx);
    if let Some(handle) = trigger {
        let stats = handle.stats();
        tokio::task::spawn_blocking(move || handle.shutdown())
            .await
            .context("trigger channel thread could not be joined")??;
        info!(
            connects = stats.connects,
            disconnects = stats.disconnects,
            failed_opens = stats.failed_opens,
            triggers = stats.triggers,
            "Trigger channel statistics"
        );
    }

    info!("kiosklock stopped");
    Ok(())
}

/// Spawn the serial polling thread unless the trigger board is disabled.
fn start_trigger_channel(
    config: &KioskConfig,
    tx: mpsc::Sender<LockEvent>,
) -> anyhow::Result<Option<TriggerChannelHandle>> {
    if !config.serial.enabled {
        info!("Serial trigger disabled");
        return Ok(None);
    }

    warn_if_port_missing(&config.serial.port);

    let port = SerialTriggerPort::new(config.serial_config())
        .context("invalid serial configuration")?;
    let handle = TriggerChannel::new(port, config.channel_config())
        .start(tx)
        .context("failed to start trigger channel")?;
    Ok(Some(handle))
}

/// The port may appear later (USB replug), so a missing port only warns.
fn warn_if_port_missing(port: &str) {
    match available_ports() {
        Ok(ports) if ports.iter().any(|p| p.name == port) => {
            debug!(port, "Configured serial port present");
        }
        Ok(ports) => {
            let available: Vec<&str> = ports.iter().map(|p| p.name.as_str()).collect();
            warn!(
                port,
                ?available,
                "Configured serial port not found, will keep retrying"
            );
        }
        Err(e) => warn!(error = %e, "Could not enumerate serial ports"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
