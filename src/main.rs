//! GPK Companion - Entry Point
//!
//! Headless daemon: initializes logging, loads configuration and the
//! settings store, starts the synchronization engine and logs the event
//! stream a UI/tray frontend would consume.

use anyhow::Result;
use gpk_companion::{
    core::{config::Config, events::AppEvent, store::SettingsStore},
    sync::engine::SyncEngine,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("GPK Companion starting");

    let mut config = Config::load()?;
    let store = Arc::new(SettingsStore::open()?);

    // The stored polling interval (user-tunable from the UI) wins over the
    // config file default
    if let Some(interval) = store.polling_interval() {
        debug!("Using stored polling interval: {}ms", interval);
        config.sync.polling_interval_ms = interval;
    }

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    #[cfg(feature = "mock-hid")]
    let transport: Arc<dyn gpk_companion::Transport> =
        Arc::new(gpk_companion::hid::mock::MockTransport::new());
    #[cfg(not(feature = "mock-hid"))]
    let transport: Arc<dyn gpk_companion::Transport> =
        Arc::new(gpk_companion::HidTransport::new(config.hid.clone()).map_err(
            |e| anyhow::anyhow!("Failed to initialize HID transport: {}", e),
        )?);

    let engine = SyncEngine::new(transport, store, event_tx, config.sync.clone());

    let runner = engine.clone();
    let engine_task = tokio::spawn(async move { runner.run().await });

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                match event {
                    Some(event) => handle_event(event),
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                engine.stop();
                break;
            }
        }
    }

    let _ = engine_task.await;
    info!("GPK Companion stopped");
    Ok(())
}

/// Log the event stream; a GUI frontend would render these instead
fn handle_event(event: AppEvent) {
    match event {
        AppEvent::DeviceListChanged(devices) => {
            debug!(
                "Device list: {}",
                devices
                    .iter()
                    .map(|d| format!("{} (connected={})", d.id, d.connected))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        AppEvent::DeviceDisconnected { id } => {
            info!("Disconnected: {}", id);
        }
        AppEvent::ConfigUpdated { id, .. } => {
            info!("Config updated: {}", id);
        }
        AppEvent::ConfigSaveComplete { id, success, .. } => {
            if success {
                info!("Config save complete: {}", id);
            } else {
                warn!("Config save failed: {}", id);
            }
        }
        AppEvent::PomodoroPhaseChanged {
            id, phase_changed, ..
        } => {
            if phase_changed {
                info!("Pomodoro phase changed: {}", id);
            }
        }
        AppEvent::OledSettingsChanged { id, enabled } => {
            info!("OLED {} for {}", if enabled { "enabled" } else { "disabled" }, id);
        }
    }
}
