//! Synchronization engine
//!
//! A recurring reconciliation pass over physical device presence, in-memory
//! registry state and firmware-side configuration. Each tick:
//!
//! 1. Lists present devices, upserts them, drops vanished ones (emitting
//!    `DeviceDisconnected` and releasing their processing lock first).
//! 2. Pushes a registry snapshot so the UI never shows stale entries.
//! 3. Runs a per-device state machine under a processing lock; a device
//!    still locked from a previous pass is skipped for the tick.
//! 4. Releases every lock after its branch settles, success or failure.
//!
//! Branch failures are converted into state transitions and never abort the
//! pass; one misbehaving device cannot starve the others.

use crate::core::config::SyncConfig;
use crate::core::events::AppEvent;
use crate::core::store::SettingsStore;
use crate::hid::codec;
use crate::hid::transport::Transport;
use crate::sync::device::{Device, DeviceConfig, PomodoroConfig, TrackpadConfig};
use crate::sync::edit::EditSession;
use crate::sync::locks::ProcessingLocks;
use crate::sync::registry::DeviceRegistry;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Structured result for user-initiated save operations.
/// Failures land here, never as a propagated error.
#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub success: bool,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl SaveOutcome {
    fn ok() -> Self {
        Self {
            success: true,
            error: None,
            timestamp: Utc::now(),
        }
    }

    fn failed(error: String) -> Self {
        Self {
            success: false,
            error: Some(error),
            timestamp: Utc::now(),
        }
    }
}

/// The device synchronization engine.
///
/// Cheap to clone; all state lives behind `Arc`s so detached per-device
/// tasks can capture their own handle. Multiple independent engines (e.g.
/// in tests) never share state.
#[derive(Clone)]
pub struct SyncEngine {
    transport: Arc<dyn Transport>,
    registry: Arc<Mutex<DeviceRegistry>>,
    locks: Arc<ProcessingLocks>,
    edit: Arc<EditSession>,
    store: Arc<SettingsStore>,
    event_tx: mpsc::UnboundedSender<AppEvent>,
    config: SyncConfig,
    stopped: Arc<AtomicBool>,
}

impl SyncEngine {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<SettingsStore>,
        event_tx: mpsc::UnboundedSender<AppEvent>,
        config: SyncConfig,
    ) -> Self {
        Self {
            transport,
            registry: Arc::new(Mutex::new(DeviceRegistry::new())),
            locks: Arc::new(ProcessingLocks::new()),
            edit: Arc::new(EditSession::new()),
            store,
            event_tx,
            config,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Edit-session coordinator handle for the UI layer
    pub fn edit_session(&self) -> Arc<EditSession> {
        Arc::clone(&self.edit)
    }

    /// Current registry snapshot
    pub fn snapshot(&self) -> Vec<Device> {
        self.registry.lock().all()
    }

    /// Processing lock table (exposed for tests)
    pub fn locks(&self) -> Arc<ProcessingLocks> {
        Arc::clone(&self.locks)
    }

    /// Run reconciliation passes until [`stop`](Self::stop) is called.
    /// The next tick is delayed by `max(interval - elapsed, 0)` so slow
    /// passes never pile up.
    pub async fn run(&self) {
        info!(
            "Synchronization engine started (interval {}ms)",
            self.config.polling_interval_ms
        );
        let interval = Duration::from_millis(self.config.polling_interval_ms);

        while !self.stopped.load(Ordering::Relaxed) {
            let started = Instant::now();
            self.reconcile().await;
            let delay = interval.saturating_sub(started.elapsed());
            tokio::time::sleep(delay).await;
        }
        info!("Synchronization engine stopped");
    }

    /// Request the run loop to exit after the current pass
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }

    /// Execute one reconciliation pass
    pub async fn reconcile(&self) {
        let present = match self.transport.list() {
            Ok(present) => present,
            Err(e) => {
                warn!("Device listing failed, skipping pass: {}", e);
                return;
            }
        };
        let present_ids: HashSet<&str> = present.iter().map(|d| d.id.as_str()).collect();

        // Upsert present devices, collect the vanished ones
        let removed: Vec<String> = {
            let mut registry = self.registry.lock();
            for observed in &present {
                registry.upsert(observed);
            }
            let removed: Vec<String> = registry
                .ids()
                .into_iter()
                .filter(|id| !present_ids.contains(id.as_str()))
                .collect();
            for id in &removed {
                registry.remove(id);
            }
            removed
        };

        // Disconnect handling settles fully before any branch evaluation
        for id in &removed {
            info!("Device disconnected: {}", id);
            let _ = self.transport.stop(id);
            self.locks.unlock(id);
            self.emit(AppEvent::DeviceDisconnected { id: id.clone() });
        }

        // One snapshot push before per-device processing so the UI never
        // renders already-vanished devices
        let before = self.snapshot();
        self.emit(AppEvent::DeviceListChanged(before.clone()));

        let ids = self.registry.lock().ids();
        let mut tasks = Vec::with_capacity(ids.len());
        for id in ids {
            if !self.locks.try_lock(&id) {
                debug!("Device {} still processing, skipping this tick", id);
                continue;
            }
            let engine = self.clone();
            let task_id = id.clone();
            tasks.push((
                id,
                tokio::spawn(async move { engine.process_device(&task_id).await }),
            ));
        }

        // Locks are released here regardless of how the branch ended, so a
        // panicking task can never leave its device locked forever
        for (id, task) in tasks {
            if let Err(e) = task.await {
                warn!("Processing task for {} aborted: {}", id, e);
            }
            self.locks.unlock(&id);
        }

        // Debounced end-of-pass push: once, and only if something changed
        let after = self.snapshot();
        if after != before {
            self.emit(AppEvent::DeviceListChanged(after));
        }
    }

    /// Per-device state machine. Branches are mutually exclusive and
    /// evaluated in fixed precedence order; exactly one runs per tick.
    async fn process_device(&self, id: &str) {
        let Some(device) = self.registry.lock().get(id).cloned() else {
            return;
        };

        if device.needs_restart {
            self.branch_restart(id, &device).await;
        } else if !self.transport.is_connected(id) {
            self.branch_start(id, &device);
        } else if !device.has_usable_config() && !device.check_device {
            self.branch_read_config(id).await;
        } else if device.config.is_some() {
            self.branch_steady(id, &device);
        }
    }

    /// Branch (a): stop the device, settle, then start with bounded retries.
    async fn branch_restart(&self, id: &str, device: &Device) {
        debug!("Restarting {}", id);
        if let Err(e) = self.transport.stop(id) {
            debug!("Stop before restart failed for {}: {}", id, e);
        }
        tokio::time::sleep(Duration::from_millis(self.config.settle_delay_ms)).await;

        let observed = device.as_observed();
        for attempt in 1..=self.config.start_retry_limit {
            tokio::time::sleep(Duration::from_millis(
                self.config.restart_backoff_ms * attempt as u64,
            ))
            .await;

            // The device may have been unplugged during the backoff
            if !self.registry.lock().contains(id) {
                return;
            }

            match self.transport.start(&observed) {
                Ok(()) => {
                    info!("Restart succeeded for {} (attempt {})", id, attempt);
                    self.registry.lock().update(id, |d| {
                        d.needs_restart = false;
                        d.initializing = true;
                        d.check_device = false;
                        d.config = None;
                    });
                    return;
                }
                Err(e) if e.is_benign() => {
                    debug!("Start attempt {} for {}: {}", attempt, id, e);
                }
                Err(e) => {
                    warn!("Start attempt {} for {} failed: {}", attempt, id, e);
                }
            }
        }

        // Out of attempts; surface as failed. The device stays in the
        // registry with no session, so the not-connected branch picks it
        // up next tick
        self.registry.lock().update(id, |d| {
            d.needs_restart = false;
            d.connected = false;
            d.initializing = false;
        });
    }

    /// Branch (b): no transport session; try a single start.
    fn branch_start(&self, id: &str, device: &Device) {
        self.registry.lock().update(id, |d| d.initializing = true);

        match self.transport.start(&device.as_observed()) {
            Ok(()) => {
                debug!("Session opened for {}", id);
                // New session, stale cache: force a fresh config read
                self.registry.lock().update(id, |d| {
                    d.check_device = false;
                    d.config = None;
                });
            }
            Err(e) => {
                if e.is_benign() {
                    debug!("Start failed for {}: {}", id, e);
                } else {
                    warn!("Start failed for {}: {}", id, e);
                }
                self.registry.lock().update(id, |d| {
                    d.initializing = false;
                    d.connected = false;
                    d.needs_restart = true;
                });
            }
        }
    }

    /// Branch (c): session up but no usable config yet; request one.
    async fn branch_read_config(&self, id: &str) {
        self.registry.lock().update(id, |d| {
            d.check_device = true;
            d.initializing = true;
        });

        tokio::time::sleep(Duration::from_millis(self.config.settle_delay_ms)).await;
        if !self.registry.lock().contains(id) {
            return;
        }

        match self.transport.read_config(id) {
            Ok(config) => self.apply_config(id, config),
            Err(e) => {
                if e.is_benign() {
                    debug!("Config read failed for {}: {}", id, e);
                } else {
                    warn!("Config read failed for {}: {}", id, e);
                }
                // Back to a clean pre-initialization state; the restart
                // branch takes over next tick
                self.registry.lock().update(id, |d| {
                    d.connected = false;
                    d.initializing = true;
                    d.check_device = false;
                    d.config = None;
                    d.needs_restart = true;
                });
            }
        }
    }

    /// Branch (d): configured steady state. Promote to connected and kick
    /// off fire-and-forget side operations.
    fn branch_steady(&self, id: &str, device: &Device) {
        if !device.initializing {
            self.registry.lock().update(id, |d| d.connected = true);
        }

        let Some(config) = &device.config else {
            return;
        };

        if config.oled_enabled == 1 {
            // Detached: failures are logged, never joined into the pass
            let engine = self.clone();
            let task_id = id.to_string();
            tokio::spawn(async move {
                if let Err(e) = engine.transport.write_oled_datetime(&task_id, false) {
                    warn!("OLED date/time write failed for {}: {}", task_id, e);
                }
            });
        }

        if config.pomodoro.timer_active == 1 {
            let engine = self.clone();
            let task_id = id.to_string();
            tokio::spawn(async move {
                engine.refresh_pomodoro_status(&task_id);
            });
        }
    }

    /// Apply a freshly read config snapshot through the merge policy.
    ///
    /// While the device is under an active edit the config is left alone
    /// entirely; initialization still completes so connection status keeps
    /// updating.
    fn apply_config(&self, id: &str, incoming: DeviceConfig) {
        let suppressed = self.edit.is_active(id);
        let mut applied: Option<DeviceConfig> = None;

        self.registry.lock().update(id, |d| {
            // Version is firmware identity, not user-editable state; record
            // it even while an edit suppresses the config merge
            if let Some(version) = &incoming.gpk_rc_version {
                d.gpk_rc_version = Some(version.clone());
            }
            if suppressed {
                debug!("Config refresh for {} suppressed (active edit)", id);
            } else {
                match &mut d.config {
                    // Live timer on both sides: only the volatile display
                    // fields move, everything else keeps pending edits
                    Some(current)
                        if current.pomodoro.timer_active == 1
                            && incoming.pomodoro.timer_active == 1 =>
                    {
                        current.pomodoro.pomodoro_minutes = incoming.pomodoro.pomodoro_minutes;
                        current.pomodoro.pomodoro_seconds = incoming.pomodoro.pomodoro_seconds;
                        current.pomodoro.pomodoro_state = incoming.pomodoro.pomodoro_state;
                        current.pomodoro.pomodoro_current_cycle =
                            incoming.pomodoro.pomodoro_current_cycle;
                    }
                    _ => {
                        d.config = Some(incoming);
                    }
                }
                applied = d.config.clone();
            }
            d.initializing = false;
        });

        if let Some(config) = applied {
            self.emit(AppEvent::ConfigUpdated {
                id: id.to_string(),
                config,
            });
        }
    }

    /// Poll live pomodoro status and merge the volatile fields into the
    /// cached config. Runs detached from the reconciliation pass.
    fn refresh_pomodoro_status(&self, id: &str) {
        let status = match self.transport.read_pomodoro_status(id) {
            Ok(status) => status,
            Err(e) => {
                warn!("Pomodoro status poll failed for {}: {}", id, e);
                return;
            }
        };

        if self.edit.is_active(id) {
            debug!("Pomodoro status for {} suppressed (active edit)", id);
            return;
        }

        let mut phase_changed = false;
        let mut updated: Option<DeviceConfig> = None;

        self.registry.lock().update(id, |d| {
            if let Some(config) = &mut d.config {
                phase_changed = config.pomodoro.phase != status.phase;
                config.pomodoro.timer_active = status.timer_active;
                config.pomodoro.phase = status.phase;
                config.pomodoro.pomodoro_minutes = status.minutes;
                config.pomodoro.pomodoro_seconds = status.seconds;
                config.pomodoro.pomodoro_state = status.state;
                config.pomodoro.pomodoro_current_cycle = status.current_cycle;
                updated = Some(config.clone());
            }
        });

        if let Some(config) = updated {
            self.emit(AppEvent::PomodoroPhaseChanged {
                id: id.to_string(),
                config,
                phase_changed,
            });
        }
    }

    /// User-initiated trackpad config save. Encodes, writes to firmware,
    /// updates the cached config and persists the UI-only auto-layer fields.
    pub fn save_trackpad_config(&self, id: &str, trackpad: TrackpadConfig) -> SaveOutcome {
        let outcome = match self.try_save_trackpad(id, &trackpad) {
            Ok(()) => SaveOutcome::ok(),
            Err(e) => {
                warn!("Trackpad config save failed for {}: {}", id, e);
                SaveOutcome::failed(e.to_string())
            }
        };
        self.emit(AppEvent::ConfigSaveComplete {
            id: id.to_string(),
            success: outcome.success,
            timestamp: outcome.timestamp,
        });
        outcome
    }

    fn try_save_trackpad(&self, id: &str, trackpad: &TrackpadConfig) -> anyhow::Result<()> {
        let bytes = codec::encode_trackpad(trackpad);
        self.transport.write_trackpad_config(id, &bytes)?;

        self.store.set_auto_layer_settings(
            id,
            serde_json::json!({
                "enabled": trackpad.auto_layer_enabled,
                "settings": trackpad.auto_layer_settings,
            }),
        )?;

        self.registry.lock().update(id, |d| {
            if let Some(config) = &mut d.config {
                config.trackpad = trackpad.clone();
            }
        });
        Ok(())
    }

    /// User-initiated pomodoro config save.
    pub fn save_pomodoro_config(&self, id: &str, pomodoro: PomodoroConfig) -> SaveOutcome {
        let outcome = match self.try_save_pomodoro(id, &pomodoro) {
            Ok(()) => SaveOutcome::ok(),
            Err(e) => {
                warn!("Pomodoro config save failed for {}: {}", id, e);
                SaveOutcome::failed(e.to_string())
            }
        };
        self.emit(AppEvent::ConfigSaveComplete {
            id: id.to_string(),
            success: outcome.success,
            timestamp: outcome.timestamp,
        });
        outcome
    }

    fn try_save_pomodoro(&self, id: &str, pomodoro: &PomodoroConfig) -> anyhow::Result<()> {
        let bytes = codec::encode_pomodoro(pomodoro);
        self.transport.write_pomodoro_config(id, &bytes)?;

        self.registry.lock().update(id, |d| {
            if let Some(config) = &mut d.config {
                config.pomodoro = pomodoro.clone();
            }
        });
        Ok(())
    }

    /// Export the desktop-side settings document to a file.
    pub fn export_settings(&self, path: &Path) -> SaveOutcome {
        match self.store.export_to(path) {
            Ok(()) => SaveOutcome::ok(),
            Err(e) => {
                warn!("Settings export to {:?} failed: {}", path, e);
                SaveOutcome::failed(e.to_string())
            }
        }
    }

    /// Replace the desktop-side settings document from an exported file.
    pub fn import_settings(&self, path: &Path) -> SaveOutcome {
        match self.store.import_from(path) {
            Ok(()) => SaveOutcome::ok(),
            Err(e) => {
                warn!("Settings import from {:?} failed: {}", path, e);
                SaveOutcome::failed(e.to_string())
            }
        }
    }

    /// Toggle the OLED preference for a device and record it in the store.
    pub fn set_oled_enabled(&self, id: &str, enabled: bool) -> SaveOutcome {
        let outcome = match self.store.set_oled_enabled(id, enabled) {
            Ok(()) => SaveOutcome::ok(),
            Err(e) => {
                warn!("OLED setting persist failed for {}: {}", id, e);
                SaveOutcome::failed(e.to_string())
            }
        };
        if outcome.success {
            self.registry.lock().update(id, |d| {
                if let Some(config) = &mut d.config {
                    config.oled_enabled = enabled as u8;
                }
            });
            self.emit(AppEvent::OledSettingsChanged {
                id: id.to_string(),
                enabled,
            });
        }
        outcome
    }

    fn emit(&self, event: AppEvent) {
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hid::mock::MockTransport;
    use crate::sync::device::PomodoroPhase;
    use tempfile::tempdir;

    fn test_config() -> SyncConfig {
        SyncConfig {
            polling_interval_ms: 10,
            settle_delay_ms: 1,
            restart_backoff_ms: 1,
            start_retry_limit: 3,
        }
    }

    fn engine_with_mock() -> (
        SyncEngine,
        Arc<MockTransport>,
        mpsc::UnboundedReceiver<AppEvent>,
        tempfile::TempDir,
    ) {
        let dir = tempdir().unwrap();
        let store =
            Arc::new(SettingsStore::open_at(dir.path().join("settings.json")).unwrap());
        let mock = Arc::new(MockTransport::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = SyncEngine::new(
            Arc::clone(&mock) as Arc<dyn Transport>,
            store,
            tx,
            test_config(),
        );
        (engine, mock, rx, dir)
    }

    fn usable_config() -> DeviceConfig {
        DeviceConfig {
            init: 1,
            oled_enabled: 0,
            ..Default::default()
        }
    }

    #[test]
    fn test_apply_config_wholesale_when_timer_inactive() {
        let (engine, mock, _rx, _dir) = engine_with_mock();
        mock.set_present(vec![MockTransport::observed("a")]);
        engine.registry.lock().upsert(&MockTransport::observed("a"));

        let mut incoming = usable_config();
        incoming.pomodoro.work_time = 30;
        engine.apply_config("a", incoming.clone());

        let device = engine.registry.lock().get("a").cloned().unwrap();
        assert_eq!(device.config, Some(incoming));
        assert!(!device.initializing);
    }

    #[test]
    fn test_apply_config_live_merge_preserves_durable_fields() {
        let (engine, _mock, _rx, _dir) = engine_with_mock();
        engine.registry.lock().upsert(&MockTransport::observed("a"));

        let mut cached = usable_config();
        cached.pomodoro.timer_active = 1;
        cached.pomodoro.work_time = 25;
        cached.pomodoro.pomodoro_minutes = 24;
        engine.registry.lock().update("a", |d| d.config = Some(cached));

        let mut incoming = usable_config();
        incoming.pomodoro.timer_active = 1;
        incoming.pomodoro.work_time = 50; // must NOT land
        incoming.pomodoro.pomodoro_minutes = 12;
        incoming.pomodoro.pomodoro_seconds = 34;
        incoming.pomodoro.pomodoro_state = 2;
        incoming.pomodoro.pomodoro_current_cycle = 3;
        engine.apply_config("a", incoming);

        let config = engine
            .registry
            .lock()
            .get("a")
            .and_then(|d| d.config.clone())
            .unwrap();
        assert_eq!(config.pomodoro.work_time, 25);
        assert_eq!(config.pomodoro.pomodoro_minutes, 12);
        assert_eq!(config.pomodoro.pomodoro_seconds, 34);
        assert_eq!(config.pomodoro.pomodoro_state, 2);
        assert_eq!(config.pomodoro.pomodoro_current_cycle, 3);
    }

    #[test]
    fn test_apply_config_suppressed_during_active_edit() {
        let (engine, _mock, _rx, _dir) = engine_with_mock();
        engine.registry.lock().upsert(&MockTransport::observed("a"));
        let cached = usable_config();
        engine
            .registry
            .lock()
            .update("a", |d| d.config = Some(cached.clone()));

        engine.edit_session().set_active(Some("a"));

        let mut incoming = usable_config();
        incoming.trackpad.default_speed = 42;
        engine.apply_config("a", incoming);

        let device = engine.registry.lock().get("a").cloned().unwrap();
        assert_eq!(device.config, Some(cached));
        // Initialization still completes so `connected` can keep updating
        assert!(!device.initializing);
    }

    #[test]
    fn test_pomodoro_status_refresh_sets_phase_changed() {
        let (engine, mock, mut rx, _dir) = engine_with_mock();
        engine.registry.lock().upsert(&MockTransport::observed("a"));
        let mut cached = usable_config();
        cached.pomodoro.timer_active = 1;
        cached.pomodoro.phase = PomodoroPhase::Work;
        engine.registry.lock().update("a", |d| d.config = Some(cached));

        mock.set_pomodoro_status(
            "a",
            crate::sync::device::PomodoroStatus {
                timer_active: 1,
                phase: PomodoroPhase::Break,
                minutes: 4,
                seconds: 59,
                state: 1,
                current_cycle: 2,
            },
        );
        engine.refresh_pomodoro_status("a");

        let mut saw_phase_change = false;
        while let Ok(event) = rx.try_recv() {
            if let AppEvent::PomodoroPhaseChanged {
                id, phase_changed, ..
            } = event
            {
                assert_eq!(id, "a");
                saw_phase_change = phase_changed;
            }
        }
        assert!(saw_phase_change);

        let config = engine
            .registry
            .lock()
            .get("a")
            .and_then(|d| d.config.clone())
            .unwrap();
        assert_eq!(config.pomodoro.phase, PomodoroPhase::Break);
        assert_eq!(config.pomodoro.pomodoro_minutes, 4);
    }

    #[test]
    fn test_apply_config_records_firmware_version() {
        let (engine, _mock, _rx, _dir) = engine_with_mock();
        engine.registry.lock().upsert(&MockTransport::observed("a"));

        let mut incoming = usable_config();
        incoming.gpk_rc_version = Some("1.2".to_string());
        engine.apply_config("a", incoming);

        let device = engine.registry.lock().get("a").cloned().unwrap();
        assert_eq!(device.gpk_rc_version.as_deref(), Some("1.2"));

        // A later snapshot without a version (older firmware after a
        // downgrade would report 0.0) keeps the last known one
        engine.apply_config("a", usable_config());
        let device = engine.registry.lock().get("a").cloned().unwrap();
        assert_eq!(device.gpk_rc_version.as_deref(), Some("1.2"));
    }

    #[test]
    fn test_version_recorded_even_during_active_edit() {
        let (engine, _mock, _rx, _dir) = engine_with_mock();
        engine.registry.lock().upsert(&MockTransport::observed("a"));
        engine.edit_session().set_active(Some("a"));

        let mut incoming = usable_config();
        incoming.gpk_rc_version = Some("2.0".to_string());
        engine.apply_config("a", incoming);

        let device = engine.registry.lock().get("a").cloned().unwrap();
        // Config merge suppressed, version still recorded
        assert_eq!(device.config, None);
        assert_eq!(device.gpk_rc_version.as_deref(), Some("2.0"));
    }

    #[test]
    fn test_settings_export_import_outcomes() {
        let (engine, _mock, _rx, dir) = engine_with_mock();
        engine
            .store
            .set_auto_layer_settings("a", serde_json::json!({"apps": ["code"]}))
            .unwrap();

        let export_path = dir.path().join("export.json");
        assert!(engine.export_settings(&export_path).success);

        let (other, _mock2, _rx2, _dir2) = engine_with_mock();
        assert!(other.import_settings(&export_path).success);
        assert_eq!(
            other.store.auto_layer_settings("a"),
            Some(serde_json::json!({"apps": ["code"]}))
        );

        let outcome = other.import_settings(&dir.path().join("missing.json"));
        assert!(!outcome.success);
        assert!(outcome.error.is_some());
    }

    #[test]
    fn test_save_outcome_failure_is_structured() {
        let (engine, _mock, mut rx, _dir) = engine_with_mock();
        // No session open: the write fails, but we get an outcome, not an Err
        let outcome = engine.save_trackpad_config("ghost", TrackpadConfig::default());
        assert!(!outcome.success);
        assert!(outcome.error.is_some());

        let mut saw_complete = false;
        while let Ok(event) = rx.try_recv() {
            if let AppEvent::ConfigSaveComplete { id, success, .. } = event {
                assert_eq!(id, "ghost");
                assert!(!success);
                saw_complete = true;
            }
        }
        assert!(saw_complete);
    }

    #[test]
    fn test_save_trackpad_persists_auto_layer() {
        let (engine, mock, _rx, _dir) = engine_with_mock();
        let dev = MockTransport::observed("a");
        mock.start(&dev).unwrap();
        engine.registry.lock().upsert(&dev);
        engine
            .registry
            .lock()
            .update("a", |d| d.config = Some(usable_config()));

        let trackpad = TrackpadConfig {
            default_speed: 9,
            auto_layer_enabled: true,
            auto_layer_settings: serde_json::json!({"apps": ["figma"]}),
            ..Default::default()
        };
        let outcome = engine.save_trackpad_config("a", trackpad);
        assert!(outcome.success);

        let stored = engine.store.auto_layer_settings("a").unwrap();
        assert_eq!(stored["enabled"], serde_json::json!(true));

        let config = engine
            .registry
            .lock()
            .get("a")
            .and_then(|d| d.config.clone())
            .unwrap();
        assert_eq!(config.trackpad.default_speed, 9);
    }
}
