//! End-to-end reconciliation tests over the mock transport
//!
//! Each test drives the engine tick by tick with `reconcile()` instead of
//! the free-running loop, so the pass boundaries are deterministic.

use gpk_companion::core::config::SyncConfig;
use gpk_companion::core::events::AppEvent;
use gpk_companion::core::store::SettingsStore;
use gpk_companion::hid::mock::{MockTransport, MockWrite};
use gpk_companion::hid::Transport;
use gpk_companion::sync::device::{DeviceConfig, PomodoroPhase, PomodoroStatus};
use gpk_companion::sync::engine::SyncEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

struct Harness {
    engine: SyncEngine,
    mock: Arc<MockTransport>,
    rx: mpsc::UnboundedReceiver<AppEvent>,
    _dir: tempfile::TempDir,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SettingsStore::open_at(dir.path().join("settings.json")).unwrap());
    let mock = Arc::new(MockTransport::new());
    let (tx, rx) = mpsc::unbounded_channel();
    let engine = SyncEngine::new(
        Arc::clone(&mock) as Arc<dyn Transport>,
        store,
        tx,
        SyncConfig {
            polling_interval_ms: 5,
            settle_delay_ms: 1,
            restart_backoff_ms: 1,
            start_retry_limit: 3,
        },
    );
    Harness {
        engine,
        mock,
        rx,
        _dir: dir,
    }
}

fn usable_config() -> DeviceConfig {
    DeviceConfig {
        init: 1,
        ..Default::default()
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<AppEvent>) -> Vec<AppEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Run ticks until device `id` reports connected (bounded)
async fn connect_device(h: &mut Harness, id: &str) {
    h.mock.set_present(vec![MockTransport::observed(id)]);
    h.mock.set_config(id, usable_config());
    for _ in 0..5 {
        h.engine.reconcile().await;
        let snapshot = h.engine.snapshot();
        if snapshot.iter().any(|d| d.id == id && d.connected) {
            return;
        }
    }
    panic!("device {} never connected", id);
}

#[tokio::test]
async fn test_full_connect_flow() {
    let mut h = harness();
    connect_device(&mut h, "a").await;

    let snapshot = h.engine.snapshot();
    let device = snapshot.iter().find(|d| d.id == "a").unwrap();
    assert!(device.connected);
    assert!(!device.initializing);
    assert!(device.config.is_some());

    let events = drain(&mut h.rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, AppEvent::ConfigUpdated { id, .. } if id == "a")));
}

#[tokio::test]
async fn test_reconnection_resets_state() {
    let mut h = harness();
    connect_device(&mut h, "a").await;
    let reads_before = h.mock.call_count("read_config", "a");

    // Unplug
    h.mock.set_present(vec![]);
    h.engine.reconcile().await;
    assert!(h.engine.snapshot().is_empty());

    // Replug with the same id: the new entry must carry nothing over and
    // must restart before any config read
    h.mock.set_present(vec![MockTransport::observed("a")]);
    h.engine.reconcile().await;

    let snapshot = h.engine.snapshot();
    let device = snapshot.iter().find(|d| d.id == "a").unwrap();
    assert!(device.config.is_none());
    assert!(!device.check_device);
    assert!(!device.connected);
    assert_eq!(h.mock.call_count("read_config", "a"), reads_before);
    // The restart branch ran (stop before start)
    assert!(h.mock.call_count("stop", "a") >= 1);
}

#[tokio::test]
async fn test_disconnect_emits_exactly_one_event_before_list_push() {
    let mut h = harness();
    connect_device(&mut h, "a").await;
    h.mock.set_present(vec![
        MockTransport::observed("a"),
        MockTransport::observed("b"),
    ]);
    h.mock.set_config("b", usable_config());
    for _ in 0..5 {
        h.engine.reconcile().await;
    }
    drain(&mut h.rx);

    // B vanishes
    h.mock.set_present(vec![MockTransport::observed("a")]);
    h.engine.reconcile().await;

    let events = drain(&mut h.rx);
    let disconnects: Vec<usize> = events
        .iter()
        .enumerate()
        .filter_map(|(i, e)| match e {
            AppEvent::DeviceDisconnected { id } if id == "b" => Some(i),
            _ => None,
        })
        .collect();
    assert_eq!(disconnects.len(), 1, "exactly one disconnect for b");

    // The first list push of the tick comes after the disconnect and no
    // longer contains b
    let first_list = events
        .iter()
        .enumerate()
        .find_map(|(i, e)| match e {
            AppEvent::DeviceListChanged(devices) => Some((i, devices.clone())),
            _ => None,
        })
        .expect("list push after disconnect");
    assert!(first_list.0 > disconnects[0]);
    assert!(first_list.1.iter().all(|d| d.id != "b"));
    assert!(first_list.1.iter().any(|d| d.id == "a"));
}

#[tokio::test]
async fn test_retry_ceiling_per_tick() {
    let mut h = harness();
    h.mock.set_present(vec![MockTransport::observed("a")]);
    h.mock.fail_all_starts("a");

    h.engine.reconcile().await;

    // Exactly three attempts in the tick, then the device surfaces as failed
    assert_eq!(h.mock.call_count("start", "a"), 3);
    let snapshot = h.engine.snapshot();
    let device = snapshot.iter().find(|d| d.id == "a").unwrap();
    assert!(!device.connected);
    assert!(!device.initializing);

    // And it keeps retrying on later ticks rather than giving up for good
    h.engine.reconcile().await;
    assert_eq!(h.mock.call_count("start", "a"), 6);
}

#[tokio::test]
async fn test_locked_device_is_skipped_and_locks_released() {
    let mut h = harness();
    h.mock.set_present(vec![MockTransport::observed("a")]);

    let locks = h.engine.locks();
    assert!(locks.try_lock("a"));

    // A pass over a locked device must not touch it
    h.engine.reconcile().await;
    assert_eq!(h.mock.call_count("start", "a"), 0);
    assert!(locks.is_locked("a"));

    locks.unlock("a");
    h.engine.reconcile().await;
    assert!(h.mock.call_count("start", "a") > 0);
    // Locks never leak past a pass
    assert!(!locks.is_locked("a"));
}

#[tokio::test]
async fn test_active_edit_suppresses_status_merge() {
    let mut h = harness();
    let mut config = usable_config();
    config.pomodoro.timer_active = 1;
    config.pomodoro.work_time = 25;
    h.mock.set_present(vec![MockTransport::observed("a")]);
    h.mock.set_config("a", config);
    h.mock.set_pomodoro_status(
        "a",
        PomodoroStatus {
            timer_active: 1,
            phase: PomodoroPhase::Work,
            minutes: 7,
            seconds: 30,
            state: 1,
            current_cycle: 1,
        },
    );
    for _ in 0..5 {
        h.engine.reconcile().await;
    }

    h.engine.edit_session().set_active(Some("a"));
    h.mock.set_pomodoro_status(
        "a",
        PomodoroStatus {
            timer_active: 1,
            phase: PomodoroPhase::Break,
            minutes: 4,
            seconds: 59,
            state: 1,
            current_cycle: 1,
        },
    );
    let before = h
        .engine
        .snapshot()
        .iter()
        .find(|d| d.id == "a")
        .and_then(|d| d.config.clone())
        .unwrap();

    h.engine.reconcile().await;
    // Give the detached status task time to run (and be suppressed)
    tokio::time::sleep(Duration::from_millis(30)).await;

    let snapshot = h.engine.snapshot();
    let device = snapshot.iter().find(|d| d.id == "a").unwrap();
    // Config untouched while the edit is active; connected still true
    assert_eq!(device.config.as_ref(), Some(&before));
    assert!(device.connected);

    // Edit ends: the next refresh lands again
    h.engine.edit_session().set_active(None);
    h.engine.reconcile().await;
    tokio::time::sleep(Duration::from_millis(30)).await;

    let snapshot = h.engine.snapshot();
    let config = snapshot
        .iter()
        .find(|d| d.id == "a")
        .and_then(|d| d.config.clone())
        .unwrap();
    assert_eq!(config.pomodoro.phase, PomodoroPhase::Break);
    assert_eq!(config.pomodoro.pomodoro_minutes, 4);
}

#[tokio::test]
async fn test_oled_datetime_write_fires_when_enabled() {
    let mut h = harness();
    let mut config = usable_config();
    config.oled_enabled = 1;
    h.mock.set_present(vec![MockTransport::observed("a")]);
    h.mock.set_config("a", config);
    for _ in 0..5 {
        h.engine.reconcile().await;
    }
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert!(h
        .mock
        .writes()
        .iter()
        .any(|w| matches!(w, MockWrite::OledDateTime(id, false) if id == "a")));
}

#[tokio::test]
async fn test_pomodoro_live_countdown_and_phase_event() {
    let mut h = harness();
    let mut config = usable_config();
    config.pomodoro.timer_active = 1;
    config.pomodoro.phase = PomodoroPhase::Work;
    h.mock.set_present(vec![MockTransport::observed("a")]);
    h.mock.set_config("a", config);
    h.mock.set_pomodoro_status(
        "a",
        PomodoroStatus {
            timer_active: 1,
            phase: PomodoroPhase::Break,
            minutes: 4,
            seconds: 42,
            state: 1,
            current_cycle: 2,
        },
    );
    for _ in 0..5 {
        h.engine.reconcile().await;
    }
    tokio::time::sleep(Duration::from_millis(30)).await;

    let snapshot = h.engine.snapshot();
    let merged = snapshot
        .iter()
        .find(|d| d.id == "a")
        .and_then(|d| d.config.clone())
        .unwrap();
    assert_eq!(merged.pomodoro.pomodoro_minutes, 4);
    assert_eq!(merged.pomodoro.pomodoro_seconds, 42);
    assert_eq!(merged.pomodoro.pomodoro_current_cycle, 2);
    assert_eq!(merged.pomodoro.phase, PomodoroPhase::Break);

    let events = drain(&mut h.rx);
    assert!(events.iter().any(|e| matches!(
        e,
        AppEvent::PomodoroPhaseChanged {
            id,
            phase_changed: true,
            ..
        } if id == "a"
    )));
}

#[tokio::test]
async fn test_dropped_session_recovers_with_fresh_config_read() {
    let mut h = harness();
    connect_device(&mut h, "a").await;
    let reads_before = h.mock.call_count("read_config", "a");

    // Session dies while the device stays enumerated
    h.mock.drop_session("a");
    for _ in 0..5 {
        h.engine.reconcile().await;
    }

    assert!(h.mock.has_session("a"));
    assert!(h.mock.call_count("read_config", "a") > reads_before);
    let snapshot = h.engine.snapshot();
    let device = snapshot.iter().find(|d| d.id == "a").unwrap();
    assert!(device.connected);
}

#[tokio::test]
async fn test_save_roundtrip_updates_cache_and_emits_event() {
    let mut h = harness();
    connect_device(&mut h, "a").await;
    drain(&mut h.rx);

    let mut pomodoro = h
        .engine
        .snapshot()
        .iter()
        .find(|d| d.id == "a")
        .and_then(|d| d.config.clone())
        .unwrap()
        .pomodoro;
    pomodoro.work_time = 50;

    let outcome = h.engine.save_pomodoro_config("a", pomodoro);
    assert!(outcome.success);

    assert!(h
        .mock
        .writes()
        .iter()
        .any(|w| matches!(w, MockWrite::Pomodoro(id, bytes) if id == "a" && bytes[0] == 50)));

    let events = drain(&mut h.rx);
    assert!(events.iter().any(|e| matches!(
        e,
        AppEvent::ConfigSaveComplete { id, success: true, .. } if id == "a"
    )));

    let cached = h
        .engine
        .snapshot()
        .iter()
        .find(|d| d.id == "a")
        .and_then(|d| d.config.clone())
        .unwrap();
    assert_eq!(cached.pomodoro.work_time, 50);
}

#[tokio::test]
async fn test_one_failing_device_does_not_starve_others() {
    let mut h = harness();
    h.mock.set_present(vec![
        MockTransport::observed("bad"),
        MockTransport::observed("good"),
    ]);
    h.mock.fail_all_starts("bad");
    h.mock.set_config("good", usable_config());

    for _ in 0..5 {
        h.engine.reconcile().await;
    }

    let snapshot = h.engine.snapshot();
    let good = snapshot.iter().find(|d| d.id == "good").unwrap();
    let bad = snapshot.iter().find(|d| d.id == "bad").unwrap();
    assert!(good.connected);
    assert!(!bad.connected);
}
