//! Application event definitions

use crate::sync::device::{Device, DeviceConfig};
use chrono::{DateTime, Utc};

/// Events pushed from the synchronization engine to the UI/tray surface.
///
/// Each variant fires at most once per logical change per reconciliation
/// pass; consumers treat payloads as eventually-consistent snapshots.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Registry snapshot changed (new listing, state transitions)
    DeviceListChanged(Vec<Device>),

    /// A device vanished from the physical listing and was dropped
    DeviceDisconnected { id: String },

    /// A config snapshot was applied to the registry entry
    ConfigUpdated { id: String, config: DeviceConfig },

    /// A user-initiated config save finished
    ConfigSaveComplete {
        id: String,
        success: bool,
        timestamp: DateTime<Utc>,
    },

    /// Pomodoro status refresh landed; `phase_changed` marks a transition
    /// the tray/notification surface should announce
    PomodoroPhaseChanged {
        id: String,
        config: DeviceConfig,
        phase_changed: bool,
    },

    /// OLED display was toggled for a device
    OledSettingsChanged { id: String, enabled: bool },
}
