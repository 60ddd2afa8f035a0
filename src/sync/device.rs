//! Device and firmware configuration model

use serde::{Deserialize, Serialize};

/// Kind of GPK keyboard, derived from the USB product string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeviceType {
    /// Split keyboard with integrated trackpad
    #[default]
    Trackpad,
    /// Keyboard without trackpad (pomodoro/OLED only)
    Plain,
}

impl DeviceType {
    /// Trackpad models carry a "TP" suffix in the USB product string
    pub fn from_product(product: Option<&str>) -> Self {
        match product {
            Some(name) if name.contains("TP") => DeviceType::Trackpad,
            Some(_) => DeviceType::Plain,
            None => DeviceType::default(),
        }
    }
}

/// Pomodoro timer phase as reported by firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum PomodoroPhase {
    #[default]
    Work = 1,
    Break = 2,
    LongBreak = 3,
}

impl PomodoroPhase {
    pub fn as_byte(&self) -> u8 {
        *self as u8
    }

    /// Parse a phase byte; out-of-range values fall back to Work
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            2 => PomodoroPhase::Break,
            3 => PomodoroPhase::LongBreak,
            _ => PomodoroPhase::Work,
        }
    }
}

/// Trackpad configuration block.
///
/// All fields except `auto_layer_enabled`/`auto_layer_settings` are encoded
/// into the 19-byte wire format (see `hid::codec`). The auto-layer fields are
/// UI-only state persisted to the settings store, never sent to firmware.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackpadConfig {
    /// Haptic waveform index (0-127)
    pub hf_waveform_number: u8,
    /// Play haptic feedback on layer change
    pub can_hf_for_layer: bool,
    /// Tap-and-hold dragging enabled
    pub can_drag: bool,
    /// Switch layer while touching the trackpad
    pub can_trackpad_layer: bool,
    /// Reverse vertical scroll direction
    pub can_reverse_scrolling_direction: bool,
    /// Use fixed drag strength instead of adaptive
    pub drag_strength_mode: bool,
    /// Drag strength (0-31)
    pub drag_strength: u8,
    /// Default cursor speed (0-63)
    pub default_speed: u8,
    /// Scroll lines per step (0-15)
    pub scroll_step: u8,
    /// Allow short flick scrolling
    pub can_short_scroll: bool,
    /// Scroll gesture debounce in ms
    pub scroll_term: u16,
    /// Drag begin threshold in ms
    pub drag_term: u16,
    /// Tap detection window in ms
    pub tap_term: u16,
    /// Swipe detection window in ms
    pub swipe_term: u16,
    /// Pinch detection window in ms
    pub pinch_term: u16,
    /// Generic gesture timeout in ms
    pub gesture_term: u16,

    /// UI-only: automatic layer switching enabled (persisted, not encoded)
    #[serde(default)]
    pub auto_layer_enabled: bool,
    /// UI-only: automatic layer switching rules (persisted, not encoded)
    #[serde(default)]
    pub auto_layer_settings: serde_json::Value,
}

/// Pomodoro timer configuration block.
///
/// The `pomodoro_minutes/seconds/state/current_cycle` fields are runtime
/// status streamed by firmware for live display; they are never persisted
/// and never part of the 8-byte write format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PomodoroConfig {
    /// 1 while a timer is running on the device
    pub timer_active: u8,
    /// Current phase (work/break/long break)
    pub phase: PomodoroPhase,
    /// Work phase length in minutes
    pub work_time: u8,
    /// Break phase length in minutes
    pub break_time: u8,
    /// Long break length in minutes
    pub long_break_time: u8,
    /// Work phases per long break
    pub work_interval: u8,
    /// Haptic pattern played on work phase start
    pub work_hf_pattern: u8,
    /// Haptic pattern played on break phase start
    pub break_hf_pattern: u8,
    /// Number of full cycles to run (0 means "use default of 1")
    pub pomodoro_cycle: u8,
    /// Haptic notification on phase change
    pub notify_haptic_enable: u8,
    /// Restart automatically after the last cycle
    pub continuous_mode: u8,

    /// Runtime: minutes remaining in the current phase
    #[serde(skip)]
    pub pomodoro_minutes: u8,
    /// Runtime: seconds remaining in the current phase
    #[serde(skip)]
    pub pomodoro_seconds: u8,
    /// Runtime: raw firmware timer state byte
    #[serde(skip)]
    pub pomodoro_state: u8,
    /// Runtime: cycle the timer is currently in
    #[serde(skip)]
    pub pomodoro_current_cycle: u8,
}

/// Live pomodoro status snapshot returned by a status poll
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PomodoroStatus {
    pub timer_active: u8,
    pub phase: PomodoroPhase,
    pub minutes: u8,
    pub seconds: u8,
    pub state: u8,
    pub current_cycle: u8,
}

/// Full firmware-side configuration snapshot for one device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Firmware-reported init marker; nonzero once firmware settings are live
    pub init: u8,
    /// OLED display enabled (0/1)
    pub oled_enabled: u8,
    /// Trackpad settings
    pub trackpad: TrackpadConfig,
    /// Pomodoro settings
    pub pomodoro: PomodoroConfig,
    /// GPK RC protocol version reported alongside the snapshot, if nonzero
    #[serde(default)]
    pub gpk_rc_version: Option<String>,
}

impl DeviceConfig {
    /// Whether this snapshot carries usable firmware state.
    /// A config with neither the init marker nor the OLED flag set is the
    /// firmware's "not yet populated" shape.
    pub fn is_usable(&self) -> bool {
        self.init != 0 || self.oled_enabled != 0
    }
}

/// Identity fields observed in a transport listing, before a session exists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservedDevice {
    pub id: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub path: Option<String>,
}

impl ObservedDevice {
    /// Stable device id derived from transport-level descriptors
    pub fn derive_id(vendor_id: u16, product_id: u16, path: Option<&str>) -> String {
        format!("{:04x}:{:04x}:{}", vendor_id, product_id, path.unwrap_or(""))
    }
}

/// One tracked keyboard accessory and its last-observed state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Stable identifier (vid:pid:path)
    pub id: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub path: Option<String>,

    /// True only once initialization finished and a config has been observed
    pub connected: bool,
    /// Session is being (re)established; config not yet trusted
    pub initializing: bool,
    /// A config read has been requested for this session
    pub check_device: bool,
    /// Device must be stopped and restarted before further use
    pub needs_restart: bool,
    /// Last config snapshot read from firmware
    pub config: Option<DeviceConfig>,
    /// GPK RC firmware protocol version, once reported
    pub gpk_rc_version: Option<String>,
    /// Device kind
    pub device_type: DeviceType,
}

impl Device {
    /// Create a fresh entry for a newly observed device
    pub fn from_observed(observed: &ObservedDevice) -> Self {
        Self {
            id: observed.id.clone(),
            vendor_id: observed.vendor_id,
            product_id: observed.product_id,
            manufacturer: observed.manufacturer.clone(),
            product: observed.product.clone(),
            path: observed.path.clone(),
            connected: false,
            initializing: true,
            check_device: false,
            // Every new session begins with a restart so a reappearing
            // device can never resume prior firmware state
            needs_restart: true,
            config: None,
            gpk_rc_version: None,
            device_type: DeviceType::from_product(observed.product.as_deref()),
        }
    }

    /// Reset mutable state so the next initialization starts from scratch.
    /// Invoked on every reconnect; nothing from the prior session survives.
    pub fn reset_for_reconnect(&mut self) {
        self.connected = false;
        self.initializing = true;
        self.check_device = false;
        self.needs_restart = true;
        self.config = None;
        self.gpk_rc_version = None;
    }

    /// Merge identity fields from a fresh transport observation
    pub fn merge_observed(&mut self, observed: &ObservedDevice) {
        self.vendor_id = observed.vendor_id;
        self.product_id = observed.product_id;
        self.manufacturer = observed.manufacturer.clone();
        self.product = observed.product.clone();
        self.path = observed.path.clone();
    }

    /// Whether the cached config is usable firmware state
    pub fn has_usable_config(&self) -> bool {
        self.config.as_ref().is_some_and(DeviceConfig::is_usable)
    }

    /// Identity fields in the shape the transport expects
    pub fn as_observed(&self) -> ObservedDevice {
        ObservedDevice {
            id: self.id.clone(),
            vendor_id: self.vendor_id,
            product_id: self.product_id,
            manufacturer: self.manufacturer.clone(),
            product: self.product.clone(),
            path: self.path.clone(),
        }
    }
}
