//! GPK Companion
//!
//! A Rust daemon that configures and monitors GPK split keyboards
//! (trackpad, OLED and pomodoro-timer firmware features) over Raw HID.
//!
//! # Features
//! - Continuous reconciliation of physical device presence vs. tracked state
//! - Per-device processing locks so overlapping passes never race
//! - Firmware config read/write with trackpad and pomodoro byte codecs
//! - Edit-session tracking so live slider drags are never clobbered by polls
//! - Event surface for a UI/tray frontend (device list, pomodoro phases,
//!   OLED toggles, save completions)

pub mod core;
pub mod hid;
pub mod sync;

pub use crate::core::config::Config;
pub use crate::core::events::AppEvent;
pub use crate::core::store::SettingsStore;
pub use crate::hid::{HidTransport, Transport, TransportError};
pub use crate::sync::{Device, DeviceConfig, SyncEngine};
