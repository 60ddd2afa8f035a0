//! Key-value persistence service
//!
//! Backs the desktop-side settings the firmware never sees: auto-layer
//! rules, OLED toggles, desktop notification preferences, tray behavior,
//! window bounds, locale, polling interval. One JSON document with
//! independent camelCase keys; every `set_*` persists the whole document.
//! No cross-key transactionality.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Tray behavior settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TraySettings {
    pub minimize_to_tray: bool,
    pub background_start: bool,
}

/// Last-known main window geometry
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// The on-disk settings document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreDocument {
    /// Per-device auto-layer rules, keyed by device id
    pub auto_layer_settings: HashMap<String, serde_json::Value>,
    /// Per-device OLED enabled flag, keyed by device id
    pub oled_settings: HashMap<String, bool>,
    /// Per-device desktop notification opt-in for pomodoro phases
    pub pomodoro_desktop_notifications_settings: HashMap<String, bool>,
    /// Notification history shown in the UI
    pub saved_notifications: Vec<serde_json::Value>,
    pub tray_settings: TraySettings,
    pub window_bounds: Option<WindowBounds>,
    pub locale: Option<String>,
    /// Override for the engine polling interval in ms
    pub polling_interval: Option<u64>,
    pub notification_api_endpoint: Option<String>,
}

/// Settings store with get/set semantics over the fixed schema
pub struct SettingsStore {
    path: PathBuf,
    document: Mutex<StoreDocument>,
}

impl SettingsStore {
    /// Open the store at the default platform location
    pub fn open() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("com", "gpk", "GpkCompanion")
            .context("Failed to determine data directory")?;
        Self::open_at(proj_dirs.data_dir().join("settings.json"))
    }

    /// Open the store at an explicit path (used by tests)
    pub fn open_at(path: PathBuf) -> Result<Self> {
        let document = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings store: {:?}", path))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse settings store: {:?}", path))?
        } else {
            StoreDocument::default()
        };

        Ok(Self {
            path,
            document: Mutex::new(document),
        })
    }

    fn persist(&self, document: &StoreDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory: {:?}", parent))?;
        }
        let content =
            serde_json::to_string_pretty(document).context("Failed to serialize settings")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write settings store: {:?}", self.path))?;
        Ok(())
    }

    /// Mutate the document under the lock and persist the result.
    /// The mutation lands on a copy; memory only takes the new state once
    /// the disk write succeeded, so a failed set leaves both sides as-is.
    fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut StoreDocument),
    {
        let mut document = self.document.lock();
        let mut next = document.clone();
        f(&mut next);
        self.persist(&next)?;
        *document = next;
        Ok(())
    }

    pub fn auto_layer_settings(&self, device_id: &str) -> Option<serde_json::Value> {
        self.document.lock().auto_layer_settings.get(device_id).cloned()
    }

    pub fn set_auto_layer_settings(&self, device_id: &str, value: serde_json::Value) -> Result<()> {
        self.update(|doc| {
            doc.auto_layer_settings.insert(device_id.to_string(), value);
        })
    }

    pub fn oled_enabled(&self, device_id: &str) -> Option<bool> {
        self.document.lock().oled_settings.get(device_id).copied()
    }

    pub fn set_oled_enabled(&self, device_id: &str, enabled: bool) -> Result<()> {
        self.update(|doc| {
            doc.oled_settings.insert(device_id.to_string(), enabled);
        })
    }

    pub fn pomodoro_notifications_enabled(&self, device_id: &str) -> bool {
        self.document
            .lock()
            .pomodoro_desktop_notifications_settings
            .get(device_id)
            .copied()
            .unwrap_or(false)
    }

    pub fn set_pomodoro_notifications_enabled(&self, device_id: &str, enabled: bool) -> Result<()> {
        self.update(|doc| {
            doc.pomodoro_desktop_notifications_settings
                .insert(device_id.to_string(), enabled);
        })
    }

    pub fn saved_notifications(&self) -> Vec<serde_json::Value> {
        self.document.lock().saved_notifications.clone()
    }

    pub fn push_saved_notification(&self, notification: serde_json::Value) -> Result<()> {
        self.update(|doc| doc.saved_notifications.push(notification))
    }

    pub fn tray_settings(&self) -> TraySettings {
        self.document.lock().tray_settings.clone()
    }

    pub fn set_tray_settings(&self, settings: TraySettings) -> Result<()> {
        self.update(|doc| doc.tray_settings = settings)
    }

    pub fn window_bounds(&self) -> Option<WindowBounds> {
        self.document.lock().window_bounds
    }

    pub fn set_window_bounds(&self, bounds: WindowBounds) -> Result<()> {
        self.update(|doc| doc.window_bounds = Some(bounds))
    }

    pub fn locale(&self) -> Option<String> {
        self.document.lock().locale.clone()
    }

    pub fn set_locale(&self, locale: &str) -> Result<()> {
        self.update(|doc| doc.locale = Some(locale.to_string()))
    }

    pub fn polling_interval(&self) -> Option<u64> {
        self.document.lock().polling_interval
    }

    pub fn set_polling_interval(&self, interval_ms: u64) -> Result<()> {
        self.update(|doc| doc.polling_interval = Some(interval_ms))
    }

    pub fn notification_api_endpoint(&self) -> Option<String> {
        self.document.lock().notification_api_endpoint.clone()
    }

    pub fn set_notification_api_endpoint(&self, endpoint: &str) -> Result<()> {
        self.update(|doc| doc.notification_api_endpoint = Some(endpoint.to_string()))
    }

    /// Export the whole document as pretty JSON to `path`
    pub fn export_to(&self, path: &Path) -> Result<()> {
        let document = self.document.lock();
        let content =
            serde_json::to_string_pretty(&*document).context("Failed to serialize settings")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to export settings to {:?}", path))?;
        Ok(())
    }

    /// Replace the document from a previously exported JSON file
    pub fn import_from(&self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {:?}", path))?;
        let imported: StoreDocument = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings from {:?}", path))?;
        self.update(|doc| *doc = imported)
    }
}
