//! In-memory registry of known devices
//!
//! Pure data plus mutation rules; all operations are total and never panic.
//! Concurrency is handled by the owner (the engine wraps the registry in a
//! `parking_lot::Mutex`).

use super::device::{Device, ObservedDevice};
use std::collections::HashMap;
use tracing::debug;

/// Keyed collection of devices and their last-observed state
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: HashMap<String, Device>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a device from a transport observation.
    ///
    /// A known entry that settled into a failed state (not connected, not
    /// mid-initialization, no config) is reset to a creation-equivalent
    /// state first, so nothing from the prior session survives. Entries that
    /// are initializing or already carry a config are left alone; the
    /// disconnect path removes vanished devices outright, so any replug
    /// re-enters through the fresh-insert path anyway.
    pub fn upsert(&mut self, observed: &ObservedDevice) {
        match self.devices.get_mut(&observed.id) {
            Some(device) => {
                if !device.connected && !device.initializing && device.config.is_none() {
                    device.reset_for_reconnect();
                }
                device.merge_observed(observed);
            }
            None => {
                debug!("Registry: new device {}", observed.id);
                self.devices
                    .insert(observed.id.clone(), Device::from_observed(observed));
            }
        }
    }

    /// Drop an entry entirely. No-op for unknown ids.
    pub fn remove(&mut self, id: &str) {
        if self.devices.remove(id).is_some() {
            debug!("Registry: removed {}", id);
        }
    }

    pub fn get(&self, id: &str) -> Option<&Device> {
        self.devices.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.devices.contains_key(id)
    }

    /// Apply a mutation to one device, if present. Returns whether the
    /// device was found; resumed async code uses this to re-validate
    /// presence after a suspension point.
    pub fn update<F>(&mut self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut Device),
    {
        match self.devices.get_mut(id) {
            Some(device) => {
                f(device);
                true
            }
            None => false,
        }
    }

    /// Snapshot of all devices (unordered)
    pub fn all(&self) -> Vec<Device> {
        self.devices.values().cloned().collect()
    }

    /// Ids of all tracked devices
    pub fn ids(&self) -> Vec<String> {
        self.devices.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
