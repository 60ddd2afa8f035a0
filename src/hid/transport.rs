//! HID transport - session management and typed request/response per device
//!
//! Wraps `hidapi` behind the [`Transport`] trait so the synchronization
//! engine can run against real hardware or a mock. One 32-byte Raw HID
//! packet per request; responses read with a timeout.

use super::codec::{self, POMODORO_CONFIG_LEN, TRACKPAD_CONFIG_LEN};
use crate::core::config::HidConfig;
use crate::sync::device::{DeviceConfig, ObservedDevice, PomodoroPhase, PomodoroStatus};
use hidapi::{HidApi, HidDevice};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::CString;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Raw HID packet size in bytes
pub const PACKET_SIZE: usize = 32;

/// Response read timeout in milliseconds
const READ_TIMEOUT_MS: i32 = 500;

/// Command bytes understood by GPK RC firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HidCommand {
    /// Request the full configuration snapshot
    GetConfig = 0x01,
    /// Request live pomodoro timer status
    GetPomodoroStatus = 0x02,
    /// Write the 19-byte trackpad configuration
    SetTrackpadConfig = 0x03,
    /// Write the 8-byte pomodoro configuration
    SetPomodoroConfig = 0x04,
    /// Push current date/time to the OLED
    SetOledDateTime = 0x05,
}

/// Transport failure taxonomy.
///
/// `DeviceUnavailable` is the expected connect/disconnect race (the device
/// vanished between listing and open, or its path is gone); callers treat it
/// as benign and log at debug. Everything else is a real failure.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("device not found or path not available")]
    DeviceUnavailable,
    #[error("no open session for device {0}")]
    NotOpen(String),
    #[error("timed out waiting for firmware response")]
    Timeout,
    #[error("malformed firmware response: {0}")]
    Codec(String),
    #[error("HID I/O error: {0}")]
    Io(String),
}

impl TransportError {
    /// Whether this failure is an expected connect/disconnect race
    pub fn is_benign(&self) -> bool {
        matches!(self, TransportError::DeviceUnavailable)
    }
}

/// Byte-oriented request/response channel to physical devices.
///
/// All methods are synchronous and cheap enough to call from async tasks;
/// blocking reads are bounded by `READ_TIMEOUT_MS`.
pub trait Transport: Send + Sync {
    /// Enumerate physically present devices matching the GPK filter
    fn list(&self) -> Result<Vec<ObservedDevice>, TransportError>;

    /// Open a session for the device
    fn start(&self, device: &ObservedDevice) -> Result<(), TransportError>;

    /// Close the session for the device, if any
    fn stop(&self, id: &str) -> Result<(), TransportError>;

    /// Whether an open session exists for the device
    fn is_connected(&self, id: &str) -> bool;

    /// Read the full configuration snapshot from firmware
    fn read_config(&self, id: &str) -> Result<DeviceConfig, TransportError>;

    /// Read live pomodoro timer status
    fn read_pomodoro_status(&self, id: &str) -> Result<PomodoroStatus, TransportError>;

    /// Write a trackpad configuration block
    fn write_trackpad_config(
        &self,
        id: &str,
        bytes: &[u8; TRACKPAD_CONFIG_LEN],
    ) -> Result<(), TransportError>;

    /// Write a pomodoro configuration block
    fn write_pomodoro_config(
        &self,
        id: &str,
        bytes: &[u8; POMODORO_CONFIG_LEN],
    ) -> Result<(), TransportError>;

    /// Push current date/time to the OLED display
    fn write_oled_datetime(&self, id: &str, force: bool) -> Result<(), TransportError>;
}

/// `Transport` implementation over `hidapi`
pub struct HidTransport {
    /// HID API instance
    api: Arc<Mutex<HidApi>>,
    /// Open sessions keyed by device id
    sessions: Mutex<HashMap<String, HidDevice>>,
    /// Device filter (usage page/id, optional vendor pin)
    config: HidConfig,
}

impl HidTransport {
    /// Create a transport with the given device filter
    pub fn new(config: HidConfig) -> Result<Self, TransportError> {
        let api = HidApi::new().map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(Self {
            api: Arc::new(Mutex::new(api)),
            sessions: Mutex::new(HashMap::new()),
            config,
        })
    }

    /// Send one packet and read one response packet for the session
    fn request(&self, id: &str, packet: &[u8; PACKET_SIZE]) -> Result<[u8; PACKET_SIZE], TransportError> {
        let sessions = self.sessions.lock();
        let device = sessions
            .get(id)
            .ok_or_else(|| TransportError::NotOpen(id.to_string()))?;

        write_packet(device, packet)?;

        let mut buffer = [0u8; PACKET_SIZE];
        match device.read_timeout(&mut buffer, READ_TIMEOUT_MS) {
            Ok(n) if n > 0 => Ok(buffer),
            Ok(_) => Err(TransportError::Timeout),
            Err(e) => Err(TransportError::Io(e.to_string())),
        }
    }

    /// Send one packet without waiting for a response
    fn send(&self, id: &str, packet: &[u8; PACKET_SIZE]) -> Result<(), TransportError> {
        let sessions = self.sessions.lock();
        let device = sessions
            .get(id)
            .ok_or_else(|| TransportError::NotOpen(id.to_string()))?;
        write_packet(device, packet)
    }
}

impl Transport for HidTransport {
    fn list(&self) -> Result<Vec<ObservedDevice>, TransportError> {
        let mut api = self.api.lock();
        if let Err(e) = api.refresh_devices() {
            debug!("Failed to refresh device list: {}", e);
        }

        let devices = api
            .device_list()
            .filter(|d| {
                d.usage_page() == self.config.usage_page
                    && d.usage() == self.config.usage_id
                    && self
                        .config
                        .vendor_id
                        .map_or(true, |vid| d.vendor_id() == vid)
            })
            .map(|d| {
                let path = d.path().to_str().ok().map(str::to_string);
                ObservedDevice {
                    id: ObservedDevice::derive_id(d.vendor_id(), d.product_id(), path.as_deref()),
                    vendor_id: d.vendor_id(),
                    product_id: d.product_id(),
                    manufacturer: d.manufacturer_string().map(str::to_string),
                    product: d.product_string().map(str::to_string),
                    path,
                }
            })
            .collect();

        Ok(devices)
    }

    fn start(&self, device: &ObservedDevice) -> Result<(), TransportError> {
        let path = device
            .path
            .as_deref()
            .ok_or(TransportError::DeviceUnavailable)?;
        let path = CString::new(path).map_err(|_| TransportError::DeviceUnavailable)?;

        let api = self.api.lock();
        // Open failures here are almost always the device racing a replug
        let handle = api
            .open_path(&path)
            .map_err(|_| TransportError::DeviceUnavailable)?;
        handle
            .set_blocking_mode(false)
            .map_err(|e| TransportError::Io(e.to_string()))?;

        info!(
            "Opened session: {} {}",
            device.manufacturer.as_deref().unwrap_or("Unknown"),
            device.product.as_deref().unwrap_or("Unknown")
        );

        self.sessions.lock().insert(device.id.clone(), handle);
        Ok(())
    }

    fn stop(&self, id: &str) -> Result<(), TransportError> {
        if self.sessions.lock().remove(id).is_some() {
            info!("Closed session for {}", id);
        }
        Ok(())
    }

    fn is_connected(&self, id: &str) -> bool {
        self.sessions.lock().contains_key(id)
    }

    fn read_config(&self, id: &str) -> Result<DeviceConfig, TransportError> {
        let mut packet = [0u8; PACKET_SIZE];
        packet[0] = HidCommand::GetConfig as u8;
        let response = self.request(id, &packet)?;

        if response[0] != HidCommand::GetConfig as u8 {
            return Err(TransportError::Codec(format!(
                "unexpected response command 0x{:02x}",
                response[0]
            )));
        }

        // Response layout: [cmd, init, oled_enabled, trackpad x19, pomodoro x8, ver_major, ver_minor]
        let mut trackpad = [0u8; TRACKPAD_CONFIG_LEN];
        trackpad.copy_from_slice(&response[3..3 + TRACKPAD_CONFIG_LEN]);
        let mut pomodoro = [0u8; POMODORO_CONFIG_LEN];
        pomodoro.copy_from_slice(&response[22..22 + POMODORO_CONFIG_LEN]);

        // 0.0 means firmware that predates version reporting
        let gpk_rc_version = match (response[30], response[31]) {
            (0, 0) => None,
            (major, minor) => Some(format!("{}.{}", major, minor)),
        };

        Ok(DeviceConfig {
            init: response[1],
            oled_enabled: response[2],
            trackpad: codec::decode_trackpad(&trackpad),
            pomodoro: codec::decode_pomodoro(&pomodoro),
            gpk_rc_version,
        })
    }

    fn read_pomodoro_status(&self, id: &str) -> Result<PomodoroStatus, TransportError> {
        let mut packet = [0u8; PACKET_SIZE];
        packet[0] = HidCommand::GetPomodoroStatus as u8;
        let response = self.request(id, &packet)?;

        if response[0] != HidCommand::GetPomodoroStatus as u8 {
            return Err(TransportError::Codec(format!(
                "unexpected response command 0x{:02x}",
                response[0]
            )));
        }

        Ok(PomodoroStatus {
            timer_active: response[1],
            phase: PomodoroPhase::from_byte(response[2]),
            minutes: response[3],
            seconds: response[4],
            state: response[5],
            current_cycle: response[6],
        })
    }

    fn write_trackpad_config(
        &self,
        id: &str,
        bytes: &[u8; TRACKPAD_CONFIG_LEN],
    ) -> Result<(), TransportError> {
        let mut packet = [0u8; PACKET_SIZE];
        packet[0] = HidCommand::SetTrackpadConfig as u8;
        packet[1..1 + TRACKPAD_CONFIG_LEN].copy_from_slice(bytes);
        self.send(id, &packet)
    }

    fn write_pomodoro_config(
        &self,
        id: &str,
        bytes: &[u8; POMODORO_CONFIG_LEN],
    ) -> Result<(), TransportError> {
        let mut packet = [0u8; PACKET_SIZE];
        packet[0] = HidCommand::SetPomodoroConfig as u8;
        packet[1..1 + POMODORO_CONFIG_LEN].copy_from_slice(bytes);
        self.send(id, &packet)
    }

    fn write_oled_datetime(&self, id: &str, force: bool) -> Result<(), TransportError> {
        use chrono::{Datelike, Local, Timelike};

        let now = Local::now();
        let mut packet = [0u8; PACKET_SIZE];
        packet[0] = HidCommand::SetOledDateTime as u8;
        packet[1] = (now.year() - 2000).clamp(0, 255) as u8;
        packet[2] = now.month() as u8;
        packet[3] = now.day() as u8;
        packet[4] = now.hour() as u8;
        packet[5] = now.minute() as u8;
        packet[6] = now.second() as u8;
        packet[7] = force as u8;
        self.send(id, &packet)
    }
}

impl Drop for HidTransport {
    fn drop(&mut self) {
        let count = self.sessions.lock().len();
        if count > 0 {
            debug!("Dropping transport with {} open session(s)", count);
        }
    }
}

/// Write a single 32-byte packet, prepending the report id where the
/// platform requires it
fn write_packet(device: &HidDevice, packet: &[u8; PACKET_SIZE]) -> Result<(), TransportError> {
    #[cfg(any(target_os = "macos", target_os = "windows"))]
    let data = {
        let mut data = Vec::with_capacity(PACKET_SIZE + 1);
        data.push(0x00); // Report ID
        data.extend_from_slice(packet);
        data
    };

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let data = packet.to_vec();

    match device.write(&data) {
        Ok(written) => {
            debug!("Wrote {} bytes to HID device", written);
            Ok(())
        }
        Err(e) => {
            warn!("HID write failed: {}", e);
            Err(TransportError::Io(e.to_string()))
        }
    }
}
