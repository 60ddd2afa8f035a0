//! Scriptable in-memory transport for tests and the `mock-hid` feature

use super::codec::{POMODORO_CONFIG_LEN, TRACKPAD_CONFIG_LEN};
use super::transport::{Transport, TransportError};
use crate::sync::device::{DeviceConfig, ObservedDevice, PomodoroStatus};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// Recorded write issued through the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockWrite {
    Trackpad(String, [u8; TRACKPAD_CONFIG_LEN]),
    Pomodoro(String, [u8; POMODORO_CONFIG_LEN]),
    OledDateTime(String, bool),
}

#[derive(Default)]
struct MockState {
    /// Devices returned by `list()`
    present: Vec<ObservedDevice>,
    /// Ids with an open session
    sessions: HashSet<String>,
    /// Per-device remaining `start` failures before success
    start_failures: HashMap<String, u32>,
    /// Ids whose `start` fails forever with the benign error
    start_always_fails: HashSet<String>,
    /// Config returned by `read_config`
    configs: HashMap<String, DeviceConfig>,
    /// Status returned by `read_pomodoro_status`
    statuses: HashMap<String, PomodoroStatus>,
    /// Every write issued through the transport, in order
    writes: Vec<MockWrite>,
    /// Call counters keyed by "<op>:<id>"
    calls: HashMap<String, u32>,
}

/// In-memory [`Transport`] with scriptable presence, failures and configs.
/// Backs the integration tests and the `mock-hid` run mode.
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an observation with a stable id for scripting convenience
    pub fn observed(id: &str) -> ObservedDevice {
        ObservedDevice {
            id: id.to_string(),
            vendor_id: 0x5950,
            product_id: 0x0001,
            manufacturer: Some("GPK".to_string()),
            product: Some("GPK60-46TP".to_string()),
            path: Some(format!("/dev/hidraw-{id}")),
        }
    }

    /// Replace the set of physically present devices
    pub fn set_present(&self, devices: Vec<ObservedDevice>) {
        self.state.lock().present = devices;
    }

    /// Script the config returned by `read_config` for a device
    pub fn set_config(&self, id: &str, config: DeviceConfig) {
        self.state.lock().configs.insert(id.to_string(), config);
    }

    /// Script the status returned by `read_pomodoro_status`
    pub fn set_pomodoro_status(&self, id: &str, status: PomodoroStatus) {
        self.state.lock().statuses.insert(id.to_string(), status);
    }

    /// Make the next `count` calls to `start` fail with the benign error
    pub fn fail_next_starts(&self, id: &str, count: u32) {
        self.state.lock().start_failures.insert(id.to_string(), count);
    }

    /// Make every `start` for this id fail with the benign error
    pub fn fail_all_starts(&self, id: &str) {
        self.state.lock().start_always_fails.insert(id.to_string());
    }

    /// Drop the session without changing presence (firmware-side hiccup)
    pub fn drop_session(&self, id: &str) {
        self.state.lock().sessions.remove(id);
    }

    /// Whether a session is currently open
    pub fn has_session(&self, id: &str) -> bool {
        self.state.lock().sessions.contains(id)
    }

    /// All writes recorded so far
    pub fn writes(&self) -> Vec<MockWrite> {
        self.state.lock().writes.clone()
    }

    /// Number of times an operation ran for a device
    pub fn call_count(&self, op: &str, id: &str) -> u32 {
        self.state
            .lock()
            .calls
            .get(&format!("{op}:{id}"))
            .copied()
            .unwrap_or(0)
    }

    fn count(state: &mut MockState, op: &str, id: &str) {
        *state.calls.entry(format!("{op}:{id}")).or_insert(0) += 1;
    }
}

impl Transport for MockTransport {
    fn list(&self) -> Result<Vec<ObservedDevice>, TransportError> {
        Ok(self.state.lock().present.clone())
    }

    fn start(&self, device: &ObservedDevice) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        Self::count(&mut state, "start", &device.id);

        if state.start_always_fails.contains(&device.id) {
            return Err(TransportError::DeviceUnavailable);
        }
        if let Some(remaining) = state.start_failures.get_mut(&device.id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(TransportError::DeviceUnavailable);
            }
        }

        state.sessions.insert(device.id.clone());
        Ok(())
    }

    fn stop(&self, id: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        Self::count(&mut state, "stop", id);
        state.sessions.remove(id);
        Ok(())
    }

    fn is_connected(&self, id: &str) -> bool {
        self.state.lock().sessions.contains(id)
    }

    fn read_config(&self, id: &str) -> Result<DeviceConfig, TransportError> {
        let mut state = self.state.lock();
        Self::count(&mut state, "read_config", id);
        if !state.sessions.contains(id) {
            return Err(TransportError::NotOpen(id.to_string()));
        }
        state
            .configs
            .get(id)
            .cloned()
            .ok_or(TransportError::Timeout)
    }

    fn read_pomodoro_status(&self, id: &str) -> Result<PomodoroStatus, TransportError> {
        let mut state = self.state.lock();
        Self::count(&mut state, "read_pomodoro_status", id);
        state
            .statuses
            .get(id)
            .copied()
            .ok_or(TransportError::Timeout)
    }

    fn write_trackpad_config(
        &self,
        id: &str,
        bytes: &[u8; TRACKPAD_CONFIG_LEN],
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if !state.sessions.contains(id) {
            return Err(TransportError::NotOpen(id.to_string()));
        }
        state.writes.push(MockWrite::Trackpad(id.to_string(), *bytes));
        Ok(())
    }

    fn write_pomodoro_config(
        &self,
        id: &str,
        bytes: &[u8; POMODORO_CONFIG_LEN],
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if !state.sessions.contains(id) {
            return Err(TransportError::NotOpen(id.to_string()));
        }
        state.writes.push(MockWrite::Pomodoro(id.to_string(), *bytes));
        Ok(())
    }

    fn write_oled_datetime(&self, id: &str, force: bool) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if !state.sessions.contains(id) {
            return Err(TransportError::NotOpen(id.to_string()));
        }
        state
            .writes
            .push(MockWrite::OledDateTime(id.to_string(), force));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_failure_scripting() {
        let mock = MockTransport::new();
        let dev = MockTransport::observed("a");
        mock.fail_next_starts("a", 2);

        assert!(mock.start(&dev).is_err());
        assert!(mock.start(&dev).is_err());
        assert!(mock.start(&dev).is_ok());
        assert!(mock.is_connected("a"));
        assert_eq!(mock.call_count("start", "a"), 3);
    }

    #[test]
    fn test_reads_require_session() {
        let mock = MockTransport::new();
        mock.set_config("a", DeviceConfig::default());
        assert!(matches!(
            mock.read_config("a"),
            Err(TransportError::NotOpen(_))
        ));

        mock.start(&MockTransport::observed("a")).unwrap();
        assert!(mock.read_config("a").is_ok());
    }
}
