//! Edit-session coordination
//!
//! Tracks the one device (at most) whose config is being manipulated through
//! a live control such as a slider. While active, the engine keeps updating
//! connection status but must not overwrite that device's config from a
//! firmware read, so the control under the user's finger never jumps.

use parking_lot::Mutex;

/// At-most-one active edit session
#[derive(Debug, Default)]
pub struct EditSession {
    active: Mutex<Option<String>>,
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a device as actively edited, or clear with `None`.
    /// Setting a new id implicitly clears any previous one.
    pub fn set_active(&self, id: Option<&str>) {
        *self.active.lock() = id.map(str::to_string);
    }

    /// Whether the given device is under an active edit
    pub fn is_active(&self, id: &str) -> bool {
        self.active.lock().as_deref() == Some(id)
    }

    /// Currently active device id, if any
    pub fn active(&self) -> Option<String> {
        self.active.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_most_one_active() {
        let edit = EditSession::new();
        assert!(edit.active().is_none());

        edit.set_active(Some("a"));
        assert!(edit.is_active("a"));

        edit.set_active(Some("b"));
        assert!(!edit.is_active("a"));
        assert!(edit.is_active("b"));
    }

    #[test]
    fn test_clear() {
        let edit = EditSession::new();
        edit.set_active(Some("a"));
        edit.set_active(None);
        assert!(!edit.is_active("a"));
        assert!(edit.active().is_none());
    }
}
