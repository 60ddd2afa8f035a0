//! Sync module - device registry, locks, edit sessions and the engine

pub mod device;
pub mod edit;
pub mod engine;
pub mod locks;
pub mod registry;

pub use device::{Device, DeviceConfig, PomodoroConfig, PomodoroPhase, TrackpadConfig};
pub use edit::EditSession;
pub use engine::{SaveOutcome, SyncEngine};
pub use locks::ProcessingLocks;
pub use registry::DeviceRegistry;
