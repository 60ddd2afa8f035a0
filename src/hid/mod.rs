//! HID module - Raw HID transport and firmware configuration codecs

pub mod codec;
pub mod mock;
pub mod transport;

pub use transport::{HidTransport, Transport, TransportError};
