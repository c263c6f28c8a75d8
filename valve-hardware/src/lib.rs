//! valve-hardware
//!
//! Hardware crate that owns everything touching the serial line: the
//! low-level tokio-serial driver, the device session that serializes score
//! commands, port discovery, and an in-memory mock device.
//!
//! Public API:
//! - `session::DeviceSession` - lazy-connecting, mutex-guarded device session
//! - `serial_driver::SerialDriver` - low-level serial I/O driver
//! - `discovery::NativePortDiscovery` - serial port enumeration
//! - `mock::MockOpener` - simulated controller for tests and `--mock` mode

pub mod discovery;
pub mod mock;
pub mod serial_driver;
pub mod session;

pub use discovery::{NativePortDiscovery, PortDiscovery};
pub use serial_driver::{NativeOpener, SerialDriver, SerialOpener, SerialTransport};
pub use session::DeviceSession;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exports_present() {
        let _ = std::any::TypeId::of::<DeviceSession>();
        let _ = std::any::TypeId::of::<SerialDriver>();
        let _ = std::any::TypeId::of::<NativePortDiscovery>();
    }
}
