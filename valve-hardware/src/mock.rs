//! In-memory stand-in for the valve microcontroller
//!
//! Backs the daemon's `--mock` mode and the test suites. The mock speaks the
//! same line protocol as the firmware: every score line written to it is
//! answered with `ACK <score>` unless it is made silent.

use crate::discovery::PortDiscovery;
use crate::serial_driver::{SerialOpener, SerialTransport};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use valve_core::{PortInfo, Result, ValveError};

/// Something that happened on the mock line, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    /// A transport was opened
    Opened,
    /// A complete line was written (terminator stripped)
    Wrote(String),
    /// Buffered output was read by the host
    Drained,
    /// The transport was shut down by the host
    Closed,
}

#[derive(Debug, Default)]
struct MockState {
    link_open: bool,
    silent: bool,
    forbid_writes: bool,
    fail_next_write: bool,
    banner: Vec<String>,
    pending: VecDeque<u8>,
    wire: Vec<u8>,
    events: Vec<MockEvent>,
}

/// Shared handle to the simulated device.
///
/// Clones observe and control the same device.
#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
}

impl MockDevice {
    /// Device that acknowledges every score with `ACK <score>`
    pub fn new() -> Self {
        Self::default()
    }

    /// Device that never answers
    pub fn silent() -> Self {
        let device = Self::default();
        device.state().silent = true;
        device
    }

    /// Lines emitted right after each open, like a firmware boot message
    pub fn with_banner(self, line: impl Into<String>) -> Self {
        self.state().banner.push(line.into());
        self
    }

    /// Panic on any write; for checks that a command never reaches the wire
    pub fn forbid_writes(&self) {
        self.state().forbid_writes = true;
    }

    /// Make the next write fail as if the cable had been pulled mid-call
    pub fn fail_next_write(&self) {
        self.state().fail_next_write = true;
    }

    /// Queue raw bytes as device output
    pub fn queue_output(&self, bytes: &[u8]) {
        self.state().pending.extend(bytes.iter().copied());
    }

    /// Drop the current link; the next I/O on it fails
    pub fn unplug(&self) {
        self.state().link_open = false;
    }

    /// Whether a transport is currently open
    pub fn is_open(&self) -> bool {
        self.state().link_open
    }

    /// Every byte written to the device so far
    pub fn wire(&self) -> Vec<u8> {
        self.state().wire.clone()
    }

    /// Complete lines written to the device so far
    pub fn written_lines(&self) -> Vec<String> {
        self.state()
            .events
            .iter()
            .filter_map(|event| match event {
                MockEvent::Wrote(line) => Some(line.clone()),
                _ => None,
            })
            .collect()
    }

    /// Event log
    pub fn events(&self) -> Vec<MockEvent> {
        self.state().events.clone()
    }

    fn attach(&self) {
        let mut state = self.state();
        state.link_open = true;
        state.events.push(MockEvent::Opened);
        let banner: Vec<u8> = state
            .banner
            .iter()
            .flat_map(|line| format!("{}\n", line).into_bytes())
            .collect();
        state.pending.extend(banner);
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Transport handed out by [`MockOpener`]
#[derive(Debug)]
pub struct MockLink {
    device: MockDevice,
}

#[async_trait]
impl SerialTransport for MockLink {
    async fn write_line(&mut self, line: &str) -> Result<()> {
        {
            let mut state = self.device.state();
            if state.forbid_writes {
                panic!("mock device received {:?} but writes are forbidden", line);
            }
            if !state.link_open {
                return Err(ValveError::DeviceDisconnected("Broken pipe".to_string()));
            }
            if state.fail_next_write {
                state.fail_next_write = false;
                state.link_open = false;
                return Err(ValveError::Serial("Write failed: Broken pipe".to_string()));
            }
        }

        // Byte by byte with yields, so unserialized writers would interleave
        for byte in format!("{}\n", line).into_bytes() {
            self.device.state().wire.push(byte);
            tokio::task::yield_now().await;
        }

        let mut state = self.device.state();
        state.events.push(MockEvent::Wrote(line.to_string()));
        if !state.silent {
            let reply = format!("ACK {}\n", line).into_bytes();
            state.pending.extend(reply);
        }
        Ok(())
    }

    fn bytes_to_read(&mut self) -> Result<usize> {
        Ok(self.device.state().pending.len())
    }

    async fn read_available(&mut self) -> Result<Vec<u8>> {
        let mut state = self.device.state();
        if !state.link_open {
            return Err(ValveError::DeviceDisconnected(
                "Serial port returned EOF - device may have been unplugged".to_string(),
            ));
        }
        let bytes: Vec<u8> = state.pending.drain(..).collect();
        state.events.push(MockEvent::Drained);
        Ok(bytes)
    }

    fn is_connected(&self) -> bool {
        self.device.state().link_open
    }

    async fn shutdown(&mut self) -> Result<()> {
        let mut state = self.device.state();
        state.link_open = false;
        state.events.push(MockEvent::Closed);
        Ok(())
    }
}

/// Opener for a [`MockDevice`] that can be "plugged in" and out
#[derive(Debug)]
pub struct MockOpener {
    device: MockDevice,
    available: AtomicBool,
    opens: AtomicUsize,
}

impl MockOpener {
    /// Opener whose device is plugged in
    pub fn new(device: MockDevice) -> Self {
        Self {
            device,
            available: AtomicBool::new(true),
            opens: AtomicUsize::new(0),
        }
    }

    /// Opener whose port does not exist until [`MockOpener::set_available`]
    pub fn unavailable(device: MockDevice) -> Self {
        let opener = Self::new(device);
        opener.set_available(false);
        opener
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of successful opens
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn device(&self) -> &MockDevice {
        &self.device
    }
}

impl SerialOpener for MockOpener {
    fn open(&self, port: &str, _baud_rate: u32) -> Result<Box<dyn SerialTransport>> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(ValveError::Connect {
                port: port.to_string(),
                cause: "No such file or directory".to_string(),
            });
        }

        self.opens.fetch_add(1, Ordering::SeqCst);
        self.device.attach();
        Ok(Box::new(MockLink {
            device: self.device.clone(),
        }))
    }
}

/// Fixed port listing
#[derive(Debug, Clone, Default)]
pub struct MockPortDiscovery {
    ports: Vec<PortInfo>,
}

impl MockPortDiscovery {
    pub fn new(ports: Vec<PortInfo>) -> Self {
        Self { ports }
    }

    /// Listing with a single port
    pub fn single(device: &str, description: &str) -> Self {
        Self::new(vec![PortInfo {
            device: device.to_string(),
            description: description.to_string(),
        }])
    }
}

impl PortDiscovery for MockPortDiscovery {
    fn list_ports(&self) -> Vec<PortInfo> {
        self.ports.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_acknowledges_writes() {
        let opener = MockOpener::new(MockDevice::new());
        let mut link = opener.open("mock", 9600).unwrap();

        link.write_line("42").await.unwrap();
        assert_eq!(link.bytes_to_read().unwrap(), "ACK 42\n".len());
        assert_eq!(link.read_available().await.unwrap(), b"ACK 42\n".to_vec());
        assert_eq!(link.bytes_to_read().unwrap(), 0);
        assert_eq!(opener.device().wire(), b"42\n".to_vec());
    }

    #[tokio::test]
    async fn test_mock_banner_on_open() {
        let opener = MockOpener::new(MockDevice::new().with_banner("Ready"));
        let mut link = opener.open("mock", 9600).unwrap();

        assert_eq!(link.read_available().await.unwrap(), b"Ready\n".to_vec());
        assert_eq!(opener.open_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_unavailable_port() {
        let opener = MockOpener::unavailable(MockDevice::new());
        assert!(matches!(
            opener.open("COM5", 9600),
            Err(ValveError::Connect { .. })
        ));
        assert_eq!(opener.open_count(), 0);

        opener.set_available(true);
        assert!(opener.open("COM5", 9600).is_ok());
    }

    #[tokio::test]
    async fn test_mock_unplug_breaks_link() {
        let opener = MockOpener::new(MockDevice::new());
        let mut link = opener.open("mock", 9600).unwrap();

        opener.device().unplug();
        assert!(!link.is_connected());
        assert!(matches!(
            link.write_line("10").await,
            Err(ValveError::DeviceDisconnected(_))
        ));
    }

    #[test]
    fn test_mock_port_discovery() {
        let discovery = MockPortDiscovery::single("mock", "Simulated valve controller");
        let ports = discovery.list_ports();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].device, "mock");
        assert!(MockPortDiscovery::default().list_ports().is_empty());
    }
}
