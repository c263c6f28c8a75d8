//! Serial port enumeration
//!
//! Used for diagnostics when the configured port cannot be opened, and by
//! `GET /api/ports`.

use tokio_serial::{SerialPortInfo, SerialPortType};
use tracing::{debug, warn};
use valve_core::PortInfo;

/// Lists the serial ports visible to the OS.
///
/// An empty list is a valid answer ("no ports found"), so implementations
/// report enumeration problems through logging only.
pub trait PortDiscovery: Send + Sync {
    fn list_ports(&self) -> Vec<PortInfo>;
}

/// Enumerates ports through tokio-serial
#[derive(Debug, Clone, Copy, Default)]
pub struct NativePortDiscovery;

impl PortDiscovery for NativePortDiscovery {
    fn list_ports(&self) -> Vec<PortInfo> {
        match tokio_serial::available_ports() {
            Ok(ports) => {
                debug!("Found {} serial port(s)", ports.len());
                ports.iter().map(to_port_info).collect()
            }
            Err(e) => {
                warn!("Failed to enumerate serial ports: {}", e);
                Vec::new()
            }
        }
    }
}

fn to_port_info(port: &SerialPortInfo) -> PortInfo {
    PortInfo {
        device: port.port_name.clone(),
        description: describe_port_type(&port.port_type),
    }
}

/// Human-readable description of a port, `"n/a"` when nothing is known
pub fn describe_port_type(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(info) => {
            let label = match (&info.manufacturer, &info.product) {
                (Some(manufacturer), Some(product)) if !product.contains(manufacturer.as_str()) => {
                    format!("{} {}", manufacturer, product)
                }
                (_, Some(product)) => product.clone(),
                (Some(manufacturer), None) => manufacturer.clone(),
                (None, None) => "USB serial device".to_string(),
            };
            format!("{} ({:04X}:{:04X})", label, info.vid, info.pid)
        }
        SerialPortType::PciPort => "PCI serial port".to_string(),
        SerialPortType::BluetoothPort => "Bluetooth serial port".to_string(),
        SerialPortType::Unknown => "n/a".to_string(),
    }
}

/// One-line summary of the available ports, for log messages
pub fn port_hint(ports: &[PortInfo]) -> String {
    if ports.is_empty() {
        return "No serial ports found".to_string();
    }

    let listed: Vec<String> = ports
        .iter()
        .map(|p| format!("{}: {}", p.device, p.description))
        .collect();
    format!("Available ports: {}", listed.join(", "))
}
