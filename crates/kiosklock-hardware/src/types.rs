//! Common types shared across trigger hardware implementations.

use serde::{Deserialize, Serialize};

/// A serial port present on the host.
///
/// Listed at startup so a misconfigured port name can be diagnosed from the
/// log alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    /// Port name as accepted by the driver (e.g. `COM5`, `/dev/ttyACM0`).
    pub name: String,

    /// Short description of the port type.
    pub description: String,
}

impl PortInfo {
    /// Create a new PortInfo.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

impl From<serialport::SerialPortInfo> for PortInfo {
    fn from(info: serialport::SerialPortInfo) -> Self {
        let description = match info.port_type {
            serialport::SerialPortType::UsbPort(usb) => match usb.product {
                Some(product) => format!("USB {:04x}:{:04x} {product}", usb.vid, usb.pid),
                None => format!("USB {:04x}:{:04x}", usb.vid, usb.pid),
            },
            serialport::SerialPortType::PciPort => "PCI".to_string(),
            serialport::SerialPortType::BluetoothPort => "Bluetooth".to_string(),
            serialport::SerialPortType::Unknown => "Unknown".to_string(),
        };
        Self::new(info.port_name, description)
    }
}
