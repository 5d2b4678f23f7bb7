//! Serial port handling
//!
//! Opens and configures the UART for W-Bus: 2400 baud, 8 data bits, even
//! parity, one stop bit, no flow control.

use serde::{Deserialize, Serialize};
use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::time::Duration;
use tracing::debug;

use super::{SerialError, SerialTransport, DEFAULT_BAUD_RATE, WAKE_BAUD_RATE};

/// Physical port settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub port_name: String,
    /// Normal bus bit rate
    pub baud_rate: u32,
    /// Slow bit rate used to stretch the wake pulse
    pub wake_baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            wake_baud_rate: WAKE_BAUD_RATE,
        }
    }
}

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortInfo {
    /// Port name
    pub name: String,

    /// USB vendor/product id, if the port is a USB adapter
    pub usb_id: Option<(u16, u16)>,

    /// Product string reported by the adapter
    pub product: Option<String>,
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (usb_id, product) = match info.port_type {
            SerialPortType::UsbPort(usb) => (Some((usb.vid, usb.pid)), usb.product),
            _ => (None, None),
        };
        Self {
            name: info.port_name,
            usb_id,
            product,
        }
    }
}

/// USB adapters first (most W-Bus interfaces are FTDI/CH340 cables), then by name
fn port_sort_key(port: &PortInfo) -> (u8, String) {
    let rank = if port.usb_id.is_some() {
        0
    } else if port.name.contains("ttyUSB") || port.name.contains("ttyACM") {
        1
    } else {
        2
    };
    (rank, port.name.clone())
}

/// List available serial ports in a stable order
pub fn list_ports() -> Vec<PortInfo> {
    let mut ports: Vec<PortInfo> = serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
        .map(PortInfo::from)
        .collect();
    ports.sort_by_key(port_sort_key);
    ports
}

/// Open and configure a port for W-Bus
pub fn open_port(config: &SerialConfig) -> Result<Box<dyn SerialPort>, SerialError> {
    if config.port_name.is_empty() {
        return Err(SerialError::PortNotFound("<empty>".to_string()));
    }

    // Reads are polled through bytes_to_read(); the timeout only bounds the
    // rare blocking read
    let mut port = serialport::new(&config.port_name, config.baud_rate)
        .timeout(Duration::from_millis(10))
        .open()
        .map_err(|e| match e.kind {
            serialport::ErrorKind::NoDevice => SerialError::PortNotFound(config.port_name.clone()),
            _ => SerialError::Port(e),
        })?;
    configure_port(port.as_mut())?;
    port.clear(serialport::ClearBuffer::All)?;

    debug!(
        "opened {} at {} baud (wake {} baud)",
        config.port_name, config.baud_rate, config.wake_baud_rate
    );
    Ok(port)
}

/// Apply 8E1 framing
pub fn configure_port(port: &mut dyn SerialPort) -> Result<(), SerialError> {
    port.set_data_bits(serialport::DataBits::Eight)?;
    port.set_parity(serialport::Parity::Even)?;
    port.set_stop_bits(serialport::StopBits::One)?;
    port.set_flow_control(serialport::FlowControl::None)?;
    Ok(())
}

/// Open the configured port and wrap it as a [`SerialTransport`]
pub fn open_transport(config: &SerialConfig) -> Result<SerialTransport, SerialError> {
    let port = open_port(config)?;
    Ok(SerialTransport::new(port).with_baud_rates(config.baud_rate, config.wake_baud_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(name: &str, usb: bool) -> PortInfo {
        PortInfo {
            name: name.to_string(),
            usb_id: if usb { Some((0x0403, 0x6001)) } else { None },
            product: None,
        }
    }

    #[test]
    fn test_port_sorting() {
        let mut ports = vec![
            port("/dev/ttyS0", false),
            port("/dev/ttyUSB1", false),
            port("/dev/ttyUSB0", true),
            port("COM3", false),
        ];
        ports.sort_by_key(port_sort_key);
        let ordered: Vec<&str> = ports.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            ordered,
            vec!["/dev/ttyUSB0", "/dev/ttyUSB1", "/dev/ttyS0", "COM3"]
        );
    }

    #[test]
    fn test_open_empty_port_name() {
        let result = open_port(&SerialConfig::default());
        assert!(matches!(result, Err(SerialError::PortNotFound(_))));
    }

    #[test]
    fn test_serial_config_defaults() {
        let cfg = SerialConfig::default();
        assert_eq!(cfg.baud_rate, 2400);
        assert_eq!(cfg.wake_baud_rate, 300);
    }
}
