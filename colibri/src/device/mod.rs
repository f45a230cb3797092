//! Device discovery and classification utilities.
//!
//! A Colibri module enumerates as a USB CDC serial port with a fixed
//! vendor/product pair. Discovery only yields a port name; opening the port is
//! left to the caller.

use crate::error::{Error, Result};

#[cfg(feature = "native")]
use log::{debug, info, trace};

/// USB vendor ID of the Colibri module.
pub const COLIBRI_VID: u16 = 0x1CBE;

/// USB product ID of the Colibri module.
pub const COLIBRI_PID: u16 = 0x0002;

/// Classification of an enumerated serial port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeviceKind {
    /// Colibri spectrophotometer module.
    Colibri,
    /// Any other USB serial device.
    OtherUsb,
    /// Native UART, Bluetooth or unclassified port.
    Unknown,
}

impl DeviceKind {
    /// Classify a USB VID/PID pair.
    #[must_use]
    pub fn from_vid_pid(vid: u16, pid: u16) -> Self {
        if vid == COLIBRI_VID && pid == COLIBRI_PID {
            Self::Colibri
        } else {
            Self::OtherUsb
        }
    }

    /// Get a human-readable name for the device kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Colibri => "Colibri",
            Self::OtherUsb => "USB",
            Self::Unknown => "Unknown",
        }
    }

    /// Whether this is a Colibri module.
    pub fn is_colibri(&self) -> bool {
        matches!(self, Self::Colibri)
    }
}

/// Discovered serial port information.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DetectedPort {
    /// Port name/path (e.g., "/dev/ttyACM0" or "COM3").
    pub name: String,
    /// Classified device kind.
    pub device: DeviceKind,
    /// USB Vendor ID (if available).
    pub vid: Option<u16>,
    /// USB Product ID (if available).
    pub pid: Option<u16>,
    /// Device manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Device product string (if available).
    pub product: Option<String>,
    /// Serial number (if available).
    pub serial: Option<String>,
}

/// Enumerate all serial ports with metadata.
#[cfg(feature = "native")]
pub fn detect_ports() -> Vec<DetectedPort> {
    let mut result = Vec::new();

    match serialport::available_ports() {
        Ok(ports) => {
            for port_info in ports {
                let mut detected = DetectedPort {
                    name: port_info.port_name.clone(),
                    device: DeviceKind::Unknown,
                    vid: None,
                    pid: None,
                    manufacturer: None,
                    product: None,
                    serial: None,
                };

                if let serialport::SerialPortType::UsbPort(usb_info) = port_info.port_type {
                    detected.vid = Some(usb_info.vid);
                    detected.pid = Some(usb_info.pid);
                    detected.manufacturer = usb_info.manufacturer;
                    detected.product = usb_info.product;
                    detected.serial = usb_info.serial_number;
                    detected.device = DeviceKind::from_vid_pid(usb_info.vid, usb_info.pid);

                    trace!(
                        "Found USB port: {} (VID: {:04X}, PID: {:04X}, Device: {:?})",
                        port_info.port_name, usb_info.vid, usb_info.pid, detected.device
                    );
                }

                result.push(detected);
            }
        },
        Err(e) => {
            debug!("Failed to enumerate serial ports: {e}");
        },
    }

    result
}

/// Enumerate all serial ports (no native backend: always empty).
#[cfg(not(feature = "native"))]
pub fn detect_ports() -> Vec<DetectedPort> {
    Vec::new()
}

/// Pick the first Colibri module among `ports`.
pub fn select_colibri(ports: &[DetectedPort]) -> Result<&DetectedPort> {
    ports
        .iter()
        .find(|p| p.device.is_colibri())
        .ok_or(Error::NotFound)
}

/// Auto-detect a single Colibri module.
///
/// Unlike generic serial tools there is no fallback to "first available
/// port": sending commands to an unrelated device is never attempted.
#[cfg(feature = "native")]
pub fn auto_detect_port() -> Result<DetectedPort> {
    let ports = detect_ports();
    let port = select_colibri(&ports)?;
    info!("Auto-detected Colibri module: {}", port.name);
    Ok(port.clone())
}

/// Auto-detect a single Colibri module (no native backend).
#[cfg(not(feature = "native"))]
pub fn auto_detect_port() -> Result<DetectedPort> {
    Err(Error::NotFound)
}

/// Format a list of detected ports for display.
pub fn format_port_list(ports: &[DetectedPort]) -> Vec<String> {
    let mut result = Vec::new();

    for port in ports {
        let device_info = if port.device.is_colibri() {
            format!(" [{}]", port.device.name())
        } else if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
            format!(" [VID:{vid:04X} PID:{pid:04X}]")
        } else {
            String::new()
        };

        let product_info = port
            .product
            .as_ref()
            .map(|p| format!(" - {p}"))
            .unwrap_or_default();

        let serial_info = port
            .serial
            .as_ref()
            .map(|s| format!(" (S/N {s})"))
            .unwrap_or_default();

        result.push(format!(
            "{}{}{}{}",
            port.name, device_info, product_info, serial_info
        ));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(name: &str, vid: Option<u16>, pid: Option<u16>) -> DetectedPort {
        let device = match (vid, pid) {
            (Some(v), Some(p)) => DeviceKind::from_vid_pid(v, p),
            _ => DeviceKind::Unknown,
        };
        DetectedPort {
            name: name.to_string(),
            device,
            vid,
            pid,
            manufacturer: None,
            product: None,
            serial: None,
        }
    }

    #[test]
    fn test_device_kind_from_vid_pid() {
        assert_eq!(DeviceKind::from_vid_pid(0x1CBE, 0x0002), DeviceKind::Colibri);
        assert_eq!(DeviceKind::from_vid_pid(0x1CBE, 0x00FD), DeviceKind::OtherUsb);
        assert_eq!(DeviceKind::from_vid_pid(0x1A86, 0x7523), DeviceKind::OtherUsb);
    }

    #[test]
    fn test_select_colibri_skips_other_ports() {
        let ports = vec![
            port("/dev/ttyS0", None, None),
            port("/dev/ttyUSB0", Some(0x1A86), Some(0x7523)),
            port("/dev/ttyACM1", Some(0x1CBE), Some(0x0002)),
        ];
        let selected = select_colibri(&ports).unwrap();
        assert_eq!(selected.name, "/dev/ttyACM1");
    }

    #[test]
    fn test_select_colibri_not_found() {
        let ports = vec![port("/dev/ttyUSB0", Some(0x1A86), Some(0x7523))];
        assert!(matches!(select_colibri(&ports), Err(Error::NotFound)));
        assert!(matches!(select_colibri(&[]), Err(Error::NotFound)));
    }

    #[test]
    fn test_format_port_list() {
        let mut colibri = port("/dev/ttyACM0", Some(0x1CBE), Some(0x0002));
        colibri.product = Some("Colibri".to_string());
        colibri.serial = Some("0042".to_string());
        let ports = vec![colibri, port("/dev/ttyUSB1", Some(0x0403), Some(0x6001))];

        let formatted = format_port_list(&ports);
        assert_eq!(formatted.len(), 2);
        assert_eq!(formatted[0], "/dev/ttyACM0 [Colibri] - Colibri (S/N 0042)");
        assert_eq!(formatted[1], "/dev/ttyUSB1 [VID:0403 PID:6001]");
    }
}
