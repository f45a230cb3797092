//! Native serial port implementation using the `serialport` crate.
//!
//! The module is a USB CDC device; line settings are fixed at 8N1 without
//! flow control.

use {
    crate::{
        error::Result,
        port::{Port, SerialConfig},
    },
    log::trace,
    serialport::{ClearBuffer, DataBits, FlowControl, Parity, StopBits},
    std::io::{Read, Write},
};

/// Native serial port implementation.
pub struct NativePort {
    port: Option<Box<dyn serialport::SerialPort>>,
    name: String,
}

impl NativePort {
    /// Open a serial port with the given configuration.
    ///
    /// Stale input left over from a previous session is discarded.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        trace!(
            "Opening {} at {} baud (timeout {:?})",
            config.port_name, config.baud_rate, config.timeout
        );
        let port = serialport::new(&config.port_name, config.baud_rate)
            .timeout(config.timeout)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open()?;

        let mut native = Self {
            port: Some(port),
            name: config
                .port_name
                .clone(),
        };
        native.clear_buffers()?;
        Ok(native)
    }

    /// Open a serial port with default settings.
    pub fn open_simple(port_name: &str) -> Result<Self> {
        Self::open(&SerialConfig::new(port_name))
    }
}

impl Port for NativePort {
    fn name(&self) -> &str {
        &self.name
    }

    fn clear_buffers(&mut self) -> Result<()> {
        if let Some(ref mut p) = self.port {
            p.clear(ClearBuffer::All)?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self
            .port
            .take()
            .is_some()
        {
            trace!("Closed {}", self.name);
        }
        Ok(())
    }
}

impl Read for NativePort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.port
            .as_mut()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotConnected, "port closed"))
            .and_then(|p| p.read(buf))
    }
}

impl Write for NativePort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.port
            .as_mut()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotConnected, "port closed"))
            .and_then(|p| p.write(buf))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.port
            .as_mut()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotConnected, "port closed"))
            .and_then(std::io::Write::flush)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{DEFAULT_BAUD, DEFAULT_READ_TIMEOUT};
    use std::time::Duration;

    #[test]
    fn test_serial_config_default() {
        let config = SerialConfig::default();
        assert_eq!(config.baud_rate, DEFAULT_BAUD);
        assert_eq!(config.timeout, DEFAULT_READ_TIMEOUT);
        assert!(config.port_name.is_empty());
    }

    #[test]
    fn test_serial_config_builder() {
        let config = SerialConfig::new("/dev/ttyACM0")
            .with_baud_rate(9600)
            .with_timeout(Duration::from_millis(20));

        assert_eq!(config.port_name, "/dev/ttyACM0");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.timeout, Duration::from_millis(20));
    }

    #[test]
    fn test_open_missing_port_fails() {
        assert!(NativePort::open_simple("/dev/colibri-does-not-exist").is_err());
    }
}
