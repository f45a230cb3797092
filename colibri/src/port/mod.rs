//! Port abstraction for the serial link to the module.
//!
//! The protocol layer only needs a blocking byte transport. Reads are expected
//! to return quickly: the module is driven with a 1 ms read timeout, so a read
//! means "whatever arrived, else nothing".
//!
//! ```text
//! +------------------+
//! |  Protocol Layer  |
//! | (frame, exchange)|
//! +--------+---------+
//!          |
//!          v
//! +--------+---------+
//! |    Port Trait    |
//! +--------+---------+
//!          |
//!          v
//! +--------+---------+
//! | Native SerialPort|
//! |   (serialport)   |
//! +------------------+
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use colibri::port::Port;
//!
//! fn example<P: Port>(port: &mut P) -> colibri::Result<()> {
//!     port.write_all_bytes(b":V 0\n")?;
//!
//!     let mut buf = [0u8; 32];
//!     let n = port.read(&mut buf)?;
//!     println!("Received: {:?}", &buf[..n]);
//!
//!     Ok(())
//! }
//! ```

#[cfg(feature = "native")]
pub mod native;

use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// Baud rate used by the module's USB CDC interface.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Per-read timeout; short so the decoder can poll its own deadline.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// Serial port configuration.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyACM0", "COM3").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Read/write timeout.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD,
            timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl SerialConfig {
    /// Create a new configuration for the given port with default settings.
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Default::default()
        }
    }

    /// Set the baud rate.
    #[must_use]
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Byte transport to the module.
///
/// Implemented by [`native::NativePort`] and by test doubles.
pub trait Port: Read + Write + Send {
    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Discard any bytes pending in the input and output buffers.
    fn clear_buffers(&mut self) -> Result<()>;

    /// Close the port and release resources.
    ///
    /// After calling this method, the port cannot be used for further I/O.
    fn close(&mut self) -> Result<()>;

    /// Write all bytes, blocking until complete.
    fn write_all_bytes(&mut self, buf: &[u8]) -> Result<()> {
        std::io::Write::write_all(self, buf)?;
        std::io::Write::flush(self)?;
        Ok(())
    }
}

impl<P: Port + ?Sized> Port for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn clear_buffers(&mut self) -> Result<()> {
        (**self).clear_buffers()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

#[cfg(feature = "native")]
pub use native::NativePort;
