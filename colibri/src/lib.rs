//! # colibri
//!
//! A library for controlling the Colibri spectrophotometer module over its
//! serial line protocol.
//!
//! This crate provides:
//!
//! - Frame encoding and decoding with optional CRC-16 checksums
//! - Response tokenizing and interpretation, including device error frames
//! - Typed measurement, baseline, levelling and selftest results
//! - Firmware update from SREC files
//! - USB discovery of the module
//!
//! ## Features
//!
//! - `native` (default): Native serial port support via the `serialport` crate
//! - `serde`: Serialization support for result types
//!
//! ## Example
//!
//! ```rust,no_run
//! use colibri::{Colibri, FirmwareImage, SessionConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SessionConfig::new().with_checksum(true);
//!     let mut colibri = Colibri::native(config);
//!
//!     let levelling = colibri.levelling()?;
//!     if !levelling.is_ok() {
//!         eprintln!("levelling failed");
//!     }
//!
//!     let image = FirmwareImage::from_file("colibri.srec")?;
//!     colibri.firmware_update(&image, &mut |sent, total| {
//!         println!("{sent}/{total}");
//!     })?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod device;
pub mod error;
pub mod firmware;
pub mod port;
pub mod protocol;
pub mod records;
pub mod session;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-exports for convenience
#[cfg(feature = "native")]
pub use {client::NativeConnector, port::NativePort};
pub use {
    client::{Colibri, Connector},
    device::{DetectedPort, DeviceKind, auto_detect_port, detect_ports, format_port_list},
    error::{Error, ErrorCode, Result},
    firmware::{FirmwareImage, FirmwareUpdater, UpdateState},
    port::{Port, SerialConfig},
    protocol::{Family, FrameDecoder, Response},
    records::{
        INDICES, Index, Levelling, LevellingRecord, Measurement, Reading, SelftestFlags,
        SetupResult, Wavelength,
    },
    session::SessionConfig,
};
