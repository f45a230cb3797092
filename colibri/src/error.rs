//! Error types for colibri.
//!
//! Every failure maps to exactly one [`ErrorCode`]. The numeric values are
//! stable: the device reports codes 1..=8 in its own `E <code>` frames, the
//! host side uses the 100 and 200 ranges.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for colibri operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable numeric error code with a fixed human-readable description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// No error.
    Ok,
    /// The device did not recognise the command.
    UnknownCommand,
    /// The device rejected a command parameter.
    InvalidParameter,
    /// The device timed out internally.
    Timeout,
    /// Flash write failed while programming an SREC record.
    SrecFlashWriteError,
    /// SREC record type not supported by the boot loader.
    SrecUnsupportedType,
    /// SREC record checksum invalid.
    SrecInvalidCrc,
    /// SREC record malformed.
    SrecInvalidString,
    /// Levelling did not succeed on every channel.
    LevellingFailed,
    /// The response did not echo the command and was not an error frame.
    ResponseError,
    /// The response had the wrong shape for the issued command.
    ProtocolError,
    /// The checksum of a received frame did not match.
    ChecksumError,
    /// No complete response arrived before the deadline.
    ResponseTimeout,
    /// Unknown command line argument.
    UnknownCommandLineArgument,
    /// Unknown command line option.
    UnknownCommandLineOption,
    /// No Colibri module found.
    NotFound,
    /// A number could not be parsed.
    InvalidNumber,
    /// A file could not be found.
    FileNotFound,
    /// The serial port could not be opened, read or written.
    PortError,
    /// The command does not fit into a single frame.
    InvalidCommand,
    /// Invalid number of stored measurements.
    NumberOfMeasurements,
    /// A code outside the known table, kept verbatim.
    Unknown(u32),
}

impl ErrorCode {
    /// Map a numeric code to its table entry.
    #[must_use]
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::UnknownCommand,
            2 => Self::InvalidParameter,
            3 => Self::Timeout,
            4 => Self::SrecFlashWriteError,
            5 => Self::SrecUnsupportedType,
            6 => Self::SrecInvalidCrc,
            7 => Self::SrecInvalidString,
            8 => Self::LevellingFailed,
            100 => Self::ResponseError,
            101 => Self::ProtocolError,
            102 => Self::ChecksumError,
            103 => Self::ResponseTimeout,
            200 => Self::UnknownCommandLineArgument,
            201 => Self::UnknownCommandLineOption,
            202 => Self::NotFound,
            203 => Self::InvalidNumber,
            204 => Self::FileNotFound,
            205 => Self::PortError,
            206 => Self::InvalidCommand,
            207 => Self::NumberOfMeasurements,
            other => Self::Unknown(other),
        }
    }

    /// Numeric value of the code.
    #[must_use]
    pub fn code(self) -> u32 {
        match self {
            Self::Ok => 0,
            Self::UnknownCommand => 1,
            Self::InvalidParameter => 2,
            Self::Timeout => 3,
            Self::SrecFlashWriteError => 4,
            Self::SrecUnsupportedType => 5,
            Self::SrecInvalidCrc => 6,
            Self::SrecInvalidString => 7,
            Self::LevellingFailed => 8,
            Self::ResponseError => 100,
            Self::ProtocolError => 101,
            Self::ChecksumError => 102,
            Self::ResponseTimeout => 103,
            Self::UnknownCommandLineArgument => 200,
            Self::UnknownCommandLineOption => 201,
            Self::NotFound => 202,
            Self::InvalidNumber => 203,
            Self::FileNotFound => 204,
            Self::PortError => 205,
            Self::InvalidCommand => 206,
            Self::NumberOfMeasurements => 207,
            Self::Unknown(code) => code,
        }
    }

    /// Human-readable description from the fixed lookup table.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::UnknownCommand => "Unknown command",
            Self::InvalidParameter => "Invalid parameter",
            Self::Timeout => "Timeout",
            Self::SrecFlashWriteError => "SREC Flash write error",
            Self::SrecUnsupportedType => "SREC Unsupported type",
            Self::SrecInvalidCrc => "SREC Invalid crc",
            Self::SrecInvalidString => "SREC Invalid string",
            Self::LevellingFailed => "Colibri levelling failed. Cuvette holder blocked?",
            Self::ResponseError => "Unexpected response",
            Self::ProtocolError => "Protocol error",
            Self::ChecksumError => "Checksum mismatch",
            Self::ResponseTimeout => "No complete response before deadline",
            Self::UnknownCommandLineArgument => "Unknown command line argument",
            Self::UnknownCommandLineOption => "Unknown command line option",
            Self::NotFound => "Colibri module not found",
            Self::InvalidNumber => "Invalid number",
            Self::FileNotFound => "Colibri file not found",
            Self::PortError => "Serial port error",
            Self::InvalidCommand => "Command does not fit in a frame",
            Self::NumberOfMeasurements => "Invalid number of measurements",
            Self::Unknown(_) => "?",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl From<u32> for ErrorCode {
    fn from(code: u32) -> Self {
        Self::from_code(code)
    }
}

/// Error type for colibri operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on the serial port.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// No Colibri module was found during discovery.
    #[error("Colibri module not found")]
    NotFound,

    /// Firmware source file missing.
    #[error("Colibri file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Firmware source file exists but could not be read.
    #[error("Cannot read file {}: {source}", path.display())]
    FileRead {
        /// File that was opened.
        path: PathBuf,
        /// Underlying read or decoding error.
        source: io::Error,
    },

    /// No complete frame arrived before the response deadline.
    #[error("Timeout: no complete response within {0:?}")]
    Timeout(Duration),

    /// Received checksum does not match the payload.
    #[error("Checksum mismatch: received '{received}', computed {computed}")]
    ChecksumMismatch {
        /// Checksum text as received after the separator.
        received: String,
        /// CRC computed over the received payload.
        computed: u16,
    },

    /// Response had the wrong arity or a malformed field.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Response neither echoed the command nor carried an error frame.
    #[error("Unexpected response: {0}")]
    Response(String),

    /// Error reported by the device in an `E <code>` frame.
    #[error("Device error {}: {}", .0.code(), .0.description())]
    Device(ErrorCode),

    /// Command cannot be framed.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Levelling finished but at least one channel did not reach its target.
    #[error("{}", ErrorCode::LevellingFailed.description())]
    LevellingFailed,
}

impl Error {
    /// The stable numeric code of this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Io(_) => ErrorCode::PortError,
            #[cfg(feature = "native")]
            Self::Serial(_) => ErrorCode::PortError,
            Self::NotFound => ErrorCode::NotFound,
            Self::FileNotFound(_) | Self::FileRead { .. } => ErrorCode::FileNotFound,
            Self::Timeout(_) => ErrorCode::ResponseTimeout,
            Self::ChecksumMismatch { .. } => ErrorCode::ChecksumError,
            Self::Protocol(_) => ErrorCode::ProtocolError,
            Self::Response(_) => ErrorCode::ResponseError,
            Self::Device(code) => *code,
            Self::InvalidCommand(_) => ErrorCode::InvalidCommand,
            Self::LevellingFailed => ErrorCode::LevellingFailed,
        }
    }

    /// Whether the error means no valid frame was received.
    ///
    /// Checksum failures and deadline expiry are treated alike by callers
    /// that choose to retry a command.
    #[must_use]
    pub fn is_no_frame(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::ChecksumMismatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_table_roundtrip() {
        for code in [0, 1, 2, 3, 4, 5, 6, 7, 8, 100, 101, 102, 103, 200, 201, 202, 203, 204, 205, 206, 207] {
            let entry = ErrorCode::from_code(code);
            assert!(!matches!(entry, ErrorCode::Unknown(_)), "code {code} missing");
            assert_eq!(entry.code(), code);
            assert_ne!(entry.description(), "?");
        }
    }

    #[test]
    fn test_unknown_device_code_is_kept() {
        let code = ErrorCode::from_code(42);
        assert_eq!(code, ErrorCode::Unknown(42));
        assert_eq!(code.code(), 42);
        assert_eq!(code.description(), "?");
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::NotFound.code().code(), 202);
        assert_eq!(Error::Protocol("x".into()).code().code(), 101);
        assert_eq!(Error::Response("x".into()).code().code(), 100);
        assert_eq!(Error::Device(ErrorCode::LevellingFailed).code().code(), 8);
        assert_eq!(Error::Timeout(Duration::from_secs(1)).code().code(), 103);
        assert_eq!(
            Error::FileNotFound(PathBuf::from("fw.srec")).code(),
            ErrorCode::FileNotFound
        );
    }

    #[test]
    fn test_device_error_display() {
        let err = Error::Device(ErrorCode::from_code(2));
        assert_eq!(err.to_string(), "Device error 2: Invalid parameter");
    }

    #[test]
    fn test_no_frame_classification() {
        let checksum = Error::ChecksumMismatch {
            received: "1".into(),
            computed: 2,
        };
        assert!(checksum.is_no_frame());
        assert!(Error::Timeout(Duration::from_millis(5)).is_no_frame());
        assert!(!Error::NotFound.is_no_frame());
    }
}
