//! Frame encoding and incremental decoding.
//!
//! ## Frame Format
//!
//! ```text
//! :<payload>\n                 plain frame
//! ;<payload>@<decimal-crc>\n   checksummed frame
//! ```
//!
//! The checksum is the CRC-16 of the payload bytes only, written as an
//! unsigned decimal number. `\r` is accepted as a stop marker as well.

use crate::error::{Error, Result};
use crate::protocol::crc::crc16;
use log::warn;

/// Start marker of a frame without checksum.
pub const START_PLAIN: u8 = b':';

/// Start marker of a frame carrying a checksum.
pub const START_CHECKSUM: u8 = b';';

/// Separator between payload and checksum.
pub const CHECKSUM_SEPARATOR: u8 = b'@';

/// Maximum length of a frame on the wire, markers included.
pub const MAX_LINE_LENGTH: usize = 255;

/// Whether `byte` terminates a frame.
#[must_use]
pub fn is_stop_marker(byte: u8) -> bool {
    byte == b'\n' || byte == b'\r'
}

/// Encode `command` into a frame.
///
/// Fails with [`Error::InvalidCommand`] if the command contains a stop marker
/// or the frame would exceed [`MAX_LINE_LENGTH`].
pub fn encode(command: &str, use_checksum: bool) -> Result<Vec<u8>> {
    if command.bytes().any(is_stop_marker) {
        return Err(Error::InvalidCommand(format!(
            "line break inside command {command:?}"
        )));
    }

    let mut frame = Vec::with_capacity(command.len() + 8);
    if use_checksum {
        frame.push(START_CHECKSUM);
        frame.extend_from_slice(command.as_bytes());
        frame.push(CHECKSUM_SEPARATOR);
        frame.extend_from_slice(crc16(command.as_bytes()).to_string().as_bytes());
    } else {
        frame.push(START_PLAIN);
        frame.extend_from_slice(command.as_bytes());
    }
    frame.push(b'\n');

    if frame.len() > MAX_LINE_LENGTH {
        return Err(Error::InvalidCommand(format!(
            "frame of {} bytes exceeds {MAX_LINE_LENGTH}",
            frame.len()
        )));
    }
    Ok(frame)
}

/// Decoder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Discarding bytes until a start marker.
    WaitingForStart,
    /// Collecting payload bytes until a stop marker.
    Accumulating,
    /// A full frame has been received.
    Complete,
}

/// Incremental frame decoder.
///
/// Bytes are fed as they arrive; once [`DecoderState::Complete`] is reached,
/// [`FrameDecoder::finish`] verifies and returns the payload. Any bytes fed
/// after completion are ignored.
#[derive(Debug)]
pub struct FrameDecoder {
    state: DecoderState,
    checksummed: bool,
    buf: Vec<u8>,
    separator: Option<usize>,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a decoder waiting for a start marker.
    pub fn new() -> Self {
        Self {
            state: DecoderState::WaitingForStart,
            checksummed: false,
            buf: Vec::with_capacity(MAX_LINE_LENGTH),
            separator: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Whether a full frame has been received.
    pub fn is_complete(&self) -> bool {
        self.state == DecoderState::Complete
    }

    /// Whether the frame being received carries a checksum.
    pub fn is_checksummed(&self) -> bool {
        self.checksummed
    }

    /// Feed a chunk of received bytes.
    ///
    /// Returns `true` once the frame is complete.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<bool> {
        for &byte in bytes {
            match self.state {
                DecoderState::WaitingForStart => match byte {
                    START_PLAIN | START_CHECKSUM => {
                        self.checksummed = byte == START_CHECKSUM;
                        self.state = DecoderState::Accumulating;
                    },
                    _ => {},
                },
                DecoderState::Accumulating => {
                    if is_stop_marker(byte) {
                        self.state = DecoderState::Complete;
                        continue;
                    }
                    if self.buf.len() >= MAX_LINE_LENGTH {
                        return Err(Error::Protocol(format!(
                            "no stop marker within {MAX_LINE_LENGTH} bytes"
                        )));
                    }
                    if byte == CHECKSUM_SEPARATOR {
                        self.separator = Some(self.buf.len());
                    }
                    self.buf.push(byte);
                },
                DecoderState::Complete => break,
            }
        }
        Ok(self.is_complete())
    }

    /// Verify the completed frame and return its payload.
    ///
    /// For checksummed frames the payload excludes the separator and checksum
    /// text. Fails with [`Error::Protocol`] if the frame is not complete yet.
    pub fn finish(self) -> Result<Vec<u8>> {
        if !self.is_complete() {
            return Err(Error::Protocol("incomplete frame".to_string()));
        }
        if !self.checksummed {
            return Ok(self.buf);
        }

        let mut buf = self.buf;
        let Some(split) = self.separator else {
            let computed = crc16(&buf);
            warn!("Checksummed frame without separator (computed {computed})");
            return Err(Error::ChecksumMismatch {
                received: String::new(),
                computed,
            });
        };

        let received = String::from_utf8_lossy(&buf[split + 1..]).into_owned();
        buf.truncate(split);
        let computed = crc16(&buf);

        match received.trim().parse::<u16>() {
            Ok(value) if value == computed => Ok(buf),
            _ => {
                warn!("Checksum mismatch: received '{received}', computed {computed}");
                Err(Error::ChecksumMismatch { received, computed })
            },
        }
    }
}

/// Decode one frame from a complete byte slice.
pub fn decode(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = FrameDecoder::new();
    if !decoder.feed(bytes)? {
        return Err(Error::Protocol("incomplete frame".to_string()));
    }
    decoder.finish()
}
