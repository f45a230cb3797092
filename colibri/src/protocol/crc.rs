//! CRC-16 used for checksummed frames.
//!
//! CRC-16/CCITT-FALSE: polynomial 0x1021, initial value 0xFFFF, no
//! reflection, no final XOR. Both the encoder and the decoder go through
//! [`crc16`].

use crc::{CRC_16_IBM_3740, Crc};

/// CRC-16/CCITT-FALSE algorithm instance.
pub const COLIBRI_CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Compute the frame checksum over `data`.
#[must_use]
pub fn crc16(data: &[u8]) -> u16 {
    COLIBRI_CRC16.checksum(data)
}
