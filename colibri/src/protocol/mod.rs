//! Serial protocol implementation.

pub mod crc;
pub mod exchange;
pub mod frame;
pub mod response;

// Re-export common types
pub use frame::{DecoderState, FrameDecoder, MAX_LINE_LENGTH, decode, encode};
pub use response::{Family, MAX_ARGS, Response, interpret};
