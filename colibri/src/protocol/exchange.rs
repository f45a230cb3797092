//! One command/response cycle over an open port.
//!
//! Strictly half-duplex: a frame is written, then reads are issued until one
//! complete response frame has been decoded. Reads that return nothing are
//! expected (the port uses a very short read timeout) and simply repeated
//! until the session's response deadline passes.

use crate::error::{Error, Result};
use crate::port::Port;
use crate::protocol::frame::{FrameDecoder, MAX_LINE_LENGTH, encode};
use crate::protocol::response::Response;
use crate::session::SessionConfig;
use log::{debug, log};
use std::io::{ErrorKind, Read};
use std::time::Instant;

/// Size of a single read from the port.
const READ_CHUNK: usize = 64;

/// Append `bytes` to the traffic log buffer, keeping only the newest
/// [`MAX_LINE_LENGTH`] bytes.
fn keep_tail(raw: &mut Vec<u8>, bytes: &[u8]) {
    raw.extend_from_slice(bytes);
    if raw.len() > MAX_LINE_LENGTH {
        raw.drain(..raw.len() - MAX_LINE_LENGTH);
    }
}

/// Encode and write `command` to `port`.
pub fn send<P: Port + ?Sized>(port: &mut P, command: &str, config: &SessionConfig) -> Result<()> {
    let frame = encode(command, config.use_checksum)?;
    log!(
        config.traffic_level(),
        "TX: {}",
        String::from_utf8_lossy(&frame).trim_end()
    );
    port.write_all_bytes(&frame)
}

/// Read until one frame is complete and return its verified payload.
pub fn receive<P: Port + ?Sized>(port: &mut P, config: &SessionConfig) -> Result<Vec<u8>> {
    let started = Instant::now();
    let mut decoder = FrameDecoder::new();
    let mut raw = Vec::with_capacity(MAX_LINE_LENGTH);
    let mut received = 0usize;
    let mut buf = [0u8; READ_CHUNK];

    while !decoder.is_complete() {
        if let Some(limit) = config.response_timeout {
            if started.elapsed() >= limit {
                debug!("No complete frame after {limit:?}, got {received} bytes");
                return Err(Error::Timeout(limit));
            }
        }

        match port.read(&mut buf) {
            Ok(0) => {},
            Ok(n) => {
                received += n;
                keep_tail(&mut raw, &buf[..n]);
                decoder.feed(&buf[..n])?;
            },
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) => {},
            Err(e) => return Err(e.into()),
        }
    }

    log!(
        config.traffic_level(),
        "RX: {}",
        String::from_utf8_lossy(&raw).trim_end()
    );
    decoder.finish()
}

/// Send `command` and return the tokenized response.
pub fn transact<P: Port + ?Sized>(
    port: &mut P,
    command: &str,
    config: &SessionConfig,
) -> Result<Response> {
    send(port, command, config)?;
    let payload = receive(port, config)?;
    Ok(Response::parse(&payload))
}
