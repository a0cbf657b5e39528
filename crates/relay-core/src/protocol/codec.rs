//! Binary codec for encoding and decoding Packet-Relay packets.
//!
//! Wire format:
//! ```text
//! [length:4][type:4][payload:length-8]
//! ```
//! Total header size: 8 bytes.  All multi-byte integers are **little-endian**.
//! `length` counts the whole packet, header included, so the smallest valid
//! packet (empty payload) has `length == 8`.
//!
//! Both ends must agree on this layout; it is fixed here rather than taken
//! from the platform's native byte order.

use crate::protocol::packet::{Packet, PacketType, HEADER_SIZE, MAX_PACKET_SIZE};
use thiserror::Error;

/// The byte stream can no longer be cut into packets at this position.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// Fewer bytes are available than the header or the declared length requires.
    #[error("truncated packet: need {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },

    /// The length field is smaller than a header or larger than the maximum packet.
    #[error("invalid declared length {declared} (allowed {min}..={max})")]
    InvalidLength { declared: u32, min: usize, max: usize },
}

/// A well-framed packet whose contents are not acceptable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The type field is not a defined [`PacketType`] code.
    #[error("unknown packet type: {0}")]
    UnknownPacketType(u32),

    /// The payload does not fit in a single packet.
    #[error("payload of {size} bytes exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },

    /// The payload could not be interpreted for its packet type.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// Errors that can occur during packet decoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error(transparent)]
    Framing(#[from] FramingError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl CodecError {
    /// Framing errors mean the stream has lost packet boundaries; the
    /// connection that produced them cannot be read any further.
    pub fn is_framing(&self) -> bool {
        matches!(self, CodecError::Framing(_))
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Builds a packet ready to be encoded.
///
/// Pure: no I/O.  Equivalent to [`Packet::new`].
///
/// # Errors
///
/// Returns [`ProtocolError::PayloadTooLarge`] when the payload would overflow
/// [`MAX_PACKET_SIZE`].
///
/// # Examples
///
/// ```rust
/// use relay_core::{build_request, PacketType};
///
/// let packet = build_request(PacketType::RequestName, Vec::new()).unwrap();
/// assert_eq!(packet.length(), 8);
/// ```
pub fn build_request(
    packet_type: PacketType,
    payload: impl Into<Vec<u8>>,
) -> Result<Packet, ProtocolError> {
    Packet::new(packet_type, payload)
}

/// Encodes a [`Packet`] into a byte vector including the 8-byte header.
///
/// # Examples
///
/// ```rust
/// use relay_core::{build_request, encode_packet, PacketType};
///
/// let packet = build_request(PacketType::RequestName, Vec::new()).unwrap();
/// assert_eq!(encode_packet(&packet), vec![8, 0, 0, 0, 2, 0, 0, 0]);
/// ```
pub fn encode_packet(packet: &Packet) -> Vec<u8> {
    let mut buf = Vec::with_capacity(packet.length() as usize);
    buf.extend_from_slice(&packet.length().to_le_bytes());
    buf.extend_from_slice(&packet.packet_type().code().to_le_bytes());
    buf.extend_from_slice(packet.payload());
    buf
}

/// Decodes one [`Packet`] from the beginning of `bytes`.
///
/// Returns the decoded packet and the number of bytes consumed (always the
/// declared `length`), so the caller can advance their read cursor.  Bytes
/// after the declared length are left untouched: they belong to the next
/// packet.
///
/// # Errors
///
/// - [`FramingError::Truncated`] if fewer than a header's worth of bytes, or
///   fewer than `length` bytes, are available.
/// - [`FramingError::InvalidLength`] if `length` is below [`HEADER_SIZE`] or
///   above [`MAX_PACKET_SIZE`].
/// - [`ProtocolError::UnknownPacketType`] if `type` is not a defined code.
///
/// # Examples
///
/// ```rust
/// use relay_core::{build_request, decode_packet, encode_packet, PacketType};
///
/// let original = build_request(PacketType::ResponseName, "Server").unwrap();
/// let bytes = encode_packet(&original);
/// let (decoded, n) = decode_packet(&bytes).unwrap();
/// assert_eq!(decoded, original);
/// assert_eq!(n, bytes.len());
/// ```
pub fn decode_packet(bytes: &[u8]) -> Result<(Packet, usize), CodecError> {
    let declared = peek_length(bytes).ok_or(FramingError::Truncated {
        needed: HEADER_SIZE,
        available: bytes.len(),
    })?;
    let total = validate_length(declared)?;

    if bytes.len() < total {
        return Err(FramingError::Truncated {
            needed: total,
            available: bytes.len(),
        }
        .into());
    }

    let code = read_u32_le(bytes, 4);
    let packet_type = PacketType::try_from(code)?;
    let packet = Packet::new(packet_type, &bytes[HEADER_SIZE..total])?;
    Ok((packet, total))
}

/// Reads the `length` field of a buffered header without consuming anything.
///
/// Returns `None` while fewer than [`HEADER_SIZE`] bytes are available.
pub fn peek_length(bytes: &[u8]) -> Option<u32> {
    if bytes.len() < HEADER_SIZE {
        return None;
    }
    Some(read_u32_le(bytes, 0))
}

/// Checks a declared length against the protocol bounds and returns it as
/// a byte count.
///
/// # Errors
///
/// Returns [`FramingError::InvalidLength`] when out of bounds.
pub fn validate_length(declared: u32) -> Result<usize, FramingError> {
    let total = declared as usize;
    if !(HEADER_SIZE..=MAX_PACKET_SIZE).contains(&total) {
        return Err(FramingError::InvalidLength {
            declared,
            min: HEADER_SIZE,
            max: MAX_PACKET_SIZE,
        });
    }
    Ok(total)
}

// ── Utility helpers ───────────────────────────────────────────────────────────

fn read_u32_le(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

// ── Tests ─────────────────────────────────────────────────────────────────────
