//! Accumulate-and-extract framing for byte streams.
//!
//! # Why a buffer is needed
//!
//! TCP is a stream protocol.  There is no guarantee that a single `read()`
//! call returns exactly one complete packet:
//!
//! - It may return fewer bytes than the full packet (partial read).
//! - It may return bytes from several packets at once (coalesced reads).
//!
//! [`FrameReader`] solves this by appending every chunk it is fed to an
//! internal buffer and cutting complete packets off the front of that buffer
//! as soon as their declared `length` is fully available.  Whatever is left
//! over stays buffered for the next call.
//!
//! ```text
//! read #1: [len=13|type=5|"la"]            -> nothing yet (10 of 13 bytes)
//! read #2: ["ter"][len=8|type=2][len=9|ty  -> ResponseTime("later"), RequestName
//! read #3: pe=9|"x"]                       -> IndicationMessage("x")
//! ```

use tracing::debug;

use crate::protocol::codec::{decode_packet, peek_length, validate_length, CodecError, FramingError};
use crate::protocol::packet::Packet;

/// Incremental packet extractor for one byte stream.
///
/// Create one reader per connection; it is not meant to be shared.
#[derive(Debug, Default)]
pub struct FrameReader {
    /// Streaming receive buffer: accumulates bytes across `feed` calls.
    buf: Vec<u8>,
    /// Set once an impossible length is seen; boundaries are lost for good.
    poisoned: Option<FramingError>,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `bytes` and returns an iterator over every packet that is now
    /// complete, in stream order.
    ///
    /// The iterator is lazy and never blocks: it stops as soon as the buffer
    /// does not hold a whole packet.  Items are:
    ///
    /// - `Ok(packet)` for each complete, valid packet;
    /// - `Err(CodecError::Protocol(_))` for a complete packet with an unknown
    ///   type code.  Its bytes are consumed, so the following packets still
    ///   decode and the caller may keep going;
    /// - `Err(CodecError::Framing(_))` when the header declares an impossible
    ///   length.  The reader is poisoned from then on and the caller should
    ///   drop the connection.
    ///
    /// Dropping the iterator early is fine; unextracted packets stay buffered
    /// and are returned by the next `feed` (even an empty one).
    pub fn feed(&mut self, bytes: &[u8]) -> Frames<'_> {
        if self.poisoned.is_none() {
            self.buf.extend_from_slice(bytes);
        }
        Frames {
            reader: self,
            poison_reported: false,
        }
    }

    /// Number of bytes buffered but not yet returned as packets.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    fn next_frame(&mut self) -> Option<Result<Packet, CodecError>> {
        let declared = peek_length(&self.buf)?;

        let total = match validate_length(declared) {
            Ok(total) => total,
            Err(e) => {
                debug!(declared, buffered = self.buf.len(), "framing lost; discarding buffer");
                self.buf.clear();
                self.poisoned = Some(e.clone());
                return Some(Err(e.into()));
            }
        };

        if self.buf.len() < total {
            return None;
        }

        let result = decode_packet(&self.buf[..total]).map(|(packet, _)| packet);
        // The frame is consumed whether or not its type was recognised.
        self.buf.drain(..total);
        Some(result)
    }
}

/// Iterator returned by [`FrameReader::feed`].
pub struct Frames<'a> {
    reader: &'a mut FrameReader,
    poison_reported: bool,
}

impl Iterator for Frames<'_> {
    type Item = Result<Packet, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.poison_reported {
            return None;
        }
        if let Some(err) = &self.reader.poisoned {
            self.poison_reported = true;
            return Some(Err(err.clone().into()));
        }
        let item = self.reader.next_frame();
        if self.reader.poisoned.is_some() {
            self.poison_reported = true;
        }
        item
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
