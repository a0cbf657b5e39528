//! Protocol module containing the packet model, the binary codec, and the
//! stream framing reader.

pub mod codec;
pub mod framing;
pub mod packet;
pub mod payload;

pub use codec::{build_request, decode_packet, encode_packet, CodecError, FramingError, ProtocolError};
pub use framing::FrameReader;
pub use packet::*;
