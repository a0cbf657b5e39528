//! # relay-core
//!
//! Shared library for Packet-Relay containing the packet data model, the
//! binary wire codec, and the stream framing reader.
//!
//! This crate is used by both the server and client applications.
//! It has zero dependencies on network sockets or async runtimes: everything
//! here operates on byte slices, so it can be tested without any I/O.
//!
//! # Architecture overview (for beginners)
//!
//! Packet-Relay is a small messaging service.  Clients connect to a server
//! over TCP, ask it simple questions (what time is it, what is your name, who
//! else is connected) and relay short text messages to each other through it.
//!
//! This crate (`relay-core`) is the shared foundation.  It defines:
//!
//! - **`protocol::packet`** – The vocabulary: [`PacketType`] and the
//!   [`Packet`] value exchanged between both ends.
//!
//! - **`protocol::codec`** – How a packet becomes bytes and back.  Every
//!   packet is an 8-byte little-endian header (`length`, `type`) followed by
//!   an opaque payload.
//!
//! - **`protocol::framing`** – TCP delivers a *stream* of bytes, not
//!   messages.  The [`FrameReader`] accumulates bytes across reads and cuts
//!   them back into whole packets.
//!
//! - **`protocol::payload`** – Helpers for the few payloads that carry
//!   structure (the send-message request).

pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `relay_core::Packet` instead of `relay_core::protocol::packet::Packet`.
pub use protocol::codec::{
    build_request, decode_packet, encode_packet, CodecError, FramingError, ProtocolError,
};
pub use protocol::framing::FrameReader;
pub use protocol::packet::{Packet, PacketType, HEADER_SIZE, MAX_PACKET_SIZE, MAX_PAYLOAD_SIZE};
