//! Packet-Relay packet types.
//!
//! Every unit of application-level communication is a [`Packet`]: a type
//! code plus an opaque payload.  The payload is interpreted only by whoever
//! consumes the packet (the server dispatcher or the client display).

use crate::protocol::codec::ProtocolError;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Size of the common packet header in bytes: `length` (4) + `type` (4).
pub const HEADER_SIZE: usize = 8;

/// Largest total packet size (header included) either end will accept.
pub const MAX_PACKET_SIZE: usize = 1_048_576;

/// Largest payload that fits in a [`MAX_PACKET_SIZE`] packet.
pub const MAX_PAYLOAD_SIZE: usize = MAX_PACKET_SIZE - HEADER_SIZE;

// ── Packet type codes ─────────────────────────────────────────────────────────

/// All packet type codes defined by the protocol.
///
/// Requests travel client → server; responses and indications travel
/// server → client.  The two families never share a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PacketType {
    // Requests (1–4)
    RequestTime = 1,
    RequestName = 2,
    RequestClientList = 3,
    RequestSendMessage = 4,
    // Responses and indications (5–9)
    ResponseTime = 5,
    ResponseName = 6,
    ResponseClientList = 7,
    ResponseSendMessage = 8,
    IndicationMessage = 9,
}

impl PacketType {
    /// Every defined packet type, in wire-code order.
    pub const ALL: [PacketType; 9] = [
        PacketType::RequestTime,
        PacketType::RequestName,
        PacketType::RequestClientList,
        PacketType::RequestSendMessage,
        PacketType::ResponseTime,
        PacketType::ResponseName,
        PacketType::ResponseClientList,
        PacketType::ResponseSendMessage,
        PacketType::IndicationMessage,
    ];

    /// Returns the stable wire code for this type.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Returns `true` for the client → server family.
    pub fn is_request(self) -> bool {
        matches!(
            self,
            PacketType::RequestTime
                | PacketType::RequestName
                | PacketType::RequestClientList
                | PacketType::RequestSendMessage
        )
    }

    /// Returns `true` for the server → client family (responses and indications).
    pub fn is_response(self) -> bool {
        !self.is_request()
    }
}

impl TryFrom<u32> for PacketType {
    type Error = ProtocolError;

    fn try_from(value: u32) -> Result<Self, ProtocolError> {
        match value {
            1 => Ok(PacketType::RequestTime),
            2 => Ok(PacketType::RequestName),
            3 => Ok(PacketType::RequestClientList),
            4 => Ok(PacketType::RequestSendMessage),
            5 => Ok(PacketType::ResponseTime),
            6 => Ok(PacketType::ResponseName),
            7 => Ok(PacketType::ResponseClientList),
            8 => Ok(PacketType::ResponseSendMessage),
            9 => Ok(PacketType::IndicationMessage),
            other => Err(ProtocolError::UnknownPacketType(other)),
        }
    }
}

// ── Packet ────────────────────────────────────────────────────────────────────

/// A single application-level packet.
///
/// The fields are private so that `length` always equals
/// `HEADER_SIZE + payload.len()`: a `Packet` can only be produced by
/// [`Packet::new`] (or [`crate::build_request`]) and by the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    length: u32,
    packet_type: PacketType,
    payload: Vec<u8>,
}

impl Packet {
    /// Builds a packet, computing `length` from the payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::PayloadTooLarge`] if the payload is larger
    /// than [`MAX_PAYLOAD_SIZE`].
    pub fn new(packet_type: PacketType, payload: impl Into<Vec<u8>>) -> Result<Self, ProtocolError> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        Ok(Self {
            length: (HEADER_SIZE + payload.len()) as u32,
            packet_type,
            payload,
        })
    }

    /// Builds a packet whose payload is the UTF-8 bytes of `text`.
    ///
    /// # Errors
    ///
    /// Same as [`Packet::new`].
    pub fn text(packet_type: PacketType, text: &str) -> Result<Self, ProtocolError> {
        Self::new(packet_type, text.as_bytes())
    }

    /// Total encoded size in bytes, header included.
    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consumes the packet and returns its payload.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Returns the payload as text, replacing invalid UTF-8 sequences.
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_type_codes_round_trip_through_try_from() {
        for ty in PacketType::ALL {
            assert_eq!(PacketType::try_from(ty.code()), Ok(ty));
        }
    }

    #[test]
    fn test_packet_type_unknown_code_is_protocol_error() {
        assert_eq!(PacketType::try_from(0), Err(ProtocolError::UnknownPacketType(0)));
        assert_eq!(PacketType::try_from(10), Err(ProtocolError::UnknownPacketType(10)));
    }

    #[test]
    fn test_request_and_response_families_do_not_overlap() {
        let requests: Vec<_> = PacketType::ALL.iter().filter(|t| t.is_request()).collect();
        let responses: Vec<_> = PacketType::ALL.iter().filter(|t| t.is_response()).collect();
        assert_eq!(requests.len(), 4);
        assert_eq!(responses.len(), 5);
        assert!(requests.iter().all(|r| !responses.contains(r)));
    }

    #[test]
    fn test_packet_new_sets_length_to_header_plus_payload() {
        let packet = Packet::new(PacketType::ResponseName, b"Server".to_vec()).unwrap();
        assert_eq!(packet.length() as usize, HEADER_SIZE + 6);
        assert_eq!(packet.payload(), b"Server");
    }

    #[test]
    fn test_packet_new_with_empty_payload_has_header_length() {
        let packet = Packet::new(PacketType::RequestTime, Vec::new()).unwrap();
        assert_eq!(packet.length() as usize, HEADER_SIZE);
    }

    #[test]
    fn test_packet_new_rejects_oversized_payload() {
        let payload = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        let result = Packet::new(PacketType::RequestSendMessage, payload);
        assert_eq!(
            result,
            Err(ProtocolError::PayloadTooLarge {
                size: MAX_PAYLOAD_SIZE + 1,
                max: MAX_PAYLOAD_SIZE,
            })
        );
    }

    #[test]
    fn test_packet_new_accepts_payload_at_exact_maximum() {
        let payload = vec![0u8; MAX_PAYLOAD_SIZE];
        let packet = Packet::new(PacketType::IndicationMessage, payload).unwrap();
        assert_eq!(packet.length() as usize, MAX_PACKET_SIZE);
    }

    #[test]
    fn test_payload_text_replaces_invalid_utf8() {
        let packet = Packet::new(PacketType::IndicationMessage, vec![b'h', 0xFF, b'i']).unwrap();
        assert_eq!(packet.payload_text(), "h\u{FFFD}i");
    }
}
