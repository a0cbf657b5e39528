//! Payload layouts for the packet types that carry structure.
//!
//! Most payloads are plain UTF-8 text.  The one exception is
//! `RequestSendMessage`:
//!
//! ```text
//! [target:1][message text: remaining bytes]
//! ```
//!
//! The target is the one-byte session identifier the server issued to the
//! recipient (as shown in the client list).

use crate::protocol::codec::ProtocolError;

/// `ResponseSendMessage` text when the message reached its target.
pub const SEND_OK: &str = "Message sent successfully";

/// `ResponseSendMessage` text when no client holds the target identifier.
pub const SEND_NOT_FOUND: &str = "Client not found";

/// `ResponseSendMessage` text when the target was found but writing to it failed.
pub const SEND_FAILED: &str = "Message delivery failed";

/// Borrowed view of a `RequestSendMessage` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendMessage<'a> {
    pub target: u8,
    pub text: &'a [u8],
}

impl<'a> SendMessage<'a> {
    /// Splits a `RequestSendMessage` payload into target and text.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedPayload`] for an empty payload
    /// (there is no target byte).
    pub fn parse(payload: &'a [u8]) -> Result<Self, ProtocolError> {
        match payload.split_first() {
            Some((&target, text)) => Ok(Self { target, text }),
            None => Err(ProtocolError::MalformedPayload(
                "send-message payload is missing the target byte".to_string(),
            )),
        }
    }

    /// Encodes a `RequestSendMessage` payload.
    pub fn encode(target: u8, text: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + text.len());
        buf.push(target);
        buf.extend_from_slice(text.as_bytes());
        buf
    }
}
