//! PacketHandler: how received packets reach the application.
//!
//! The consumer task calls [`dispatch`] for every packet it pops off the
//! queue.  `dispatch` looks at the packet type and calls the matching
//! handler method with the payload decoded as text.
//!
//! Handler methods run synchronously on the consumer task, one packet at a
//! time, in the order the packets arrived.  They should return quickly.

use relay_core::{Packet, PacketType};

/// Receives packets from the server, one method per packet type.
#[cfg_attr(test, mockall::automock)]
pub trait PacketHandler: Send + Sync {
    /// `ResponseTime`: the server's clock, as text.
    fn on_time(&self, text: &str);

    /// `ResponseName`: the server's configured name.
    fn on_name(&self, text: &str);

    /// `ResponseClientList`: one `Client <id>: <ip>:<port>` line per client.
    fn on_client_list(&self, text: &str);

    /// `ResponseSendMessage`: the outcome of a send-message request.
    fn on_send_result(&self, text: &str);

    /// `IndicationMessage`: text pushed by the server.
    fn on_message(&self, text: &str);

    /// Any packet type a server should never send to a client.
    fn on_unexpected(&self, packet_type: PacketType);
}

/// Routes one packet to the handler method for its type.
pub fn dispatch(handler: &dyn PacketHandler, packet: Packet) {
    let text = packet.payload_text();
    match packet.packet_type() {
        PacketType::ResponseTime => handler.on_time(&text),
        PacketType::ResponseName => handler.on_name(&text),
        PacketType::ResponseClientList => handler.on_client_list(&text),
        PacketType::ResponseSendMessage => handler.on_send_result(&text),
        PacketType::IndicationMessage => handler.on_message(&text),
        other => handler.on_unexpected(other),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
