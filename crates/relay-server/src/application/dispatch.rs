//! Dispatcher: turns one decoded request into its response.
//!
//! This is the server's only use case.  The connection handler decodes
//! packets off the wire and hands each one here; whatever comes back is
//! written to the requesting client.
//!
//! | Request              | Response              |
//! |----------------------|-----------------------|
//! | `RequestTime`        | `ResponseTime`        |
//! | `RequestName`        | `ResponseName`        |
//! | `RequestClientList`  | `ResponseClientList`  |
//! | `RequestSendMessage` | `ResponseSendMessage` (plus an `IndicationMessage` to the target) |
//!
//! Response and indication types arriving *from* a client have no meaning to
//! the server and are skipped.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use relay_core::protocol::payload::{SendMessage, SEND_FAILED, SEND_NOT_FOUND, SEND_OK};
use relay_core::{Packet, PacketType, ProtocolError};
use tracing::{debug, info, warn};

use crate::application::registry::{ClientRegistry, SessionId};

/// Answers requests on behalf of every connection.
pub struct Dispatcher {
    registry: Arc<ClientRegistry>,
    server_name: String,
    clock: fn() -> SystemTime,
}

impl Dispatcher {
    pub fn new(registry: Arc<ClientRegistry>, server_name: impl Into<String>) -> Self {
        Self {
            registry,
            server_name: server_name.into(),
            clock: SystemTime::now,
        }
    }

    /// Replaces the wall clock used for `RequestTime`.
    pub fn with_clock(mut self, clock: fn() -> SystemTime) -> Self {
        self.clock = clock;
        self
    }

    /// Handles one packet received from `from`.
    ///
    /// Returns `Ok(Some(response))` for requests, `Ok(None)` for packet types
    /// the server ignores.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] when the request payload cannot be
    /// interpreted.  The caller discards the packet and keeps the connection.
    pub async fn handle(
        &self,
        from: SessionId,
        packet: Packet,
    ) -> Result<Option<Packet>, ProtocolError> {
        let response = match packet.packet_type() {
            PacketType::RequestTime => {
                let now = format_utc((self.clock)());
                Packet::text(PacketType::ResponseTime, &now)?
            }
            PacketType::RequestName => Packet::text(PacketType::ResponseName, &self.server_name)?,
            PacketType::RequestClientList => {
                Packet::text(PacketType::ResponseClientList, &self.client_list())?
            }
            PacketType::RequestSendMessage => {
                let status = self.route_message(from, packet.payload()).await?;
                Packet::text(PacketType::ResponseSendMessage, status)?
            }
            other => {
                debug!(session = %from, packet_type = ?other, "ignoring non-request packet");
                return Ok(None);
            }
        };
        Ok(Some(response))
    }

    fn client_list(&self) -> String {
        self.registry
            .snapshot()
            .into_iter()
            .map(|(id, addr)| format!("Client {id}: {}:{}\n", addr.ip(), addr.port()))
            .collect()
    }

    /// Delivers the message text to its target and returns the status text
    /// for the sender.
    async fn route_message(
        &self,
        from: SessionId,
        payload: &[u8],
    ) -> Result<&'static str, ProtocolError> {
        let msg = SendMessage::parse(payload)?;

        let target = SessionId::new(msg.target)
            .and_then(|id| self.registry.get(id).map(|handle| (id, handle)));
        let Some((target_id, handle)) = target else {
            debug!(session = %from, recipient = msg.target, "send target not registered");
            return Ok(SEND_NOT_FOUND);
        };

        let indication = Packet::new(PacketType::IndicationMessage, msg.text)?;
        match handle.sink.send(&indication).await {
            Ok(()) => {
                info!(session = %from, recipient = %target_id, bytes = msg.text.len(), "message relayed");
                Ok(SEND_OK)
            }
            Err(e) => {
                warn!(session = %from, recipient = %target_id, error = %e, "delivery failed; evicting target");
                if self.registry.remove(target_id, handle.generation()).is_some() {
                    handle.sink.close().await;
                }
                Ok(SEND_FAILED)
            }
        }
    }
}

// ── Time formatting ───────────────────────────────────────────────────────────

/// Formats a wall-clock instant as `YYYY-MM-DD HH:MM:SS UTC`.
///
/// Instants before the Unix epoch are reported as the epoch.
pub fn format_utc(time: SystemTime) -> String {
    let secs = time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let days = (secs / 86_400) as i64;
    let rem = secs % 86_400;
    let (year, month, day) = civil_from_days(days);
    format!(
        "{year:04}-{month:02}-{day:02} {:02}:{:02}:{:02} UTC",
        rem / 3600,
        (rem % 3600) / 60,
        rem % 60
    )
}

/// Converts days since 1970-01-01 to a proleptic Gregorian `(year, month, day)`.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
