//! Socket-backed packet sink.
//!
//! The write half of a connection is shared between its own handler (which
//! writes responses) and every other handler that routes a message to it.
//! The async mutex serialises those writers so that packets never
//! interleave on the wire.

use async_trait::async_trait;
use relay_core::{encode_packet, Packet};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::registry::PacketSink;

/// [`PacketSink`] over any async writer.  `None` once closed.
pub struct StreamSink<W> {
    writer: Mutex<Option<W>>,
}

/// The sink used for accepted TCP connections.
pub type TcpSink = StreamSink<OwnedWriteHalf>;

impl<W> StreamSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(Some(writer)),
        }
    }
}

#[async_trait]
impl<W> PacketSink for StreamSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&self, packet: &Packet) -> std::io::Result<()> {
        let bytes = encode_packet(packet);
        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotConnected))?;
        writer.write_all(&bytes).await?;
        writer.flush().await
    }

    async fn close(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!(error = %e, "writer shutdown failed");
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
