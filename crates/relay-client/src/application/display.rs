//! Console output for received packets.
//!
//! Each packet type is printed on its own line behind a fixed label:
//!
//! ```text
//! Server Time: 2026-10-17 09:00:00 UTC
//! Server Name: Server
//! Client List: Client 1: 127.0.0.1:51234
//! Message Response: Message sent successfully
//! Message from Server: Hello from server
//! ```

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use relay_core::PacketType;
use tracing::warn;

use crate::application::handler::PacketHandler;

/// [`PacketHandler`] that writes labelled lines to any [`Write`] sink.
pub struct DisplayHandler<W> {
    out: Mutex<W>,
}

impl DisplayHandler<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> DisplayHandler<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn line(&self, label: &str, text: &str) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let result = writeln!(out, "{label}: {}", text.trim_end_matches('\n'))
            .and_then(|()| out.flush());
        if let Err(e) = result {
            warn!(error = %e, "could not write to console");
        }
    }
}

impl<W: Write + Send> PacketHandler for DisplayHandler<W> {
    fn on_time(&self, text: &str) {
        self.line("Server Time", text);
    }

    fn on_name(&self, text: &str) {
        self.line("Server Name", text);
    }

    fn on_client_list(&self, text: &str) {
        self.line("Client List", text);
    }

    fn on_send_result(&self, text: &str) {
        self.line("Message Response", text);
    }

    fn on_message(&self, text: &str) {
        self.line("Message from Server", text);
    }

    fn on_unexpected(&self, packet_type: PacketType) {
        self.line(
            "Unexpected packet",
            &format!("{packet_type:?} (type {})", packet_type.code()),
        );
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
