//! Error type for the server's connection router.

use thiserror::Error;

use crate::application::registry::SessionId;

/// Errors raised while accepting, registering, or serving clients.
///
/// Only [`RouterError::Bind`] is fatal to the process; the rest are confined
/// to the connection or request that produced them.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("bind failed on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Every session identifier is held by a live connection.
    #[error("client registry is full ({capacity} sessions)")]
    RegistryFull { capacity: usize },

    #[error("send to session {session} failed: {source}")]
    Send {
        session: SessionId,
        #[source]
        source: std::io::Error,
    },
}
