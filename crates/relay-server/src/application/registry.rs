//! ClientRegistry: the server's table of live connections.
//!
//! Every accepted connection is registered under a [`SessionId`] that the
//! server issues itself.  Clients see these identifiers in the client list
//! and use them as the target byte of a send-message request.
//!
//! # Identifier lifecycle (for beginners)
//!
//! ```text
//! accept ──► register() ──► SessionId 3 (generation 17)
//!                                 │
//!              connection closes  │  or delivery to it fails
//!                                 ▼
//!                    remove(3, generation 17)
//! ```
//!
//! Identifiers are small (`1..=255`, the range of the one-byte target field)
//! and are reused, but only after the previous holder has been removed.  The
//! allocator hands out the lowest free identifier *after* the last one
//! issued, wrapping around, so a freshly released identifier is not
//! immediately given to the next client.
//!
//! Each registration also carries a generation number that is never reused.
//! Removal must quote both, which guarantees an entry is removed exactly
//! once: a late cleanup from an old connection cannot remove the entry that
//! now belongs to a newer connection holding the same identifier.

use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use relay_core::Packet;

use crate::error::RouterError;

/// Number of identifiers available (`1..=255`).
pub const MAX_SESSIONS: usize = u8::MAX as usize;

/// Opaque, server-issued identifier of one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u8);

impl SessionId {
    /// Wraps a raw identifier.  `0` is never issued and yields `None`.
    pub fn new(raw: u8) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Something that can deliver packets to one connected client.
///
/// The TCP implementation lives in `infrastructure::network::sink`; tests use
/// in-memory recorders.
#[async_trait]
pub trait PacketSink: Send + Sync {
    /// Encodes and writes one packet.
    async fn send(&self, packet: &Packet) -> std::io::Result<()>;

    /// Shuts the underlying writer down.  Later sends fail.
    async fn close(&self);
}

/// Registry entry for one live connection.
#[derive(Clone)]
pub struct ClientHandle {
    pub addr: SocketAddr,
    pub sink: Arc<dyn PacketSink>,
    generation: u64,
}

impl ClientHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("addr", &self.addr)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Proof of registration returned to the connection that owns the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub id: SessionId,
    pub generation: u64,
}

#[derive(Default)]
struct Inner {
    clients: BTreeMap<SessionId, ClientHandle>,
    last_issued: u8,
    next_generation: u64,
}

/// Thread-safe map of live connections.
///
/// The lock is only held for the map operation itself; callers that need to
/// write to a client clone its [`ClientHandle`] out first and send without
/// holding the lock.
#[derive(Default)]
pub struct ClientRegistry {
    inner: Mutex<Inner>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new connection and issues its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::RegistryFull`] when all identifiers are in use.
    pub fn register(
        &self,
        addr: SocketAddr,
        sink: Arc<dyn PacketSink>,
    ) -> Result<Registration, RouterError> {
        let mut inner = self.lock();

        let start = inner.last_issued;
        let id = (1..=MAX_SESSIONS as u16)
            .map(|offset| ((start as u16 + offset - 1) % MAX_SESSIONS as u16 + 1) as u8)
            .filter_map(SessionId::new)
            .find(|id| !inner.clients.contains_key(id))
            .ok_or(RouterError::RegistryFull {
                capacity: MAX_SESSIONS,
            })?;

        inner.next_generation += 1;
        let generation = inner.next_generation;
        inner.last_issued = id.get();
        inner.clients.insert(
            id,
            ClientHandle {
                addr,
                sink,
                generation,
            },
        );
        Ok(Registration { id, generation })
    }

    /// Removes the entry for `id` if it still belongs to `generation`.
    ///
    /// Returns the removed handle, or `None` when the entry is already gone
    /// or has since been re-issued to another connection.
    pub fn remove(&self, id: SessionId, generation: u64) -> Option<ClientHandle> {
        let mut inner = self.lock();
        match inner.clients.get(&id) {
            Some(handle) if handle.generation == generation => inner.clients.remove(&id),
            _ => None,
        }
    }

    /// Returns a clone of the handle registered under `id`.
    pub fn get(&self, id: SessionId) -> Option<ClientHandle> {
        self.lock().clients.get(&id).cloned()
    }

    /// Point-in-time list of `(id, address)` pairs in ascending id order.
    pub fn snapshot(&self) -> Vec<(SessionId, SocketAddr)> {
        self.lock()
            .clients
            .iter()
            .map(|(id, handle)| (*id, handle.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // No method panics while holding the lock, so a poisoned map is still consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
