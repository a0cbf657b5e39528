//! MessageQueue: the hand-off between the receive task and the consumer task.
//!
//! # How the wait works (for beginners)
//!
//! The consumer must sleep while the queue is empty and wake up when either a
//! packet arrives *or* shutdown is requested.  Both facts live under one
//! mutex, and a [`Notify`] does the waking:
//!
//! ```text
//! pop():  register interest ─► lock ─► item? return it
//!                                   ─► shut down? return None
//!                                   ─► unlock, sleep until notified, retry
//! ```
//!
//! Interest is registered *before* the mutex is checked, so a `push` or
//! `shutdown` that lands between the check and the sleep is not missed.
//!
//! # Shutdown policy
//!
//! Draining: after [`MessageQueue::shutdown`], `pop` keeps returning the
//! packets that were already queued and only returns `None` once the queue is
//! empty.  New pushes are rejected.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use relay_core::Packet;
use thiserror::Error;
use tokio::sync::Notify;

/// Returned by [`MessageQueue::push`] after shutdown; carries the rejected packet.
#[derive(Debug, Error)]
#[error("message queue is shut down")]
pub struct QueueClosed(pub Packet);

#[derive(Default)]
struct QueueState {
    items: VecDeque<Packet>,
    shutdown: bool,
}

/// Unbounded multi-producer FIFO of packets with an async `pop`.
#[derive(Default)]
pub struct MessageQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a packet and wakes one waiting consumer.
    ///
    /// # Errors
    ///
    /// Returns [`QueueClosed`] with the packet if shutdown was already requested.
    pub fn push(&self, packet: Packet) -> Result<(), QueueClosed> {
        {
            let mut state = self.lock();
            if state.shutdown {
                return Err(QueueClosed(packet));
            }
            state.items.push_back(packet);
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Waits for the next packet.
    ///
    /// Returns `None` only when shutdown has been requested and every queued
    /// packet has been taken.
    pub async fn pop(&self) -> Option<Packet> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if let Some(packet) = state.items.pop_front() {
                    return Some(packet);
                }
                if state.shutdown {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Stops accepting packets and wakes every waiting consumer.
    pub fn shutdown(&self) {
        self.lock().shutdown = true;
        self.notify.notify_waiters();
    }

    pub fn is_shutdown(&self) -> bool {
        self.lock().shutdown
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // Nothing panics while the lock is held, so the state is always consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
