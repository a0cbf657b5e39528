//! ClientPipeline: the client's connection to the server.
//!
//! # Connection lifecycle (for beginners)
//!
//! ```text
//!                 connect()                  TCP connected
//! Disconnected ───────────────► Connecting ───────────────► Connected
//!      ▲                            │                           │
//!      │     timeout / refused      │      server closed, or    │
//!      ├────────────────────────────┘      disconnect() called  │
//!      │                                                        ▼
//!      └──────────────────────────────────────────────── Disconnecting
//!                     receive task joined
//! ```
//!
//! The current state is published on a `watch` channel so the console can
//! react when the server goes away.
//!
//! While connected, two tasks run:
//!
//! - the **receive task** reads from the socket, cuts the bytes into packets
//!   with a [`FrameReader`], and pushes them onto the [`MessageQueue`];
//! - the **consumer task** (started once, for the life of the pipeline) pops
//!   packets and hands them to the [`PacketHandler`].
//!
//! Sends go straight to the socket from the caller's task; nothing waits for
//! a reply.  Replies arrive later through the handler.  A send blocked on a
//! server that stopped reading is abandoned as soon as `disconnect` fires the
//! session's cancel signal.

use std::io;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use relay_core::protocol::payload::SendMessage;
use relay_core::{build_request, encode_packet, FrameReader, PacketType, ProtocolError};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::application::handler::{dispatch, PacketHandler};
use crate::infrastructure::network::queue::MessageQueue;

/// Errors returned by [`ClientPipeline`] operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The TCP connection to the server could not be opened.
    #[error("failed to connect to {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("connecting to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("not connected")]
    NotConnected,

    #[error("already connected")]
    AlreadyConnected,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("connection I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ClientError {
    /// `true` for the errors that mean "could not reach the server".
    pub fn is_connection_error(&self) -> bool {
        matches!(self, ClientError::ConnectFailed { .. } | ClientError::ConnectTimeout { .. })
    }
}

/// Configuration for the client's network connection.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Address used when `connect` is given none, as `host:port`.
    pub server_addr: String,
    pub connect_timeout: Duration,
    /// Size of the socket read buffer in bytes.
    pub read_buffer_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:6026".to_string(),
            connect_timeout: Duration::from_secs(5),
            read_buffer_size: 4096,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// The connection is closing, or was closed by the server and has not
    /// been cleaned up yet.
    Disconnecting,
}

/// How a receive task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReceiveOutcome {
    Cancelled,
    Closed,
    ReadFailed,
    FramingLost,
}

/// Resources of one live connection.
struct Session {
    writer: OwnedWriteHalf,
    receiver: JoinHandle<ReceiveOutcome>,
    cancel: Arc<watch::Sender<bool>>,
}

impl Session {
    /// Stops the receive task, closes the socket, and waits for the task.
    async fn close(mut self) {
        self.cancel.send_replace(true);
        if let Err(e) = self.writer.shutdown().await {
            debug!(error = %e, "socket shutdown failed");
        }
        drop(self.writer);
        match self.receiver.await {
            Ok(outcome) => debug!(?outcome, "receive task finished"),
            Err(e) => warn!(error = %e, "receive task failed"),
        }
    }
}

/// Owns the connection, the message queue, and the consumer task.
pub struct ClientPipeline {
    config: ClientConfig,
    queue: Arc<MessageQueue>,
    state: Arc<watch::Sender<ConnectionState>>,
    /// Serialises connect, send, and disconnect.
    session: Mutex<Option<Session>>,
    /// Cancel signal of the open session, reachable while a send holds `session`.
    cancel: StdMutex<Option<Arc<watch::Sender<bool>>>>,
    consumer: StdMutex<Option<JoinHandle<()>>>,
}

impl ClientPipeline {
    /// Creates the pipeline and starts its consumer task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(config: ClientConfig, handler: Arc<dyn PacketHandler>) -> Arc<Self> {
        let queue = Arc::new(MessageQueue::new());
        let consumer = tokio::spawn(consume(Arc::clone(&queue), handler));
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Arc::new(Self {
            config,
            queue,
            state: Arc::new(state),
            session: Mutex::new(None),
            cancel: StdMutex::new(None),
            consumer: StdMutex::new(Some(consumer)),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watches connection state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Opens a connection to `addr` (`host:port`).
    ///
    /// A connection left behind by a server-side close is cleaned up first.
    ///
    /// # Errors
    ///
    /// - [`ClientError::AlreadyConnected`] if a connection is open.
    /// - [`ClientError::ConnectTimeout`] / [`ClientError::ConnectFailed`] if
    ///   the server cannot be reached; the state returns to `Disconnected`.
    pub async fn connect(&self, addr: &str) -> Result<(), ClientError> {
        let mut session = self.session.lock().await;

        match self.state() {
            ConnectionState::Connected | ConnectionState::Connecting => {
                return Err(ClientError::AlreadyConnected)
            }
            ConnectionState::Disconnecting => {
                if let Some(stale) = session.take() {
                    self.take_cancel();
                    stale.close().await;
                }
            }
            ConnectionState::Disconnected => {}
        }

        self.state.send_replace(ConnectionState::Connecting);
        debug!(addr, "connecting");

        let stream = match timeout(self.config.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                self.state.send_replace(ConnectionState::Disconnected);
                return Err(ClientError::ConnectFailed {
                    addr: addr.to_string(),
                    source,
                });
            }
            Err(_) => {
                self.state.send_replace(ConnectionState::Disconnected);
                return Err(ClientError::ConnectTimeout {
                    addr: addr.to_string(),
                    timeout: self.config.connect_timeout,
                });
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "set_nodelay failed");
        }

        let (reader, writer) = stream.into_split();
        let (cancel, cancel_rx) = watch::channel(false);
        let cancel = Arc::new(cancel);
        *self.cancel.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&cancel));

        // Published before the receive task starts so that task can move it
        // on to `Disconnecting` if the server hangs up immediately.
        self.state.send_replace(ConnectionState::Connected);
        let receiver = tokio::spawn(receive_loop(
            reader,
            Arc::clone(&self.queue),
            Arc::clone(&self.state),
            cancel_rx,
            self.config.read_buffer_size.max(1),
        ));
        *session = Some(Session {
            writer,
            receiver,
            cancel,
        });

        info!(addr, "connected to server");
        Ok(())
    }

    /// Closes the connection and waits for the receive task to stop.
    ///
    /// Idempotent.  Once this returns no more packets are queued from the
    /// old connection.  A send in progress is abandoned and fails with
    /// [`ClientError::NotConnected`].
    pub async fn disconnect(&self) {
        // Fired before taking the session lock, which a stalled send may hold.
        if let Some(cancel) = self.take_cancel() {
            cancel.send_replace(true);
        }

        let mut session = self.session.lock().await;
        let Some(active) = session.take() else {
            return;
        };

        self.state.send_replace(ConnectionState::Disconnecting);
        active.close().await;
        self.state.send_replace(ConnectionState::Disconnected);
        info!("disconnected from server");
    }

    /// Cleans up after a connection the server closed.
    ///
    /// Returns `true` only if such a connection was released.  It returns
    /// `false`, and leaves everything alone, when the state is no longer
    /// `Disconnecting` by the time the session lock is held: the user
    /// disconnected, or a new connection is already open.
    pub async fn release_if_closed(&self) -> bool {
        let mut session = self.session.lock().await;
        if self.state() != ConnectionState::Disconnecting {
            return false;
        }
        let Some(stale) = session.take() else {
            return false;
        };

        self.take_cancel();
        stale.close().await;
        self.state.send_replace(ConnectionState::Disconnected);
        info!("released connection closed by the server");
        true
    }

    fn take_cancel(&self) -> Option<Arc<watch::Sender<bool>>> {
        self.cancel.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Encodes and sends one request.  Does not wait for the response.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NotConnected`] unless the state is `Connected`.
    /// - [`ClientError::Protocol`] if the payload is too large.
    /// - [`ClientError::Io`] if the socket write fails.
    pub async fn send(
        &self,
        packet_type: PacketType,
        payload: impl Into<Vec<u8>>,
    ) -> Result<(), ClientError> {
        let mut session = self.session.lock().await;
        if self.state() != ConnectionState::Connected {
            return Err(ClientError::NotConnected);
        }
        let active = session.as_mut().ok_or(ClientError::NotConnected)?;

        let packet = build_request(packet_type, payload)?;
        let bytes = encode_packet(&packet);
        let mut cancel = active.cancel.subscribe();
        tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => {
                debug!(packet_type = ?packet_type, "send abandoned by disconnect");
                return Err(ClientError::NotConnected);
            }
            written = active.writer.write_all(&bytes) => written?,
        }
        debug!(packet_type = ?packet_type, length = packet.length(), "sent");
        Ok(())
    }

    /// Sends a request whose payload is `text`.
    ///
    /// # Errors
    ///
    /// Same as [`ClientPipeline::send`].
    pub async fn send_text(&self, packet_type: PacketType, text: &str) -> Result<(), ClientError> {
        self.send(packet_type, text.as_bytes()).await
    }

    /// Asks the server to relay `text` to client `target`.
    ///
    /// # Errors
    ///
    /// Same as [`ClientPipeline::send`].
    pub async fn send_message(&self, target: u8, text: &str) -> Result<(), ClientError> {
        self.send(PacketType::RequestSendMessage, SendMessage::encode(target, text))
            .await
    }

    /// Disconnects, then lets the consumer deliver every packet still queued
    /// and waits for it to stop.
    pub async fn shutdown(&self) {
        self.disconnect().await;
        self.queue.shutdown();

        let consumer = self
            .consumer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(consumer) = consumer {
            if let Err(e) = consumer.await {
                warn!(error = %e, "consumer task failed");
            }
        }
    }
}

impl Drop for ClientPipeline {
    fn drop(&mut self) {
        // Lets the consumer task finish even without an explicit shutdown.
        self.queue.shutdown();
    }
}

/// Resolves once the session is cancelled, or its cancel sender is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|&c| c).await;
}

/// Pops packets until the queue is shut down and empty.
async fn consume(queue: Arc<MessageQueue>, handler: Arc<dyn PacketHandler>) {
    while let Some(packet) = queue.pop().await {
        dispatch(&*handler, packet);
    }
    debug!("consumer stopped");
}

/// Reads packets off `reader` and queues them until cancelled, closed, or
/// the stream becomes unreadable.
///
/// Every ending except cancellation moves a `Connected` state to
/// `Disconnecting`; cancellation comes from `disconnect`, which manages the
/// state itself.
pub(crate) async fn receive_loop<R>(
    mut reader: R,
    queue: Arc<MessageQueue>,
    state: Arc<watch::Sender<ConnectionState>>,
    mut cancel: watch::Receiver<bool>,
    buffer_size: usize,
) -> ReceiveOutcome
where
    R: AsyncRead + Unpin,
{
    let mut frames = FrameReader::new();
    let mut buf = vec![0u8; buffer_size];

    let outcome = 'read: loop {
        let n = tokio::select! {
            biased;
            _ = cancel.changed() => return ReceiveOutcome::Cancelled,
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    info!("server closed the connection");
                    break 'read ReceiveOutcome::Closed;
                }
                Ok(n) => n,
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "read failed");
                    break 'read ReceiveOutcome::ReadFailed;
                }
            },
        };

        for item in frames.feed(&buf[..n]) {
            match item {
                Ok(packet) => {
                    if let Err(e) = queue.push(packet) {
                        warn!(error = %e, "dropping packet");
                    }
                }
                Err(e) if e.is_framing() => {
                    warn!(error = %e, "framing lost; closing connection");
                    break 'read ReceiveOutcome::FramingLost;
                }
                Err(e) => warn!(error = %e, "discarding packet"),
            }
        }
    };

    state.send_if_modified(|current| {
        if *current == ConnectionState::Connected {
            *current = ConnectionState::Disconnecting;
            true
        } else {
            false
        }
    });
    outcome
}

// ── Tests ─────────────────────────────────────────────────────────────────────
