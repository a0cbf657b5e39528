//! RelayServer: TCP accept loop and per-connection handlers.
//!
//! # Task layout (for beginners)
//!
//! ```text
//! run_until()                         (one task)
//!  ├─ accept ──► register ──► spawn serve_connection()   (one task per client)
//!  ├─ reap finished handler tasks
//!  └─ on shutdown: signal every handler, then join them all
//! ```
//!
//! Handler tasks live in a [`JoinSet`] owned by the accept loop, so none of
//! them outlives [`RelayServer::run_until`].  A handler watches the stop
//! signal while it reads *and* while it writes, so a client that stops
//! reading cannot hold up shutdown.  Handlers still running after
//! [`SHUTDOWN_GRACE`] are aborted.
//!
//! Each handler owns a [`FrameReader`] for its socket.  Decoded packets go to
//! the [`Dispatcher`] one at a time, so responses leave in request order.
//! A packet that frames correctly but cannot be interpreted is dropped and
//! the connection carries on.  Once the byte stream itself is corrupt there is
//! no way to find the next packet boundary, so the connection is closed.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use relay_core::{CodecError, FrameReader, Packet, PacketType};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::application::dispatch::Dispatcher;
use crate::application::registry::{ClientRegistry, PacketSink, Registration};
use crate::error::RouterError;
use crate::infrastructure::network::sink::TcpSink;
use crate::infrastructure::storage::config::ServerConfig;

/// How long handlers get to finish after the stop signal before they are aborted.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Shared state every connection handler needs.
struct Shared {
    registry: Arc<ClientRegistry>,
    dispatcher: Dispatcher,
    greeting: String,
    read_buffer_size: usize,
}

/// The relay server.  Cheap to clone; clones share one registry.
#[derive(Clone)]
pub struct RelayServer {
    shared: Arc<Shared>,
}

impl RelayServer {
    pub fn new(config: &ServerConfig) -> Self {
        let registry = Arc::new(ClientRegistry::new());
        let dispatcher = Dispatcher::new(Arc::clone(&registry), config.server.name.clone());
        Self::with_dispatcher(registry, dispatcher, config)
    }

    /// Builds a server around an existing registry and dispatcher.
    pub fn with_dispatcher(
        registry: Arc<ClientRegistry>,
        dispatcher: Dispatcher,
        config: &ServerConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry,
                dispatcher,
                greeting: config.server.greeting.clone(),
                read_buffer_size: config.network.read_buffer_size.max(1),
            }),
        }
    }

    pub fn registry(&self) -> Arc<ClientRegistry> {
        Arc::clone(&self.shared.registry)
    }

    /// Binds the listening socket described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Bind`] if the address is invalid or in use.
    pub async fn bind(config: &ServerConfig) -> Result<TcpListener, RouterError> {
        let addr = config.listen_addr();
        TcpListener::bind(&addr)
            .await
            .map_err(|source| RouterError::Bind { addr, source })
    }

    /// Accepts connections until `shutdown` completes, then stops every
    /// handler and waits for them to finish.
    pub async fn run_until<F>(&self, listener: TcpListener, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        if let Ok(local) = listener.local_addr() {
            info!(addr = %local, "relay server listening");
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut handlers = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                accepted = listener.accept() => {
                    self.handle_accept_result(accepted, &mut handlers, &stop_rx);
                }
                Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
                    log_join_result(joined);
                }
            }
        }

        stop_tx.send_replace(true);
        let drained = timeout(SHUTDOWN_GRACE, async {
            while let Some(joined) = handlers.join_next().await {
                log_join_result(joined);
            }
        })
        .await;
        if drained.is_err() {
            warn!(remaining = handlers.len(), "handlers did not stop in time; aborting");
            handlers.abort_all();
            while let Some(joined) = handlers.join_next().await {
                log_join_result(joined);
            }
        }
        info!("relay server stopped");
    }

    fn handle_accept_result(
        &self,
        accepted: io::Result<(TcpStream, SocketAddr)>,
        handlers: &mut JoinSet<()>,
        stop_rx: &watch::Receiver<bool>,
    ) {
        let (stream, peer) = match accepted {
            Ok(pair) => pair,
            Err(err) => {
                warn!(error = ?err, "accept failed");
                return;
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer = %peer, error = %e, "set_nodelay failed");
        }

        let (reader, writer) = stream.into_split();
        let sink: Arc<dyn PacketSink> = Arc::new(TcpSink::new(writer));
        let registration = match self.shared.registry.register(peer, Arc::clone(&sink)) {
            Ok(reg) => reg,
            Err(e) => {
                warn!(peer = %peer, error = %e, "rejecting connection");
                handlers.spawn(async move { sink.close().await });
                return;
            }
        };

        info!(session = %registration.id, peer = %peer, "client connected");
        let shared = Arc::clone(&self.shared);
        let stop_rx = stop_rx.clone();
        handlers.spawn(async move {
            serve_connection(shared, reader, sink, registration, peer, stop_rx).await;
        });
    }
}

/// Runs one connection until EOF, a fatal error, or shutdown, then removes
/// its registry entry.
async fn serve_connection<R>(
    shared: Arc<Shared>,
    mut reader: R,
    sink: Arc<dyn PacketSink>,
    registration: Registration,
    peer: SocketAddr,
    mut stop_rx: watch::Receiver<bool>,
) where
    R: AsyncRead + Unpin,
{
    let session = registration.id;

    match Packet::text(PacketType::IndicationMessage, &shared.greeting) {
        Ok(greeting) => {
            tokio::select! {
                sent = sink.send(&greeting) => {
                    if let Err(e) = sent {
                        warn!(session = %session, error = %e, "greeting failed");
                    }
                }
                _ = stopped(&mut stop_rx) => {
                    finish_connection(&shared, &*sink, registration, peer).await;
                    return;
                }
            }
        }
        Err(e) => error!(error = %e, "configured greeting does not fit in a packet"),
    }

    let mut frames = FrameReader::new();
    let mut buf = vec![0u8; shared.read_buffer_size];

    'conn: loop {
        let n = tokio::select! {
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    debug!(session = %session, "peer closed the connection");
                    break;
                }
                Ok(n) => n,
                Err(e) if matches!(e.kind(), io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock) => continue,
                Err(e) => {
                    warn!(session = %session, error = %e, "read failed");
                    break;
                }
            },
            _ = stopped(&mut stop_rx) => break,
        };

        let decoded: Vec<Result<Packet, CodecError>> = frames.feed(&buf[..n]).collect();
        for item in decoded {
            match item {
                Ok(packet) => {
                    // A peer that stops reading blocks the write, so the stop
                    // signal is watched here as well.
                    tokio::select! {
                        handled = handle_packet(&shared, &*sink, registration, packet) => {
                            if let Err(e) = handled {
                                warn!(session = %session, error = %e, "could not reply; closing");
                                break 'conn;
                            }
                        }
                        _ = stopped(&mut stop_rx) => {
                            debug!(session = %session, "stopped while replying");
                            break 'conn;
                        }
                    }
                }
                Err(e) if e.is_framing() => {
                    warn!(session = %session, error = %e, "framing lost; closing");
                    break 'conn;
                }
                Err(e) => warn!(session = %session, error = %e, "discarding packet"),
            }
        }
    }

    finish_connection(&shared, &*sink, registration, peer).await;
}

/// Removes the connection's own registry entry and closes its socket.
async fn finish_connection(
    shared: &Shared,
    sink: &dyn PacketSink,
    registration: Registration,
    peer: SocketAddr,
) {
    if shared.registry.remove(registration.id, registration.generation).is_some() {
        info!(session = %registration.id, peer = %peer, "client disconnected");
    }
    sink.close().await;
}

/// Resolves once the stop flag is set, or its sender is gone.
async fn stopped(stop_rx: &mut watch::Receiver<bool>) {
    let _ = stop_rx.wait_for(|&stop| stop).await;
}

/// Dispatches one packet and writes the response, if any.
///
/// Protocol errors are logged and swallowed; only a failed write is returned.
async fn handle_packet(
    shared: &Shared,
    sink: &dyn PacketSink,
    registration: Registration,
    packet: Packet,
) -> Result<(), RouterError> {
    let session = registration.id;
    debug!(session = %session, packet_type = ?packet.packet_type(), "request");

    let response = match shared.dispatcher.handle(session, packet).await {
        Ok(Some(response)) => response,
        Ok(None) => return Ok(()),
        Err(e) => {
            warn!(session = %session, error = %e, "discarding request");
            return Ok(());
        }
    };

    sink.send(&response)
        .await
        .map_err(|source| RouterError::Send { session, source })
}

fn log_join_result(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!(error = %e, "connection handler panicked");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
