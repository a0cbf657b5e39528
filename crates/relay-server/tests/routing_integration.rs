//! End-to-end tests for the relay server over loopback TCP.
//!
//! Each test starts a real [`RelayServer`] on an ephemeral port and talks to
//! it with plain `TcpStream`s, encoding and decoding with `relay_core`.  They
//! verify:
//!
//! - The greeting and the simple requests (name, time, client list).
//! - Message routing to a live client and to an absent identifier.
//! - That a corrupt stream closes only the offending connection.
//! - That disconnects release registry entries and shutdown joins handlers,
//!   even one stuck writing to a client that never reads.

use std::time::Duration;

use relay_core::protocol::payload::{SendMessage, SEND_NOT_FOUND, SEND_OK};
use relay_core::{encode_packet, FrameReader, Packet, PacketType};
use relay_server::{ClientRegistry, RelayServer, ServerConfig};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const STEP: Duration = Duration::from_secs(5);

// ── Harness ───────────────────────────────────────────────────────────────────

struct Harness {
    addr: std::net::SocketAddr,
    registry: Arc<ClientRegistry>,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl Harness {
    async fn start() -> Self {
        Self::start_with(ServerConfig::default()).await
    }

    async fn start_with(config: ServerConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = RelayServer::new(&config);
        let registry = server.registry();
        let (stop, stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            server
                .run_until(listener, async {
                    let _ = stop_rx.await;
                })
                .await;
        });
        Self {
            addr,
            registry,
            stop: Some(stop),
            task,
        }
    }

    async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        timeout(STEP, self.task).await.expect("server stops").unwrap();
    }

    /// Waits until the registry holds exactly `n` clients.
    async fn wait_for_clients(&self, n: usize) {
        timeout(STEP, async {
            while self.registry.len() != n {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("registry reached expected size");
    }
}

struct TestClient {
    stream: TcpStream,
    frames: FrameReader,
}

impl TestClient {
    /// Connects and consumes the greeting.
    async fn connect(addr: std::net::SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let mut client = Self {
            stream,
            frames: FrameReader::new(),
        };
        let greeting = client.recv().await.expect("greeting");
        assert_eq!(greeting.packet_type(), PacketType::IndicationMessage);
        assert_eq!(greeting.payload(), b"Hello from server");
        client
    }

    async fn send(&mut self, packet_type: PacketType, payload: impl Into<Vec<u8>>) {
        let packet = Packet::new(packet_type, payload).unwrap();
        self.stream.write_all(&encode_packet(&packet)).await.unwrap();
    }

    /// Next packet, or `None` on EOF.
    async fn recv(&mut self) -> Option<Packet> {
        let mut buf = [0u8; 1024];
        timeout(STEP, async {
            loop {
                if let Some(item) = self.frames.feed(&[]).next() {
                    return Some(item.expect("server sent a valid packet"));
                }
                let n = self.stream.read(&mut buf).await.unwrap_or(0);
                if n == 0 {
                    return None;
                }
                if let Some(item) = self.frames.feed(&buf[..n]).next() {
                    return Some(item.expect("server sent a valid packet"));
                }
            }
        })
        .await
        .expect("response within timeout")
    }

    async fn request(&mut self, packet_type: PacketType, payload: impl Into<Vec<u8>>) -> Packet {
        self.send(packet_type, payload).await;
        self.recv().await.expect("response")
    }
}

// ── Simple requests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_name_request_returns_default_name() {
    let harness = Harness::start().await;
    let mut client = TestClient::connect(harness.addr).await;

    let reply = client.request(PacketType::RequestName, Vec::new()).await;

    assert_eq!(reply.packet_type(), PacketType::ResponseName);
    assert_eq!(reply.payload(), b"Server");
    harness.shutdown().await;
}

#[tokio::test]
async fn test_time_request_returns_utc_timestamp() {
    let harness = Harness::start().await;
    let mut client = TestClient::connect(harness.addr).await;

    let reply = client.request(PacketType::RequestTime, Vec::new()).await;

    let text = reply.payload_text();
    assert_eq!(reply.packet_type(), PacketType::ResponseTime);
    assert_eq!(text.len(), "YYYY-MM-DD HH:MM:SS UTC".len());
    assert!(text.ends_with(" UTC"));
    harness.shutdown().await;
}

#[tokio::test]
async fn test_client_list_includes_every_connected_client() {
    let harness = Harness::start().await;
    let mut first = TestClient::connect(harness.addr).await;
    let second = TestClient::connect(harness.addr).await;
    harness.wait_for_clients(2).await;

    let reply = first.request(PacketType::RequestClientList, Vec::new()).await;

    let text = reply.payload_text();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    let first_port = first.stream.local_addr().unwrap().port();
    let second_port = second.stream.local_addr().unwrap().port();
    assert_eq!(lines[0], format!("Client 1: 127.0.0.1:{first_port}"));
    assert_eq!(lines[1], format!("Client 2: 127.0.0.1:{second_port}"));
    harness.shutdown().await;
}

// ── Routing ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_send_message_reaches_target_and_sender_gets_ok() {
    // Arrange
    let harness = Harness::start().await;
    let mut alice = TestClient::connect(harness.addr).await;
    let mut bob = TestClient::connect(harness.addr).await;
    harness.wait_for_clients(2).await;

    // Act: bob was the second client, so its id is 2.
    let status = alice
        .request(PacketType::RequestSendMessage, SendMessage::encode(2, "hello bob"))
        .await;
    let delivered = bob.recv().await.expect("indication");

    // Assert
    assert_eq!(status.packet_type(), PacketType::ResponseSendMessage);
    assert_eq!(status.payload_text(), SEND_OK);
    assert_eq!(delivered.packet_type(), PacketType::IndicationMessage);
    assert_eq!(delivered.payload(), b"hello bob");
    harness.shutdown().await;
}

#[tokio::test]
async fn test_send_message_to_absent_id_reports_not_found() {
    let harness = Harness::start().await;
    let mut alice = TestClient::connect(harness.addr).await;

    let status = alice
        .request(PacketType::RequestSendMessage, SendMessage::encode(200, "anyone?"))
        .await;

    assert_eq!(status.payload_text(), SEND_NOT_FOUND);
    harness.shutdown().await;
}

// ── Error isolation ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_unknown_type_and_stray_responses_are_skipped() {
    let harness = Harness::start().await;
    let mut client = TestClient::connect(harness.addr).await;

    client.stream.write_all(&[8, 0, 0, 0, 0xEE, 0, 0, 0]).await.unwrap();
    client.send(PacketType::ResponseName, "not a request").await;
    let reply = client.request(PacketType::RequestName, Vec::new()).await;

    assert_eq!(reply.packet_type(), PacketType::ResponseName);
    harness.shutdown().await;
}

#[tokio::test]
async fn test_corrupt_stream_closes_only_that_client() {
    // Arrange
    let harness = Harness::start().await;
    let mut bad = TestClient::connect(harness.addr).await;
    let mut good = TestClient::connect(harness.addr).await;
    harness.wait_for_clients(2).await;

    // Act: a declared length larger than any valid packet.
    bad.stream.write_all(&[0xFF, 0xFF, 0xFF, 0x7F, 1, 0, 0, 0]).await.unwrap();

    // Assert
    assert!(bad.recv().await.is_none(), "bad client sees EOF");
    harness.wait_for_clients(1).await;
    let reply = good.request(PacketType::RequestName, Vec::new()).await;
    assert_eq!(reply.payload(), b"Server");
    harness.shutdown().await;
}

// ── Lifecycle ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_disconnect_removes_client_from_list() {
    let harness = Harness::start().await;
    let mut stays = TestClient::connect(harness.addr).await;
    let leaves = TestClient::connect(harness.addr).await;
    harness.wait_for_clients(2).await;

    drop(leaves);
    harness.wait_for_clients(1).await;
    let reply = stays.request(PacketType::RequestClientList, Vec::new()).await;

    assert_eq!(reply.payload_text().lines().count(), 1);
    assert!(reply.payload_text().starts_with("Client 1: "));
    harness.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_closes_connected_clients() {
    let harness = Harness::start().await;
    let mut client = TestClient::connect(harness.addr).await;
    harness.wait_for_clients(1).await;
    let registry = Arc::clone(&harness.registry);

    harness.shutdown().await;

    assert!(client.recv().await.is_none());
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_shutdown_completes_while_a_client_never_reads() {
    // Arrange: large replies fill the socket buffers of a client that only writes.
    let mut config = ServerConfig::default();
    config.server.name = "n".repeat(512 * 1024);
    let harness = Harness::start_with(config).await;
    let mut stalled = TcpStream::connect(harness.addr).await.unwrap();
    let request = encode_packet(&Packet::new(PacketType::RequestName, Vec::new()).unwrap());
    for _ in 0..200 {
        stalled.write_all(&request).await.unwrap();
    }
    harness.wait_for_clients(1).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Act + Assert: `shutdown` fails the test if the server does not stop in time.
    harness.shutdown().await;
}
