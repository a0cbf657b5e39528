//! Criterion benchmarks for the Packet-Relay codec and framing reader.
//!
//! Measures encoding and decoding latency for representative payload sizes
//! and the cost of re-framing a stream delivered in small chunks.
//!
//! Run with:
//! ```bash
//! cargo bench --package relay-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use relay_core::protocol::payload::SendMessage;
use relay_core::{decode_packet, encode_packet, FrameReader, Packet, PacketType};

// ── Packet fixtures ───────────────────────────────────────────────────────────

fn make_request_name() -> Packet {
    Packet::new(PacketType::RequestName, Vec::new()).expect("empty payload")
}

fn make_response_time() -> Packet {
    Packet::text(PacketType::ResponseTime, "2026-10-17 12:00:00 UTC").expect("small payload")
}

fn make_client_list_64() -> Packet {
    let list: String = (1..=64)
        .map(|id| format!("Client {id}: 192.168.1.{id}:50{id:03}\n"))
        .collect();
    Packet::text(PacketType::ResponseClientList, &list).expect("list fits")
}

fn make_send_message_4k() -> Packet {
    let text = "x".repeat(4096);
    Packet::new(PacketType::RequestSendMessage, SendMessage::encode(7, &text)).expect("4k fits")
}

fn fixtures() -> Vec<(&'static str, Packet)> {
    vec![
        ("RequestName", make_request_name()),
        ("ResponseTime", make_response_time()),
        ("ClientList(64)", make_client_list_64()),
        ("SendMessage(4k)", make_send_message_4k()),
    ]
}

// ── Benchmark groups ──────────────────────────────────────────────────────────

/// Benchmarks `encode_packet` for each fixture.
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_packet");
    for (name, packet) in fixtures() {
        group.bench_with_input(BenchmarkId::new("packet", name), &packet, |b, packet| {
            b.iter(|| encode_packet(black_box(packet)))
        });
    }
    group.finish();
}

/// Benchmarks `decode_packet` for each fixture from pre-encoded bytes.
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_packet");
    for (name, packet) in fixtures() {
        let bytes = encode_packet(&packet);
        group.bench_with_input(BenchmarkId::new("packet", name), &bytes, |b, bytes| {
            b.iter(|| decode_packet(black_box(bytes)).expect("decode must succeed"))
        });
    }
    group.finish();
}

/// Benchmarks the framing reader on a 100-packet stream cut into fixed-size chunks.
fn bench_framing(c: &mut Criterion) {
    let stream: Vec<u8> = fixtures()
        .iter()
        .cycle()
        .take(100)
        .flat_map(|(_, packet)| encode_packet(packet))
        .collect();

    let mut group = c.benchmark_group("frame_reader");
    for chunk_size in [1usize, 64, 1024, 16 * 1024] {
        group.bench_with_input(
            BenchmarkId::new("chunk", chunk_size),
            &chunk_size,
            |b, &chunk_size| {
                b.iter(|| {
                    let mut reader = FrameReader::new();
                    let mut count = 0usize;
                    for chunk in stream.chunks(chunk_size) {
                        count += reader.feed(black_box(chunk)).filter(Result::is_ok).count();
                    }
                    assert_eq!(count, 100);
                    count
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_framing);
criterion_main!(benches);
