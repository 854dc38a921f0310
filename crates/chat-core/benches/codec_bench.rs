//! Criterion benchmarks for the parcel-chat send and receive paths.
//!
//! Measures chunking, record serialization and frame decoding for inputs of
//! the sizes a client actually produces (up to 80 characters per line).
//!
//! Run with:
//! ```bash
//! cargo bench --package chat-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use chat_core::protocol::chunking::split_into_parcels;
use chat_core::protocol::codec::{read_frame, send_parcelled};
use chat_core::protocol::messages::{ChatMessage, MAX_PARCEL_LEN};
use chat_core::protocol::record::{decode_record, serialize_record};

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn short_line() -> String {
    "see you at noon".to_string()
}

fn full_line() -> String {
    "the quick brown fox jumps over the lazy dog while the cat watches it".to_string()
}

fn wordless_line() -> String {
    "x".repeat(80)
}

fn fixtures() -> [(&'static str, String); 3] {
    [
        ("short", short_line()),
        ("full", full_line()),
        ("wordless", wordless_line()),
    ]
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

/// Benchmarks the word-aware splitter alone.
fn bench_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("split_into_parcels");
    for (name, text) in fixtures() {
        group.bench_with_input(BenchmarkId::new("text", name), &text, |b, text| {
            b.iter(|| split_into_parcels(black_box(text), MAX_PARCEL_LEN))
        });
    }
    group.finish();
}

/// Benchmarks chunking + serialization + framing into an in-memory buffer.
fn bench_send_parcelled(c: &mut Criterion) {
    let mut group = c.benchmark_group("send_parcelled");
    for (name, text) in fixtures() {
        let message = ChatMessage::new("192.168.1.20", "alice", &text);
        group.bench_with_input(BenchmarkId::new("text", name), &message, |b, message| {
            b.iter(|| {
                let mut wire = Vec::with_capacity(256);
                send_parcelled(&mut wire, black_box(message), MAX_PARCEL_LEN).unwrap();
                wire
            })
        });
    }
    group.finish();
}

/// Benchmarks the receive path: read one frame and decode its record.
fn bench_receive(c: &mut Criterion) {
    let message = ChatMessage::new("192.168.1.20", "alice", "");
    let record = serialize_record(&message, "the quick brown fox jumps over the");
    let mut wire = Vec::new();
    chat_core::write_frame(&mut wire, record.as_bytes()).unwrap();

    c.bench_function("read_frame+decode_record", |b| {
        b.iter(|| {
            let payload = read_frame(&mut black_box(wire.as_slice())).unwrap().unwrap();
            decode_record(&String::from_utf8_lossy(&payload))
        })
    });
}

criterion_group!(benches, bench_split, bench_send_parcelled, bench_receive);
criterion_main!(benches);
