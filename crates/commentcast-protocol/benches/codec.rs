//! Codec benchmarks for commentcast-protocol.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use commentcast_protocol::{codec, EventKind};
use serde_json::json;

fn bench_encode_small(c: &mut Criterion) {
    let payload = json!({"id": "c1", "likes": 3});

    let mut group = c.benchmark_group("encode");
    group.bench_function("small_payload", |b| {
        b.iter(|| codec::encode(EventKind::Liked, black_box("post-42"), black_box(&payload)))
    });
    group.finish();
}

fn bench_encode_comment(c: &mut Criterion) {
    let payload = json!({
        "id": "8b0d5c1e-6a3f-4d0e-9c52-1f3c5a7e9b21",
        "post_id": "post-42",
        "user_id": 17,
        "content": "x".repeat(1024),
        "status": "active",
        "metadata": {"likes": 0, "reports": 0},
        "created_at": 1_700_000_000_000u64,
        "updated_at": 1_700_000_000_000u64,
    });
    let encoded = codec::encode(EventKind::Created, "post-42", &payload).unwrap();

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Bytes(encoded.len() as u64));
    group.bench_function("comment_1KB", |b| {
        b.iter(|| codec::encode(EventKind::Created, black_box("post-42"), black_box(&payload)))
    });
    group.finish();
}

criterion_group!(benches, bench_encode_small, bench_encode_comment);
criterion_main!(benches);
