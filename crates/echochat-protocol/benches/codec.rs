//! Codec benchmarks for echochat-protocol.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use echochat_protocol::{codec, OperationTag, Request, Response};
use serde_json::json;

fn bench_encode_publish(c: &mut Criterion) {
    let request = Request::publish("general", "x".repeat(64)).with_id(1);

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Bytes(64));
    group.bench_function("publish_64B", |b| {
        b.iter(|| codec::encode(black_box(&request)))
    });
    group.finish();
}

fn bench_decode_update(c: &mut Criterion) {
    let response = Response::success(
        OperationTag::UpdateTopic,
        json!({"name": "general", "message": "x".repeat(64), "timestamp": "2024-01-01 12:00:00"}),
    );
    let encoded = codec::encode_response(&response).unwrap();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(encoded.len() as u64));
    group.bench_function("update_64B", |b| {
        b.iter(|| {
            let decoded = codec::decode(black_box(&encoded)).unwrap();
            decoded.topic_update().unwrap()
        })
    });
    group.finish();
}

fn bench_decode_topic_list(c: &mut Criterion) {
    let topics: Vec<String> = (0..100).map(|i| format!("topic-{i}")).collect();
    let response = Response::success(OperationTag::ListTopics, json!({ "topic_list": topics }));
    let encoded = codec::encode_response(&response).unwrap();

    c.bench_function("decode_topic_list_100", |b| {
        b.iter(|| {
            let decoded = codec::decode(black_box(&encoded)).unwrap();
            decoded.topic_list().unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_encode_publish,
    bench_decode_update,
    bench_decode_topic_list
);
criterion_main!(benches);
