//! Benchmarks for the status translation path taken by every switch response.
//!
//! Run with:
//! ```sh
//! cargo bench -p cardpool-core --bench status_bench
//! ```

use cardpool_core::status::{StatusCode, translate};
use cardpool_core::{Payload, RemoteResponse};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::json;
use std::hint::black_box;

fn bench_translate(c: &mut Criterion) {
    let mut group = c.benchmark_group("translate");
    for raw in ["3810000", "0x0183000A", "0xFFFFFFFF", "garbage"] {
        group.bench_with_input(BenchmarkId::from_parameter(raw), raw, |b, raw| {
            b.iter(|| translate(black_box(raw)))
        });
    }
    group.finish();
}

fn bench_extract(c: &mut Criterion) {
    let raw = Payload::Raw(r#"{"imsi":"460001234567890","code":"0x03820001","extra":[1,2,3]}"#.to_string());
    let structured = Payload::Structured(json!({"imsi": "460001234567890", "code": "0x03820001"}));

    c.bench_function("extract_raw", |b| b.iter(|| black_box(&raw).status_code()));
    c.bench_function("extract_structured", |b| {
        b.iter(|| black_box(&structured).status_code())
    });
}

fn bench_decorate_response(c: &mut Criterion) {
    let response: RemoteResponse = serde_json::from_value(json!({
        "code": "3810000",
        "msg": "ok",
        "data": "{\"code\":\"3810000\"}"
    }))
    .expect("valid response");

    c.bench_function("decorate_response", |b| {
        b.iter(|| {
            black_box(&response)
                .status_code()
                .map(|code: StatusCode| code.describe())
        })
    });
}

criterion_group!(benches, bench_translate, bench_extract, bench_decorate_response);
criterion_main!(benches);
