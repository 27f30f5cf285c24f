//! Benchmark suite for field extraction and decoding.
//!
//! Isolates the per-rule hot path from async runtime overhead.

use ble_advert_data::{
    AdvertisementSnapshot, DecodeRule, Endian, MacAddress, RuleId, RuleSpec, SourceType, decode,
    extract,
};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

const TEST_MAC: MacAddress = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

/// RuuviTag V5 style manufacturer payload.
fn snapshot() -> AdvertisementSnapshot {
    let mut snapshot = AdvertisementSnapshot::new(TEST_MAC, -60, 0.0);
    snapshot.manufacturer_data.insert(
        0x0499,
        vec![
            0x05, 0x12, 0xFC, 0x53, 0x94, 0xC3, 0x7C, 0x00, 0x04, 0xFF, 0xFC, 0x04, 0x0C, 0xAC,
            0x36, 0x42, 0x00, 0xCD, 0xCB, 0xB8, 0x33, 0x4C, 0x88, 0x4F,
        ],
    );
    snapshot.service_data.insert(
        "0000180f-0000-1000-8000-00805f9b34fb".to_string(),
        vec![0x57],
    );
    snapshot
}

fn rule(spec: RuleSpec) -> DecodeRule {
    DecodeRule::new(RuleId::from("bench"), spec).unwrap()
}

fn bench_decode_widths(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_width");
    let snapshot = snapshot();

    for length in [1i64, 2, 4, 8, 16, 20] {
        let rule = rule(
            RuleSpec::new("width", SourceType::Manufacturer)
                .source_key("0x0499")
                .offset(1)
                .length(length)
                .signed(true)
                .scale(0.005),
        );
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(length), &rule, |b, rule| {
            b.iter(|| black_box(decode(extract(black_box(&snapshot), rule), rule)))
        });
    }

    group.finish();
}

fn bench_sources(c: &mut Criterion) {
    let mut group = c.benchmark_group("source_lookup");
    let snapshot = snapshot();

    let manufacturer = rule(
        RuleSpec::new("temperature", SourceType::Manufacturer)
            .source_key("1177")
            .offset(1)
            .length(2)
            .signed(true),
    );
    let service_fallback = rule(
        RuleSpec::new("battery", SourceType::Service)
            .source_key("0000180F-0000-1000-8000-00805F9B34FB"),
    );
    let missing = rule(
        RuleSpec::new("missing", SourceType::Manufacturer)
            .source_key("0x004C")
            .length(2)
            .endian(Endian::Little),
    );

    for (name, rule) in [
        ("manufacturer", &manufacturer),
        ("service_lowercase_fallback", &service_fallback),
        ("unavailable", &missing),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| black_box(decode(extract(black_box(&snapshot), rule), rule)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_decode_widths, bench_sources);
criterion_main!(benches);
