// Receipt validation and scoring benchmarks
//
// Run with: cargo bench
// View reports: target/criterion/report/index.html

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use receipt_points::state::ReceiptStore;
use receipt_points::{Receipt, compute, validate_receipt};
use serde_json::{Value, json};
use std::sync::Arc;

fn receipt_with_items(count: usize) -> Value {
    let items: Vec<Value> = (0..count)
        .map(|i| {
            json!({
                "shortDescription": format!("Item number {i}"),
                "price": format!("{}.{:02}", i + 1, (i * 7) % 100),
            })
        })
        .collect();
    json!({
        "retailer": "M&M Corner Market",
        "purchaseDate": "2022-03-21",
        "purchaseTime": "14:33",
        "total": "123.25",
        "items": items,
    })
}

// =============================================================================
// 1. VALIDATION
// =============================================================================

fn bench_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate_receipt");

    for count in [1, 10, 100, 1000] {
        let value = receipt_with_items(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &value, |b, value| {
            b.iter(|| black_box(validate_receipt(black_box(value))));
        });
    }

    let mut invalid = receipt_with_items(1000);
    invalid["items"][999]["price"] = json!("1.5");
    group.bench_function("last_item_invalid", |b| {
        b.iter(|| black_box(validate_receipt(black_box(&invalid))));
    });

    group.finish();
}

// =============================================================================
// 2. SCORING
// =============================================================================

fn bench_compute(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute");

    for count in [1, 10, 100, 1000] {
        let receipt = Receipt::from_json(receipt_with_items(count)).expect("valid receipt");
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &receipt, |b, receipt| {
            b.iter(|| black_box(compute(black_box(receipt))));
        });
    }

    group.finish();
}

// =============================================================================
// 3. STORE
// =============================================================================

fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("receipt_store");
    let receipt = Receipt::from_json(receipt_with_items(5)).expect("valid receipt");

    group.bench_function("insert", |b| {
        let store = ReceiptStore::new();
        b.iter(|| black_box(store.insert(receipt.clone())));
    });

    group.bench_function("lookup_hit", |b| {
        let store = Arc::new(ReceiptStore::new());
        let id = store.insert(receipt.clone()).to_string();
        b.iter(|| black_box(store.lookup(black_box(&id)).is_ok()));
    });

    group.bench_function("lookup_malformed", |b| {
        let store = ReceiptStore::new();
        b.iter(|| black_box(store.lookup(black_box("not-a-receipt-id")).is_err()));
    });

    group.finish();
}

criterion_group!(benches, bench_validation, bench_compute, bench_store);
criterion_main!(benches);
