use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;
use std::thread;

use stockledger_core::{ExpectedVersion, OrderId, ProductId, UserId, Versioned};
use stockledger_infra::engine::Stores;
use stockledger_infra::notify::Notifier;
use stockledger_infra::store::{CatalogProduct, InMemoryCatalog};
use stockledger_infra::{InventoryConfig, InventoryEngine, RetryPolicy};
use stockledger_inventory::StockThresholds;

fn thresholds() -> StockThresholds {
    StockThresholds {
        min_stock_level: 5,
        reorder_point: 20,
        reorder_quantity: 50,
        max_stock_level: 1_000,
    }
}

fn engine_with_product(physical: i64) -> (InventoryEngine, ProductId) {
    let engine = InventoryEngine::in_memory(InventoryConfig::default());
    let product_id = ProductId::new();
    engine
        .register_product(product_id, "BENCH-SKU", physical, thresholds(), UserId::new())
        .unwrap();
    (engine, product_id)
}

fn bench_ledger_updates(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_updates");

    // Raw compare-and-swap against the current version.
    group.bench_function("apply_delta_exact_version", |b| {
        let (engine, product_id) = engine_with_product(1_000_000);
        b.iter(|| {
            let version = engine.ledger.get_stock(product_id).unwrap().version();
            engine
                .ledger
                .apply_delta(product_id, black_box(1), 0, ExpectedVersion::Exact(version))
                .unwrap();
        });
    });

    // Full service path: ledger, reservation record, audit, event, alert check.
    group.bench_function("reserve_then_cancel", |b| {
        let (engine, product_id) = engine_with_product(1_000_000);
        let actor = UserId::new();
        b.iter(|| {
            let order_id = OrderId::new();
            engine
                .reservations
                .reserve(product_id, order_id, black_box(3), actor)
                .unwrap();
            engine.reservations.cancel(product_id, order_id, actor).unwrap();
        });
    });

    group.finish();
}

fn bench_contended_reservations(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_reservations");
    group.sample_size(20);

    for threads in [2usize, 4, 8] {
        let per_thread = 50;
        group.throughput(Throughput::Elements((threads * per_thread) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            let config = InventoryConfig::default().with_retry(RetryPolicy::exponential(
                50,
                std::time::Duration::from_micros(50),
                std::time::Duration::from_millis(2),
            ));
            b.iter(|| {
                let engine = InventoryEngine::in_memory(config.clone());
                let product_id = ProductId::new();
                engine
                    .register_product(product_id, "HOT-SKU", 1_000_000, thresholds(), UserId::new())
                    .unwrap();
                let engine = Arc::new(engine);

                let handles: Vec<_> = (0..threads)
                    .map(|_| {
                        let engine = Arc::clone(&engine);
                        thread::spawn(move || {
                            for _ in 0..per_thread {
                                let _ = engine
                                    .reservations
                                    .reserve(product_id, OrderId::new(), 1, UserId::new());
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().unwrap();
                }
            });
        });
    }

    group.finish();
}

fn bench_consistency_report(c: &mut Criterion) {
    let mut group = c.benchmark_group("consistency_report");

    for products in [100usize, 1_000] {
        let catalog = Arc::new(InMemoryCatalog::new());
        let engine = InventoryEngine::new(
            Stores::in_memory_with_catalog(catalog.clone()),
            InventoryConfig::default(),
            Arc::new(stockledger_core::SystemClock),
            Notifier::default(),
        );
        for i in 0..products {
            let product_id = ProductId::new();
            let physical = (i % 50) as i64;
            engine
                .register_product(product_id, format!("SKU-{i:05}"), physical, thresholds(), UserId::new())
                .unwrap();
            catalog.upsert(CatalogProduct {
                product_id,
                sku: format!("SKU-{i:05}"),
                name: format!("Product {i}"),
                legacy_stock_quantity: Some(physical + (i % 3) as i64),
                unit_cost: Some(400),
                unit_price: Some(650),
            })
            .unwrap();
        }

        group.throughput(Throughput::Elements(products as u64));
        group.bench_with_input(BenchmarkId::from_parameter(products), &products, |b, _| {
            b.iter(|| black_box(engine.reconciler.run().unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_ledger_updates,
    bench_contended_reservations,
    bench_consistency_report
);
criterion_main!(benches);
