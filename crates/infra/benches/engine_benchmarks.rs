use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use std::sync::Arc;

use pickbay_core::{OperatorId, StoreId};
use pickbay_infra::{
    CreateJob, CreateJobItem, NewLocation, ReceiveRequest, ReconciliationEngine, ScanRequest,
};
use pickbay_infra::InMemoryWarehouseStore;
use pickbay_jobs::JobType;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("failed to build runtime")
}

async fn seeded_engine(
    planned: i64,
) -> (ReconciliationEngine<Arc<InMemoryWarehouseStore>>, pickbay_core::JobId) {
    let engine = ReconciliationEngine::new(Arc::new(InMemoryWarehouseStore::new()));
    let operator = OperatorId::new();

    engine
        .register_location(NewLocation {
            code: "A-01".to_string(),
            is_system: false,
            is_shortage_pool: false,
            is_default: true,
        })
        .await
        .unwrap();

    let (inbound, _) = engine
        .create_job(CreateJob {
            job_type: JobType::Inbound,
            store_id: StoreId::new(),
            parent_id: None,
            allow_overpick: false,
            operator_id: operator,
            items: vec![CreateJobItem {
                sku_code: "SKU-A".to_string(),
                maker_code: None,
                name: "Widget".to_string(),
                qty_planned: planned,
            }],
        })
        .await
        .unwrap();
    engine
        .scan_receive(ReceiveRequest {
            job_id: inbound.id,
            value: "SKU-A".to_string(),
            qty: planned,
            location_code: "A-01".to_string(),
            operator_id: operator,
        })
        .await
        .unwrap();

    let (outbound, _) = engine
        .create_job(CreateJob {
            job_type: JobType::Outbound,
            store_id: StoreId::new(),
            parent_id: None,
            allow_overpick: false,
            operator_id: operator,
            items: vec![CreateJobItem {
                sku_code: "SKU-A".to_string(),
                maker_code: None,
                name: "Widget".to_string(),
                qty_planned: planned,
            }],
        })
        .await
        .unwrap();

    (engine, outbound.id)
}

fn bench_scan_commit_latency(c: &mut Criterion) {
    let rt = runtime();

    c.bench_function("scan_pick_commit", |b| {
        b.iter_batched(
            || rt.block_on(seeded_engine(1_000_000)),
            |(engine, job_id)| {
                rt.block_on(async {
                    engine
                        .scan_pick(ScanRequest {
                            job_id,
                            value: "SKU-A".to_string(),
                            qty: 1,
                            location_code: None,
                            force: false,
                            force_reason: None,
                            operator_id: OperatorId::new(),
                        })
                        .await
                        .unwrap()
                })
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_scan_undo_cycle_throughput(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("scan_undo_cycle");

    for ops in [10u64, 100] {
        group.throughput(Throughput::Elements(ops));
        group.bench_with_input(BenchmarkId::from_parameter(ops), &ops, |b, &ops| {
            b.iter_batched(
                || rt.block_on(seeded_engine(1_000_000)),
                |(engine, job_id)| {
                    rt.block_on(async {
                        let operator = OperatorId::new();
                        for _ in 0..ops {
                            engine
                                .scan_pick(ScanRequest {
                                    job_id,
                                    value: "SKU-A".to_string(),
                                    qty: 1,
                                    location_code: None,
                                    force: false,
                                    force_reason: None,
                                    operator_id: operator,
                                })
                                .await
                                .unwrap();
                        }
                        engine.undo_all(job_id, false, operator).await.unwrap()
                    })
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_scan_commit_latency,
    bench_scan_undo_cycle_throughput
);
criterion_main!(benches);
