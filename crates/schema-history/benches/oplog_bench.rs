//! Benchmarks for operation registration and chained undo/redo.
//!
//! Run with: cargo bench -p schema-history --bench oplog_bench

use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use schema_history::{
    HistoryConfig, MemoryModel, MemoryObject, ObjectHandle, OperationKind, OperationList,
};

// ============================================================================
// Setup helpers
// ============================================================================

/// Model with `n` tables and a log holding one chained modification per table.
fn setup_chain(
    n: usize,
) -> (
    MemoryModel,
    Vec<ObjectHandle<MemoryObject>>,
    OperationList<MemoryObject>,
) {
    let mut model = MemoryModel::new();
    let tables: Vec<_> = (0..n).map(|i| model.add_table(&format!("t{i}"))).collect();
    let mut list = OperationList::new(HistoryConfig::new(n.max(1))).unwrap();
    list.start_chain();
    for (i, table) in tables.iter().enumerate() {
        list.register_object(&model, table, OperationKind::Modified, None, None)
            .unwrap();
        table.borrow_mut().set_attribute("comment", i.to_string());
    }
    list.finish_chain().unwrap();
    (model, tables, list)
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_register(c: &mut Criterion) {
    let mut group = c.benchmark_group("oplog/register");

    for cap in [16usize, 500] {
        group.bench_with_input(BenchmarkId::new("modified_at_cap", cap), &cap, |b, &cap| {
            let mut model = MemoryModel::new();
            let table = model.add_table("users");
            let mut list = OperationList::new(HistoryConfig::new(cap)).unwrap();
            for _ in 0..cap {
                list.register_object(&model, &table, OperationKind::Modified, None, None)
                    .unwrap();
            }
            b.iter(|| {
                list.register_object(
                    &model,
                    black_box(&table),
                    OperationKind::Modified,
                    None,
                    None,
                )
                .unwrap();
            });
        });
    }

    group.finish();
}

fn bench_chain_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("oplog/chain");

    for n in [10usize, 100] {
        group.bench_with_input(BenchmarkId::new("undo", n), &n, |b, &n| {
            b.iter_batched(
                || setup_chain(n),
                |(mut model, _tables, mut list)| {
                    list.undo_operation(&mut model).unwrap();
                    black_box(list.current_index())
                },
                BatchSize::SmallInput,
            );
        });

        group.bench_with_input(BenchmarkId::new("undo_redo", n), &n, |b, &n| {
            let (mut model, _tables, mut list) = setup_chain(n);
            b.iter(|| {
                list.undo_operation(&mut model).unwrap();
                list.redo_operation(&mut model).unwrap();
                black_box(list.current_index())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_register, bench_chain_round_trip);
criterion_main!(benches);
