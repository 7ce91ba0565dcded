//! Benchmarks for schema inference and registry loading.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::time::Duration;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use quickdata::registry::DatasetRegistry;
use quickdata::schema::SchemaInferencer;
use quickdata::table::Table;
use tokio::runtime::Runtime;

const CATEGORIES: [&str; 6] = ["north", "south", "east", "west", "central", "online"];

fn synthetic_table(rows: usize) -> Table {
    let ids: Vec<i64> = (0..rows as i64).collect();
    let amounts: Vec<f64> = (0..rows).map(|i| (i as f64 * 1.37) % 500.0).collect();
    let regions: Vec<&str> = (0..rows).map(|i| CATEGORIES[i % CATEGORIES.len()]).collect();
    let codes: Vec<String> = (0..rows).map(|i| format!("SKU-{i:06}")).collect();
    Table::try_from_columns(vec![
        ("id", Arc::new(Int64Array::from(ids)) as ArrayRef),
        ("amount", Arc::new(Float64Array::from(amounts)) as ArrayRef),
        ("region", Arc::new(StringArray::from(regions)) as ArrayRef),
        ("sku", Arc::new(StringArray::from(codes)) as ArrayRef),
    ])
    .unwrap()
}

fn bench_infer_schema(c: &mut Criterion) {
    let mut group = c.benchmark_group("infer_schema");
    group.measurement_time(Duration::from_secs(8));

    for rows in [100, 1_000, 10_000, 100_000] {
        let table = synthetic_table(rows);
        let inferencer = SchemaInferencer::new();
        group.bench_with_input(BenchmarkId::new("rows", rows), &table, |b, table| {
            b.iter(|| inferencer.infer(std::hint::black_box("bench"), std::hint::black_box(table)));
        });
    }

    group.finish();
}

fn bench_registry_load(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let mut group = c.benchmark_group("registry_load_csv");
    group.measurement_time(Duration::from_secs(10));

    for rows in [1_000, 10_000] {
        let mut csv = String::from("id,amount,region\n");
        for i in 0..rows {
            csv.push_str(&format!(
                "{i},{:.2},{}\n",
                (i as f64 * 1.37) % 500.0,
                CATEGORIES[i % CATEGORIES.len()]
            ));
        }
        let path = dir.path().join(format!("bench_{rows}.csv"));
        std::fs::write(&path, csv).unwrap();

        group.bench_with_input(BenchmarkId::new("rows", rows), &path, |b, path| {
            b.iter(|| {
                rt.block_on(async {
                    let registry = DatasetRegistry::new();
                    registry
                        .load(std::hint::black_box(path), "bench")
                        .await
                        .unwrap()
                })
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_infer_schema, bench_registry_load);
criterion_main!(benches);
