//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use quickdata::registry::DatasetRegistry;
use quickdata::table::Table;
use tempfile::TempDir;

pub const SALES_CSV: &str = "\
id,category,value
0,A,10.5
1,B,20.0
2,A,15.5
3,C,30.0
4,B,25.5
";

pub const ORDERS_JSON: &str = r#"[
  {"order_id": 1, "customer": "alice", "amount": 120.0, "order_date": "2024-01-05"},
  {"order_id": 2, "customer": "bob", "amount": 80.5, "order_date": "2024-01-19"},
  {"order_id": 3, "customer": "alice", "amount": 42.0, "order_date": "2024-02-02"},
  {"order_id": 4, "customer": "carol", "amount": 310.0, "order_date": "2024-02-16"},
  {"order_id": 5, "customer": "bob", "amount": 99.9, "order_date": "2024-03-01"},
  {"order_id": 6, "customer": "alice", "amount": 65.0, "order_date": "2024-03-15"}
]"#;

/// Writes `contents` to `dir/name` and returns the path.
pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write fixture");
    path
}

/// A temporary directory holding `sales.csv` and `orders.json`.
pub fn data_dir() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "sales.csv", SALES_CSV);
    write_file(dir.path(), "orders.json", ORDERS_JSON);
    dir
}

pub fn sales_table() -> Table {
    Table::try_from_columns(vec![
        ("id", Arc::new(Int64Array::from(vec![0, 1, 2, 3, 4])) as ArrayRef),
        (
            "category",
            Arc::new(StringArray::from(vec!["A", "B", "A", "C", "B"])) as ArrayRef,
        ),
        (
            "value",
            Arc::new(Float64Array::from(vec![10.5, 20.0, 15.5, 30.0, 25.5])) as ArrayRef,
        ),
    ])
    .expect("sales table")
}

pub async fn registry_with_sales() -> DatasetRegistry {
    let registry = DatasetRegistry::new();
    registry
        .load_table(sales_table(), "sales")
        .await
        .expect("load sales");
    registry
}
