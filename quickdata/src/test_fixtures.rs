//! Small in-memory tables shared by unit tests.

use std::sync::Arc;

use arrow::array::{ArrayRef, Date32Array, Float64Array, Int64Array, StringArray};

use crate::table::Table;

/// The five-row `id`/`category`/`value` table used across the suite.
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
    .unwrap()
}

/// Ten rows with perfectly correlated, anti-correlated and constant columns.
pub fn numeric_table() -> Table {
    let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
    let up: Vec<f64> = x.iter().map(|v| 2.0 * v + 1.0).collect();
    let down: Vec<f64> = x.iter().map(|v| -3.0 * v).collect();
    let flat = vec![7.0; 10];
    Table::try_from_columns(vec![
        ("x", Arc::new(Float64Array::from(x)) as ArrayRef),
        ("up", Arc::new(Float64Array::from(up)) as ArrayRef),
        ("down", Arc::new(Float64Array::from(down)) as ArrayRef),
        ("flat", Arc::new(Float64Array::from(flat)) as ArrayRef),
    ])
    .unwrap()
}

/// Daily series of `days` rows starting 2024-01-01 with a rising value.
pub fn daily_series(days: i32) -> Table {
    // 2024-01-01 as days since the epoch
    let start = 19_723;
    let dates: Vec<i32> = (0..days).map(|d| start + d).collect();
    let values: Vec<f64> = (0..days).map(|d| d as f64 * 1.5 + 10.0).collect();
    Table::try_from_columns(vec![
        ("date", Arc::new(Date32Array::from(dates)) as ArrayRef),
        ("sales", Arc::new(Float64Array::from(values)) as ArrayRef),
    ])
    .unwrap()
}
