//! Side-by-side comparison of two datasets.

use serde::Serialize;
use tracing::instrument;

use crate::error::{AnalyticsError, Result};
use crate::outcome::Outcome;
use crate::registry::DatasetRegistry;
use crate::stats::{self, round_opt, round_to};
use crate::table::{self, is_numeric_type, Table};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapeComparison {
    pub dataset_a_shape: (usize, usize),
    pub dataset_b_shape: (usize, usize),
    pub row_difference: i64,
    pub column_difference: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericComparison {
    pub mean_a: Option<f64>,
    pub mean_b: Option<f64>,
    pub mean_difference: Option<f64>,
    pub std_a: Option<f64>,
    pub std_b: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnComparison {
    pub column: String,
    pub dtype_a: String,
    pub dtype_b: String,
    pub unique_values_a: usize,
    pub unique_values_b: usize,
    pub null_pct_a: f64,
    pub null_pct_b: f64,
    /// Present only when the column is numerical in both datasets.
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub numeric: Option<NumericComparison>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetComparison {
    pub dataset_a: String,
    pub dataset_b: String,
    pub shape_comparison: ShapeComparison,
    pub common_columns: Vec<String>,
    pub column_comparisons: Vec<ColumnComparison>,
}

fn null_pct(table: &Table, column: &str) -> Result<f64> {
    let rows = table.num_rows();
    if rows == 0 {
        return Ok(0.0);
    }
    let nulls = table::null_count(table.column(column)?.as_ref());
    Ok(round_to(nulls as f64 / rows as f64 * 100.0, 2))
}

fn compare_column(a: &Table, b: &Table, column: &str) -> Result<ColumnComparison> {
    let array_a = a.column(column)?;
    let array_b = b.column(column)?;

    let numeric = if is_numeric_type(array_a.data_type()) && is_numeric_type(array_b.data_type()) {
        let values_a = table::numeric_values(array_a)?;
        let values_b = table::numeric_values(array_b)?;
        let mean_a = stats::mean(&values_a);
        let mean_b = stats::mean(&values_b);
        Some(NumericComparison {
            mean_a: round_opt(mean_a, 3),
            mean_b: round_opt(mean_b, 3),
            mean_difference: round_opt(mean_a.zip(mean_b).map(|(x, y)| x - y), 3),
            std_a: round_opt(stats::std_dev(&values_a), 3),
            std_b: round_opt(stats::std_dev(&values_b), 3),
        })
    } else {
        None
    };

    Ok(ColumnComparison {
        column: column.to_string(),
        dtype_a: array_a.data_type().to_string(),
        dtype_b: array_b.data_type().to_string(),
        unique_values_a: table::distinct_count(array_a)?,
        unique_values_b: table::distinct_count(array_b)?,
        null_pct_a: null_pct(a, column)?,
        null_pct_b: null_pct(b, column)?,
        numeric,
    })
}

async fn compare(
    registry: &DatasetRegistry,
    dataset_a: &str,
    dataset_b: &str,
    columns: Option<&[String]>,
) -> Result<DatasetComparison> {
    let a = registry.get(dataset_a).await?;
    let b = registry.get(dataset_b).await?;

    let common_columns: Vec<String> = match columns {
        Some(requested) => {
            let missing: Vec<&str> = requested
                .iter()
                .filter(|c| !a.has_column(c) || !b.has_column(c))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                return Err(AnalyticsError::invalid(format!(
                    "Columns not present in both datasets: {}",
                    missing.join(", ")
                )));
            }
            requested.to_vec()
        }
        None => a
            .column_names()
            .into_iter()
            .filter(|c| b.has_column(c))
            .collect(),
    };
    if common_columns.is_empty() {
        return Err(AnalyticsError::invalid(
            "No common columns found between datasets to compare.",
        ));
    }

    let column_comparisons = common_columns
        .iter()
        .map(|c| compare_column(&a, &b, c))
        .collect::<Result<Vec<_>>>()?;

    Ok(DatasetComparison {
        dataset_a: dataset_a.to_string(),
        dataset_b: dataset_b.to_string(),
        shape_comparison: ShapeComparison {
            dataset_a_shape: (a.num_rows(), a.num_columns()),
            dataset_b_shape: (b.num_rows(), b.num_columns()),
            row_difference: a.num_rows() as i64 - b.num_rows() as i64,
            column_difference: a.num_columns() as i64 - b.num_columns() as i64,
        },
        common_columns,
        column_comparisons,
    })
}

/// Compares shapes and per-column statistics of two loaded datasets.
#[instrument(skip(registry))]
pub async fn compare_datasets(
    registry: &DatasetRegistry,
    dataset_a: &str,
    dataset_b: &str,
    columns: Option<&[String]>,
) -> Outcome<DatasetComparison> {
    Outcome::from_result(
        compare(registry, dataset_a, dataset_b, columns).await,
        "Dataset comparison failed",
    )
}
