//! IQR and z-score outlier detection.

use std::str::FromStr;

use serde::Serialize;
use tracing::instrument;

use crate::config::AnalyticsConfig;
use crate::error::{AnalyticsError, Result};
use crate::outcome::Outcome;
use crate::registry::DatasetRegistry;
use crate::stats::{self, round_to};
use crate::table::{self, is_numeric_type};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierMethod {
    Iqr,
    Zscore,
}

impl FromStr for OutlierMethod {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "iqr" => Ok(Self::Iqr),
            "zscore" | "z-score" => Ok(Self::Zscore),
            other => Err(AnalyticsError::invalid(format!(
                "Unsupported outlier detection method: '{other}'. Use 'iqr' or 'zscore'."
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnOutliers {
    pub column: String,
    pub method: OutlierMethod,
    pub outlier_count: usize,
    pub outlier_percentage: f64,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
    /// First few outlying values in row order.
    pub outlier_values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierReport {
    pub dataset: String,
    pub method: OutlierMethod,
    pub columns_analyzed: Vec<String>,
    pub outliers_by_column: Vec<ColumnOutliers>,
    pub total_outliers: usize,
}

/// Flags values of one column. `values` holds the non-missing entries.
pub fn column_outliers(
    column: &str,
    values: &[f64],
    method: OutlierMethod,
    config: &AnalyticsConfig,
) -> ColumnOutliers {
    let (lower, upper, flagged): (Option<f64>, Option<f64>, Vec<f64>) = match method {
        OutlierMethod::Iqr => {
            let sorted = stats::sorted(values);
            match (
                stats::quantile_sorted(&sorted, 0.25),
                stats::quantile_sorted(&sorted, 0.75),
            ) {
                (Some(q1), Some(q3)) => {
                    let iqr = q3 - q1;
                    let lower = q1 - config.iqr_multiplier * iqr;
                    let upper = q3 + config.iqr_multiplier * iqr;
                    let flagged = values
                        .iter()
                        .copied()
                        .filter(|v| *v < lower || *v > upper)
                        .collect();
                    (Some(lower), Some(upper), flagged)
                }
                _ => (None, None, Vec::new()),
            }
        }
        OutlierMethod::Zscore => match (stats::mean(values), stats::std_dev(values)) {
            (Some(mean), Some(std)) if std > 0.0 => {
                let threshold = config.zscore_threshold;
                let flagged = values
                    .iter()
                    .copied()
                    .filter(|v| ((v - mean) / std).abs() > threshold)
                    .collect();
                (
                    Some(mean - threshold * std),
                    Some(mean + threshold * std),
                    flagged,
                )
            }
            // zero or undefined variance: nothing can be an outlier
            (mean, _) => (mean, mean, Vec::new()),
        },
    };

    let outlier_count = flagged.len();
    let outlier_percentage = if values.is_empty() {
        0.0
    } else {
        round_to(outlier_count as f64 / values.len() as f64 * 100.0, 2)
    };

    ColumnOutliers {
        column: column.to_string(),
        method,
        outlier_count,
        outlier_percentage,
        lower_bound: lower.map(|v| round_to(v, 3)),
        upper_bound: upper.map(|v| round_to(v, 3)),
        outlier_values: flagged
            .into_iter()
            .take(config.outlier_value_limit)
            .collect(),
    }
}

async fn outliers(
    registry: &DatasetRegistry,
    dataset_name: &str,
    columns: Option<&[String]>,
    method: &str,
) -> Result<OutlierReport> {
    let method = OutlierMethod::from_str(method)?;
    let table = registry.get(dataset_name).await?;

    let columns: Vec<String> = match columns {
        Some(requested) => requested
            .iter()
            .filter(|c| {
                table
                    .data_type(c)
                    .map(|t| is_numeric_type(&t))
                    .unwrap_or(false)
            })
            .cloned()
            .collect(),
        None => table.numeric_columns(),
    };
    if columns.is_empty() {
        return Err(AnalyticsError::invalid(
            "No numerical columns found for outlier detection",
        ));
    }

    let mut by_column = Vec::with_capacity(columns.len());
    for column in &columns {
        let values = table::numeric_values(table.column(column)?)?;
        by_column.push(column_outliers(column, &values, method, registry.config()));
    }
    let total_outliers = by_column.iter().map(|c| c.outlier_count).sum();

    Ok(OutlierReport {
        dataset: dataset_name.to_string(),
        method,
        columns_analyzed: columns,
        outliers_by_column: by_column,
        total_outliers,
    })
}

/// Outliers per numerical column using `iqr` (default) or `zscore`.
#[instrument(skip(registry))]
pub async fn detect_outliers(
    registry: &DatasetRegistry,
    dataset_name: &str,
    columns: Option<&[String]>,
    method: Option<&str>,
) -> Outcome<OutlierReport> {
    Outcome::from_result(
        outliers(registry, dataset_name, columns, method.unwrap_or("iqr")).await,
        "Outlier detection failed",
    )
}
