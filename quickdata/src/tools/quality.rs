//! Data quality scoring.

use serde::Serialize;
use serde_json::Map;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::outcome::Outcome;
use crate::registry::DatasetRegistry;
use crate::stats::round_to;
use crate::table;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataQualityReport {
    pub dataset_name: String,
    pub total_rows: usize,
    pub total_columns: usize,
    /// Missing percentage for columns that have any missing value.
    pub missing_data: Map<String, serde_json::Value>,
    pub duplicate_rows: usize,
    pub potential_issues: Vec<String>,
    /// 0 to 100, one decimal.
    pub quality_score: f64,
    pub recommendations: Vec<String>,
}

/// `100 - penalty * null_fraction - penalty * duplicate_fraction`, clamped.
pub fn quality_score(null_fraction: f64, duplicate_fraction: f64, max_penalty: f64) -> f64 {
    let score = 100.0 - null_fraction * max_penalty - duplicate_fraction * max_penalty;
    round_to(score.clamp(0.0, 100.0), 1)
}

async fn quality(registry: &DatasetRegistry, dataset_name: &str) -> Result<DataQualityReport> {
    let (table, schema) = registry.entry(dataset_name).await?;
    let config = registry.config();
    let rows = table.num_rows();

    let mut missing_data = Map::new();
    let mut high_missing = Vec::new();
    for name in table.column_names() {
        let nulls = table::null_count(table.column(&name)?.as_ref());
        if nulls == 0 {
            continue;
        }
        let pct = round_to(nulls as f64 / rows as f64 * 100.0, 2);
        if pct > config.high_missing_percentage {
            high_missing.push(name.clone());
        }
        missing_data.insert(name, pct.into());
    }
    let duplicate_rows = table.duplicate_row_count()?;

    let mut issues = Vec::new();
    let mut recommendations = Vec::new();
    if duplicate_rows > 0 {
        issues.push(format!("Found {duplicate_rows} duplicate rows."));
        recommendations.push("Consider removing duplicate rows using a data cleaning tool.".to_string());
    }
    if !high_missing.is_empty() {
        issues.push(format!(
            "Columns with >{}% missing data: {}.",
            config.high_missing_percentage,
            high_missing.join(", ")
        ));
        recommendations.push(
            "Investigate data source or consider imputation/removal for high-missing columns."
                .to_string(),
        );
    }
    for column in schema.identifier_columns() {
        let unique = table::distinct_count(table.column(&column)?)?;
        if unique < rows {
            issues.push(format!("Potential ID column '{column}' has duplicate values."));
            recommendations.push(format!("Verify if '{column}' should be a unique identifier."));
        }
    }
    if issues.is_empty() {
        recommendations.push("Data quality appears to be good. No major issues detected.".to_string());
    }

    let cells = rows * table.num_columns();
    let null_fraction = if cells == 0 {
        0.0
    } else {
        table.total_null_count() as f64 / cells as f64
    };
    let duplicate_fraction = if rows == 0 {
        0.0
    } else {
        duplicate_rows as f64 / rows as f64
    };
    let quality_score = quality_score(null_fraction, duplicate_fraction, config.max_quality_penalty);
    debug!(dataset = dataset_name, quality_score, issues = issues.len(), "Scored data quality");

    Ok(DataQualityReport {
        dataset_name: dataset_name.to_string(),
        total_rows: rows,
        total_columns: table.num_columns(),
        missing_data,
        duplicate_rows,
        potential_issues: issues,
        quality_score,
        recommendations,
    })
}

/// Missing data, duplicates and identifier uniqueness rolled into a score.
#[instrument(skip(registry))]
pub async fn validate_data_quality(
    registry: &DatasetRegistry,
    dataset_name: &str,
) -> Outcome<DataQualityReport> {
    Outcome::from_result(
        quality(registry, dataset_name).await,
        "Data quality validation failed",
    )
}
