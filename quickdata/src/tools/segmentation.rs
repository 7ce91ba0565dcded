//! Group-by segmentation through DataFusion SQL.

use arrow::array::{ArrayRef, AsArray, RecordBatch};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::{AnalyticsError, Result};
use crate::outcome::Outcome;
use crate::registry::DatasetRegistry;
use crate::security::SqlSecurity;
use crate::stats::round_to;
use crate::table::{self, SQL_TABLE_NAME};

/// Aggregates of one numerical column within a segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnAggregate {
    pub column: String,
    pub mean: Option<f64>,
    pub sum: Option<f64>,
    pub std: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub segment: String,
    pub count: usize,
    pub percentage_of_total: f64,
    pub aggregates: Vec<ColumnAggregate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentationReport {
    pub dataset: String,
    pub segmented_by: String,
    pub segment_count: usize,
    pub total_rows: usize,
    /// Largest segments first.
    pub segments: Vec<Segment>,
}

fn string_values(column: &ArrayRef) -> Result<Vec<Option<String>>> {
    let strings = cast(column, &DataType::Utf8)?;
    Ok(strings
        .as_string::<i32>()
        .iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

fn float_values(column: &ArrayRef) -> Result<Vec<Option<f64>>> {
    let floats = cast(column, &DataType::Float64)?;
    Ok(floats
        .as_primitive::<Float64Type>()
        .iter()
        .map(|v| v.filter(|f| !f.is_nan()))
        .collect())
}

fn count_values(column: &ArrayRef) -> Result<Vec<usize>> {
    let counts = cast(column, &DataType::Int64)?;
    Ok(counts
        .as_primitive::<Int64Type>()
        .iter()
        .map(|v| v.unwrap_or(0).max(0) as usize)
        .collect())
}

/// Builds the aggregation query over the registered `data` table.
fn segmentation_sql(group_column: &str, numeric_columns: &[String], top_n: usize) -> Result<String> {
    let group = SqlSecurity::quote_identifier(group_column)?;
    let mut inner = vec![format!("CAST({group} AS VARCHAR) AS segment")];
    let mut outer = vec!["segment".to_string(), "COUNT(*) AS segment_count".to_string()];
    for (i, column) in numeric_columns.iter().enumerate() {
        let quoted = SqlSecurity::quote_identifier(column)?;
        inner.push(format!("CAST({quoted} AS DOUBLE) AS c{i}"));
        outer.push(format!("AVG(c{i}) AS mean_{i}"));
        outer.push(format!("SUM(c{i}) AS sum_{i}"));
        outer.push(format!("STDDEV(c{i}) AS std_{i}"));
    }
    Ok(format!(
        "SELECT {} FROM (SELECT {} FROM {SQL_TABLE_NAME} WHERE {group} IS NOT NULL) AS grouped \
         GROUP BY segment ORDER BY segment_count DESC, segment ASC LIMIT {top_n}",
        outer.join(", "),
        inner.join(", "),
    ))
}

fn segments_from_batches(
    batches: &[RecordBatch],
    numeric_columns: &[String],
    total_rows: usize,
) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    for batch in batches {
        let names = string_values(batch.column(0))?;
        let counts = count_values(batch.column(1))?;
        let aggregates = (0..numeric_columns.len())
            .map(|i| {
                let base = 2 + i * 3;
                Ok((
                    float_values(batch.column(base))?,
                    float_values(batch.column(base + 1))?,
                    float_values(batch.column(base + 2))?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        for row in 0..batch.num_rows() {
            let count = counts[row];
            let percentage_of_total = if total_rows == 0 {
                0.0
            } else {
                round_to(count as f64 / total_rows as f64 * 100.0, 2)
            };
            segments.push(Segment {
                segment: names[row].clone().unwrap_or_default(),
                count,
                percentage_of_total,
                aggregates: numeric_columns
                    .iter()
                    .zip(&aggregates)
                    .map(|(column, (means, sums, stds))| ColumnAggregate {
                        column: column.clone(),
                        mean: means[row].map(|v| round_to(v, 3)),
                        sum: sums[row].map(|v| round_to(v, 3)),
                        std: stds[row].map(|v| round_to(v, 3)),
                    })
                    .collect(),
            });
        }
    }
    Ok(segments)
}

async fn segment(
    registry: &DatasetRegistry,
    dataset_name: &str,
    column_name: &str,
    top_n: usize,
) -> Result<SegmentationReport> {
    let table = registry.get(dataset_name).await?;
    let group_array = table.column(column_name)?;

    let max_cardinality = registry.config().max_segment_cardinality;
    let distinct = table::distinct_count(group_array)?;
    if distinct > max_cardinality {
        return Err(AnalyticsError::invalid(format!(
            "Column '{column_name}' has {distinct} unique values (more than {max_cardinality}). \
             Segmentation is impractical for high-cardinality columns."
        )));
    }

    let numeric_columns: Vec<String> = table
        .numeric_columns()
        .into_iter()
        .filter(|c| c != column_name)
        .collect();

    let sql = segmentation_sql(column_name, &numeric_columns, top_n)?;
    debug!(sql = %sql, "Running segmentation query");

    let ctx = table.session_context()?;
    let batches = ctx.sql(&sql).await?.collect().await?;
    let segments = segments_from_batches(&batches, &numeric_columns, table.num_rows())?;

    Ok(SegmentationReport {
        dataset: dataset_name.to_string(),
        segmented_by: column_name.to_string(),
        segment_count: segments.len(),
        total_rows: table.num_rows(),
        segments,
    })
}

/// Groups rows by a low-cardinality column and aggregates every numerical
/// column per group, keeping the `top_n` largest groups.
///
/// `method` is accepted for interface compatibility; grouping is always by
/// exact value.
#[instrument(skip(registry))]
pub async fn segment_by_column(
    registry: &DatasetRegistry,
    dataset_name: &str,
    column_name: &str,
    method: Option<&str>,
    top_n: Option<usize>,
) -> Outcome<SegmentationReport> {
    let top_n = top_n.unwrap_or(registry.config().default_top_segments);
    Outcome::from_result(
        segment(registry, dataset_name, column_name, top_n).await,
        "Segmentation failed",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::sales_table;

    #[tokio::test]
    async fn test_five_row_scenario() {
        let registry = DatasetRegistry::new();
        registry.load_table(sales_table(), "sales").await.unwrap();
        let report = segment_by_column(&registry, "sales", "category", None, None)
            .await
            .into_ok()
            .unwrap();

        assert_eq!(report.segment_count, 3);
        let names: Vec<_> = report.segments.iter().map(|s| s.segment.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        let counts: Vec<_> = report.segments.iter().map(|s| s.count).collect();
        assert_eq!(counts, vec![2, 2, 1]);
        let pct: f64 = report.segments.iter().map(|s| s.percentage_of_total).sum();
        assert!((pct - 100.0).abs() < 1e-9);

        let a_value = report.segments[0]
            .aggregates
            .iter()
            .find(|a| a.column == "value")
            .unwrap();
        assert_eq!(a_value.mean, Some(13.0));
        assert_eq!(a_value.sum, Some(26.0));
        // single-row segment has no sample deviation
        let c_value = &report.segments[2].aggregates[1];
        assert_eq!(c_value.std, None);
    }

    #[tokio::test]
    async fn test_top_n_limits_segments() {
        let registry = DatasetRegistry::new();
        registry.load_table(sales_table(), "sales").await.unwrap();
        let report = segment_by_column(&registry, "sales", "category", None, Some(1))
            .await
            .into_ok()
            .unwrap();
        assert_eq!(report.segment_count, 1);
        assert_eq!(report.segments[0].segment, "A");
    }

    #[tokio::test]
    async fn test_high_cardinality_rejected() {
        let config = crate::config::AnalyticsConfig::builder()
            .max_segment_cardinality(2)
            .build()
            .unwrap();
        let registry = DatasetRegistry::with_config(config);
        registry.load_table(sales_table(), "sales").await.unwrap();
        let outcome = segment_by_column(&registry, "sales", "category", None, None).await;
        assert!(outcome.error_message().unwrap().contains("impractical"));
    }

    #[test]
    fn test_sql_quotes_identifiers() {
        let sql = segmentation_sql("my \"col\"", &["v".to_string()], 5).unwrap();
        assert!(sql.contains("CAST(\"my \"\"col\"\"\" AS VARCHAR)"));
        assert!(sql.contains("STDDEV(c0)"));
        assert!(sql.ends_with("LIMIT 5"));
    }
}
