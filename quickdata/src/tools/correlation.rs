//! Pairwise Pearson correlation and feature importance.

pub use matrix::OrderedMatrix;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::{AnalyticsError, Result};
use crate::outcome::Outcome;
use crate::registry::DatasetRegistry;
use crate::stats::{self, round_to};
use crate::table::{self, is_numeric_type, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Strong,
    Moderate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Positive,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationPair {
    pub column1: String,
    pub column2: String,
    pub correlation: f64,
    pub strength: Strength,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationReport {
    pub dataset: String,
    /// Row-major matrix keyed by column name; `None` where undefined.
    pub correlation_matrix: OrderedMatrix,
    pub strong_correlations: Vec<CorrelationPair>,
    pub columns_analyzed: Vec<String>,
    pub threshold: f64,
}

mod matrix {
    use serde::ser::SerializeMap;
    use serde::{Serialize, Serializer};

    /// Square matrix that serializes as nested maps in column order.
    #[derive(Debug, Clone, PartialEq)]
    pub struct OrderedMatrix {
        pub columns: Vec<String>,
        pub values: Vec<Vec<Option<f64>>>,
    }

    impl OrderedMatrix {
        pub fn get(&self, row: &str, column: &str) -> Option<f64> {
            let i = self.columns.iter().position(|c| c == row)?;
            let j = self.columns.iter().position(|c| c == column)?;
            self.values[i][j]
        }
    }

    struct Row<'a>(&'a [String], &'a [Option<f64>]);

    impl Serialize for Row<'_> {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut map = serializer.serialize_map(Some(self.0.len()))?;
            for (name, value) in self.0.iter().zip(self.1) {
                map.serialize_entry(name, value)?;
            }
            map.end()
        }
    }

    impl Serialize for OrderedMatrix {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut map = serializer.serialize_map(Some(self.columns.len()))?;
            for (name, row) in self.columns.iter().zip(&self.values) {
                map.serialize_entry(name, &Row(&self.columns, row))?;
            }
            map.end()
        }
    }
}

/// Resolves the numeric columns to analyze: the caller's selection (missing
/// or non-numeric names dropped) or every numeric column.
fn resolve_numeric_columns(table: &Table, requested: Option<&[String]>) -> Result<Vec<String>> {
    match requested {
        Some(columns) => {
            if columns.len() < 2 {
                return Err(AnalyticsError::invalid(
                    "Correlation analysis requires at least two numerical columns.",
                ));
            }
            let existing: Vec<String> = columns
                .iter()
                .filter(|c| {
                    table
                        .data_type(c)
                        .map(|t| is_numeric_type(&t))
                        .unwrap_or(false)
                })
                .cloned()
                .collect();
            if existing.len() < 2 {
                return Err(AnalyticsError::invalid(
                    "Fewer than two existing numerical columns found for analysis.",
                ));
            }
            Ok(existing)
        }
        None => {
            let numeric = table.numeric_columns();
            if numeric.len() < 2 {
                return Err(AnalyticsError::invalid(
                    "Correlation analysis requires at least two numerical columns.",
                ));
            }
            Ok(numeric)
        }
    }
}

/// Symmetric matrix with a unit diagonal.
pub fn correlation_matrix(table: &Table, columns: &[String]) -> Result<OrderedMatrix> {
    let series = columns
        .iter()
        .map(|c| table::f64_values(table.column(c)?))
        .collect::<Result<Vec<_>>>()?;

    let n = columns.len();
    let mut values = vec![vec![None; n]; n];
    for i in 0..n {
        values[i][i] = Some(1.0);
        for j in (i + 1)..n {
            let r = stats::pearson(&series[i], &series[j]).map(|r| round_to(r, 3));
            values[i][j] = r;
            values[j][i] = r;
        }
    }
    Ok(OrderedMatrix {
        columns: columns.to_vec(),
        values,
    })
}

/// Unordered pairs above `threshold`, strongest first.
pub fn significant_pairs(
    matrix: &OrderedMatrix,
    threshold: f64,
    strong_threshold: f64,
) -> Vec<CorrelationPair> {
    let n = matrix.columns.len();
    let mut pairs = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            let Some(r) = matrix.values[i][j] else { continue };
            if r.abs() <= threshold {
                continue;
            }
            pairs.push(CorrelationPair {
                column1: matrix.columns[i].clone(),
                column2: matrix.columns[j].clone(),
                correlation: r,
                strength: if r.abs() > strong_threshold {
                    Strength::Strong
                } else {
                    Strength::Moderate
                },
                direction: if r > 0.0 {
                    Direction::Positive
                } else {
                    Direction::Negative
                },
            });
        }
    }
    pairs.sort_by(|a, b| b.correlation.abs().total_cmp(&a.correlation.abs()));
    pairs
}

async fn correlations(
    registry: &DatasetRegistry,
    dataset_name: &str,
    columns: Option<&[String]>,
    threshold: f64,
) -> Result<CorrelationReport> {
    let table = registry.get(dataset_name).await?;
    let columns = resolve_numeric_columns(&table, columns)?;
    let matrix = correlation_matrix(&table, &columns)?;
    let strong = significant_pairs(
        &matrix,
        threshold,
        registry.config().strong_correlation_threshold,
    );
    debug!(dataset = dataset_name, pairs = strong.len(), "Computed correlations");

    Ok(CorrelationReport {
        dataset: dataset_name.to_string(),
        correlation_matrix: matrix,
        strong_correlations: strong,
        columns_analyzed: columns,
        threshold,
    })
}

/// Pearson correlations between numerical columns.
#[instrument(skip(registry))]
pub async fn find_correlations(
    registry: &DatasetRegistry,
    dataset_name: &str,
    columns: Option<&[String]>,
    threshold: Option<f64>,
) -> Outcome<CorrelationReport> {
    let threshold = threshold.unwrap_or(registry.config().default_correlation_threshold);
    Outcome::from_result(
        correlations(registry, dataset_name, columns, threshold).await,
        "Correlation analysis failed",
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportanceReport {
    pub dataset: String,
    pub target_column: String,
    /// Features in rank order.
    pub feature_importance: Vec<FeatureImportance>,
    pub top_features: Vec<String>,
    pub method: String,
    pub features_analyzed: usize,
}

async fn feature_importance(
    registry: &DatasetRegistry,
    dataset_name: &str,
    target_column: &str,
    feature_columns: Option<&[String]>,
) -> Result<FeatureImportanceReport> {
    let table = registry.get(dataset_name).await?;
    let target_type = table.data_type(target_column)?;
    if !is_numeric_type(&target_type) {
        return Err(AnalyticsError::invalid(format!(
            "Target column '{target_column}' must be numerical"
        )));
    }

    let features: Vec<String> = match feature_columns {
        Some(columns) => {
            for column in columns {
                table.column(column)?;
            }
            columns
                .iter()
                .filter(|c| c.as_str() != target_column)
                .cloned()
                .collect()
        }
        None => table
            .numeric_columns()
            .into_iter()
            .filter(|c| c != target_column)
            .collect(),
    };
    if features.is_empty() {
        return Err(AnalyticsError::invalid(
            "No numerical feature columns available for importance analysis",
        ));
    }

    let target = table::f64_values(table.column(target_column)?)?;
    let mut scored: Vec<(String, f64)> = Vec::new();
    for feature in &features {
        if !is_numeric_type(&table.data_type(feature)?) {
            continue;
        }
        let values = table::f64_values(table.column(feature)?)?;
        if let Some(r) = stats::pearson(&values, &target) {
            scored.push((feature.clone(), round_to(r.abs(), 4)));
        }
    }
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    let top_count = registry.config().top_feature_count;
    let top_features = scored.iter().take(top_count).map(|(n, _)| n.clone()).collect();
    let feature_importance = scored
        .iter()
        .enumerate()
        .map(|(i, (name, importance))| FeatureImportance {
            feature: name.clone(),
            importance: *importance,
            rank: i + 1,
        })
        .collect();

    Ok(FeatureImportanceReport {
        dataset: dataset_name.to_string(),
        target_column: target_column.to_string(),
        feature_importance,
        top_features,
        method: "correlation_based".to_string(),
        features_analyzed: features.len(),
    })
}

/// Ranks numerical features by absolute correlation with the target.
#[instrument(skip(registry))]
pub async fn calculate_feature_importance(
    registry: &DatasetRegistry,
    dataset_name: &str,
    target_column: &str,
    feature_columns: Option<&[String]>,
) -> Outcome<FeatureImportanceReport> {
    Outcome::from_result(
        feature_importance(registry, dataset_name, target_column, feature_columns).await,
        "Feature importance calculation failed",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{numeric_table, sales_table};

    async fn registry() -> DatasetRegistry {
        let registry = DatasetRegistry::new();
        registry.load_table(numeric_table(), "nums").await.unwrap();
        registry
    }

    #[tokio::test]
    async fn test_matrix_symmetric_unit_diagonal() {
        let registry = registry().await;
        let report = find_correlations(&registry, "nums", None, None)
            .await
            .into_ok()
            .unwrap();
        let m = &report.correlation_matrix;
        for a in &m.columns {
            assert_eq!(m.get(a, a), Some(1.0));
            for b in &m.columns {
                assert_eq!(m.get(a, b), m.get(b, a));
            }
        }
        assert_eq!(m.get("x", "up"), Some(1.0));
        assert_eq!(m.get("x", "down"), Some(-1.0));
        assert_eq!(m.get("x", "flat"), None);
    }

    #[tokio::test]
    async fn test_pairs_have_no_self_or_duplicates() {
        let registry = registry().await;
        let report = find_correlations(&registry, "nums", None, Some(0.3))
            .await
            .into_ok()
            .unwrap();
        assert_eq!(report.strong_correlations.len(), 3);
        for pair in &report.strong_correlations {
            assert_ne!(pair.column1, pair.column2);
            assert_eq!(pair.strength, Strength::Strong);
        }
        let down = report
            .strong_correlations
            .iter()
            .find(|p| p.column2 == "down")
            .unwrap();
        assert_eq!(down.direction, Direction::Negative);
    }

    #[tokio::test]
    async fn test_single_numeric_column_mentions_two() {
        let registry = DatasetRegistry::new();
        let table = sales_table();
        let single = crate::table::Table::try_from_columns(vec![
            ("category", table.column("category").unwrap().clone()),
            ("value", table.column("value").unwrap().clone()),
        ])
        .unwrap();
        registry.load_table(single, "one").await.unwrap();
        let outcome = find_correlations(&registry, "one", None, None).await;
        assert!(outcome.error_message().unwrap().contains("two"));
    }

    #[tokio::test]
    async fn test_requested_columns_filtered() {
        let registry = registry().await;
        let columns = vec!["x".to_string(), "missing".to_string()];
        let outcome = find_correlations(&registry, "nums", Some(&columns), None).await;
        assert_eq!(
            outcome.error_message(),
            Some("Fewer than two existing numerical columns found for analysis.")
        );
    }

    #[tokio::test]
    async fn test_feature_importance_ranks() {
        let registry = registry().await;
        let report = calculate_feature_importance(&registry, "nums", "x", None)
            .await
            .into_ok()
            .unwrap();
        // flat has no defined correlation and is skipped
        assert_eq!(report.feature_importance.len(), 2);
        assert_eq!(report.feature_importance[0].feature, "up");
        assert_eq!(report.feature_importance[0].importance, 1.0);
        assert_eq!(report.feature_importance[1].rank, 2);
        assert_eq!(report.features_analyzed, 3);
        assert!(report.top_features.contains(&"down".to_string()));
    }
}
