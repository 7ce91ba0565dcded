//! Single-column distribution analysis.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

use crate::error::Result;
use crate::outcome::Outcome;
use crate::registry::DatasetRegistry;
use crate::schema::ColumnRole;
use crate::stats::{self, round_opt};
use crate::table::{self, Table};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quartiles {
    pub q25: Option<f64>,
    pub q50: Option<f64>,
    pub q75: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericDistribution {
    pub distribution_type: &'static str,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub quartiles: Quartiles,
    pub skewness: Option<f64>,
    pub kurtosis: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueCount {
    pub value: Value,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoricalDistribution {
    pub distribution_type: &'static str,
    pub most_frequent: Option<Value>,
    pub frequency_of_most_common: usize,
    pub top_10_values: Vec<ValueCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DistributionDetail {
    Numerical(NumericDistribution),
    Categorical(CategoricalDistribution),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionReport {
    pub dataset: String,
    pub column: String,
    pub dtype: String,
    pub total_values: usize,
    pub unique_values: usize,
    pub null_values: usize,
    pub null_percentage: f64,
    #[serde(flatten)]
    pub detail: DistributionDetail,
}

/// Value counts in descending order; ties keep first-appearance order.
pub fn value_counts(table: &Table, column: &str) -> Result<Vec<ValueCount>> {
    let array = table.column(column)?;
    let keys = table::column_strings(array)?;
    let values = table::column_json_values(array)?;

    let mut order: Vec<(String, Value)> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for (key, value) in keys.into_iter().zip(values) {
        let Some(key) = key else { continue };
        let count = counts.entry(key.clone()).or_insert(0);
        if *count == 0 {
            order.push((key, value));
        }
        *count += 1;
    }

    let mut result: Vec<ValueCount> = order
        .into_iter()
        .map(|(key, value)| ValueCount {
            count: counts[&key],
            value,
        })
        .collect();
    result.sort_by(|a, b| b.count.cmp(&a.count));
    Ok(result)
}

fn numeric_distribution(values: &[f64]) -> NumericDistribution {
    let sorted = stats::sorted(values);
    NumericDistribution {
        distribution_type: "numerical",
        mean: round_opt(stats::mean(values), 3),
        median: round_opt(stats::quantile_sorted(&sorted, 0.5), 3),
        std: round_opt(stats::std_dev(values), 3),
        min: round_opt(sorted.first().copied(), 3),
        max: round_opt(sorted.last().copied(), 3),
        quartiles: Quartiles {
            q25: round_opt(stats::quantile_sorted(&sorted, 0.25), 3),
            q50: round_opt(stats::quantile_sorted(&sorted, 0.5), 3),
            q75: round_opt(stats::quantile_sorted(&sorted, 0.75), 3),
        },
        skewness: round_opt(stats::skewness(values), 3),
        kurtosis: round_opt(stats::kurtosis(values), 3),
    }
}

async fn distribution(
    registry: &DatasetRegistry,
    dataset_name: &str,
    column_name: &str,
    top_n: usize,
) -> Result<DistributionReport> {
    let (table, schema) = registry.entry(dataset_name).await?;
    let array = table.column(column_name)?;
    let info = schema.column(column_name);
    let role = info.map(|c| c.suggested_role);

    let total_values = table.num_rows();
    let null_values = table::null_count(array.as_ref());
    let unique_values = table::distinct_count(array)?;
    let null_percentage = if total_values == 0 {
        0.0
    } else {
        stats::round_to(null_values as f64 / total_values as f64 * 100.0, 2)
    };

    let detail = if role == Some(ColumnRole::Numerical) {
        let values = table::numeric_values(array)?;
        DistributionDetail::Numerical(numeric_distribution(&values))
    } else {
        let counts = value_counts(&table, column_name)?;
        DistributionDetail::Categorical(CategoricalDistribution {
            distribution_type: "categorical",
            most_frequent: counts.first().map(|c| c.value.clone()),
            frequency_of_most_common: counts.first().map_or(0, |c| c.count),
            top_10_values: counts.into_iter().take(top_n).collect(),
        })
    };

    Ok(DistributionReport {
        dataset: dataset_name.to_string(),
        column: column_name.to_string(),
        dtype: array.data_type().to_string(),
        total_values,
        unique_values,
        null_values,
        null_percentage,
        detail,
    })
}

/// Distribution of one column, numerical or categorical by inferred role.
#[instrument(skip(registry))]
pub async fn analyze_distributions(
    registry: &DatasetRegistry,
    dataset_name: &str,
    column_name: &str,
) -> Outcome<DistributionReport> {
    let top_n = registry.config().top_value_count;
    Outcome::from_result(
        distribution(registry, dataset_name, column_name, top_n).await,
        "Distribution analysis failed",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::sales_table;
    use serde_json::json;

    async fn registry() -> DatasetRegistry {
        let registry = DatasetRegistry::new();
        registry.load_table(sales_table(), "sales").await.unwrap();
        registry
    }

    #[tokio::test]
    async fn test_numerical_distribution() {
        let registry = registry().await;
        let report = analyze_distributions(&registry, "sales", "value")
            .await
            .into_ok()
            .unwrap();
        let DistributionDetail::Numerical(numeric) = &report.detail else {
            panic!("expected numerical detail");
        };
        assert_eq!(numeric.mean, Some(20.3));
        assert_eq!(numeric.median, Some(20.0));
        assert_eq!(numeric.min, Some(10.5));
        assert_eq!(numeric.quartiles.q75, Some(25.5));
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["distribution_type"], json!("numerical"));
    }

    #[tokio::test]
    async fn test_categorical_distribution() {
        let registry = registry().await;
        let report = analyze_distributions(&registry, "sales", "category")
            .await
            .into_ok()
            .unwrap();
        let DistributionDetail::Categorical(cat) = &report.detail else {
            panic!("expected categorical detail");
        };
        assert_eq!(cat.most_frequent, Some(json!("A")));
        assert_eq!(cat.frequency_of_most_common, 2);
        assert_eq!(cat.top_10_values.len(), 3);
        assert_eq!(report.unique_values, 3);
    }

    #[tokio::test]
    async fn test_missing_column_is_soft() {
        let registry = registry().await;
        let outcome = analyze_distributions(&registry, "sales", "nope").await;
        assert_eq!(
            outcome.error_message(),
            Some("Column 'nope' not found in dataset")
        );
    }
}
