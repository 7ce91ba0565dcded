//! Sequential joins and concatenation of loaded datasets.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use arrow::array::{new_null_array, ArrayRef, BooleanArray, UInt32Array};
use arrow::compute::kernels::zip::zip;
use arrow::compute::{cast, concat, take};
use arrow::datatypes::DataType;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{AnalyticsError, Result};
use crate::outcome::Outcome;
use crate::registry::DatasetRegistry;
use crate::table::{self, is_numeric_type, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinStrategy {
    Inner,
    Left,
    Right,
    Outer,
}

impl FromStr for JoinStrategy {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "inner" => Ok(Self::Inner),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "outer" | "full" => Ok(Self::Outer),
            other => Err(AnalyticsError::invalid(format!(
                "Unsupported join strategy '{other}'. Use 'inner', 'left', 'right' or 'outer'."
            ))),
        }
    }
}

/// One dataset taking part in a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConfig {
    pub dataset_name: String,
    #[serde(default)]
    pub join_column: Option<String>,
}

impl MergeConfig {
    pub fn new(dataset_name: impl Into<String>) -> Self {
        Self {
            dataset_name: dataset_name.into(),
            join_column: None,
        }
    }

    pub fn on(mut self, column: impl Into<String>) -> Self {
        self.join_column = Some(column.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeOperation {
    Join,
    Concatenate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeStep {
    pub merged_with: String,
    pub operation: MergeOperation,
    pub join_column: Option<String>,
    pub rows_before: usize,
    pub rows_after: usize,
    pub rows_gained: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeReport {
    pub status: &'static str,
    pub merged_dataset_name: String,
    pub final_shape: (usize, usize),
    pub merge_strategy: JoinStrategy,
    pub merge_steps: Vec<MergeStep>,
}

/// Row pairs produced by matching join keys; `None` marks the missing side.
fn match_rows(
    left_keys: &[Option<String>],
    right_keys: &[Option<String>],
    strategy: JoinStrategy,
) -> Vec<(Option<u32>, Option<u32>)> {
    fn index(keys: &[Option<String>]) -> HashMap<&str, Vec<u32>> {
        let mut map: HashMap<&str, Vec<u32>> = HashMap::new();
        for (row, key) in keys.iter().enumerate() {
            if let Some(key) = key {
                map.entry(key.as_str()).or_default().push(row as u32);
            }
        }
        map
    }

    let mut pairs = Vec::new();
    if strategy == JoinStrategy::Right {
        let left_index = index(left_keys);
        for (r, key) in right_keys.iter().enumerate() {
            match key.as_deref().and_then(|k| left_index.get(k)) {
                Some(matches) => pairs.extend(matches.iter().map(|&l| (Some(l), Some(r as u32)))),
                None => pairs.push((None, Some(r as u32))),
            }
        }
        return pairs;
    }

    let right_index = index(right_keys);
    let mut matched_right = HashSet::new();
    for (l, key) in left_keys.iter().enumerate() {
        match key.as_deref().and_then(|k| right_index.get(k)) {
            Some(matches) => {
                matched_right.extend(matches.iter().copied());
                pairs.extend(matches.iter().map(|&r| (Some(l as u32), Some(r))));
            }
            None if strategy != JoinStrategy::Inner => pairs.push((Some(l as u32), None)),
            None => {}
        }
    }
    if strategy == JoinStrategy::Outer {
        pairs.extend(
            (0..right_keys.len() as u32)
                .filter(|r| !matched_right.contains(r))
                .map(|r| (None, Some(r))),
        );
    }
    pairs
}

/// Casts both arrays to a shared type: mixed numerics widen to `Float64`,
/// anything else falls back to strings.
fn unify(a: &ArrayRef, b: &ArrayRef) -> Result<(ArrayRef, ArrayRef)> {
    if a.data_type() == b.data_type() {
        return Ok((a.clone(), b.clone()));
    }
    if is_numeric_type(a.data_type()) && is_numeric_type(b.data_type()) {
        return Ok((cast(a, &DataType::Float64)?, cast(b, &DataType::Float64)?));
    }
    if a.data_type() == &DataType::Null {
        return Ok((cast(a, b.data_type())?, b.clone()));
    }
    if b.data_type() == &DataType::Null {
        return Ok((a.clone(), cast(b, a.data_type())?));
    }
    Ok((cast(a, &DataType::Utf8)?, cast(b, &DataType::Utf8)?))
}

fn join_tables(
    left: &Table,
    right: &Table,
    right_name: &str,
    key: &str,
    strategy: JoinStrategy,
) -> Result<Table> {
    let (left_key, right_key) = unify(left.column(key)?, right.column(key)?)?;
    let pairs = match_rows(
        &table::column_strings(&left_key)?,
        &table::column_strings(&right_key)?,
        strategy,
    );
    let left_idx: UInt32Array = pairs.iter().map(|p| p.0).collect();
    let right_idx: UInt32Array = pairs.iter().map(|p| p.1).collect();

    let mut columns: Vec<(String, ArrayRef)> = Vec::new();
    for name in left.column_names() {
        let array = if name == key {
            // key comes from whichever side matched
            let from_left = take(left_key.as_ref(), &left_idx, None)?;
            let from_right = take(right_key.as_ref(), &right_idx, None)?;
            let mask: BooleanArray = pairs.iter().map(|p| Some(p.0.is_some())).collect();
            zip(&mask, &from_left, &from_right)?
        } else {
            take(left.column(&name)?.as_ref(), &left_idx, None)?
        };
        columns.push((name, array));
    }

    let taken: HashSet<String> = columns.iter().map(|(n, _)| n.clone()).collect();
    for name in right.column_names() {
        if name == key {
            continue;
        }
        let array = take(right.column(&name)?.as_ref(), &right_idx, None)?;
        let output_name = if taken.contains(&name) {
            format!("{name}_{right_name}")
        } else {
            name
        };
        columns.push((output_name, array));
    }
    Table::try_from_columns(columns)
}

fn concat_tables(top: &Table, bottom: &Table) -> Result<Table> {
    let mut names = top.column_names();
    names.extend(
        bottom
            .column_names()
            .into_iter()
            .filter(|n| !top.has_column(n)),
    );

    let mut columns = Vec::with_capacity(names.len());
    for name in names {
        let (upper, lower) = match (top.column(&name).ok(), bottom.column(&name).ok()) {
            (Some(u), Some(l)) => unify(u, l)?,
            (Some(u), None) => (u.clone(), new_null_array(u.data_type(), bottom.num_rows())),
            (None, Some(l)) => (new_null_array(l.data_type(), top.num_rows()), l.clone()),
            (None, None) => continue,
        };
        let combined = concat(&[upper.as_ref(), lower.as_ref()])?;
        columns.push((name, combined));
    }
    Table::try_from_columns(columns)
}

async fn merge(
    registry: &DatasetRegistry,
    configs: &[MergeConfig],
    strategy: &str,
) -> Result<MergeReport> {
    let strategy = JoinStrategy::from_str(strategy)?;
    let Some((first, rest)) = configs.split_first().filter(|(_, rest)| !rest.is_empty()) else {
        return Err(AnalyticsError::invalid(
            "Merge operation requires at least two datasets.",
        ));
    };

    let mut merged = registry.get(&first.dataset_name).await?;
    let mut steps = Vec::with_capacity(rest.len());
    for config in rest {
        let next = registry.get(&config.dataset_name).await?;
        let rows_before = merged.num_rows();
        let operation = match &config.join_column {
            Some(key) => {
                if !merged.has_column(key) || !next.has_column(key) {
                    return Err(AnalyticsError::invalid(format!(
                        "Join column '{key}' not found in one or both datasets."
                    )));
                }
                merged = join_tables(&merged, &next, &config.dataset_name, key, strategy)?;
                MergeOperation::Join
            }
            None => {
                merged = concat_tables(&merged, &next)?;
                MergeOperation::Concatenate
            }
        };
        debug!(with = %config.dataset_name, ?operation, rows = merged.num_rows(), "Merge step");
        steps.push(MergeStep {
            merged_with: config.dataset_name.clone(),
            operation,
            join_column: config.join_column.clone(),
            rows_before,
            rows_after: merged.num_rows(),
            rows_gained: merged.num_rows() as i64 - rows_before as i64,
        });
    }

    let merged_name = format!(
        "merged_{}",
        configs
            .iter()
            .map(|c| c.dataset_name.as_str())
            .collect::<Vec<_>>()
            .join("_")
    );
    let final_shape = (merged.num_rows(), merged.num_columns());
    registry.load_table(merged, &merged_name).await?;
    info!(dataset = %merged_name, rows = final_shape.0, "Registered merged dataset");

    Ok(MergeReport {
        status: "success",
        merged_dataset_name: merged_name,
        final_shape,
        merge_strategy: strategy,
        merge_steps: steps,
    })
}

/// Merges two or more datasets left to right and registers the result as
/// `merged_{a}_{b}…`. Steps with a join column join on it; steps without one
/// append rows.
#[instrument(skip(registry))]
pub async fn merge_datasets(
    registry: &DatasetRegistry,
    configs: &[MergeConfig],
    join_strategy: Option<&str>,
) -> Outcome<MergeReport> {
    Outcome::from_result(
        merge(registry, configs, join_strategy.unwrap_or("inner")).await,
        "Dataset merge failed",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::column_ref;
    use arrow::array::{Float64Array, Int64Array, StringArray};

    async fn registry() -> DatasetRegistry {
        let registry = DatasetRegistry::new();
        let customers = Table::try_from_columns(vec![
            ("id", column_ref(Int64Array::from(vec![1, 2, 3]))),
            ("name", column_ref(StringArray::from(vec!["ann", "bo", "cy"]))),
        ])
        .unwrap();
        let orders = Table::try_from_columns(vec![
            ("id", column_ref(Int64Array::from(vec![1, 1, 4]))),
            ("name", column_ref(StringArray::from(vec!["x", "y", "z"]))),
            ("amount", column_ref(Float64Array::from(vec![5.0, 6.0, 7.0]))),
        ])
        .unwrap();
        registry.load_table(customers, "customers").await.unwrap();
        registry.load_table(orders, "orders").await.unwrap();
        registry
    }

    fn configs() -> Vec<MergeConfig> {
        vec![MergeConfig::new("customers"), MergeConfig::new("orders").on("id")]
    }

    #[test]
    fn test_match_rows_strategies() {
        let left = vec![Some("a".to_string()), Some("b".to_string()), None];
        let right = vec![Some("b".to_string()), Some("c".to_string()), None];
        assert_eq!(
            match_rows(&left, &right, JoinStrategy::Inner),
            vec![(Some(1), Some(0))]
        );
        assert_eq!(match_rows(&left, &right, JoinStrategy::Left).len(), 3);
        assert_eq!(
            match_rows(&left, &right, JoinStrategy::Right),
            vec![(Some(1), Some(0)), (None, Some(1)), (None, Some(2))]
        );
        assert_eq!(match_rows(&left, &right, JoinStrategy::Outer).len(), 5);
    }

    #[tokio::test]
    async fn test_inner_join_suffixes_and_registers() {
        let registry = registry().await;
        let report = merge_datasets(&registry, &configs(), None)
            .await
            .into_ok()
            .unwrap();
        assert_eq!(report.merged_dataset_name, "merged_customers_orders");
        assert_eq!(report.final_shape, (2, 4));
        assert_eq!(report.merge_steps[0].rows_gained, -1);

        let merged = registry.get("merged_customers_orders").await.unwrap();
        assert_eq!(merged.column_names(), vec!["id", "name", "name_orders", "amount"]);
    }

    #[tokio::test]
    async fn test_outer_join_keeps_unmatched_keys() {
        let registry = registry().await;
        let report = merge_datasets(&registry, &configs(), Some("outer"))
            .await
            .into_ok()
            .unwrap();
        // 1 matches twice, 2 and 3 unmatched on the left, 4 unmatched on the right
        assert_eq!(report.final_shape.0, 5);
        let merged = registry.get(&report.merged_dataset_name).await.unwrap();
        let ids = table::column_strings(merged.column("id").unwrap()).unwrap();
        assert_eq!(ids.last().unwrap().as_deref(), Some("4"));
    }

    #[tokio::test]
    async fn test_concatenation_without_join_column() {
        let registry = registry().await;
        let configs = vec![MergeConfig::new("customers"), MergeConfig::new("orders")];
        let report = merge_datasets(&registry, &configs, None)
            .await
            .into_ok()
            .unwrap();
        assert_eq!(report.final_shape, (6, 3));
        assert_eq!(report.merge_steps[0].operation, MergeOperation::Concatenate);
        let merged = registry.get(&report.merged_dataset_name).await.unwrap();
        assert_eq!(table::null_count(merged.column("amount").unwrap().as_ref()), 3);
    }

    #[tokio::test]
    async fn test_join_matches_integer_and_float_keys() {
        let registry = DatasetRegistry::new();
        let left = Table::try_from_columns(vec![
            ("id", column_ref(Int64Array::from(vec![1, 2, 3]))),
            ("name", column_ref(StringArray::from(vec!["ann", "bo", "cy"]))),
        ])
        .unwrap();
        let right = Table::try_from_columns(vec![
            ("id", column_ref(Float64Array::from(vec![1.0, 3.0, 4.5]))),
            ("score", column_ref(Float64Array::from(vec![0.5, 0.7, 0.9]))),
        ])
        .unwrap();
        registry.load_table(left, "people").await.unwrap();
        registry.load_table(right, "scores").await.unwrap();

        let configs = vec![MergeConfig::new("people"), MergeConfig::new("scores").on("id")];
        let report = merge_datasets(&registry, &configs, None)
            .await
            .into_ok()
            .unwrap();
        assert_eq!(report.final_shape, (2, 3));
        let merged = registry.get(&report.merged_dataset_name).await.unwrap();
        assert_eq!(merged.data_type("id").unwrap(), DataType::Float64);
    }

    #[tokio::test]
    async fn test_requires_two_datasets() {
        let registry = registry().await;
        let outcome = merge_datasets(&registry, &[MergeConfig::new("customers")], None).await;
        assert_eq!(
            outcome.error_message(),
            Some("Merge operation requires at least two datasets.")
        );
    }
}
