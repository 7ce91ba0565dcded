//! The dataset registry: named tables and their schemas.
//!
//! One `RwLock` guards both mappings so a name is present in one iff it is
//! present in the other. Statistics never run under the lock; callers take a
//! [`Table`] snapshot with [`DatasetRegistry::get`] and work on that.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::config::AnalyticsConfig;
use crate::error::{AnalyticsError, Result};
use crate::outcome::Outcome;
use crate::schema::{DatasetSchema, SchemaInferencer};
use crate::sources::{self, SourceFormat};
use crate::table::Table;

/// Returned by a successful load.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadSummary {
    pub status: String,
    pub dataset_name: String,
    pub rows: usize,
    pub columns: Vec<String>,
    pub format: SourceFormat,
    /// Footprint formatted as `"X.X MB"`.
    pub memory_usage: String,
    pub memory_usage_mb: f64,
}

/// Shape, columns, footprint and schema of one dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetInfo {
    pub name: String,
    pub shape: (usize, usize),
    pub columns: Vec<String>,
    pub memory_usage_mb: f64,
    pub schema: DatasetSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClearStatus {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClearAllStatus {
    pub status: String,
    pub message: String,
    pub cleared: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResampleSummary {
    pub dataset_name: String,
    pub original_rows: usize,
    pub rows: usize,
    pub seed: u64,
}

/// Per-dataset footprint used by listings and the memory resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetUsage {
    pub name: String,
    pub rows: usize,
    pub columns: usize,
    pub memory_mb: f64,
}

#[derive(Debug, Default)]
struct RegistryState {
    order: Vec<String>,
    tables: HashMap<String, Table>,
    schemas: HashMap<String, DatasetSchema>,
    last_loaded: Option<String>,
}

impl RegistryState {
    fn insert(&mut self, name: &str, table: Table, schema: DatasetSchema) {
        if !self.tables.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.tables.insert(name.to_string(), table);
        self.schemas.insert(name.to_string(), schema);
        self.last_loaded = Some(name.to_string());
    }

    fn remove(&mut self, name: &str) -> bool {
        let removed = self.tables.remove(name).is_some();
        self.schemas.remove(name);
        if removed {
            self.order.retain(|n| n != name);
            if self.last_loaded.as_deref() == Some(name) {
                self.last_loaded = self.order.last().cloned();
            }
        }
        removed
    }

    fn clear(&mut self) -> usize {
        let count = self.tables.len();
        self.order.clear();
        self.tables.clear();
        self.schemas.clear();
        self.last_loaded = None;
        count
    }
}

pub(crate) fn format_megabytes(mb: f64) -> String {
    format!("{mb:.1} MB")
}

/// Process-wide store of loaded datasets.
///
/// Cloning yields another handle to the same store.
///
/// # Example
///
/// ```rust,no_run
/// use quickdata::registry::DatasetRegistry;
///
/// # async fn example() -> quickdata::error::Result<()> {
/// let registry = DatasetRegistry::new();
/// let summary = registry.load("data/sales.csv", "sales").await?;
/// println!("{} rows", summary.rows);
///
/// let schema = registry.schema("sales").await?;
/// println!("{:?}", schema.suggested_analyses);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DatasetRegistry {
    state: Arc<RwLock<RegistryState>>,
    config: Arc<AnalyticsConfig>,
    inferencer: Arc<SchemaInferencer>,
}

impl Default for DatasetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self::with_config(AnalyticsConfig::default())
    }

    pub fn with_config(config: AnalyticsConfig) -> Self {
        let inferencer = SchemaInferencer::builder().from_config(&config).build();
        Self {
            state: Arc::new(RwLock::new(RegistryState::default())),
            config: Arc::new(config),
            inferencer: Arc::new(inferencer),
        }
    }

    /// Thresholds shared with the analysis tools.
    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn inferencer(&self) -> &SchemaInferencer {
        &self.inferencer
    }

    /// Loads a `.csv` or `.json` file under `name`, replacing any prior entry.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub async fn load(&self, path: impl AsRef<Path>, name: &str) -> Result<LoadSummary> {
        let path = path.as_ref();
        let source = sources::open(path)?;
        let table = source.read().await?;
        self.insert(name, table, source.format()).await
    }

    /// Registers an already-materialized table under `name`.
    #[instrument(skip(self, table), fields(rows = table.num_rows()))]
    pub async fn load_table(&self, table: Table, name: &str) -> Result<LoadSummary> {
        self.insert(name, table, SourceFormat::InMemory).await
    }

    async fn insert(&self, name: &str, table: Table, format: SourceFormat) -> Result<LoadSummary> {
        let schema = self.inferencer.infer(name, &table)?;
        let memory_mb = table.memory_mb();
        let summary = LoadSummary {
            status: "loaded".to_string(),
            dataset_name: name.to_string(),
            rows: table.num_rows(),
            columns: table.column_names(),
            format,
            memory_usage: format_megabytes(memory_mb),
            memory_usage_mb: memory_mb,
        };

        let mut state = self.state.write().await;
        if state.tables.contains_key(name) {
            warn!(dataset = name, "Replacing previously loaded dataset");
        }
        state.insert(name, table, schema);
        drop(state);

        info!(
            dataset = name,
            rows = summary.rows,
            columns = summary.columns.len(),
            format = format.as_str(),
            "Dataset loaded"
        );
        Ok(summary)
    }

    /// Snapshot of the table registered under `name`.
    pub async fn get(&self, name: &str) -> Result<Table> {
        self.state
            .read()
            .await
            .tables
            .get(name)
            .cloned()
            .ok_or_else(|| AnalyticsError::dataset_not_found(name))
    }

    pub async fn schema(&self, name: &str) -> Result<DatasetSchema> {
        self.state
            .read()
            .await
            .schemas
            .get(name)
            .cloned()
            .ok_or_else(|| AnalyticsError::dataset_not_found(name))
    }

    /// Table and schema read under one lock acquisition.
    pub async fn entry(&self, name: &str) -> Result<(Table, DatasetSchema)> {
        let state = self.state.read().await;
        match (state.tables.get(name), state.schemas.get(name)) {
            (Some(table), Some(schema)) => Ok((table.clone(), schema.clone())),
            _ => Err(AnalyticsError::dataset_not_found(name)),
        }
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.state.read().await.tables.contains_key(name)
    }

    /// Dataset names in insertion order.
    pub async fn list(&self) -> Vec<String> {
        self.state.read().await.order.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.tables.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// The most recently loaded (or replaced) dataset still present.
    pub async fn last_loaded(&self) -> Option<String> {
        self.state.read().await.last_loaded.clone()
    }

    pub async fn info(&self, name: &str) -> Result<DatasetInfo> {
        let (table, schema) = self.entry(name).await?;
        Ok(DatasetInfo {
            name: name.to_string(),
            shape: (table.num_rows(), table.num_columns()),
            columns: table.column_names(),
            memory_usage_mb: table.memory_mb(),
            schema,
        })
    }

    /// Footprint of every dataset, in insertion order.
    pub async fn memory_usage(&self) -> Vec<DatasetUsage> {
        let state = self.state.read().await;
        state
            .order
            .iter()
            .filter_map(|name| {
                state.tables.get(name).map(|table| DatasetUsage {
                    name: name.clone(),
                    rows: table.num_rows(),
                    columns: table.num_columns(),
                    memory_mb: table.memory_mb(),
                })
            })
            .collect()
    }

    /// Removes one dataset. Absence is reported, not raised.
    #[instrument(skip(self))]
    pub async fn clear(&self, name: &str) -> Outcome<ClearStatus> {
        if self.state.write().await.remove(name) {
            info!(dataset = name, "Dataset cleared");
            Outcome::Ok(ClearStatus {
                status: "success".to_string(),
                message: format!("Dataset '{name}' removed from memory"),
            })
        } else {
            Outcome::error(format!("Dataset '{name}' not found"))
        }
    }

    /// Removes every dataset and reports how many there were.
    #[instrument(skip(self))]
    pub async fn clear_all(&self) -> ClearAllStatus {
        let cleared = self.state.write().await.clear();
        info!(cleared, "All datasets cleared");
        ClearAllStatus {
            status: "success".to_string(),
            message: format!("Cleared {cleared} datasets from memory"),
            cleared,
        }
    }

    /// Replaces the table with `n` uniformly sampled rows and recomputes its
    /// schema from scratch. Row order of the survivors is preserved.
    #[instrument(skip(self))]
    pub async fn resample(&self, name: &str, n: usize) -> Result<ResampleSummary> {
        let table = self.get(name).await?;
        let original_rows = table.num_rows();
        if n > original_rows {
            return Err(AnalyticsError::invalid(format!(
                "Cannot sample {n} rows from dataset '{name}' with {original_rows} rows"
            )));
        }

        let seed = self.config.sample_seed;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut indices = rand::seq::index::sample(&mut rng, original_rows, n).into_vec();
        indices.sort_unstable();

        let sampled = table.take_rows(&indices)?;
        let schema = self.inferencer.infer(name, &sampled)?;

        let mut state = self.state.write().await;
        if !state.tables.contains_key(name) {
            return Err(AnalyticsError::dataset_not_found(name));
        }
        state.tables.insert(name.to_string(), sampled);
        state.schemas.insert(name.to_string(), schema);
        drop(state);

        info!(dataset = name, original_rows, rows = n, "Dataset resampled");
        Ok(ResampleSummary {
            dataset_name: name.to_string(),
            original_rows,
            rows: n,
            seed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{numeric_table, sales_table};

    #[tokio::test]
    async fn test_load_table_and_get() {
        let registry = DatasetRegistry::new();
        let summary = registry.load_table(sales_table(), "sales").await.unwrap();
        assert_eq!(summary.status, "loaded");
        assert_eq!(summary.rows, 5);
        assert_eq!(summary.format, SourceFormat::InMemory);
        assert!(summary.memory_usage.ends_with(" MB"));

        let table = registry.get("sales").await.unwrap();
        assert_eq!(table.num_rows(), 5);
        assert_eq!(registry.schema("sales").await.unwrap().row_count, 5);
    }

    #[tokio::test]
    async fn test_any_name_is_a_valid_key() {
        let registry = DatasetRegistry::new();
        for name in ["sales data", "ventes_été", "../q3"] {
            let summary = registry.load_table(sales_table(), name).await.unwrap();
            assert_eq!(summary.dataset_name, name);
            assert_eq!(registry.get(name).await.unwrap().num_rows(), 5);
        }
        assert_eq!(registry.list().await, vec!["sales data", "ventes_été", "../q3"]);
    }

    #[tokio::test]
    async fn test_list_keeps_insertion_order_on_overwrite() {
        let registry = DatasetRegistry::new();
        registry.load_table(sales_table(), "b").await.unwrap();
        registry.load_table(numeric_table(), "a").await.unwrap();
        registry.load_table(numeric_table(), "b").await.unwrap();
        assert_eq!(registry.list().await, vec!["b", "a"]);
        assert_eq!(registry.last_loaded().await.as_deref(), Some("b"));
        assert_eq!(registry.get("b").await.unwrap().num_columns(), 4);
    }

    #[tokio::test]
    async fn test_clear_is_soft_and_get_is_hard() {
        let registry = DatasetRegistry::new();
        registry.load_table(sales_table(), "sales").await.unwrap();
        assert!(registry.clear("sales").await.is_ok());
        assert!(matches!(
            registry.get("sales").await,
            Err(AnalyticsError::DatasetNotFound { .. })
        ));
        let again = registry.clear("sales").await;
        assert_eq!(again.error_message(), Some("Dataset 'sales' not found"));
        assert!(registry.last_loaded().await.is_none());
    }

    #[tokio::test]
    async fn test_clear_all_counts() {
        let registry = DatasetRegistry::new();
        registry.load_table(sales_table(), "one").await.unwrap();
        registry.load_table(sales_table(), "two").await.unwrap();
        let status = registry.clear_all().await;
        assert_eq!(status.cleared, 2);
        assert_eq!(status.message, "Cleared 2 datasets from memory");
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_resample_recomputes_schema() {
        let registry = DatasetRegistry::new();
        registry.load_table(numeric_table(), "nums").await.unwrap();
        let summary = registry.resample("nums", 4).await.unwrap();
        assert_eq!(summary.original_rows, 10);
        assert_eq!(registry.get("nums").await.unwrap().num_rows(), 4);
        assert_eq!(registry.schema("nums").await.unwrap().row_count, 4);
        assert!(registry.resample("nums", 50).await.is_err());
    }

    #[tokio::test]
    async fn test_resample_is_deterministic() {
        let first = DatasetRegistry::new();
        let second = DatasetRegistry::new();
        for registry in [&first, &second] {
            registry.load_table(numeric_table(), "nums").await.unwrap();
            registry.resample("nums", 3).await.unwrap();
        }
        let a = first.get("nums").await.unwrap().to_records(None).unwrap();
        let b = second.get("nums").await.unwrap().to_records(None).unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_unsupported_format_is_hard() {
        let registry = DatasetRegistry::new();
        let result = registry.load("data.xlsx", "x").await;
        assert!(matches!(result, Err(AnalyticsError::UnsupportedFormat { .. })));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_info_reports_shape() {
        let registry = DatasetRegistry::new();
        registry.load_table(sales_table(), "sales").await.unwrap();
        let info = registry.info("sales").await.unwrap();
        assert_eq!(info.shape, (5, 3));
        assert_eq!(info.schema.name, "sales");
        assert!(registry.info("nope").await.is_err());
    }
}
