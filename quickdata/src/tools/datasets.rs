//! Dataset management tools.

use serde::Serialize;
use tracing::{info, instrument};

use crate::outcome::Outcome;
use crate::registry::{
    format_megabytes, ClearAllStatus, ClearStatus, DatasetInfo, DatasetRegistry, DatasetUsage,
    LoadSummary,
};
use crate::stats::round_to;

/// A dataset that loaded, with sampling details when it was down-sampled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadedDataset {
    #[serde(flatten)]
    pub summary: LoadSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_rows: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadFailure {
    pub status: String,
    pub message: String,
}

/// Result of `load_dataset`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LoadResult {
    Loaded(LoadedDataset),
    Failed(LoadFailure),
}

impl LoadResult {
    fn failed(message: String) -> Self {
        Self::Failed(LoadFailure {
            status: "error".to_string(),
            message,
        })
    }

    pub fn summary(&self) -> Option<&LoadSummary> {
        match self {
            Self::Loaded(loaded) => Some(&loaded.summary),
            Self::Failed(_) => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }
}

/// Loads a file, optionally down-sampling it to `sample_size` rows.
///
/// Failures (missing file, unsupported extension) are reported with
/// `status: "error"` instead of aborting the call.
#[instrument(skip(registry))]
pub async fn load_dataset(
    registry: &DatasetRegistry,
    file_path: &str,
    dataset_name: &str,
    sample_size: Option<usize>,
) -> LoadResult {
    let mut summary = match registry.load(file_path, dataset_name).await {
        Ok(summary) => summary,
        Err(err) => return LoadResult::failed(format!("Failed to load dataset: {err}")),
    };

    let wants_sample = sample_size.filter(|&n| n < summary.rows);
    let Some(n) = wants_sample else {
        return LoadResult::Loaded(LoadedDataset {
            summary,
            sampled: None,
            original_rows: None,
        });
    };

    match registry.resample(dataset_name, n).await {
        Ok(resampled) => {
            if let Ok(table) = registry.get(dataset_name).await {
                summary.memory_usage_mb = table.memory_mb();
                summary.memory_usage = format_megabytes(summary.memory_usage_mb);
            }
            summary.rows = resampled.rows;
            info!(dataset = dataset_name, rows = n, "Loaded with sampling");
            LoadResult::Loaded(LoadedDataset {
                summary,
                sampled: Some(true),
                original_rows: Some(resampled.original_rows),
            })
        }
        Err(err) => LoadResult::failed(format!("Failed to sample dataset: {err}")),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetListing {
    pub loaded_datasets: Vec<DatasetUsage>,
    pub total_datasets: usize,
    pub total_memory_mb: f64,
}

pub async fn list_loaded_datasets(registry: &DatasetRegistry) -> Outcome<DatasetListing> {
    let loaded_datasets: Vec<DatasetUsage> = registry
        .memory_usage()
        .await
        .into_iter()
        .map(|usage| DatasetUsage {
            memory_mb: round_to(usage.memory_mb, 1),
            ..usage
        })
        .collect();
    let total_memory_mb = round_to(loaded_datasets.iter().map(|d| d.memory_mb).sum(), 1);
    Outcome::Ok(DatasetListing {
        total_datasets: loaded_datasets.len(),
        loaded_datasets,
        total_memory_mb,
    })
}

pub async fn get_dataset_info(registry: &DatasetRegistry, dataset_name: &str) -> Outcome<DatasetInfo> {
    Outcome::from_result(registry.info(dataset_name).await, "")
}

pub async fn clear_dataset(registry: &DatasetRegistry, dataset_name: &str) -> Outcome<ClearStatus> {
    registry.clear(dataset_name).await
}

pub async fn clear_all_datasets(registry: &DatasetRegistry) -> ClearAllStatus {
    registry.clear_all().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(rows: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "id,group,amount").unwrap();
        for i in 0..rows {
            writeln!(file, "{i},{},{}", ["x", "y"][i % 2], i as f64 * 1.25).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_load_with_sample() {
        let file = write_csv(50);
        let registry = DatasetRegistry::new();
        let result = load_dataset(&registry, file.path().to_str().unwrap(), "d", Some(20)).await;
        let LoadResult::Loaded(LoadedDataset {
            summary,
            sampled,
            original_rows,
        }) = result
        else {
            panic!("expected a loaded result");
        };
        assert_eq!(summary.rows, 20);
        assert_eq!(sampled, Some(true));
        assert_eq!(original_rows, Some(50));
        assert_eq!(registry.schema("d").await.unwrap().row_count, 20);
    }

    #[tokio::test]
    async fn test_sample_larger_than_table_is_ignored() {
        let file = write_csv(5);
        let registry = DatasetRegistry::new();
        let result = load_dataset(&registry, file.path().to_str().unwrap(), "d", Some(100)).await;
        assert_eq!(result.summary().unwrap().rows, 5);
        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("sampled").is_none());
        assert_eq!(value["status"], "loaded");
    }

    #[tokio::test]
    async fn test_load_failure_is_soft() {
        let registry = DatasetRegistry::new();
        let result = load_dataset(&registry, "notes.txt", "n", None).await;
        assert!(!result.is_loaded());
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "error");
        assert!(value["message"].as_str().unwrap().contains("Unsupported file format"));
    }

    #[tokio::test]
    async fn test_listing_totals() {
        let registry = DatasetRegistry::new();
        registry
            .load_table(crate::test_fixtures::sales_table(), "s")
            .await
            .unwrap();
        let listing = list_loaded_datasets(&registry).await.into_ok().unwrap();
        assert_eq!(listing.total_datasets, 1);
        assert_eq!(listing.loaded_datasets[0].rows, 5);
    }
}
