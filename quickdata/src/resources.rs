//! Read-only resources describing server state and loaded datasets.
//!
//! Each resource is addressed by a URI such as `datasets://sales/schema`.
//! [`ResourceUri`] parses those addresses and [`read_resource`] resolves them
//! against a registry. Most resources report problems softly; the dataset
//! summary and sample are hard lookups and fail with
//! [`AnalyticsError::DatasetNotFound`].

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::config::ServerSettings;
use crate::error::{AnalyticsError, Result};
use crate::outcome::Outcome;
use crate::registry::{DatasetRegistry, DatasetUsage};
use crate::schema::{DatasetSchema, SuggestedAnalysis};
use crate::stats::{round_to, Summary};
use crate::table::numeric_values;
use crate::tools::suggest::{suggestions_for, AnalysisSuggestions, Suggestion};

/// Rows returned by the sample resource when no count is given.
pub const DEFAULT_SAMPLE_ROWS: usize = 5;

pub const SUPPORTED_FORMATS: [&str; 2] = ["csv", "json"];

pub const SUPPORTED_ANALYSES: [&str; 7] = [
    "data_quality",
    "distribution",
    "correlation",
    "segmentation",
    "time_series",
    "outlier_detection",
    "feature_importance",
];

/// Static description of one resource and its tool mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceDescriptor {
    /// URI, or URI template when `parameter` is set.
    pub uri: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// Tool exposing the same data for clients without resource support.
    pub mirror_tool: &'static str,
    /// Placeholder in `uri` filled from the mirror tool's argument of the same name.
    pub parameter: Option<&'static str>,
}

impl ResourceDescriptor {
    pub fn is_template(&self) -> bool {
        self.parameter.is_some()
    }
}

pub const RESOURCES: [ResourceDescriptor; 12] = [
    ResourceDescriptor {
        uri: "datasets://loaded",
        name: "loaded_datasets",
        description: "List of all datasets currently loaded in memory",
        mirror_tool: "resource_datasets_loaded",
        parameter: None,
    },
    ResourceDescriptor {
        uri: "datasets://{dataset_name}/schema",
        name: "dataset_schema",
        description: "Inferred schema of a loaded dataset",
        mirror_tool: "resource_datasets_schema",
        parameter: Some("dataset_name"),
    },
    ResourceDescriptor {
        uri: "datasets://{dataset_name}/summary",
        name: "dataset_summary",
        description: "Statistical summary of a dataset's numerical columns",
        mirror_tool: "resource_datasets_summary",
        parameter: Some("dataset_name"),
    },
    ResourceDescriptor {
        uri: "datasets://{dataset_name}/sample",
        name: "dataset_sample",
        description: "First rows of a dataset",
        mirror_tool: "resource_datasets_sample",
        parameter: Some("dataset_name"),
    },
    ResourceDescriptor {
        uri: "analytics://current_dataset",
        name: "current_dataset",
        description: "The most recently loaded dataset",
        mirror_tool: "resource_analytics_current_dataset",
        parameter: None,
    },
    ResourceDescriptor {
        uri: "analytics://available_analyses",
        name: "available_analyses",
        description: "Analyses applicable to the current dataset",
        mirror_tool: "resource_analytics_available_analyses",
        parameter: None,
    },
    ResourceDescriptor {
        uri: "analytics://column_types",
        name: "column_types",
        description: "Inferred role of every column in the current dataset",
        mirror_tool: "resource_analytics_column_types",
        parameter: None,
    },
    ResourceDescriptor {
        uri: "analytics://suggested_insights",
        name: "suggested_insights",
        description: "Suggested next analyses for the current dataset",
        mirror_tool: "resource_analytics_suggested_insights",
        parameter: None,
    },
    ResourceDescriptor {
        uri: "analytics://memory_usage",
        name: "memory_usage",
        description: "Total memory used by loaded datasets",
        mirror_tool: "resource_analytics_memory_usage",
        parameter: None,
    },
    ResourceDescriptor {
        uri: "config://server",
        name: "server_config",
        description: "Server configuration and capabilities",
        mirror_tool: "resource_config_server",
        parameter: None,
    },
    ResourceDescriptor {
        uri: "users://{user_id}/profile",
        name: "user_profile",
        description: "Example user profile",
        mirror_tool: "resource_users_profile",
        parameter: Some("user_id"),
    },
    ResourceDescriptor {
        uri: "system://status",
        name: "system_status",
        description: "Server health and status",
        mirror_tool: "resource_system_status",
        parameter: None,
    },
];

/// Looks up the resource mirrored by a `resource_*` tool.
pub fn descriptor_for_tool(tool: &str) -> Option<&'static ResourceDescriptor> {
    RESOURCES.iter().find(|r| r.mirror_tool == tool)
}

/// A parsed resource address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceUri {
    LoadedDatasets,
    DatasetSchema(String),
    DatasetSummary(String),
    DatasetSample { dataset_name: String, n_rows: usize },
    CurrentDataset,
    AvailableAnalyses,
    ColumnTypes,
    SuggestedInsights,
    MemoryUsage,
    ServerConfig,
    UserProfile(String),
    SystemStatus,
}

impl ResourceUri {
    /// Builds the address behind a mirror tool from its call arguments.
    ///
    /// `n_rows` is honoured by the sample mirror only.
    pub fn from_mirror(tool: &str, arguments: &Map<String, Value>) -> Result<Self> {
        let descriptor = descriptor_for_tool(tool)
            .ok_or_else(|| AnalyticsError::invalid(format!("Unknown resource tool: '{tool}'")))?;
        let argument = |key: &str| -> Result<String> {
            arguments
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| AnalyticsError::invalid(format!("Missing required argument '{key}'")))
        };
        let uri = match descriptor.parameter {
            Some(key) => descriptor.uri.replace(&format!("{{{key}}}"), &argument(key)?),
            None => descriptor.uri.to_string(),
        };
        let mut parsed: Self = uri.parse()?;
        if let Self::DatasetSample { n_rows, .. } = &mut parsed {
            if let Some(requested) = arguments.get("n_rows").and_then(Value::as_u64) {
                *n_rows = requested as usize;
            }
        }
        Ok(parsed)
    }
}

impl FromStr for ResourceUri {
    type Err = AnalyticsError;

    fn from_str(uri: &str) -> Result<Self> {
        let unknown = || AnalyticsError::invalid(format!("Unknown resource URI: '{uri}'"));
        let (scheme, path) = uri.split_once("://").ok_or_else(unknown)?;
        let parsed = match (scheme, path) {
            ("datasets", "loaded") => Self::LoadedDatasets,
            ("datasets", path) => {
                let (name, leaf) = path.rsplit_once('/').ok_or_else(unknown)?;
                if name.is_empty() {
                    return Err(unknown());
                }
                match leaf {
                    "schema" => Self::DatasetSchema(name.to_string()),
                    "summary" => Self::DatasetSummary(name.to_string()),
                    "sample" => Self::DatasetSample {
                        dataset_name: name.to_string(),
                        n_rows: DEFAULT_SAMPLE_ROWS,
                    },
                    _ => return Err(unknown()),
                }
            }
            ("analytics", "current_dataset") => Self::CurrentDataset,
            ("analytics", "available_analyses") => Self::AvailableAnalyses,
            ("analytics", "column_types") => Self::ColumnTypes,
            ("analytics", "suggested_insights") => Self::SuggestedInsights,
            ("analytics", "memory_usage") => Self::MemoryUsage,
            ("config", "server") => Self::ServerConfig,
            ("system", "status") => Self::SystemStatus,
            ("users", path) => match path.strip_suffix("/profile") {
                Some(id) if !id.is_empty() && !id.contains('/') => Self::UserProfile(id.to_string()),
                _ => return Err(unknown()),
            },
            _ => return Err(unknown()),
        };
        Ok(parsed)
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadedDatasets => f.write_str("datasets://loaded"),
            Self::DatasetSchema(name) => write!(f, "datasets://{name}/schema"),
            Self::DatasetSummary(name) => write!(f, "datasets://{name}/summary"),
            Self::DatasetSample { dataset_name, .. } => write!(f, "datasets://{dataset_name}/sample"),
            Self::CurrentDataset => f.write_str("analytics://current_dataset"),
            Self::AvailableAnalyses => f.write_str("analytics://available_analyses"),
            Self::ColumnTypes => f.write_str("analytics://column_types"),
            Self::SuggestedInsights => f.write_str("analytics://suggested_insights"),
            Self::MemoryUsage => f.write_str("analytics://memory_usage"),
            Self::ServerConfig => f.write_str("config://server"),
            Self::UserProfile(id) => write!(f, "users://{id}/profile"),
            Self::SystemStatus => f.write_str("system://status"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadedDatasets {
    pub datasets: Vec<DatasetUsage>,
    pub total_datasets: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentDataset {
    pub current_dataset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailableAnalyses {
    pub available_analyses: Vec<SuggestedAnalysis>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnTypes {
    /// Column name to role, in table order.
    pub column_types: Map<String, Value>,
}

/// Suggestions for the current dataset, or an empty list when nothing is loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SuggestedInsights {
    Dataset(Outcome<AnalysisSuggestions>),
    Empty { suggestions: Vec<Suggestion> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryUsage {
    pub total_memory_mb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerCapabilities {
    pub server_name: String,
    pub server_version: String,
    pub supported_formats: Vec<&'static str>,
    pub supported_analyses: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub status: String,
    pub preferences: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemStatus {
    pub status: String,
    pub version: String,
    pub datasets_loaded: usize,
    pub total_memory_mb: f64,
}

fn not_found(dataset_name: &str) -> String {
    format!("Dataset '{dataset_name}' not found.")
}

pub async fn loaded_datasets(registry: &DatasetRegistry) -> LoadedDatasets {
    let datasets: Vec<DatasetUsage> = registry
        .memory_usage()
        .await
        .into_iter()
        .map(|usage| DatasetUsage {
            memory_mb: round_to(usage.memory_mb, 2),
            ..usage
        })
        .collect();
    LoadedDatasets {
        total_datasets: datasets.len(),
        datasets,
    }
}

pub async fn dataset_schema(registry: &DatasetRegistry, dataset_name: &str) -> Outcome<DatasetSchema> {
    match registry.schema(dataset_name).await {
        Ok(schema) => Outcome::Ok(schema),
        Err(_) => Outcome::Error(not_found(dataset_name)),
    }
}

/// Count, mean, std, min, quartiles and max for every numeric column.
#[instrument(skip(registry))]
pub async fn dataset_summary(registry: &DatasetRegistry, dataset_name: &str) -> Result<Map<String, Value>> {
    let table = registry.get(dataset_name).await?;
    let mut summary = Map::new();
    for column in table.numeric_columns() {
        let values = numeric_values(table.column(&column)?)?;
        summary.insert(column, serde_json::to_value(Summary::of(&values))?);
    }
    Ok(summary)
}

#[instrument(skip(registry))]
pub async fn dataset_sample(
    registry: &DatasetRegistry,
    dataset_name: &str,
    n_rows: usize,
) -> Result<Vec<Map<String, Value>>> {
    registry.get(dataset_name).await?.to_records(Some(n_rows))
}

pub async fn current_dataset(registry: &DatasetRegistry) -> CurrentDataset {
    match registry.last_loaded().await {
        Some(name) => CurrentDataset {
            current_dataset: Some(name),
            message: None,
        },
        None => CurrentDataset {
            current_dataset: None,
            message: Some("No datasets loaded.".to_string()),
        },
    }
}

/// Resolves an explicit dataset name or falls back to the most recent load.
async fn target_dataset(registry: &DatasetRegistry, dataset_name: Option<&str>) -> Option<String> {
    match dataset_name {
        Some(name) => Some(name.to_string()),
        None => registry.last_loaded().await,
    }
}

pub async fn available_analyses(
    registry: &DatasetRegistry,
    dataset_name: Option<&str>,
) -> Outcome<AvailableAnalyses> {
    let Some(name) = target_dataset(registry, dataset_name).await else {
        return Outcome::Ok(AvailableAnalyses {
            available_analyses: Vec::new(),
        });
    };
    match registry.schema(&name).await {
        Ok(schema) => Outcome::Ok(AvailableAnalyses {
            available_analyses: schema.suggested_analyses,
        }),
        Err(_) => Outcome::Error(not_found(&name)),
    }
}

pub async fn column_types(registry: &DatasetRegistry, dataset_name: Option<&str>) -> Outcome<ColumnTypes> {
    let Some(name) = target_dataset(registry, dataset_name).await else {
        return Outcome::Ok(ColumnTypes {
            column_types: Map::new(),
        });
    };
    match registry.schema(&name).await {
        Ok(schema) => Outcome::Ok(ColumnTypes {
            column_types: schema
                .columns
                .iter()
                .map(|c| (c.name.clone(), Value::from(c.suggested_role.as_str())))
                .collect(),
        }),
        Err(_) => Outcome::Error(not_found(&name)),
    }
}

pub async fn suggested_insights(registry: &DatasetRegistry, dataset_name: Option<&str>) -> SuggestedInsights {
    let Some(name) = target_dataset(registry, dataset_name).await else {
        return SuggestedInsights::Empty {
            suggestions: Vec::new(),
        };
    };
    SuggestedInsights::Dataset(Outcome::from_result(
        registry.schema(&name).await.map(|s| suggestions_for(&s)),
        "Analysis suggestion failed",
    ))
}

pub async fn memory_usage(registry: &DatasetRegistry) -> MemoryUsage {
    let total: f64 = registry.memory_usage().await.iter().map(|u| u.memory_mb).sum();
    MemoryUsage {
        total_memory_mb: round_to(total, 2),
    }
}

pub fn server_config(settings: &ServerSettings) -> ServerCapabilities {
    ServerCapabilities {
        server_name: settings.server_name.clone(),
        server_version: settings.version.clone(),
        supported_formats: SUPPORTED_FORMATS.to_vec(),
        supported_analyses: SUPPORTED_ANALYSES.to_vec(),
    }
}

/// A fixed example profile; there is no user store behind it.
pub fn user_profile(user_id: &str) -> UserProfile {
    UserProfile {
        id: user_id.to_string(),
        name: format!("User {user_id}"),
        email: format!("user.{user_id}@example.com"),
        status: "active".to_string(),
        preferences: Map::new(),
    }
}

pub async fn system_status(registry: &DatasetRegistry, settings: &ServerSettings) -> SystemStatus {
    SystemStatus {
        status: "healthy".to_string(),
        version: settings.version.clone(),
        datasets_loaded: registry.len().await,
        total_memory_mb: memory_usage(registry).await.total_memory_mb,
    }
}

/// Resolves a resource to its JSON document.
///
/// Only the dataset summary and sample can fail; every other resource
/// reports problems inside the document.
#[instrument(skip(registry, settings), fields(uri = %uri))]
pub async fn read_resource(
    registry: &DatasetRegistry,
    settings: &ServerSettings,
    uri: &ResourceUri,
) -> Result<Value> {
    debug!("Reading resource");
    let document = match uri {
        ResourceUri::LoadedDatasets => serde_json::to_value(loaded_datasets(registry).await)?,
        ResourceUri::DatasetSchema(name) => serde_json::to_value(dataset_schema(registry, name).await)?,
        ResourceUri::DatasetSummary(name) => Value::Object(dataset_summary(registry, name).await?),
        ResourceUri::DatasetSample { dataset_name, n_rows } => Value::Array(
            dataset_sample(registry, dataset_name, *n_rows)
                .await?
                .into_iter()
                .map(Value::Object)
                .collect(),
        ),
        ResourceUri::CurrentDataset => serde_json::to_value(current_dataset(registry).await)?,
        ResourceUri::AvailableAnalyses => serde_json::to_value(available_analyses(registry, None).await)?,
        ResourceUri::ColumnTypes => serde_json::to_value(column_types(registry, None).await)?,
        ResourceUri::SuggestedInsights => serde_json::to_value(suggested_insights(registry, None).await)?,
        ResourceUri::MemoryUsage => serde_json::to_value(memory_usage(registry).await)?,
        ResourceUri::ServerConfig => serde_json::to_value(server_config(settings))?,
        ResourceUri::UserProfile(id) => serde_json::to_value(user_profile(id))?,
        ResourceUri::SystemStatus => serde_json::to_value(system_status(registry, settings).await)?,
    };
    Ok(document)
}
