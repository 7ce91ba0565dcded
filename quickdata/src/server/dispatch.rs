//! Routes `tools/call` and `prompts/get` to the library functions.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ServerConfig;
use crate::error::{AnalyticsError, Result};
use crate::prompts;
use crate::registry::DatasetRegistry;
use crate::render::{self, ChartRequest};
use crate::resources::{self, ResourceUri};
use crate::tools::{self, MergeConfig};

/// What a tool produced: a JSON document or plain text.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Json(Value),
    Text(String),
}

impl ToolOutput {
    /// Text block carried in the `tools/call` result.
    pub fn into_text(self) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Json(value) => Ok(serde_json::to_string_pretty(&value)?),
        }
    }
}

fn json<T: Serialize>(value: T) -> Result<ToolOutput> {
    Ok(ToolOutput::Json(serde_json::to_value(value)?))
}

fn parse<T: DeserializeOwned>(arguments: Value) -> Result<T> {
    serde_json::from_value(arguments)
        .map_err(|err| AnalyticsError::invalid(format!("Invalid arguments: {err}")))
}

#[derive(Deserialize)]
struct DatasetArgs {
    dataset_name: String,
}

#[derive(Deserialize)]
struct LoadArgs {
    file_path: String,
    dataset_name: String,
    #[serde(default)]
    sample_size: Option<usize>,
}

#[derive(Deserialize)]
struct ColumnArgs {
    dataset_name: String,
    column_name: String,
}

#[derive(Deserialize)]
struct CorrelationArgs {
    dataset_name: String,
    #[serde(default)]
    columns: Option<Vec<String>>,
    #[serde(default)]
    threshold: Option<f64>,
}

#[derive(Deserialize)]
struct SegmentArgs {
    dataset_name: String,
    column_name: String,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    top_n: Option<usize>,
}

#[derive(Deserialize)]
struct OutlierArgs {
    dataset_name: String,
    #[serde(default)]
    columns: Option<Vec<String>>,
    #[serde(default)]
    method: Option<String>,
}

#[derive(Deserialize)]
struct TimeSeriesArgs {
    dataset_name: String,
    date_column: String,
    value_column: String,
    #[serde(default)]
    frequency: Option<String>,
}

#[derive(Deserialize)]
struct CompareArgs {
    dataset_a: String,
    dataset_b: String,
    #[serde(default)]
    common_columns: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct MergeArgs {
    dataset_configs: Vec<MergeConfig>,
    #[serde(default)]
    join_strategy: Option<String>,
}

#[derive(Deserialize)]
struct FeatureArgs {
    dataset_name: String,
    target_column: String,
    #[serde(default)]
    feature_columns: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct CodeArgs {
    dataset_name: String,
    python_code: String,
}

// No save_path: tool callers always write into the charts directory.
#[derive(Deserialize)]
struct ChartArgs {
    dataset_name: String,
    chart_type: String,
    x_column: String,
    #[serde(default)]
    y_column: Option<String>,
    #[serde(default)]
    groupby_column: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

impl ChartArgs {
    fn request(&self) -> ChartRequest {
        ChartRequest {
            chart_type: self.chart_type.clone(),
            x_column: self.x_column.clone(),
            y_column: self.y_column.clone(),
            groupby_column: self.groupby_column.clone(),
            title: self.title.clone(),
            save_path: None,
        }
    }
}

#[derive(Deserialize)]
struct DashboardArgs {
    dataset_name: String,
    chart_configs: Vec<Value>,
}

#[derive(Deserialize)]
struct ExportArgs {
    dataset_name: String,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    include_charts: bool,
}

/// Runs one tool. `Err` is reserved for unknown tools, malformed arguments
/// and hard lookups; analysis problems come back inside the document.
pub async fn call_tool(
    registry: &DatasetRegistry,
    config: &ServerConfig,
    name: &str,
    arguments: Value,
) -> Result<ToolOutput> {
    let arguments = match arguments {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };

    match name {
        "load_dataset" => {
            let a: LoadArgs = parse(arguments)?;
            json(tools::load_dataset(registry, &a.file_path, &a.dataset_name, a.sample_size).await)
        }
        "list_loaded_datasets" => json(tools::list_loaded_datasets(registry).await),
        "get_dataset_info" => {
            let a: DatasetArgs = parse(arguments)?;
            json(tools::get_dataset_info(registry, &a.dataset_name).await)
        }
        "clear_dataset" => {
            let a: DatasetArgs = parse(arguments)?;
            json(tools::clear_dataset(registry, &a.dataset_name).await)
        }
        "clear_all_datasets" => json(tools::clear_all_datasets(registry).await),
        "suggest_analysis" => {
            let a: DatasetArgs = parse(arguments)?;
            json(tools::suggest_analysis(registry, &a.dataset_name).await)
        }
        "analyze_distributions" => {
            let a: ColumnArgs = parse(arguments)?;
            json(tools::analyze_distributions(registry, &a.dataset_name, &a.column_name).await)
        }
        "find_correlations" => {
            let a: CorrelationArgs = parse(arguments)?;
            json(
                tools::find_correlations(registry, &a.dataset_name, a.columns.as_deref(), a.threshold)
                    .await,
            )
        }
        "segment_by_column" => {
            let a: SegmentArgs = parse(arguments)?;
            json(
                tools::segment_by_column(
                    registry,
                    &a.dataset_name,
                    &a.column_name,
                    a.method.as_deref(),
                    a.top_n,
                )
                .await,
            )
        }
        "detect_outliers" => {
            let a: OutlierArgs = parse(arguments)?;
            json(
                tools::detect_outliers(
                    registry,
                    &a.dataset_name,
                    a.columns.as_deref(),
                    a.method.as_deref(),
                )
                .await,
            )
        }
        "time_series_analysis" => {
            let a: TimeSeriesArgs = parse(arguments)?;
            json(
                tools::time_series_analysis(
                    registry,
                    &a.dataset_name,
                    &a.date_column,
                    &a.value_column,
                    a.frequency.as_deref(),
                )
                .await,
            )
        }
        "validate_data_quality" => {
            let a: DatasetArgs = parse(arguments)?;
            json(tools::validate_data_quality(registry, &a.dataset_name).await)
        }
        "compare_datasets" => {
            let a: CompareArgs = parse(arguments)?;
            json(
                tools::compare_datasets(
                    registry,
                    &a.dataset_a,
                    &a.dataset_b,
                    a.common_columns.as_deref(),
                )
                .await,
            )
        }
        "merge_datasets" => {
            let a: MergeArgs = parse(arguments)?;
            json(tools::merge_datasets(registry, &a.dataset_configs, a.join_strategy.as_deref()).await)
        }
        "calculate_feature_importance" => {
            let a: FeatureArgs = parse(arguments)?;
            json(
                tools::calculate_feature_importance(
                    registry,
                    &a.dataset_name,
                    &a.target_column,
                    a.feature_columns.as_deref(),
                )
                .await,
            )
        }
        "memory_optimization_report" => {
            let a: DatasetArgs = parse(arguments)?;
            json(tools::memory_optimization_report(registry, &a.dataset_name).await)
        }
        "execute_custom_analytics_code" => {
            let a: CodeArgs = parse(arguments)?;
            Ok(ToolOutput::Text(
                tools::execute_custom_analytics_code(
                    registry,
                    &config.sandbox,
                    &a.dataset_name,
                    &a.python_code,
                )
                .await,
            ))
        }
        "create_chart" => {
            let a: ChartArgs = parse(arguments)?;
            json(render::create_chart(registry, &config.output, &a.dataset_name, &a.request()).await)
        }
        "generate_dashboard" => {
            let a: DashboardArgs = parse(arguments)?;
            json(
                render::generate_dashboard(registry, &config.output, &a.dataset_name, &a.chart_configs)
                    .await,
            )
        }
        "export_insights" => {
            let a: ExportArgs = parse(arguments)?;
            json(
                render::export_insights(
                    registry,
                    &config.output,
                    &a.dataset_name,
                    a.format.as_deref(),
                    a.include_charts,
                )
                .await,
            )
        }
        mirror if resources::descriptor_for_tool(mirror).is_some() => {
            let Value::Object(arguments) = arguments else {
                return Err(AnalyticsError::invalid("Invalid arguments: expected an object"));
            };
            let uri = ResourceUri::from_mirror(mirror, &arguments)?;
            Ok(ToolOutput::Json(
                resources::read_resource(registry, &config.settings, &uri).await?,
            ))
        }
        unknown => Err(AnalyticsError::invalid(format!("Unknown tool: '{unknown}'"))),
    }
}

fn string_argument<'a>(arguments: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    arguments.get(key).and_then(Value::as_str)
}

fn required_argument<'a>(arguments: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    string_argument(arguments, key)
        .ok_or_else(|| AnalyticsError::invalid(format!("Missing required argument '{key}'")))
}

/// Renders one prompt to markdown.
pub async fn get_prompt(
    registry: &DatasetRegistry,
    name: &str,
    arguments: &Map<String, Value>,
) -> Result<String> {
    let text = match name {
        "dataset_first_look" => {
            prompts::dataset_first_look(registry, required_argument(arguments, "dataset_name")?).await
        }
        "segmentation_workshop" => {
            prompts::segmentation_workshop(registry, required_argument(arguments, "dataset_name")?)
                .await
        }
        "data_quality_assessment" => {
            prompts::data_quality_assessment(registry, required_argument(arguments, "dataset_name")?)
                .await
        }
        "correlation_investigation" => {
            prompts::correlation_investigation(
                registry,
                required_argument(arguments, "dataset_name")?,
            )
            .await
        }
        "pattern_discovery_session" => {
            prompts::pattern_discovery_session(
                registry,
                required_argument(arguments, "dataset_name")?,
            )
            .await
        }
        "insight_generation_workshop" => {
            prompts::insight_generation_workshop(
                registry,
                required_argument(arguments, "dataset_name")?,
                string_argument(arguments, "business_context"),
            )
            .await
        }
        "dashboard_design_consultation" => {
            prompts::dashboard_design_consultation(
                registry,
                required_argument(arguments, "dataset_name")?,
                string_argument(arguments, "audience"),
            )
            .await
        }
        "find_datasources" => {
            prompts::find_datasources(string_argument(arguments, "directory_path").map(Path::new))
                .await
        }
        "list_mcp_assets" => prompts::list_mcp_assets(),
        unknown => return Err(AnalyticsError::invalid(format!("Unknown prompt: '{unknown}'"))),
    };
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::sales_table;
    use serde_json::json;

    async fn loaded() -> DatasetRegistry {
        let registry = DatasetRegistry::new();
        registry.load_table(sales_table(), "sales").await.unwrap();
        registry
    }

    #[tokio::test]
    async fn test_segment_tool_call() {
        let registry = loaded().await;
        let config = ServerConfig::default();
        let output = call_tool(
            &registry,
            &config,
            "segment_by_column",
            json!({"dataset_name": "sales", "column_name": "category"}),
        )
        .await
        .unwrap();
        let ToolOutput::Json(report) = output else { panic!("expected JSON") };
        assert_eq!(report["segment_count"], 3);
    }

    #[tokio::test]
    async fn test_soft_error_is_not_err() {
        let registry = loaded().await;
        let config = ServerConfig::default();
        let output = call_tool(
            &registry,
            &config,
            "find_correlations",
            json!({"dataset_name": "sales", "columns": ["value"]}),
        )
        .await
        .unwrap();
        let ToolOutput::Json(report) = output else { panic!("expected JSON") };
        assert!(report["error"].as_str().unwrap().contains("two"));
    }

    #[tokio::test]
    async fn test_bad_arguments_and_unknown_tool() {
        let registry = DatasetRegistry::new();
        let config = ServerConfig::default();
        let err = call_tool(&registry, &config, "analyze_distributions", json!({"dataset_name": "x"}))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid arguments"));
        let err = call_tool(&registry, &config, "nope", Value::Null).await.unwrap_err();
        assert_eq!(err.to_string(), "Unknown tool: 'nope'");
    }

    #[tokio::test]
    async fn test_mirror_tools() {
        let registry = loaded().await;
        let config = ServerConfig::default();
        let output = call_tool(
            &registry,
            &config,
            "resource_datasets_sample",
            json!({"dataset_name": "sales", "n_rows": 3}),
        )
        .await
        .unwrap();
        let ToolOutput::Json(rows) = output else { panic!("expected JSON") };
        assert_eq!(rows.as_array().unwrap().len(), 3);

        let err = call_tool(
            &registry,
            &config,
            "resource_datasets_summary",
            json!({"dataset_name": "ghost"}),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AnalyticsError::DatasetNotFound { .. }));
    }

    #[tokio::test]
    async fn test_prompts() {
        let registry = loaded().await;
        let args = json!({"dataset_name": "sales"}).as_object().cloned().unwrap();
        let text = get_prompt(&registry, "segmentation_workshop", &args).await.unwrap();
        assert!(text.contains("category"));
        let err = get_prompt(&registry, "dataset_first_look", &Map::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "Missing required argument 'dataset_name'");
        assert!(get_prompt(&registry, "list_mcp_assets", &Map::new())
            .await
            .unwrap()
            .contains("Quick-Data"));
    }
}
