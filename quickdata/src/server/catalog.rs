//! Tool and prompt listings advertised by `tools/list` and `prompts/list`.

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::{json, Value};

use crate::resources::RESOURCES;

#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

fn tool(name: &str, description: &str, properties: Value, required: &[&str]) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: json!({
            "type": "object",
            "properties": properties,
            "required": required,
        }),
    }
}

fn string(description: &str) -> Value {
    json!({"type": "string", "description": description})
}

fn string_list(description: &str) -> Value {
    json!({"type": "array", "items": {"type": "string"}, "description": description})
}

fn dataset() -> Value {
    string("Name of a loaded dataset")
}

fn analysis_tools() -> Vec<ToolDefinition> {
    vec![
        tool(
            "load_dataset",
            "Loads a dataset from a JSON or CSV file into memory.",
            json!({
                "file_path": string("Path to a .csv or .json file"),
                "dataset_name": string("Name to register the dataset under"),
                "sample_size": {"type": "integer", "minimum": 1, "description": "Keep a random sample of this many rows"},
            }),
            &["file_path", "dataset_name"],
        ),
        tool(
            "list_loaded_datasets",
            "Shows a summary of all datasets currently loaded in memory.",
            json!({}),
            &[],
        ),
        tool(
            "get_dataset_info",
            "Returns shape, columns, memory footprint and schema of a dataset.",
            json!({"dataset_name": dataset()}),
            &["dataset_name"],
        ),
        tool(
            "clear_dataset",
            "Removes a specific dataset and its schema from memory.",
            json!({"dataset_name": dataset()}),
            &["dataset_name"],
        ),
        tool(
            "clear_all_datasets",
            "Removes all datasets and schemas from memory.",
            json!({}),
            &[],
        ),
        tool(
            "suggest_analysis",
            "Suggests relevant analysis tools based on the dataset's schema.",
            json!({"dataset_name": dataset()}),
            &["dataset_name"],
        ),
        tool(
            "analyze_distributions",
            "Analyzes and describes the distribution of a single column in a dataset.",
            json!({"dataset_name": dataset(), "column_name": string("Column to analyze")}),
            &["dataset_name", "column_name"],
        ),
        tool(
            "find_correlations",
            "Finds correlations between numerical columns in a dataset.",
            json!({
                "dataset_name": dataset(),
                "columns": string_list("Numerical columns to include (default: all)"),
                "threshold": {"type": "number", "default": 0.3, "description": "Minimum absolute correlation to report"},
            }),
            &["dataset_name"],
        ),
        tool(
            "segment_by_column",
            "Segments a dataset by a column and calculates aggregate statistics.",
            json!({
                "dataset_name": dataset(),
                "column_name": string("Column to group by"),
                "method": string("Segmentation method (accepted for compatibility)"),
                "top_n": {"type": "integer", "default": 10, "description": "Number of segments to return"},
            }),
            &["dataset_name", "column_name"],
        ),
        tool(
            "detect_outliers",
            "Detects outliers in numerical columns using the IQR or z-score method.",
            json!({
                "dataset_name": dataset(),
                "columns": string_list("Numerical columns to check (default: all)"),
                "method": {"type": "string", "enum": ["iqr", "zscore"], "default": "iqr"},
            }),
            &["dataset_name"],
        ),
        tool(
            "time_series_analysis",
            "Performs a basic time series analysis on a given dataset.",
            json!({
                "dataset_name": dataset(),
                "date_column": string("Date or timestamp column"),
                "value_column": string("Numerical column to aggregate"),
                "frequency": {"type": "string", "enum": ["auto", "D", "W", "M"], "default": "auto"},
            }),
            &["dataset_name", "date_column", "value_column"],
        ),
        tool(
            "validate_data_quality",
            "Performs a comprehensive data quality assessment on a dataset.",
            json!({"dataset_name": dataset()}),
            &["dataset_name"],
        ),
        tool(
            "compare_datasets",
            "Performs a side-by-side comparison of two datasets.",
            json!({
                "dataset_a": dataset(),
                "dataset_b": dataset(),
                "common_columns": string_list("Columns to compare (default: all shared columns)"),
            }),
            &["dataset_a", "dataset_b"],
        ),
        tool(
            "merge_datasets",
            "Merges multiple datasets based on provided configurations.",
            json!({
                "dataset_configs": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {"dataset_name": string("Dataset to merge"), "join_column": string("Key column")},
                        "required": ["dataset_name"],
                    },
                },
                "join_strategy": {"type": "string", "enum": ["inner", "left", "right", "outer"], "default": "inner"},
            }),
            &["dataset_configs"],
        ),
        tool(
            "calculate_feature_importance",
            "Calculates feature importance based on correlation with a target column.",
            json!({
                "dataset_name": dataset(),
                "target_column": string("Numerical target column"),
                "feature_columns": string_list("Candidate features (default: all other numerical columns)"),
            }),
            &["dataset_name", "target_column"],
        ),
        tool(
            "memory_optimization_report",
            "Analyzes memory usage of a dataset and suggests optimizations.",
            json!({"dataset_name": dataset()}),
            &["dataset_name"],
        ),
        tool(
            "execute_custom_analytics_code",
            "Executes custom Python code against a loaded dataset in an isolated subprocess.",
            json!({
                "dataset_name": dataset(),
                "python_code": string("Code to run; the dataset is available as `df`"),
            }),
            &["dataset_name", "python_code"],
        ),
        tool(
            "create_chart",
            "Creates a chart from a dataset and saves it as an HTML file.",
            json!({
                "dataset_name": dataset(),
                "chart_type": {"type": "string", "enum": ["histogram", "bar", "scatter", "line", "box"]},
                "x_column": string("Column for the x axis"),
                "y_column": string("Column for the y axis"),
                "groupby_column": string("Column used to colour series"),
                "title": string("Chart title"),
            }),
            &["dataset_name", "chart_type", "x_column"],
        ),
        tool(
            "generate_dashboard",
            "Generates a set of charts intended for a dashboard.",
            json!({
                "dataset_name": dataset(),
                "chart_configs": {"type": "array", "items": {"type": "object"}},
            }),
            &["dataset_name", "chart_configs"],
        ),
        tool(
            "export_insights",
            "Generates and exports a summary of insights for a dataset to a file.",
            json!({
                "dataset_name": dataset(),
                "format": {"type": "string", "enum": ["json", "csv", "html"], "default": "json"},
                "include_charts": {"type": "boolean", "default": false},
            }),
            &["dataset_name"],
        ),
    ]
}

fn mirror_tools() -> Vec<ToolDefinition> {
    RESOURCES
        .iter()
        .map(|resource| {
            let mut properties = serde_json::Map::new();
            let mut required = Vec::new();
            if let Some(parameter) = resource.parameter {
                properties.insert(parameter.to_string(), string(parameter));
                required.push(parameter);
            }
            if resource.mirror_tool == "resource_datasets_sample" {
                properties.insert(
                    "n_rows".to_string(),
                    json!({"type": "integer", "default": 5, "minimum": 0}),
                );
            }
            tool(
                resource.mirror_tool,
                &format!("Tool mirror of the `{}` resource.", resource.uri),
                Value::Object(properties),
                &required,
            )
        })
        .collect()
}

/// Every tool the server answers, analysis tools first.
pub static TOOLS: Lazy<Vec<ToolDefinition>> = Lazy::new(|| {
    let mut tools = analysis_tools();
    tools.extend(mirror_tools());
    tools
});

#[derive(Debug, Clone, Serialize)]
pub struct PromptArgument {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub arguments: Vec<PromptArgument>,
}

const DATASET_ARGUMENT: PromptArgument = PromptArgument {
    name: "dataset_name",
    description: "Name of a loaded dataset",
    required: true,
};

fn prompt(name: &'static str, description: &'static str, arguments: Vec<PromptArgument>) -> PromptDefinition {
    PromptDefinition {
        name,
        description,
        arguments,
    }
}

pub static PROMPTS: Lazy<Vec<PromptDefinition>> = Lazy::new(|| {
    vec![
        prompt(
            "dataset_first_look",
            "Adaptive first-look guide for a newly loaded dataset.",
            vec![DATASET_ARGUMENT],
        ),
        prompt(
            "segmentation_workshop",
            "Guide for planning a segmentation strategy.",
            vec![DATASET_ARGUMENT],
        ),
        prompt(
            "data_quality_assessment",
            "Guide for a systematic data quality review.",
            vec![DATASET_ARGUMENT],
        ),
        prompt(
            "correlation_investigation",
            "Guide for a correlation analysis workflow.",
            vec![DATASET_ARGUMENT],
        ),
        prompt(
            "pattern_discovery_session",
            "Open-ended pattern discovery across distributions, relationships and segments.",
            vec![DATASET_ARGUMENT],
        ),
        prompt(
            "insight_generation_workshop",
            "Business-focused insight generation workshop.",
            vec![
                DATASET_ARGUMENT,
                PromptArgument {
                    name: "business_context",
                    description: "Business domain, for example 'sales' or 'marketing'",
                    required: false,
                },
            ],
        ),
        prompt(
            "dashboard_design_consultation",
            "Dashboard planning tailored to an audience.",
            vec![
                DATASET_ARGUMENT,
                PromptArgument {
                    name: "audience",
                    description: "Intended audience, for example 'executive' or 'analyst'",
                    required: false,
                },
            ],
        ),
        prompt(
            "find_datasources",
            "Discovers data files and presents them as load commands.",
            vec![PromptArgument {
                name: "directory_path",
                description: "Directory to scan (default: current directory)",
                required: false,
            }],
        ),
        prompt(
            "list_mcp_assets",
            "Complete list of the server's prompts, tools and resources.",
            Vec::new(),
        ),
    ]
});
