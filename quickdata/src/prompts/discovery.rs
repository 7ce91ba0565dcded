use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::{debug, instrument};

/// Subdirectories scanned in addition to the base directory.
const DATA_SUBDIRECTORIES: [&str; 2] = ["data", "datasets"];
const DATA_EXTENSIONS: [&str; 2] = ["csv", "json"];

/// Human-readable size: bytes below 1 KiB, then KB, MB, GB, TB with one decimal.
pub fn format_file_size(size_bytes: u64) -> String {
    if size_bytes < 1024 {
        return format!("{size_bytes} B");
    }
    let mut size = size_bytes as f64;
    for unit in ["KB", "MB", "GB"] {
        size /= 1024.0;
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
    }
    format!("{:.1} TB", size / 1024.0)
}

fn scan(base: &Path) -> BTreeSet<PathBuf> {
    let mut found = BTreeSet::new();
    let directories = std::iter::once(base.to_path_buf())
        .chain(DATA_SUBDIRECTORIES.iter().map(|d| base.join(d)));
    for directory in directories {
        let escaped = Pattern::escape(&directory.to_string_lossy());
        for extension in DATA_EXTENSIONS {
            let pattern = format!("{escaped}/*.{extension}");
            let Ok(paths) = glob::glob(&pattern) else { continue };
            found.extend(paths.flatten().filter(|p| p.is_file()));
        }
    }
    found
}

/// Load name for a file: lower-cased stem with `-` turned into `_`.
fn dataset_name_for(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_lowercase().replace('-', "_"))
        .unwrap_or_default()
}

/// Lists `.csv`/`.json` files in `directory` (default `.`), `data/` and
/// `datasets/` with ready-to-run load commands.
#[instrument]
pub async fn find_datasources(directory: Option<&Path>) -> String {
    let requested = directory.unwrap_or_else(|| Path::new("."));
    let base = match tokio::fs::canonicalize(requested).await {
        Ok(base) => base,
        Err(err) => {
            return format!(
                "**Error**: An unexpected error occurred while searching for data sources: {err}"
            )
        }
    };

    let files = scan(&base);
    debug!(base = %base.display(), found = files.len(), "Scanned for data sources");
    if files.is_empty() {
        return format!(
            "### No Data Sources Found\n\nI searched for `.csv` and `.json` files in `{}` but \
             didn't find any. \n\n**Suggestion:** Try running this from your project's root \
             directory or specify a path.",
            base.display()
        );
    }

    let folder = base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| base.display().to_string());
    let mut prompt = format!("### Data Sources Found in `{folder}`\n\n");
    prompt.push_str("Here are the data files I found. You can load any of them using the provided commands:\n\n");
    for file in files {
        let Ok(relative) = file.strip_prefix(&base) else { continue };
        let Ok(metadata) = tokio::fs::metadata(&file).await else { continue };
        let relative = relative.display();
        writeln!(prompt, "- **`{relative}`** ({})", format_file_size(metadata.len())).unwrap();
        writeln!(
            prompt,
            "  - `/load_dataset file_path:'{relative}' dataset_name:'{}'`",
            dataset_name_for(&file)
        )
        .unwrap();
    }
    prompt
}

/// Reference card of every prompt, tool and resource the server offers.
pub fn list_mcp_assets() -> String {
    r#"# Quick-Data MCP Server Assets

This is a complete list of all available prompts, tools, and resources.

## Prompts
*Interactive conversation starters and analysis guides.*

- **/dataset_first_look** `(dataset_name)`: Initial exploration guide for a new dataset.
- **/segmentation_workshop** `(dataset_name)`: Plan a segmentation strategy.
- **/data_quality_assessment** `(dataset_name)`: Start a data quality review.
- **/correlation_investigation** `(dataset_name)`: Guide a correlation analysis.
- **/pattern_discovery_session** `(dataset_name)`: Explore distribution, relationship and segment patterns.
- **/insight_generation_workshop** `(dataset_name, business_context)`: Generate business insights.
- **/dashboard_design_consultation** `(dataset_name, audience)`: Plan a dashboard.
- **/find_datasources** `(directory_path)`: Discover data files in your project.
- **/list_mcp_assets**: You are here!

## Tools
*Functions for data analysis and manipulation.*

### Data Management
- **/load_dataset** `(file_path, dataset_name, sample_size)`: Load a JSON/CSV dataset.
- **/list_loaded_datasets**: Show all datasets in memory.
- **/clear_dataset** `(dataset_name)`: Remove a specific dataset from memory.
- **/clear_all_datasets**: Clear all datasets from memory.
- **/get_dataset_info** `(dataset_name)`: Shape, columns and schema of a dataset.

### Core Analytics
- **/suggest_analysis** `(dataset_name)`: Get analysis recommendations.
- **/analyze_distributions** `(dataset_name, column_name)`: Analyze a column's distribution.
- **/find_correlations** `(dataset_name, columns, threshold)`: Find correlations between numerical columns.
- **/segment_by_column** `(dataset_name, column_name)`: Segment data by a categorical column.
- **/detect_outliers** `(dataset_name, columns, method)`: Detect outliers in numerical columns.
- **/time_series_analysis** `(dataset_name, date_column, value_column, frequency)`: Analyze trends over time.
- **/validate_data_quality** `(dataset_name)`: Get a comprehensive data quality report.

### Advanced Operations
- **/compare_datasets** `(dataset_a, dataset_b)`: Compare two datasets.
- **/merge_datasets** `(dataset_configs, join_strategy)`: Join or stack multiple datasets.
- **/calculate_feature_importance** `(dataset_name, target_column)`: Calculate feature importance.
- **/memory_optimization_report** `(dataset_name)`: Get memory usage optimization tips.
- **/execute_custom_analytics_code** `(dataset_name, python_code)`: Run custom Python code.

### Input/Output
- **/create_chart** `(dataset_name, chart_type, x_column, ...)`: Create a chart and save it as HTML.
- **/generate_dashboard** `(dataset_name, chart_configs)`: Create multiple charts for a dashboard.
- **/export_insights** `(dataset_name, format, include_charts)`: Export an analysis report.

## Resources
*Read-only endpoints for real-time data and metadata.*

- `datasets://loaded`: List of all loaded datasets.
- `datasets://{dataset_name}/schema`: The schema of a specific dataset.
- `datasets://{dataset_name}/summary`: Statistical summary of a dataset.
- `datasets://{dataset_name}/sample`: First rows of a dataset.
- `analytics://current_dataset`: The most recently loaded dataset.
- `analytics://available_analyses`: Analyses applicable to the current dataset.
- `analytics://column_types`: Column roles of the current dataset.
- `analytics://suggested_insights`: Insight ideas for the current dataset.
- `analytics://memory_usage`: Memory used by each loaded dataset.
- `config://server`: Server configuration.
- `users://{user_id}/profile`: Example user profile.
- `system://status`: Server health and status.

Every resource also has a `resource_*` tool mirror for clients without resource support.
"#
    .to_string()
}
