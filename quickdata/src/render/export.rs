//! Insight documents exported as JSON, CSV or HTML.

use std::fmt::Write as _;
use std::str::FromStr;
use std::sync::Arc;

use arrow::array::{RecordBatch, StringArray};
use arrow::csv::WriterBuilder;
use arrow::datatypes::{DataType, Field, Schema};
use chrono::Local;
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::chart::{create_chart, ChartRequest};
use super::{html_escape, safe_title, write_output};
use crate::config::OutputConfig;
use crate::error::{AnalyticsError, ErrorContext, Result};
use crate::outcome::Outcome;
use crate::registry::DatasetRegistry;
use crate::schema::{ColumnRole, SuggestedAnalysis};
use crate::stats::round_to;

/// Maximum number of histograms attached to an export.
const MAX_EXPORT_CHARTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetOverview {
    pub rows: usize,
    pub columns: usize,
    pub memory_usage_mb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaSummary {
    pub numerical_columns: usize,
    pub categorical_columns: usize,
    pub temporal_columns: usize,
    pub identifier_columns: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityOverview {
    pub duplicate_rows: usize,
    pub total_missing_values: usize,
}

/// The exported document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insights {
    pub dataset_name: String,
    pub export_timestamp: String,
    pub dataset_info: DatasetOverview,
    pub schema_summary: SchemaSummary,
    pub data_quality: QualityOverview,
    pub suggested_analyses: Vec<SuggestedAnalysis>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub charts: Vec<String>,
}

impl Insights {
    /// Flat `(metric, value)` view used by the tabular formats.
    pub fn metric_rows(&self) -> Vec<(String, String)> {
        let mut rows = vec![
            ("Dataset Name".to_string(), self.dataset_name.clone()),
            ("Export Date".to_string(), self.export_timestamp.clone()),
            ("Total Rows".to_string(), self.dataset_info.rows.to_string()),
            ("Total Columns".to_string(), self.dataset_info.columns.to_string()),
            (
                "Memory Usage (MB)".to_string(),
                self.dataset_info.memory_usage_mb.to_string(),
            ),
            (
                "Numerical Columns".to_string(),
                self.schema_summary.numerical_columns.to_string(),
            ),
            (
                "Categorical Columns".to_string(),
                self.schema_summary.categorical_columns.to_string(),
            ),
            (
                "Temporal Columns".to_string(),
                self.schema_summary.temporal_columns.to_string(),
            ),
            (
                "Identifier Columns".to_string(),
                self.schema_summary.identifier_columns.to_string(),
            ),
            (
                "Duplicate Rows".to_string(),
                self.data_quality.duplicate_rows.to_string(),
            ),
            (
                "Total Missing Values".to_string(),
                self.data_quality.total_missing_values.to_string(),
            ),
            (
                "Suggested Analyses".to_string(),
                self.suggested_analyses
                    .iter()
                    .map(SuggestedAnalysis::as_str)
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
        ];
        rows.extend(
            self.charts
                .iter()
                .enumerate()
                .map(|(i, chart)| (format!("Chart {}", i + 1), chart.clone())),
        );
        rows
    }
}

/// Turns an [`Insights`] document into file contents.
pub trait InsightsFormatter {
    /// File extension, without the dot.
    fn extension(&self) -> &'static str;

    fn format(&self, insights: &Insights) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl InsightsFormatter for JsonFormatter {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn format(&self, insights: &Insights) -> Result<String> {
        let text = if self.pretty {
            serde_json::to_string_pretty(insights)?
        } else {
            serde_json::to_string(insights)?
        };
        Ok(text)
    }
}

/// `metric,value` rows written through the Arrow CSV writer.
#[derive(Debug, Clone, Default)]
pub struct CsvFormatter;

impl InsightsFormatter for CsvFormatter {
    fn extension(&self) -> &'static str {
        "csv"
    }

    fn format(&self, insights: &Insights) -> Result<String> {
        let (metrics, values): (Vec<String>, Vec<String>) = insights.metric_rows().into_iter().unzip();
        let schema = Arc::new(Schema::new(vec![
            Field::new("metric", DataType::Utf8, false),
            Field::new("value", DataType::Utf8, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(metrics)),
                Arc::new(StringArray::from(values)),
            ],
        )?;

        let mut buffer = Vec::new();
        {
            let mut writer = WriterBuilder::new().with_header(true).build(&mut buffer);
            writer.write(&batch)?;
        }
        String::from_utf8(buffer)
            .map_err(|e| AnalyticsError::Serialization(format!("CSV output is not UTF-8: {e}")))
    }
}

#[derive(Debug, Clone, Default)]
pub struct HtmlFormatter;

impl InsightsFormatter for HtmlFormatter {
    fn extension(&self) -> &'static str {
        "html"
    }

    fn format(&self, insights: &Insights) -> Result<String> {
        let mut html = String::new();
        let name = html_escape(&insights.dataset_name);
        writeln!(html, "<!DOCTYPE html>").unwrap();
        writeln!(html, "<html><head><meta charset=\"utf-8\"><title>Insights for {name}</title></head><body>").unwrap();
        writeln!(html, "<h1>Insights for {name}</h1>").unwrap();
        writeln!(html, "<table border=\"1\">").unwrap();
        writeln!(html, "<tr><th>Metric</th><th>Value</th></tr>").unwrap();
        for (metric, value) in insights.metric_rows() {
            writeln!(
                html,
                "<tr><td>{}</td><td>{}</td></tr>",
                html_escape(&metric),
                html_escape(&value)
            )
            .unwrap();
        }
        writeln!(html, "</table>").unwrap();
        writeln!(html, "</body></html>").unwrap();
        Ok(html)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
    Html,
}

impl ExportFormat {
    pub fn formatter(&self) -> Box<dyn InsightsFormatter + Send + Sync> {
        match self {
            Self::Json => Box::new(JsonFormatter::new()),
            Self::Csv => Box::new(CsvFormatter),
            Self::Html => Box::new(HtmlFormatter),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "html" => Ok(Self::Html),
            _ => Err(AnalyticsError::invalid(format!(
                "Unsupported export format: '{s}'. Use 'json', 'csv', or 'html'."
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportResult {
    pub dataset: String,
    pub export_format: ExportFormat,
    pub export_file: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub charts: Vec<String>,
}

/// Collects the insight document for a dataset.
pub async fn gather_insights(registry: &DatasetRegistry, dataset_name: &str) -> Result<Insights> {
    let (table, schema) = registry.entry(dataset_name).await?;
    let count = |role: ColumnRole| schema.columns_with_role(role).len();
    Ok(Insights {
        dataset_name: dataset_name.to_string(),
        export_timestamp: Local::now().to_rfc3339(),
        dataset_info: DatasetOverview {
            rows: table.num_rows(),
            columns: table.num_columns(),
            memory_usage_mb: round_to(table.memory_mb(), 2),
        },
        schema_summary: SchemaSummary {
            numerical_columns: count(ColumnRole::Numerical),
            categorical_columns: count(ColumnRole::Categorical),
            temporal_columns: count(ColumnRole::Temporal),
            identifier_columns: count(ColumnRole::Identifier),
        },
        data_quality: QualityOverview {
            duplicate_rows: table.duplicate_row_count()?,
            total_missing_values: table.total_null_count(),
        },
        suggested_analyses: schema.suggested_analyses.clone(),
        charts: Vec::new(),
    })
}

/// One histogram per numerical column, up to three. Failures are skipped.
async fn render_charts(
    registry: &DatasetRegistry,
    output: &OutputConfig,
    dataset_name: &str,
) -> Result<Vec<String>> {
    let schema = registry.schema(dataset_name).await?;
    let mut files = Vec::new();
    for column in schema.numerical_columns().into_iter().take(MAX_EXPORT_CHARTS) {
        let request = ChartRequest::new("histogram", column.as_str())
            .titled(format!("Distribution of {column} in {dataset_name}"));
        match create_chart(registry, output, dataset_name, &request).await {
            Outcome::Ok(chart) => files.push(chart.chart_file),
            Outcome::Error(message) => warn!(column = %column, error = %message, "Skipped export chart"),
        }
    }
    Ok(files)
}

async fn export(
    registry: &DatasetRegistry,
    output: &OutputConfig,
    dataset_name: &str,
    format: &str,
    include_charts: bool,
) -> Result<ExportResult> {
    let format: ExportFormat = format.parse()?;
    let mut insights = gather_insights(registry, dataset_name).await?;
    if include_charts {
        insights.charts = render_charts(registry, output, dataset_name).await?;
    }

    let formatter = format.formatter();
    let contents = formatter.format(&insights).context("Failed to format insights")?;
    let path = output
        .reports_dir
        .join(format!("insights_{}.{}", safe_title(dataset_name), formatter.extension()));
    let export_file = write_output(&path, contents.as_bytes()).await?;
    info!(export_file = %export_file, "Exported insights");

    Ok(ExportResult {
        dataset: dataset_name.to_string(),
        export_format: format,
        export_file,
        status: "success",
        charts: insights.charts,
    })
}

/// Writes `insights_{name}.{format}` to the reports directory.
#[instrument(skip(registry, output))]
pub async fn export_insights(
    registry: &DatasetRegistry,
    output: &OutputConfig,
    dataset_name: &str,
    format: Option<&str>,
    include_charts: bool,
) -> Outcome<ExportResult> {
    Outcome::from_result(
        export(
            registry,
            output,
            dataset_name,
            format.unwrap_or("json"),
            include_charts,
        )
        .await,
        "Export failed",
    )
}
