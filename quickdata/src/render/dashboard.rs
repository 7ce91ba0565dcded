//! Best-effort rendering of several charts from one dataset.

use chrono::Local;
use serde::Serialize;
use serde_json::Value;
use tracing::{instrument, warn};

use super::chart::{create_chart, ChartRequest, ChartResult};
use crate::config::OutputConfig;
use crate::error::AnalyticsError;
use crate::outcome::Outcome;
use crate::registry::DatasetRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardChart {
    pub chart_id: usize,
    pub config: Value,
    pub status: ChartStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ChartResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_charts_requested: usize,
    pub successful_charts: usize,
    pub failed_charts: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub dataset: String,
    pub dashboard_generated_at: String,
    pub summary: DashboardSummary,
    pub charts: Vec<DashboardChart>,
}

/// Reads one dashboard entry; `chart_type` and `x_column` are mandatory.
fn parse_config(config: &Value, chart_id: usize) -> Result<ChartRequest, String> {
    let field = |name: &str| config.get(name).and_then(Value::as_str).map(str::to_string);
    let (Some(chart_type), Some(x_column)) = (field("chart_type"), field("x_column")) else {
        return Err("Chart config must include 'chart_type' and 'x_column'.".to_string());
    };
    let title = field("title").unwrap_or_else(|| format!("Chart {chart_id}: {chart_type}"));
    Ok(ChartRequest {
        chart_type,
        x_column,
        y_column: field("y_column"),
        groupby_column: field("groupby_column"),
        title: Some(title),
        save_path: None,
    })
}

/// Renders each config independently; one bad chart never aborts the rest.
#[instrument(skip(registry, output, chart_configs), fields(charts = chart_configs.len()))]
pub async fn generate_dashboard(
    registry: &DatasetRegistry,
    output: &OutputConfig,
    dataset_name: &str,
    chart_configs: &[Value],
) -> Outcome<DashboardReport> {
    if let Err(err) = registry.get(dataset_name).await {
        return Outcome::from_result(Err(err), "Dashboard generation failed");
    }
    if chart_configs.is_empty() {
        return Outcome::from_result(
            Err(AnalyticsError::invalid("No chart configurations were provided.")),
            "Dashboard generation failed",
        );
    }

    let mut charts = Vec::with_capacity(chart_configs.len());
    for (i, config) in chart_configs.iter().enumerate() {
        let chart_id = i + 1;
        let outcome = match parse_config(config, chart_id) {
            Ok(request) => create_chart(registry, output, dataset_name, &request).await,
            Err(message) => Outcome::Error(message),
        };
        let entry = match outcome {
            Outcome::Ok(result) => DashboardChart {
                chart_id,
                config: config.clone(),
                status: ChartStatus::Success,
                result: Some(result),
                error: None,
            },
            Outcome::Error(message) => {
                warn!(chart_id, error = %message, "Dashboard chart failed");
                DashboardChart {
                    chart_id,
                    config: config.clone(),
                    status: ChartStatus::Failed,
                    result: None,
                    error: Some(message),
                }
            }
        };
        charts.push(entry);
    }

    let successful_charts = charts
        .iter()
        .filter(|c| c.status == ChartStatus::Success)
        .count();
    Outcome::Ok(DashboardReport {
        dataset: dataset_name.to_string(),
        dashboard_generated_at: Local::now().to_rfc3339(),
        summary: DashboardSummary {
            total_charts_requested: chart_configs.len(),
            successful_charts,
            failed_charts: chart_configs.len() - successful_charts,
        },
        charts,
    })
}
