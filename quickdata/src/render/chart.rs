//! Single-chart rendering to standalone Plotly HTML pages.

use std::collections::HashMap;
use std::path::PathBuf;

use arrow::compute::sort_to_indices;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::{html_escape, safe_title, write_output, ChartKind, PLOTLY_CDN};
use crate::config::OutputConfig;
use crate::error::{AnalyticsError, Result};
use crate::outcome::Outcome;
use crate::registry::DatasetRegistry;
use crate::table::{self, is_numeric_type, Table};

/// Arguments of a chart; also the shape of one dashboard entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartRequest {
    pub chart_type: String,
    pub x_column: String,
    #[serde(default)]
    pub y_column: Option<String>,
    #[serde(default)]
    pub groupby_column: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub save_path: Option<PathBuf>,
}

impl ChartRequest {
    pub fn new(chart_type: impl Into<String>, x_column: impl Into<String>) -> Self {
        Self {
            chart_type: chart_type.into(),
            x_column: x_column.into(),
            ..Self::default()
        }
    }

    pub fn with_y(mut self, column: impl Into<String>) -> Self {
        self.y_column = Some(column.into());
        self
    }

    pub fn grouped_by(mut self, column: impl Into<String>) -> Self {
        self.groupby_column = Some(column.into());
        self
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn saved_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_path = Some(path.into());
        self
    }

    /// `"{Kind} Chart: {x}[ vs {y}][ (grouped by {g})]"`
    pub fn default_title(&self, kind: ChartKind) -> String {
        let mut title = format!("{} Chart: {}", kind.title_case(), self.x_column);
        if let Some(y) = &self.y_column {
            title.push_str(&format!(" vs {y}"));
        }
        if let Some(group) = &self.groupby_column {
            title.push_str(&format!(" (grouped by {group})"));
        }
        title
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSettings {
    pub x_column: String,
    pub y_column: Option<String>,
    pub groupby_column: Option<String>,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartResult {
    pub dataset: String,
    pub chart_type: ChartKind,
    pub chart_config: ChartSettings,
    pub chart_file: String,
    pub status: &'static str,
}

/// Row positions per group, in first-appearance order. Null groups are dropped.
fn row_groups(table: &Table, column: Option<&str>) -> Result<Vec<(Option<String>, Vec<usize>)>> {
    let Some(column) = column else {
        return Ok(vec![(None, (0..table.num_rows()).collect())]);
    };
    let keys = table::column_strings(table.column(column)?)?;
    let mut groups: Vec<(Option<String>, Vec<usize>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for (row, key) in keys.into_iter().enumerate() {
        let Some(key) = key else { continue };
        let slot = *positions.entry(key.clone()).or_insert_with(|| {
            groups.push((Some(key), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(row);
    }
    Ok(groups)
}

/// Mean of `y` per distinct `x` (or row counts when `y` is absent).
fn bar_series(
    rows: &[usize],
    x_keys: &[Option<String>],
    x_values: &[Value],
    y_numbers: Option<&[Option<f64>]>,
) -> (Vec<Value>, Vec<Value>) {
    let mut order: Vec<(Value, f64, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for &row in rows {
        let Some(key) = x_keys[row].as_deref() else { continue };
        let slot = *index.entry(key).or_insert_with(|| {
            order.push((x_values[row].clone(), 0.0, 0));
            order.len() - 1
        });
        match y_numbers {
            Some(ys) => {
                if let Some(y) = ys[row] {
                    order[slot].1 += y;
                    order[slot].2 += 1;
                }
            }
            None => order[slot].2 += 1,
        }
    }
    order
        .into_iter()
        .map(|(x, sum, count)| {
            let y = match y_numbers {
                Some(_) if count == 0 => Value::Null,
                Some(_) => json!(sum / count as f64),
                None => json!(count),
            };
            (x, y)
        })
        .unzip()
}

/// Builds the Plotly figure (`data` plus `layout`) for a chart.
pub fn build_figure(
    table: &Table,
    kind: ChartKind,
    x: &str,
    y: Option<&str>,
    group: Option<&str>,
    title: &str,
) -> Result<Value> {
    let table = if kind == ChartKind::Line {
        let order = sort_to_indices(table.column(x)?.as_ref(), None, None)?;
        let order: Vec<usize> = order.values().iter().map(|&i| i as usize).collect();
        table.take_rows(&order)?
    } else {
        table.clone()
    };

    let x_values = table::column_json_values(table.column(x)?)?;
    let y_values = y
        .map(|c| table.column(c).and_then(table::column_json_values))
        .transpose()?;
    let bar_inputs = if kind == ChartKind::Bar {
        let numbers = match y {
            Some(c) => {
                let array = table.column(c)?;
                if !is_numeric_type(array.data_type()) {
                    return Err(AnalyticsError::invalid(format!(
                        "Bar chart y_column '{c}' must be numerical"
                    )));
                }
                Some(table::f64_values(array)?)
            }
            None => None,
        };
        Some((table::column_strings(table.column(x)?)?, numbers))
    } else {
        None
    };

    let mut traces = Vec::new();
    for (name, rows) in row_groups(&table, group)? {
        let pick = |values: &[Value]| rows.iter().map(|&r| values[r].clone()).collect::<Vec<_>>();
        let mut trace = match kind {
            ChartKind::Histogram => json!({"type": "histogram", "x": pick(&x_values)}),
            ChartKind::Bar => {
                let (keys, numbers) = bar_inputs.as_ref().ok_or_else(|| {
                    AnalyticsError::Internal("bar inputs missing".to_string())
                })?;
                let (xs, ys) = bar_series(&rows, keys, &x_values, numbers.as_deref());
                json!({"type": "bar", "x": xs, "y": ys})
            }
            ChartKind::Scatter | ChartKind::Line => {
                let mode = if kind == ChartKind::Scatter { "markers" } else { "lines" };
                let ys = y_values.as_deref().map(pick).unwrap_or_default();
                json!({"type": "scatter", "mode": mode, "x": pick(&x_values), "y": ys})
            }
            ChartKind::Box => match y_values.as_deref() {
                Some(ys) => json!({"type": "box", "x": pick(&x_values), "y": pick(ys)}),
                None => json!({"type": "box", "x": pick(&x_values)}),
            },
        };
        if let Some(name) = name {
            trace["name"] = json!(name);
        }
        traces.push(trace);
    }

    let y_title = match (kind, y) {
        (_, Some(y)) => y,
        (ChartKind::Box, None) => "",
        _ => "count",
    };
    Ok(json!({
        "data": traces,
        "layout": {
            "title": {"text": title},
            "xaxis": {"title": {"text": x}},
            "yaxis": {"title": {"text": y_title}},
            "template": "plotly_white",
        },
    }))
}

/// A self-contained page that draws `figure` with Plotly.
pub fn render_html(title: &str, figure: &Value) -> Result<String> {
    // keep "</script>" inside strings from closing the tag
    let figure = serde_json::to_string(figure)?.replace("</", "<\\/");
    Ok(format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{PLOTLY_CDN}"></script>
</head>
<body>
<div id="chart" style="width:100%;height:90vh;"></div>
<script>
const figure = {figure};
Plotly.newPlot("chart", figure.data, figure.layout, {{responsive: true}});
</script>
</body>
</html>
"#,
        title = html_escape(title),
    ))
}

async fn chart(
    registry: &DatasetRegistry,
    output: &OutputConfig,
    dataset_name: &str,
    request: &ChartRequest,
) -> Result<ChartResult> {
    let table = registry.get(dataset_name).await?;

    let missing: Vec<&str> = std::iter::once(request.x_column.as_str())
        .chain(request.y_column.as_deref())
        .chain(request.groupby_column.as_deref())
        .filter(|c| !table.has_column(c))
        .collect();
    if !missing.is_empty() {
        return Err(AnalyticsError::invalid(format!(
            "Columns not found: {}",
            missing.join(", ")
        )));
    }

    let kind: ChartKind = request.chart_type.parse()?;
    if matches!(kind, ChartKind::Scatter | ChartKind::Line) && request.y_column.is_none() {
        return Err(AnalyticsError::invalid(format!(
            "{} plot requires both x_column and y_column.",
            kind.title_case()
        )));
    }
    let title = request
        .title
        .clone()
        .unwrap_or_else(|| request.default_title(kind));

    let figure = build_figure(
        &table,
        kind,
        &request.x_column,
        request.y_column.as_deref(),
        request.groupby_column.as_deref(),
        &title,
    )?;
    let html = render_html(&title, &figure)?;
    let path = match &request.save_path {
        Some(path) => path.clone(),
        None => output.charts_dir.join(format!("{}.html", safe_title(&title))),
    };
    let chart_file = write_output(&path, html.as_bytes()).await?;
    debug!(chart_file = %chart_file, kind = %kind, "Wrote chart");

    Ok(ChartResult {
        dataset: dataset_name.to_string(),
        chart_type: kind,
        chart_config: ChartSettings {
            x_column: request.x_column.clone(),
            y_column: request.y_column.clone(),
            groupby_column: request.groupby_column.clone(),
            title,
        },
        chart_file,
        status: "success",
    })
}

/// Renders a histogram, bar, scatter, line or box chart to an HTML file.
#[instrument(skip(registry, output))]
pub async fn create_chart(
    registry: &DatasetRegistry,
    output: &OutputConfig,
    dataset_name: &str,
    request: &ChartRequest,
) -> Outcome<ChartResult> {
    Outcome::from_result(
        chart(registry, output, dataset_name, request).await,
        "Chart creation failed",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::sales_table;

    async fn setup() -> (DatasetRegistry, tempfile::TempDir, OutputConfig) {
        let registry = DatasetRegistry::new();
        registry.load_table(sales_table(), "sales").await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let output = OutputConfig::under(dir.path());
        (registry, dir, output)
    }

    #[test]
    fn test_default_title() {
        let request = ChartRequest::new("bar", "category").with_y("value").grouped_by("id");
        assert_eq!(
            request.default_title(ChartKind::Bar),
            "Bar Chart: category vs value (grouped by id)"
        );
    }

    #[test]
    fn test_bar_figure_averages_per_category() {
        let figure = build_figure(
            &sales_table(),
            ChartKind::Bar,
            "category",
            Some("value"),
            None,
            "t",
        )
        .unwrap();
        assert_eq!(figure["data"][0]["x"], json!(["A", "B", "C"]));
        assert_eq!(figure["data"][0]["y"], json!([13.0, 22.75, 30.0]));
    }

    #[test]
    fn test_histogram_groups_become_traces() {
        let figure = build_figure(
            &sales_table(),
            ChartKind::Histogram,
            "value",
            None,
            Some("category"),
            "t",
        )
        .unwrap();
        let names: Vec<_> = figure["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].clone())
            .collect();
        assert_eq!(names, vec![json!("A"), json!("B"), json!("C")]);
    }

    #[test]
    fn test_html_escapes_script_breakouts() {
        let html = render_html("<x>", &json!({"data": ["</script>"]})).unwrap();
        assert!(html.contains("<title>&lt;x&gt;</title>"));
        assert!(!html.contains("\"</script>\""));
    }

    #[tokio::test]
    async fn test_create_chart_writes_file_under_charts_dir() {
        let (registry, _dir, output) = setup().await;
        let result = create_chart(
            &registry,
            &output,
            "sales",
            &ChartRequest::new("scatter", "id").with_y("value"),
        )
        .await
        .into_ok()
        .unwrap();
        assert_eq!(result.chart_config.title, "Scatter Chart: id vs value");
        assert!(result.chart_file.ends_with("Scatter_Chart_id_vs_value.html"));
        let html = std::fs::read_to_string(&result.chart_file).unwrap();
        assert!(html.contains("Plotly.newPlot"));
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let (registry, _dir, output) = setup().await;
        let missing = create_chart(&registry, &output, "sales", &ChartRequest::new("bar", "nope")).await;
        assert_eq!(missing.error_message(), Some("Columns not found: nope"));

        let no_y = create_chart(&registry, &output, "sales", &ChartRequest::new("line", "id")).await;
        assert_eq!(
            no_y.error_message(),
            Some("Line plot requires both x_column and y_column.")
        );

        let pie = create_chart(&registry, &output, "sales", &ChartRequest::new("pie", "id")).await;
        assert!(pie.error_message().unwrap().starts_with("Unsupported chart type"));
    }
}
