//! Charts, dashboards and insight exports written to the output directories.

pub mod chart;
pub mod dashboard;
pub mod export;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{AnalyticsError, Result};

pub use chart::{create_chart, ChartRequest, ChartResult};
pub use dashboard::{generate_dashboard, DashboardReport};
pub use export::{export_insights, ExportFormat, ExportResult, Insights, InsightsFormatter};

/// Plotly CDN bundle referenced by generated pages.
pub const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Histogram,
    Bar,
    Scatter,
    Line,
    Box,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Histogram => "histogram",
            Self::Bar => "bar",
            Self::Scatter => "scatter",
            Self::Line => "line",
            Self::Box => "box",
        }
    }

    /// Capitalized name used in default titles.
    pub fn title_case(&self) -> &'static str {
        match self {
            Self::Histogram => "Histogram",
            Self::Bar => "Bar",
            Self::Scatter => "Scatter",
            Self::Line => "Line",
            Self::Box => "Box",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartKind {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "histogram" => Ok(Self::Histogram),
            "bar" => Ok(Self::Bar),
            "scatter" => Ok(Self::Scatter),
            "line" => Ok(Self::Line),
            "box" => Ok(Self::Box),
            other => Err(AnalyticsError::invalid(format!(
                "Unsupported chart type: '{other}'. Supported: histogram, bar, scatter, line, box"
            ))),
        }
    }
}

/// File-name form of a title: alphanumerics, spaces and underscores kept,
/// trailing whitespace trimmed, spaces turned into underscores.
pub fn safe_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '_')
        .collect::<String>()
        .trim_end()
        .replace(' ', "_")
}

pub fn html_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Writes `contents`, creating parent directories, and returns the absolute path.
pub(crate) async fn write_output(path: &Path, contents: &[u8]) -> Result<String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await?;
    let absolute = tokio::fs::canonicalize(path).await?;
    Ok(absolute.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_title() {
        assert_eq!(safe_title("Bar Chart: region vs sales"), "Bar_Chart_region_vs_sales");
        assert_eq!(safe_title("../../etc/passwd "), "etcpasswd");
        assert_eq!(safe_title("my_chart"), "my_chart");
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<b>\"a\" & 'b'</b>"), "&lt;b&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/b&gt;");
    }

    #[test]
    fn test_chart_kind_parsing() {
        assert_eq!("box".parse::<ChartKind>().unwrap(), ChartKind::Box);
        let err = "pie".parse::<ChartKind>().unwrap_err();
        assert!(err.to_string().contains("Unsupported chart type: 'pie'"));
    }
}
