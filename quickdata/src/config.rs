//! Server configuration and the named analysis thresholds.
//!
//! Every heuristic cut-off used by inference and the analysis tools lives in
//! [`AnalyticsConfig`] so that tests can probe boundary values exactly.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::error::{AnalyticsError, Result};
use crate::security::SecureString;

/// Thresholds and defaults used by schema inference and the analysis tools.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsConfig {
    /// Distinct/rows ratio below which a non-numeric column is categorical.
    pub categorical_ratio_threshold: f64,
    /// Number of non-null sample values recorded per column.
    pub sample_value_count: usize,
    /// Seed for reproducible resampling.
    pub sample_seed: u64,
    /// Absolute correlation above which a pair is `strong`.
    pub strong_correlation_threshold: f64,
    pub default_correlation_threshold: f64,
    /// Columns with more distinct values than this cannot be segmented.
    pub max_segment_cardinality: usize,
    pub default_top_segments: usize,
    pub iqr_multiplier: f64,
    pub zscore_threshold: f64,
    /// Missing percentage above which a column is reported as a quality issue.
    pub high_missing_percentage: f64,
    pub top_value_count: usize,
    pub outlier_value_limit: usize,
    /// Slopes within this band are reported as `stable`.
    pub trend_stability_epsilon: f64,
    pub monthly_span_days: i64,
    pub weekly_span_days: i64,
    /// Maximum points removed from the quality score by each penalty.
    pub max_quality_penalty: f64,
    pub top_feature_count: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            categorical_ratio_threshold: 0.5,
            sample_value_count: 3,
            sample_seed: 42,
            strong_correlation_threshold: 0.7,
            default_correlation_threshold: 0.3,
            max_segment_cardinality: 100,
            default_top_segments: 10,
            iqr_multiplier: 1.5,
            zscore_threshold: 3.0,
            high_missing_percentage: 20.0,
            top_value_count: 10,
            outlier_value_limit: 10,
            trend_stability_epsilon: 0.001,
            monthly_span_days: 365,
            weekly_span_days: 30,
            max_quality_penalty: 50.0,
            top_feature_count: 5,
        }
    }
}

impl AnalyticsConfig {
    /// Creates a builder starting from the defaults.
    pub fn builder() -> AnalyticsConfigBuilder {
        AnalyticsConfigBuilder::default()
    }

    /// Checks that every threshold is in its meaningful range.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.categorical_ratio_threshold) {
            return Err(AnalyticsError::Configuration(
                "categorical_ratio_threshold must be between 0 and 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.strong_correlation_threshold) {
            return Err(AnalyticsError::Configuration(
                "strong_correlation_threshold must be between 0 and 1".to_string(),
            ));
        }
        if self.iqr_multiplier <= 0.0 || self.zscore_threshold <= 0.0 {
            return Err(AnalyticsError::Configuration(
                "outlier thresholds must be positive".to_string(),
            ));
        }
        if self.weekly_span_days >= self.monthly_span_days {
            return Err(AnalyticsError::Configuration(
                "weekly_span_days must be smaller than monthly_span_days".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`AnalyticsConfig`].
#[derive(Debug, Clone, Default)]
pub struct AnalyticsConfigBuilder {
    config: AnalyticsConfig,
}

impl AnalyticsConfigBuilder {
    pub fn categorical_ratio_threshold(mut self, value: f64) -> Self {
        self.config.categorical_ratio_threshold = value;
        self
    }

    pub fn sample_seed(mut self, seed: u64) -> Self {
        self.config.sample_seed = seed;
        self
    }

    pub fn strong_correlation_threshold(mut self, value: f64) -> Self {
        self.config.strong_correlation_threshold = value;
        self
    }

    pub fn max_segment_cardinality(mut self, value: usize) -> Self {
        self.config.max_segment_cardinality = value;
        self
    }

    pub fn iqr_multiplier(mut self, value: f64) -> Self {
        self.config.iqr_multiplier = value;
        self
    }

    pub fn zscore_threshold(mut self, value: f64) -> Self {
        self.config.zscore_threshold = value;
        self
    }

    pub fn high_missing_percentage(mut self, value: f64) -> Self {
        self.config.high_missing_percentage = value;
        self
    }

    pub fn trend_stability_epsilon(mut self, value: f64) -> Self {
        self.config.trend_stability_epsilon = value;
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> Result<AnalyticsConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Where charts and reports are written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputConfig {
    pub charts_dir: PathBuf,
    pub reports_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            charts_dir: PathBuf::from("outputs/charts"),
            reports_dir: PathBuf::from("outputs/reports"),
        }
    }
}

impl OutputConfig {
    /// Places both output directories under `root`.
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            charts_dir: root.join("charts"),
            reports_dir: root.join("reports"),
        }
    }
}

/// Preamble that rebuilds the dataset from stdin before the user code runs.
///
/// `{user_code}` is replaced by the indented code fragment.
pub const DEFAULT_PYTHON_PREAMBLE: &str = r#"import sys
import pandas as pd
import numpy as np

df = pd.read_json(sys.stdin, lines=True)

try:
{user_code}
except Exception as e:
    import traceback
    print(f"ERROR: {type(e).__name__}: {e}")
    print("Traceback:")
    print(traceback.format_exc())
"#;

/// Settings for the custom code execution subprocess.
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxConfig {
    /// Interpreter to spawn.
    pub program: String,
    /// Arguments placed before the generated script.
    pub args: Vec<String>,
    /// Script template containing `{user_code}`; `None` passes the code as is.
    pub preamble: Option<String>,
    pub timeout: Duration,
    pub max_code_length: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            program: "python3".to_string(),
            args: vec!["-c".to_string()],
            preamble: Some(DEFAULT_PYTHON_PREAMBLE.to_string()),
            timeout: Duration::from_secs(30),
            max_code_length: 100_000,
        }
    }
}

/// Server identity and environment-driven overrides.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub server_name: String,
    pub version: String,
    pub log_level: String,
    pub api_key: Option<SecureString>,
    pub database_url: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            server_name: "Modular MCP Server".to_string(),
            version: "0.1.0".to_string(),
            log_level: "INFO".to_string(),
            api_key: None,
            database_url: None,
        }
    }
}

impl ServerSettings {
    /// Reads `SERVER_NAME`, `LOG_LEVEL`, `API_KEY` and `DATABASE_URL`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            server_name: lookup("SERVER_NAME").unwrap_or(defaults.server_name),
            version: defaults.version,
            log_level: lookup("LOG_LEVEL")
                .map(|level| level.to_uppercase())
                .unwrap_or(defaults.log_level),
            api_key: lookup("API_KEY").map(SecureString::from),
            database_url: lookup("DATABASE_URL"),
        }
    }
}

/// Complete configuration handed to the server.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    pub settings: ServerSettings,
    pub analytics: AnalyticsConfig,
    pub output: OutputConfig,
    pub sandbox: SandboxConfig,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            settings: ServerSettings::from_env(),
            ..Self::default()
        }
    }

    pub fn with_output(mut self, output: OutputConfig) -> Self {
        self.output = output;
        self
    }

    pub fn with_analytics(mut self, analytics: AnalyticsConfig) -> Self {
        self.analytics = analytics;
        self
    }

    pub fn with_sandbox(mut self, sandbox: SandboxConfig) -> Self {
        self.sandbox = sandbox;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_documented_thresholds() {
        let config = AnalyticsConfig::default();
        assert_eq!(config.categorical_ratio_threshold, 0.5);
        assert_eq!(config.zscore_threshold, 3.0);
        assert_eq!(config.high_missing_percentage, 20.0);
        assert_eq!(config.max_segment_cardinality, 100);
        assert_eq!(config.sample_seed, 42);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_rejects_bad_ratio() {
        let result = AnalyticsConfig::builder()
            .categorical_ratio_threshold(1.5)
            .build();
        assert!(matches!(result, Err(AnalyticsError::Configuration(_))));
    }

    #[test]
    fn test_settings_from_lookup() {
        let vars: HashMap<&str, &str> = [("LOG_LEVEL", "debug"), ("API_KEY", "secret")]
            .into_iter()
            .collect();
        let settings = ServerSettings::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(settings.server_name, "Modular MCP Server");
        assert_eq!(settings.log_level, "DEBUG");
        assert_eq!(settings.api_key.as_ref().map(|k| k.expose()), Some("secret"));
        assert!(!format!("{settings:?}").contains("secret"));
    }

    #[test]
    fn test_output_under_root() {
        let output = OutputConfig::under("/tmp/out");
        assert_eq!(output.charts_dir, PathBuf::from("/tmp/out/charts"));
        assert_eq!(output.reports_dir, PathBuf::from("/tmp/out/reports"));
    }

    #[test]
    fn test_with_analytics_replaces_thresholds() {
        let analytics = AnalyticsConfig::builder()
            .zscore_threshold(2.5)
            .build()
            .unwrap();
        let config = ServerConfig::default().with_analytics(analytics);
        assert_eq!(config.analytics.zscore_threshold, 2.5);
    }
}
