//! Logging utilities and configuration.
//!
//! The MCP transport owns stdout, so every subscriber installed here writes
//! to stderr.

use tracing::Level;

/// Controls what the engine logs while serving requests.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base log level for quickdata components
    pub base_level: Level,
    /// Whether to log every tool invocation with its arguments
    pub log_tool_calls: bool,
    /// Whether to log registry mutations (load, resample, clear)
    pub log_data_operations: bool,
    /// Maximum length for logged field values (to prevent huge logs)
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            base_level: Level::INFO,
            log_tool_calls: false,
            log_data_operations: true,
            max_field_length: 256,
        }
    }
}

impl LogConfig {
    /// Creates a verbose configuration suitable for debugging.
    pub fn verbose() -> Self {
        Self {
            base_level: Level::DEBUG,
            log_tool_calls: true,
            log_data_operations: true,
            max_field_length: 1024,
        }
    }

    /// Creates a minimal configuration for production with lowest overhead.
    pub fn production() -> Self {
        Self {
            base_level: Level::WARN,
            log_tool_calls: false,
            log_data_operations: false,
            max_field_length: 128,
        }
    }
}

/// Truncates a string to the maximum field length if needed.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        return value.to_string();
    }
    let mut end = max_length;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &value[..end])
}

/// Parses a textual level such as `INFO` or `debug`.
pub fn parse_level(level: &str) -> Option<Level> {
    match level.trim().to_ascii_uppercase().as_str() {
        "TRACE" => Some(Level::TRACE),
        "DEBUG" => Some(Level::DEBUG),
        "INFO" => Some(Level::INFO),
        "WARN" | "WARNING" => Some(Level::WARN),
        "ERROR" | "CRITICAL" => Some(Level::ERROR),
        _ => None,
    }
}

/// Subscriber installation.
pub mod setup {
    use tracing::Level;

    /// Configuration for the process-wide tracing subscriber.
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Log level for dependencies
        pub level: Level,
        /// Log level for quickdata crates
        pub quickdata_level: Level,
        /// Whether to use JSON output format
        pub json_format: bool,
        /// Environment filter override
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::WARN,
                quickdata_level: Level::INFO,
                json_format: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        /// JSON lines with informational engine logs.
        pub fn production() -> Self {
            Self {
                level: Level::WARN,
                quickdata_level: Level::INFO,
                json_format: true,
                env_filter: None,
            }
        }

        pub fn development() -> Self {
            Self {
                level: Level::DEBUG,
                quickdata_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }

        pub fn with_level(mut self, level: Level) -> Self {
            self.level = level;
            self
        }

        pub fn with_quickdata_level(mut self, level: Level) -> Self {
            self.quickdata_level = level;
            self
        }

        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// Builds the environment filter string.
        pub fn env_filter(&self) -> String {
            if let Some(ref filter) = self.env_filter {
                return filter.clone();
            }
            let crate_level = self.quickdata_level.as_str().to_lowercase();
            format!(
                "{},quickdata={crate_level},quickdata_mcp={crate_level}",
                self.level.as_str().to_lowercase()
            )
        }
    }

    /// Installs a global subscriber writing to stderr.
    ///
    /// `RUST_LOG` takes precedence over the configured filter.
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(std::io::stderr)
                .boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::setup::LoggingConfig;
    use super::*;

    #[test]
    fn test_log_config_presets() {
        assert_eq!(LogConfig::default().base_level, Level::INFO);
        assert!(LogConfig::verbose().log_tool_calls);
        assert!(!LogConfig::production().log_data_operations);
    }

    #[test]
    fn test_truncate_field() {
        assert_eq!(truncate_field("hello", 10), "hello");
        assert_eq!(
            truncate_field("this is a very long text", 10),
            "this is a ...(truncated)"
        );
        // multi-byte boundary
        assert_eq!(truncate_field("ééééé", 3), "é...(truncated)");
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("info"), Some(Level::INFO));
        assert_eq!(parse_level("WARNING"), Some(Level::WARN));
        assert_eq!(parse_level("verbose"), None);
    }

    #[test]
    fn test_env_filter_string() {
        let config = LoggingConfig::default().with_quickdata_level(Level::DEBUG);
        assert_eq!(
            config.env_filter(),
            "warn,quickdata=debug,quickdata_mcp=debug"
        );
        let config = config.with_env_filter("trace");
        assert_eq!(config.env_filter(), "trace");
    }

    #[test]
    fn test_development_preset() {
        let config = LoggingConfig::development().with_level(Level::INFO);
        assert_eq!(config.env_filter(), "info,quickdata=debug,quickdata_mcp=debug");
        assert!(LoggingConfig::production().json_format);
    }
}
