//! Error types for the quickdata analytics engine.
//!
//! Two kinds of failure coexist. [`AnalyticsError`] is the *hard* failure: it
//! aborts the call and surfaces as a transport-level error. Analysis tools,
//! prompts and chart rendering report *soft* failures instead, through
//! [`crate::outcome::Outcome`], so that automated callers always receive an
//! inspectable result.

use thiserror::Error;

/// The main error type for registry, ingest and rendering plumbing.
#[derive(Error, Debug)]
pub enum AnalyticsError {
    /// A dataset was requested by name but is not in the registry.
    #[error("Dataset '{name}' not loaded. Use load_dataset() first.")]
    DatasetNotFound { name: String },

    /// The ingest format could not be determined from the file extension.
    #[error("Unsupported file format: {path}. Supported extensions are .csv and .json")]
    UnsupportedFormat { path: String },

    /// A referenced column does not exist in the dataset.
    #[error("Column '{column}' not found in dataset")]
    ColumnNotFound { column: String },

    /// The request was well-formed but cannot be satisfied by the data.
    ///
    /// The message is shown to callers verbatim.
    #[error("{0}")]
    InvalidRequest(String),

    /// Error reading a data source.
    #[error("Data source error ({source_type}): {message}")]
    DataSource {
        source_type: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Error from the DataFusion query engine.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// I/O error (file operations, subprocess pipes).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Input rejected at a trust boundary.
    #[error("Security error: {0}")]
    SecurityError(String),

    /// Internal error that shouldn't happen in normal operation.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Type alias for Results in this crate.
pub type Result<T> = std::result::Result<T, AnalyticsError>;

impl AnalyticsError {
    /// Creates a dataset-not-found error.
    pub fn dataset_not_found(name: impl Into<String>) -> Self {
        Self::DatasetNotFound { name: name.into() }
    }

    /// Creates a column-not-found error.
    pub fn column_not_found(column: impl Into<String>) -> Self {
        Self::ColumnNotFound {
            column: column.into(),
        }
    }

    /// Creates an invalid-request error whose message reaches callers unchanged.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Creates a data source error without an underlying cause.
    pub fn data_source(source_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataSource {
            source_type: source_type.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a data source error wrapping the error that caused it.
    pub fn data_source_with_source(
        source_type: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::DataSource {
            source_type: source_type.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns true for failures caused by the caller's request rather than by
    /// the engine. Their messages are reported without a context prefix.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest(_) | Self::ColumnNotFound { .. } | Self::SecurityError(_)
        )
    }
}

impl From<serde_json::Error> for AnalyticsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a closure that's only called on error.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ErrorContext<T> for Result<T> {
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| AnalyticsError::Internal(format!("{msg}: {e}")))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AnalyticsError::Internal(format!("{}: {e}", f())))
    }
}
