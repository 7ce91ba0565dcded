//! File sources that materialize a [`Table`].
//!
//! The format is decided by the file extension alone: `.csv` is delimited
//! text and `.json` is structured records. No content sniffing.

use std::fmt::Debug;
use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{AnalyticsError, Result};
use crate::table::Table;

mod csv;
mod json;

pub use csv::{CsvOptions, CsvSource};
pub use json::JsonSource;

/// Where a dataset came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Csv,
    Json,
    /// Registered directly from an in-memory table.
    InMemory,
}

impl SourceFormat {
    /// Detects the format from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension.as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("json") => Ok(Self::Json),
            _ => Err(AnalyticsError::UnsupportedFormat {
                path: path.display().to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::InMemory => "in_memory",
        }
    }
}

/// A readable tabular source.
#[async_trait]
pub trait DataSource: Debug + Send + Sync {
    /// Reads the whole source into memory.
    async fn read(&self) -> Result<Table>;

    fn format(&self) -> SourceFormat;

    /// Returns a human-readable description of this data source.
    fn description(&self) -> String;
}

/// Picks the source implementation for `path`.
pub fn open(path: &Path) -> Result<Box<dyn DataSource>> {
    match SourceFormat::from_path(path)? {
        SourceFormat::Csv => Ok(Box::new(CsvSource::new(path))),
        SourceFormat::Json => Ok(Box::new(JsonSource::new(path))),
        SourceFormat::InMemory => Err(AnalyticsError::Internal(
            "in-memory tables have no file source".to_string(),
        )),
    }
}
