//! Delimited text source read through DataFusion.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use datafusion::prelude::{CsvReadOptions, SessionContext};
use tracing::{info, instrument};

use super::{DataSource, SourceFormat};
use crate::error::{AnalyticsError, Result};
use crate::table::Table;

/// Options for configuring CSV file reading.
#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub has_header: bool,
    /// Field delimiter (default: ',')
    pub delimiter: u8,
    /// Quote character (default: '"')
    pub quote: u8,
    /// Maximum records to read for schema inference
    pub schema_infer_max_records: usize,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            has_header: true,
            delimiter: b',',
            quote: b'"',
            schema_infer_max_records: 1000,
        }
    }
}

/// A CSV file with an inferred schema.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    options: CsvOptions,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            options: CsvOptions::default(),
        }
    }

    pub fn with_options(path: impl Into<PathBuf>, options: CsvOptions) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DataSource for CsvSource {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn read(&self) -> Result<Table> {
        let path = self.path.to_str().ok_or_else(|| {
            AnalyticsError::data_source("csv", "file path is not valid UTF-8")
        })?;
        if !self.path.is_file() {
            return Err(AnalyticsError::data_source(
                "csv",
                format!("file not found: {path}"),
            ));
        }

        // DataFusion filters listings by extension, so pass the file's own
        let extension = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();

        let ctx = SessionContext::new();
        let options = CsvReadOptions::new()
            .has_header(self.options.has_header)
            .delimiter(self.options.delimiter)
            .quote(self.options.quote)
            .schema_infer_max_records(self.options.schema_infer_max_records)
            .file_extension(&extension);

        let df = ctx.read_csv(path, options).await?;
        let schema = df.schema().inner().clone();
        let batches = df.collect().await?;
        let table = Table::try_from_batches(schema, &batches)?;

        info!(
            rows = table.num_rows(),
            columns = table.num_columns(),
            "Read CSV file"
        );
        Ok(table)
    }

    fn format(&self) -> SourceFormat {
        SourceFormat::Csv
    }

    fn description(&self) -> String {
        format!("CSV file: {}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::DataType;
    use std::io::Write;

    #[tokio::test]
    async fn test_read_csv_infers_types() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "id,name,score,day").unwrap();
        writeln!(file, "1,alice,3.5,2024-01-01").unwrap();
        writeln!(file, "2,bob,,2024-01-02").unwrap();
        file.flush().unwrap();

        let table = CsvSource::new(file.path()).read().await.unwrap();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.data_type("id").unwrap(), DataType::Int64);
        assert_eq!(table.data_type("score").unwrap(), DataType::Float64);
        assert_eq!(table.column("score").unwrap().null_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let result = CsvSource::new("/no/such/file.csv").read().await;
        assert!(matches!(result, Err(AnalyticsError::DataSource { .. })));
    }

    #[tokio::test]
    async fn test_semicolon_delimiter() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "city;visits").unwrap();
        writeln!(file, "oslo;4").unwrap();
        file.flush().unwrap();

        let options = CsvOptions {
            delimiter: b';',
            ..CsvOptions::default()
        };
        let table = CsvSource::with_options(file.path(), options).read().await.unwrap();
        assert_eq!(table.column_names(), vec!["city", "visits"]);
    }
}
