//! Structured-record JSON source.
//!
//! Accepted layouts:
//! - an array of objects (`[{"a": 1}, {"a": 2}]`)
//! - an object of column arrays (`{"a": [1, 2]}`)
//! - an object of index-keyed column maps (`{"a": {"0": 1, "1": 2}}`)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::json::reader::infer_json_schema_from_iterator;
use arrow::json::ReaderBuilder;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{info, instrument};

use super::{DataSource, SourceFormat};
use crate::error::{AnalyticsError, ErrorContext, Result};
use crate::table::Table;

#[derive(Debug, Clone)]
pub struct JsonSource {
    path: PathBuf,
}

impl JsonSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DataSource for JsonSource {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn read(&self) -> Result<Table> {
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            AnalyticsError::data_source_with_source(
                "json",
                format!("cannot read {}", self.path.display()),
                e,
            )
        })?;
        let document: Value = serde_json::from_str(&text)?;
        let records = records_from_document(document)?;
        let table = table_from_records(&records)
            .with_context(|| format!("Failed to build a table from {}", self.path.display()))?;

        info!(
            rows = table.num_rows(),
            columns = table.num_columns(),
            "Read JSON file"
        );
        Ok(table)
    }

    fn format(&self) -> SourceFormat {
        SourceFormat::Json
    }

    fn description(&self) -> String {
        format!("JSON file: {}", self.path.display())
    }
}

/// Normalizes any accepted layout into a list of row objects.
pub(crate) fn records_from_document(document: Value) -> Result<Vec<Value>> {
    match document {
        Value::Array(rows) => {
            if let Some(bad) = rows.iter().find(|r| !r.is_object()) {
                return Err(AnalyticsError::data_source(
                    "json",
                    format!("expected an array of objects, found element {bad}"),
                ));
            }
            Ok(rows)
        }
        Value::Object(columns) => records_from_columns(columns),
        other => Err(AnalyticsError::data_source(
            "json",
            format!("expected an array or object at the top level, found {other}"),
        )),
    }
}

fn records_from_columns(columns: Map<String, Value>) -> Result<Vec<Value>> {
    let mut rows: Vec<Map<String, Value>> = Vec::new();
    for (name, column) in columns {
        let values: Vec<Value> = match column {
            Value::Array(values) => values,
            Value::Object(by_index) => by_index.into_iter().map(|(_, v)| v).collect(),
            scalar => {
                return Err(AnalyticsError::data_source(
                    "json",
                    format!("column '{name}' must be an array or object, found {scalar}"),
                ))
            }
        };
        if rows.is_empty() {
            rows.resize_with(values.len(), Map::new);
        } else if rows.len() != values.len() {
            return Err(AnalyticsError::data_source(
                "json",
                format!(
                    "column '{name}' has {} values, expected {}",
                    values.len(),
                    rows.len()
                ),
            ));
        }
        for (row, value) in rows.iter_mut().zip(values) {
            row.insert(name.clone(), value);
        }
    }
    Ok(rows.into_iter().map(Value::Object).collect())
}

/// Infers an Arrow schema from the records and decodes them into one batch.
pub(crate) fn table_from_records(records: &[Value]) -> Result<Table> {
    let schema = Arc::new(infer_json_schema_from_iterator(records.iter().map(Ok))?);
    let mut decoder = ReaderBuilder::new(schema.clone())
        .with_batch_size(records.len().max(1))
        .with_coerce_primitive(true)
        .build_decoder()?;
    decoder.serialize(records)?;
    match decoder.flush()? {
        Some(batch) => Ok(Table::new(batch)),
        None => Ok(Table::new(arrow::array::RecordBatch::new_empty(schema))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::DataType;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_records_layout() {
        let records = records_from_document(json!([
            {"id": 1, "city": "Oslo", "temp": 3.5},
            {"id": 2, "city": "Rome", "temp": null}
        ]))
        .unwrap();
        let table = table_from_records(&records).unwrap();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.column_names(), vec!["id", "city", "temp"]);
        assert_eq!(table.data_type("id").unwrap(), DataType::Int64);
        assert_eq!(table.column("temp").unwrap().null_count(), 1);
    }

    #[test]
    fn test_column_layouts() {
        let arrays = records_from_document(json!({"a": [1, 2, 3], "b": ["x", "y", "z"]})).unwrap();
        assert_eq!(arrays.len(), 3);
        assert_eq!(arrays[2], json!({"a": 3, "b": "z"}));

        let maps = records_from_document(json!({"a": {"0": 1, "1": 2}})).unwrap();
        assert_eq!(maps, vec![json!({"a": 1}), json!({"a": 2})]);

        assert!(records_from_document(json!({"a": [1], "b": [1, 2]})).is_err());
        assert!(records_from_document(json!(42)).is_err());
    }

    #[test]
    fn test_mixed_types_coerce() {
        let records = vec![json!({"v": 1}), json!({"v": 2.5})];
        let table = table_from_records(&records).unwrap();
        assert_eq!(table.data_type("v").unwrap(), DataType::Float64);
    }

    #[tokio::test]
    async fn test_read_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"[{{"k": "a"}}, {{"k": "b"}}]"#).unwrap();
        file.flush().unwrap();
        let table = JsonSource::new(file.path()).read().await.unwrap();
        assert_eq!(table.num_rows(), 2);
    }
}
