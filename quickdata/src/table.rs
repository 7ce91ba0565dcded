//! In-memory tables backed by a single Arrow [`RecordBatch`].
//!
//! Tables are cheap to clone: column buffers are reference counted, so tools
//! take a snapshot from the registry and compute outside its lock.

use std::collections::HashSet;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, RecordBatch, UInt32Array};
use arrow::compute::{cast, concat_batches, take_record_batch};
use arrow::datatypes::{DataType, Float64Type, Int64Type, SchemaRef, UInt64Type};
use arrow::json::LineDelimitedWriter;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use datafusion::prelude::SessionContext;
use serde_json::{Map, Value};

use crate::error::{AnalyticsError, Result};

/// Name under which a table is registered for SQL queries.
pub const SQL_TABLE_NAME: &str = "data";

const ROW_KEY_SEPARATOR: char = '\x1F';
const ROW_KEY_NULL: &str = "\x00NULL";

/// Returns true for integer, floating point and decimal types.
pub fn is_numeric_type(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float16
            | DataType::Float32
            | DataType::Float64
            | DataType::Decimal128(_, _)
            | DataType::Decimal256(_, _)
    )
}

/// Returns true for date and timestamp types.
pub fn is_temporal_type(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _)
    )
}

pub fn is_string_type(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View
    )
}

/// Number of missing values, treating every slot of a `Null` array as missing.
pub fn null_count(array: &dyn Array) -> usize {
    if array.data_type() == &DataType::Null {
        array.len()
    } else {
        array.null_count()
    }
}

/// Formats every value of a column, `None` for nulls.
pub fn column_strings(array: &ArrayRef) -> Result<Vec<Option<String>>> {
    if array.data_type() == &DataType::Null {
        return Ok(vec![None; array.len()]);
    }
    let options = FormatOptions::default();
    let formatter = ArrayFormatter::try_new(array.as_ref(), &options)?;
    Ok((0..array.len())
        .map(|i| {
            if array.is_null(i) {
                None
            } else {
                Some(formatter.value(i).to_string())
            }
        })
        .collect())
}

/// Number of distinct non-null values in a column.
pub fn distinct_count(array: &ArrayRef) -> Result<usize> {
    let values = column_strings(array)?;
    Ok(values.into_iter().flatten().collect::<HashSet<_>>().len())
}

/// Casts a column to `f64`. Nulls and NaN become `None`.
pub fn f64_values(array: &ArrayRef) -> Result<Vec<Option<f64>>> {
    let floats = cast(array, &DataType::Float64)?;
    Ok(floats
        .as_primitive::<Float64Type>()
        .iter()
        .map(|value| value.filter(|v| !v.is_nan()))
        .collect())
}

/// Non-missing values of a numeric column, in row order.
pub fn numeric_values(array: &ArrayRef) -> Result<Vec<f64>> {
    Ok(f64_values(array)?.into_iter().flatten().collect())
}

fn float_to_json(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Converts a column to JSON scalars, keeping numbers and booleans typed.
pub fn column_json_values(array: &ArrayRef) -> Result<Vec<Value>> {
    let data_type = array.data_type();
    let values = match data_type {
        DataType::Null => vec![Value::Null; array.len()],
        DataType::Boolean => array
            .as_boolean()
            .iter()
            .map(|v| v.map(Value::Bool).unwrap_or(Value::Null))
            .collect(),
        DataType::UInt64 => array
            .as_primitive::<UInt64Type>()
            .iter()
            .map(|v| v.map(Value::from).unwrap_or(Value::Null))
            .collect(),
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32 => cast(array, &DataType::Int64)?
            .as_primitive::<Int64Type>()
            .iter()
            .map(|v| v.map(Value::from).unwrap_or(Value::Null))
            .collect(),
        DataType::Float16 | DataType::Float32 | DataType::Float64 => cast(array, &DataType::Float64)?
            .as_primitive::<Float64Type>()
            .iter()
            .map(|v| v.map(float_to_json).unwrap_or(Value::Null))
            .collect(),
        _ => column_strings(array)?
            .into_iter()
            .map(|v| v.map(Value::String).unwrap_or(Value::Null))
            .collect(),
    };
    Ok(values)
}

/// JSON value of a single cell.
pub fn cell_json(array: &ArrayRef, row: usize) -> Result<Value> {
    let slice = array.slice(row, 1);
    Ok(column_json_values(&slice)?
        .into_iter()
        .next()
        .unwrap_or(Value::Null))
}

/// A named, column-oriented table.
#[derive(Debug, Clone)]
pub struct Table {
    batch: RecordBatch,
}

impl Table {
    pub fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    /// Concatenates batches into one table; an empty list yields an empty table.
    pub fn try_from_batches(schema: SchemaRef, batches: &[RecordBatch]) -> Result<Self> {
        match batches.first() {
            None => Ok(Self::new(RecordBatch::new_empty(schema))),
            Some(first) => {
                let batch = concat_batches(&first.schema(), batches)?;
                Ok(Self::new(batch))
            }
        }
    }

    /// Builds a table from named columns of equal length.
    pub fn try_from_columns<S: AsRef<str>>(columns: Vec<(S, ArrayRef)>) -> Result<Self> {
        Ok(Self::new(RecordBatch::try_from_iter(columns)?))
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema_ref()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.batch.schema_ref().index_of(name).is_ok()
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Result<&ArrayRef> {
        let index = self
            .batch
            .schema_ref()
            .index_of(name)
            .map_err(|_| AnalyticsError::column_not_found(name))?;
        Ok(self.batch.column(index))
    }

    pub fn data_type(&self, name: &str) -> Result<DataType> {
        Ok(self.column(name)?.data_type().clone())
    }

    /// Names of numeric columns in table order.
    pub fn numeric_columns(&self) -> Vec<String> {
        self.batch
            .schema_ref()
            .fields()
            .iter()
            .filter(|f| is_numeric_type(f.data_type()))
            .map(|f| f.name().clone())
            .collect()
    }

    /// Bytes held by the column buffers.
    pub fn memory_bytes(&self) -> usize {
        self.batch.get_array_memory_size()
    }

    pub fn memory_mb(&self) -> f64 {
        self.memory_bytes() as f64 / (1024.0 * 1024.0)
    }

    /// Selects rows by position, in the order given.
    pub fn take_rows(&self, indices: &[usize]) -> Result<Self> {
        let indices = UInt32Array::from_iter_values(indices.iter().map(|&i| i as u32));
        Ok(Self::new(take_record_batch(&self.batch, &indices)?))
    }

    /// The first `n` rows (or fewer).
    pub fn head(&self, n: usize) -> Self {
        Self::new(self.batch.slice(0, n.min(self.num_rows())))
    }

    pub fn total_null_count(&self) -> usize {
        self.batch
            .columns()
            .iter()
            .map(|c| null_count(c.as_ref()))
            .sum()
    }

    /// Number of rows that repeat an earlier row exactly (nulls compare equal).
    pub fn duplicate_row_count(&self) -> Result<usize> {
        let columns = self
            .batch
            .columns()
            .iter()
            .map(column_strings)
            .collect::<Result<Vec<_>>>()?;

        let mut seen = HashSet::with_capacity(self.num_rows());
        let mut duplicates = 0;
        for row in 0..self.num_rows() {
            let mut key = String::new();
            for (i, column) in columns.iter().enumerate() {
                if i > 0 {
                    key.push(ROW_KEY_SEPARATOR);
                }
                key.push_str(column[row].as_deref().unwrap_or(ROW_KEY_NULL));
            }
            if !seen.insert(key) {
                duplicates += 1;
            }
        }
        Ok(duplicates)
    }

    /// Rows as JSON objects keyed by column name.
    pub fn to_records(&self, limit: Option<usize>) -> Result<Vec<Map<String, Value>>> {
        let rows = limit.map_or(self.num_rows(), |n| n.min(self.num_rows()));
        let table = self.head(rows);
        let names = table.column_names();
        let columns = table
            .batch
            .columns()
            .iter()
            .map(column_json_values)
            .collect::<Result<Vec<_>>>()?;

        Ok((0..rows)
            .map(|row| {
                names
                    .iter()
                    .zip(&columns)
                    .map(|(name, values)| (name.clone(), values[row].clone()))
                    .collect()
            })
            .collect())
    }

    /// Serializes the table as newline-delimited JSON.
    pub fn to_ndjson(&self) -> Result<Vec<u8>> {
        let mut writer = LineDelimitedWriter::new(Vec::new());
        writer.write(&self.batch)?;
        writer.finish()?;
        Ok(writer.into_inner())
    }

    /// A fresh DataFusion context with this table registered as `data`.
    pub fn session_context(&self) -> Result<SessionContext> {
        let ctx = SessionContext::new();
        ctx.register_batch(SQL_TABLE_NAME, self.batch.clone())?;
        Ok(ctx)
    }
}

impl From<RecordBatch> for Table {
    fn from(batch: RecordBatch) -> Self {
        Self::new(batch)
    }
}

/// Convenience for building a single column.
pub fn column_ref<A: Array + 'static>(array: A) -> ArrayRef {
    Arc::new(array)
}
