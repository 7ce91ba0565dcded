//! Column role inference and dataset schemas.
//!
//! Every column gets a [`ColumnRole`] from an ordered rule:
//!
//! 1. numeric type → `numerical`
//! 2. date/timestamp type → `temporal`
//! 3. distinct / rows below the categorical ratio → `categorical`
//! 4. all values distinct → `identifier`
//! 5. otherwise → `categorical`
//!
//! A fully unique integer column is therefore `numerical`, never `identifier`.

use std::fmt;

use arrow::array::ArrayRef;
use arrow::datatypes::DataType;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::AnalyticsConfig;
use crate::error::Result;
use crate::table::{self, is_numeric_type, is_temporal_type, Table};

/// Functional category of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Numerical,
    Categorical,
    Temporal,
    Identifier,
}

impl ColumnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numerical => "numerical",
            Self::Categorical => "categorical",
            Self::Temporal => "temporal",
            Self::Identifier => "identifier",
        }
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Analyses worth running given the role mix of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAnalysis {
    CorrelationAnalysis,
    SegmentationAnalysis,
    TimeSeriesAnalysis,
}

impl SuggestedAnalysis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CorrelationAnalysis => "correlation_analysis",
            Self::SegmentationAnalysis => "segmentation_analysis",
            Self::TimeSeriesAnalysis => "time_series_analysis",
        }
    }
}

/// Derived metadata for one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub dtype: String,
    pub unique_values: usize,
    /// Null fraction expressed as a percentage (0 to 100).
    pub null_percentage: f64,
    pub sample_values: Vec<Value>,
    pub suggested_role: ColumnRole,
}

impl ColumnInfo {
    pub fn null_fraction(&self) -> f64 {
        self.null_percentage / 100.0
    }
}

/// Schema of a loaded dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSchema {
    pub name: String,
    /// Columns in table order.
    pub columns: Vec<ColumnInfo>,
    pub row_count: usize,
    pub suggested_analyses: Vec<SuggestedAnalysis>,
}

impl DatasetSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Names of columns with the given role, in table order.
    pub fn columns_with_role(&self, role: ColumnRole) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.suggested_role == role)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn numerical_columns(&self) -> Vec<String> {
        self.columns_with_role(ColumnRole::Numerical)
    }

    pub fn categorical_columns(&self) -> Vec<String> {
        self.columns_with_role(ColumnRole::Categorical)
    }

    pub fn temporal_columns(&self) -> Vec<String> {
        self.columns_with_role(ColumnRole::Temporal)
    }

    pub fn identifier_columns(&self) -> Vec<String> {
        self.columns_with_role(ColumnRole::Identifier)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

struct ColumnMap<'a>(&'a [ColumnInfo]);

impl Serialize for ColumnMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for column in self.0 {
            map.serialize_entry(&column.name, column)?;
        }
        map.end()
    }
}

impl Serialize for DatasetSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(4))?;
        map.serialize_entry("name", &self.name)?;
        map.serialize_entry("columns", &ColumnMap(&self.columns))?;
        map.serialize_entry("row_count", &self.row_count)?;
        map.serialize_entry("suggested_analyses", &self.suggested_analyses)?;
        map.end()
    }
}

/// Configuration for schema inference.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub categorical_ratio_threshold: f64,
    pub sample_value_count: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self::from(&AnalyticsConfig::default())
    }
}

impl From<&AnalyticsConfig> for InferenceConfig {
    fn from(config: &AnalyticsConfig) -> Self {
        Self {
            categorical_ratio_threshold: config.categorical_ratio_threshold,
            sample_value_count: config.sample_value_count,
        }
    }
}

/// Derives a [`DatasetSchema`] from table contents.
///
/// # Example
///
/// ```rust
/// use quickdata::schema::{ColumnRole, SchemaInferencer};
/// use quickdata::table::{column_ref, Table};
/// use arrow::array::{Int64Array, StringArray};
///
/// let table = Table::try_from_columns(vec![
///     ("id", column_ref(Int64Array::from(vec![1, 2, 3]))),
///     ("code", column_ref(StringArray::from(vec!["a", "b", "c"]))),
/// ]).unwrap();
///
/// let schema = SchemaInferencer::new().infer("demo", &table).unwrap();
/// assert_eq!(schema.columns[0].suggested_role, ColumnRole::Numerical);
/// assert_eq!(schema.columns[1].suggested_role, ColumnRole::Identifier);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SchemaInferencer {
    config: InferenceConfig,
}

impl SchemaInferencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> SchemaInferencerBuilder {
        SchemaInferencerBuilder::default()
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Infers the schema of `table`.
    #[instrument(skip(self, table), fields(rows = table.num_rows(), columns = table.num_columns()))]
    pub fn infer(&self, name: &str, table: &Table) -> Result<DatasetSchema> {
        let row_count = table.num_rows();
        let columns = table
            .schema()
            .fields()
            .iter()
            .zip(table.batch().columns())
            .map(|(field, array)| self.infer_column(field.name(), array, row_count))
            .collect::<Result<Vec<ColumnInfo>>>()?;
        let suggested_analyses = suggest_analyses(&columns);

        debug!(
            dataset = name,
            suggestions = suggested_analyses.len(),
            "Inferred dataset schema"
        );

        Ok(DatasetSchema {
            name: name.to_string(),
            columns,
            row_count,
            suggested_analyses,
        })
    }

    /// Builds the metadata for one column.
    pub fn infer_column(
        &self,
        name: &str,
        array: &ArrayRef,
        row_count: usize,
    ) -> Result<ColumnInfo> {
        let unique_values = table::distinct_count(array)?;
        let nulls = table::null_count(array.as_ref());
        let null_percentage = if row_count == 0 {
            0.0
        } else {
            nulls as f64 / row_count as f64 * 100.0
        };

        let sample_values = self.sample_values(array);
        let suggested_role = self.classify(array.data_type(), unique_values, row_count);

        Ok(ColumnInfo {
            name: name.to_string(),
            dtype: array.data_type().to_string(),
            unique_values,
            null_percentage,
            sample_values,
            suggested_role,
        })
    }

    fn sample_values(&self, array: &ArrayRef) -> Vec<Value> {
        let wanted = self.config.sample_value_count;
        let mut samples = Vec::with_capacity(wanted);
        for row in 0..array.len() {
            if samples.len() == wanted {
                break;
            }
            if array.is_null(row) || array.data_type() == &DataType::Null {
                continue;
            }
            if let Ok(value) = table::cell_json(array, row) {
                if !value.is_null() {
                    samples.push(value);
                }
            }
        }
        samples
    }

    /// Applies the ordered role rule.
    pub fn classify(&self, data_type: &DataType, unique_values: usize, row_count: usize) -> ColumnRole {
        if is_numeric_type(data_type) {
            return ColumnRole::Numerical;
        }
        if is_temporal_type(data_type) {
            return ColumnRole::Temporal;
        }
        if row_count == 0 {
            return ColumnRole::Categorical;
        }
        let ratio = unique_values as f64 / row_count as f64;
        if ratio < self.config.categorical_ratio_threshold {
            ColumnRole::Categorical
        } else if unique_values == row_count {
            ColumnRole::Identifier
        } else {
            ColumnRole::Categorical
        }
    }
}

/// Suggested analyses from the role distribution. Independent, non-exclusive.
pub fn suggest_analyses(columns: &[ColumnInfo]) -> Vec<SuggestedAnalysis> {
    let count = |role| columns.iter().filter(|c| c.suggested_role == role).count();
    let mut suggestions = Vec::new();
    if count(ColumnRole::Numerical) >= 2 {
        suggestions.push(SuggestedAnalysis::CorrelationAnalysis);
    }
    if count(ColumnRole::Categorical) >= 1 {
        suggestions.push(SuggestedAnalysis::SegmentationAnalysis);
    }
    if count(ColumnRole::Temporal) >= 1 {
        suggestions.push(SuggestedAnalysis::TimeSeriesAnalysis);
    }
    suggestions
}

/// Builder for [`SchemaInferencer`].
#[derive(Debug, Default)]
pub struct SchemaInferencerBuilder {
    config: InferenceConfig,
}

impl SchemaInferencerBuilder {
    pub fn categorical_ratio_threshold(mut self, threshold: f64) -> Self {
        self.config.categorical_ratio_threshold = threshold;
        self
    }

    pub fn sample_value_count(mut self, count: usize) -> Self {
        self.config.sample_value_count = count;
        self
    }

    pub fn from_config(mut self, config: &AnalyticsConfig) -> Self {
        self.config = InferenceConfig::from(config);
        self
    }

    pub fn build(self) -> SchemaInferencer {
        SchemaInferencer {
            config: self.config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::column_ref;
    use crate::test_fixtures::{daily_series, sales_table};
    use arrow::array::{Int64Array, StringArray};
    use serde_json::json;

    #[test]
    fn test_sales_table_roles() {
        let schema = SchemaInferencer::new().infer("sales", &sales_table()).unwrap();
        assert_eq!(schema.row_count, 5);
        let roles: Vec<_> = schema.columns.iter().map(|c| c.suggested_role).collect();
        // 3 distinct categories over 5 rows is a 0.6 ratio, not all unique
        assert_eq!(
            roles,
            vec![
                ColumnRole::Numerical,
                ColumnRole::Categorical,
                ColumnRole::Numerical
            ]
        );
        assert_eq!(
            schema.suggested_analyses,
            vec![
                SuggestedAnalysis::CorrelationAnalysis,
                SuggestedAnalysis::SegmentationAnalysis
            ]
        );
        assert_eq!(schema.columns[1].sample_values, vec![json!("A"), json!("B"), json!("A")]);
    }

    #[test]
    fn test_unique_integer_column_is_numerical() {
        let inferencer = SchemaInferencer::new();
        assert_eq!(inferencer.classify(&DataType::Int64, 10, 10), ColumnRole::Numerical);
        assert_eq!(inferencer.classify(&DataType::Utf8, 10, 10), ColumnRole::Identifier);
        assert_eq!(inferencer.classify(&DataType::Utf8, 4, 10), ColumnRole::Categorical);
        assert_eq!(inferencer.classify(&DataType::Utf8, 5, 10), ColumnRole::Categorical);
        assert_eq!(inferencer.classify(&DataType::Date32, 10, 10), ColumnRole::Temporal);
        assert_eq!(inferencer.classify(&DataType::Utf8, 0, 0), ColumnRole::Categorical);
    }

    #[test]
    fn test_temporal_suggestion() {
        let schema = SchemaInferencer::new().infer("ts", &daily_series(3)).unwrap();
        assert_eq!(schema.temporal_columns(), vec!["date"]);
        assert!(schema
            .suggested_analyses
            .contains(&SuggestedAnalysis::TimeSeriesAnalysis));
    }

    #[test]
    fn test_nulls_and_samples() {
        let table = Table::try_from_columns(vec![
            ("n", column_ref(Int64Array::from(vec![None, Some(3), None, Some(4)]))),
            ("s", column_ref(StringArray::from(vec![Some("x"), None, Some("y"), Some("z")]))),
        ])
        .unwrap();
        let schema = SchemaInferencer::new().infer("t", &table).unwrap();
        assert_eq!(schema.columns[0].null_percentage, 50.0);
        assert_eq!(schema.columns[0].sample_values, vec![json!(3), json!(4)]);
        assert_eq!(schema.columns[1].unique_values, 3);
        assert_eq!(schema.columns[1].null_fraction(), 0.25);
    }

    #[test]
    fn test_infer_column_counts_distinct_values() {
        let inferencer = SchemaInferencer::new();
        let codes = column_ref(StringArray::from(vec![Some("a"), Some("a"), None, Some("b")]));
        let info = inferencer.infer_column("code", &codes, 4).unwrap();
        assert_eq!(info.unique_values, 2);
        assert_eq!(info.null_percentage, 25.0);

        let empty = arrow::array::new_null_array(&DataType::Null, 3);
        let info = inferencer.infer_column("blank", &empty, 3).unwrap();
        assert_eq!(info.unique_values, 0);
        assert_eq!(info.null_percentage, 100.0);
    }

    #[test]
    fn test_zero_row_table() {
        let table = sales_table().head(0);
        let schema = SchemaInferencer::new().infer("empty", &table).unwrap();
        assert_eq!(schema.row_count, 0);
        assert_eq!(schema.columns[1].suggested_role, ColumnRole::Categorical);
        assert_eq!(schema.columns[1].null_percentage, 0.0);
    }

    #[test]
    fn test_schema_serializes_columns_in_order() {
        let schema = SchemaInferencer::new().infer("sales", &sales_table()).unwrap();
        let value = serde_json::to_value(&schema).unwrap();
        let keys: Vec<_> = value["columns"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["id", "category", "value"]);
        assert_eq!(value["columns"]["category"]["suggested_role"], json!("categorical"));
    }

    #[test]
    fn test_builder_threshold() {
        let inferencer = SchemaInferencer::builder()
            .categorical_ratio_threshold(0.7)
            .build();
        assert_eq!(inferencer.classify(&DataType::Utf8, 6, 10), ColumnRole::Categorical);
    }
}
