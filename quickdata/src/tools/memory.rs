//! Column-level memory optimization advice.

use arrow::array::{Array, ArrayRef};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use serde::Serialize;
use tracing::instrument;

use crate::config::AnalyticsConfig;
use crate::error::Result;
use crate::outcome::Outcome;
use crate::registry::DatasetRegistry;
use crate::stats::round_to;
use crate::table::{self, is_string_type};

const KB: f64 = 1024.0;
const MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationSuggestion {
    pub column: String,
    pub current_type: String,
    pub suggested_type: String,
    pub suggestion: String,
    pub current_kb: f64,
    pub optimized_kb: f64,
    pub savings_kb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryReport {
    pub dataset: String,
    pub current_memory_mb: f64,
    pub potential_savings_mb: f64,
    pub potential_savings_pct: f64,
    pub optimization_suggestions: Vec<OptimizationSuggestion>,
}

fn dictionary_type() -> DataType {
    DataType::Dictionary(Box::new(DataType::Int32), Box::new(DataType::Utf8))
}

/// Smallest signed integer type holding every value, if narrower than the
/// current type.
fn narrower_integer(array: &ArrayRef) -> Result<Option<DataType>> {
    let current_width = match array.data_type() {
        DataType::Int64 | DataType::UInt64 => 8,
        DataType::Int32 | DataType::UInt32 => 4,
        DataType::Int16 | DataType::UInt16 => 2,
        _ => return Ok(None),
    };
    let values = table::f64_values(array)?;
    let (min, max) = values
        .iter()
        .flatten()
        .fold((0.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(*v), hi.max(*v)));

    let candidate = [
        (DataType::Int8, 1, i8::MIN as f64, i8::MAX as f64),
        (DataType::Int16, 2, i16::MIN as f64, i16::MAX as f64),
        (DataType::Int32, 4, i32::MIN as f64, i32::MAX as f64),
    ]
    .into_iter()
    .find(|(_, _, lo, hi)| min >= *lo && max <= *hi)
    .filter(|(_, width, _, _)| *width < current_width)
    .map(|(data_type, _, _, _)| data_type);
    Ok(candidate)
}

/// `Float32` when every value survives the round trip.
fn narrower_float(array: &ArrayRef) -> Result<Option<DataType>> {
    if array.data_type() != &DataType::Float64 {
        return Ok(None);
    }
    let lossless = table::f64_values(array)?
        .into_iter()
        .flatten()
        .all(|v| (v as f32) as f64 == v);
    Ok(lossless.then_some(DataType::Float32))
}

fn suggestion_for(
    column: &str,
    array: &ArrayRef,
    rows: usize,
    config: &AnalyticsConfig,
) -> Result<Option<OptimizationSuggestion>> {
    let target = if is_string_type(array.data_type()) {
        let unique = table::distinct_count(array)?;
        (rows > 0 && (unique as f64 / rows as f64) < config.categorical_ratio_threshold)
            .then(dictionary_type)
    } else {
        match narrower_integer(array)? {
            Some(t) => Some(t),
            None => narrower_float(array)?,
        }
    };
    let Some(target) = target else { return Ok(None) };

    let current = array.get_array_memory_size();
    let optimized = cast(array, &target)?.get_array_memory_size();
    if optimized >= current {
        return Ok(None);
    }
    let suggestion = if matches!(target, DataType::Dictionary(..)) {
        "Dictionary-encode repeated strings".to_string()
    } else {
        format!("Downcast to '{target}'")
    };
    Ok(Some(OptimizationSuggestion {
        column: column.to_string(),
        current_type: array.data_type().to_string(),
        suggested_type: target.to_string(),
        suggestion,
        current_kb: round_to(current as f64 / KB, 2),
        optimized_kb: round_to(optimized as f64 / KB, 2),
        savings_kb: round_to((current - optimized) as f64 / KB, 2),
    }))
}

async fn memory_report(registry: &DatasetRegistry, dataset_name: &str) -> Result<MemoryReport> {
    let table = registry.get(dataset_name).await?;
    let rows = table.num_rows();

    let mut suggestions = Vec::new();
    let mut total_savings = 0.0;
    for column in table.column_names() {
        let array = table.column(&column)?;
        if let Some(suggestion) = suggestion_for(&column, array, rows, registry.config())? {
            total_savings += suggestion.savings_kb * KB;
            suggestions.push(suggestion);
        }
    }

    let current = table.memory_bytes() as f64;
    Ok(MemoryReport {
        dataset: dataset_name.to_string(),
        current_memory_mb: round_to(current / MB, 2),
        potential_savings_mb: round_to(total_savings / MB, 2),
        potential_savings_pct: if current > 0.0 {
            round_to(total_savings / current * 100.0, 2)
        } else {
            0.0
        },
        optimization_suggestions: suggestions,
    })
}

/// Suggests dictionary encoding and numeric downcasts with estimated savings.
#[instrument(skip(registry))]
pub async fn memory_optimization_report(
    registry: &DatasetRegistry,
    dataset_name: &str,
) -> Outcome<MemoryReport> {
    Outcome::from_result(
        memory_report(registry, dataset_name).await,
        "Memory optimization analysis failed",
    )
}
