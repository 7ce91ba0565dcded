//! Role-driven analysis recommendations.

use serde::Serialize;

use crate::outcome::Outcome;
use crate::registry::DatasetRegistry;
use crate::schema::DatasetSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// One recommended analysis with a ready-to-run command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub columns: Vec<String>,
    pub tool_command: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummaryCounts {
    pub numerical_columns: usize,
    pub categorical_columns: usize,
    pub temporal_columns: usize,
    pub identifier_columns: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisSuggestions {
    pub dataset_name: String,
    pub suggestions: Vec<Suggestion>,
    pub dataset_summary: DatasetSummaryCounts,
}

fn take(columns: &[String], n: usize) -> Vec<String> {
    columns.iter().take(n).cloned().collect()
}

/// Builds the prioritized suggestion list for a schema.
pub fn suggestions_for(schema: &DatasetSchema) -> AnalysisSuggestions {
    let name = &schema.name;
    let numerical = schema.numerical_columns();
    let categorical = schema.categorical_columns();
    let temporal = schema.temporal_columns();
    let mut suggestions = Vec::new();

    if numerical.len() >= 2 {
        suggestions.push(Suggestion {
            kind: "correlation_analysis".to_string(),
            description: "Find relationships between numerical variables".to_string(),
            columns: numerical.clone(),
            tool_command: format!("find_correlations('{name}')"),
            priority: Priority::High,
        });
    }
    if let (Some(group), false) = (categorical.first(), numerical.is_empty()) {
        suggestions.push(Suggestion {
            kind: "segmentation".to_string(),
            description: "Group data by categorical variables".to_string(),
            columns: categorical.clone(),
            tool_command: format!("segment_by_column('{name}', '{group}')"),
            priority: Priority::High,
        });
    }
    if let (Some(date), Some(value)) = (temporal.first(), numerical.first()) {
        suggestions.push(Suggestion {
            kind: "time_series".to_string(),
            description: "Analyze trends over time".to_string(),
            columns: take(&temporal, 1)
                .into_iter()
                .chain(take(&numerical, 1))
                .collect(),
            tool_command: format!("time_series_analysis('{name}', '{date}', '{value}')"),
            priority: Priority::Medium,
        });
    }
    if let Some(first) = numerical.first().or_else(|| categorical.first()) {
        suggestions.push(Suggestion {
            kind: "distribution_analysis".to_string(),
            description: "Examine the distribution of individual columns".to_string(),
            columns: take(&numerical, 3),
            tool_command: format!("analyze_distributions('{name}', '{first}')"),
            priority: Priority::Medium,
        });
    }
    if !numerical.is_empty() {
        suggestions.push(Suggestion {
            kind: "outlier_detection".to_string(),
            description: "Find unusual values in numerical columns".to_string(),
            columns: numerical.clone(),
            tool_command: format!("detect_outliers('{name}')"),
            priority: Priority::Low,
        });
    }
    suggestions.push(Suggestion {
        kind: "data_quality".to_string(),
        description: "Check missing values, duplicates and identifier integrity".to_string(),
        columns: Vec::new(),
        tool_command: format!("validate_data_quality('{name}')"),
        priority: Priority::Low,
    });

    AnalysisSuggestions {
        dataset_name: name.clone(),
        suggestions,
        dataset_summary: DatasetSummaryCounts {
            numerical_columns: numerical.len(),
            categorical_columns: categorical.len(),
            temporal_columns: temporal.len(),
            identifier_columns: schema.identifier_columns().len(),
        },
    }
}

pub async fn suggest_analysis(
    registry: &DatasetRegistry,
    dataset_name: &str,
) -> Outcome<AnalysisSuggestions> {
    Outcome::from_result(
        registry.schema(dataset_name).await.map(|s| suggestions_for(&s)),
        "Analysis suggestion failed",
    )
}
