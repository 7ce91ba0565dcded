//! Workflow prompts: markdown guidance assembled from dataset schemas.
//!
//! Prompts never fail. Problems are reported inline as text starting with
//! `**Error**`, so the caller always has something to show.

mod analysis;
mod discovery;

pub use analysis::{
    correlation_investigation, dashboard_design_consultation, data_quality_assessment,
    dataset_first_look, insight_generation_workshop, pattern_discovery_session,
    segmentation_workshop,
};
pub use discovery::{find_datasources, format_file_size, list_mcp_assets};

/// Placeholder used in commands when no suitable column exists.
pub(crate) const COLUMN_PLACEHOLDER: &str = "COLUMN_NAME";

pub(crate) fn missing_dataset(dataset_name: &str) -> String {
    format!("**Error**: Dataset '{dataset_name}' not found. Please load it first.")
}

/// `1234567` → `1,234,567`.
pub fn format_thousands(value: usize) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// First letter of each word upper-cased, the rest lower-cased.
pub(crate) fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
