//! Analysis tools.
//!
//! Every tool takes the [`DatasetRegistry`](crate::registry::DatasetRegistry)
//! plus its arguments and returns an [`Outcome`](crate::outcome::Outcome):
//! failures come back as `{"error": …}` payloads rather than `Err`.

pub mod compare;
pub mod correlation;
pub mod custom_code;
pub mod datasets;
pub mod distribution;
pub mod memory;
pub mod merge;
pub mod outliers;
pub mod quality;
pub mod segmentation;
pub mod suggest;
pub mod time_series;

pub use compare::{compare_datasets, DatasetComparison};
pub use correlation::{
    calculate_feature_importance, find_correlations, CorrelationReport, FeatureImportanceReport,
};
pub use custom_code::{execute_custom_analytics_code, CodeExecutor};
pub use datasets::{
    clear_all_datasets, clear_dataset, get_dataset_info, list_loaded_datasets, load_dataset,
    DatasetListing, LoadResult,
};
pub use distribution::{analyze_distributions, DistributionReport};
pub use memory::{memory_optimization_report, MemoryReport};
pub use merge::{merge_datasets, JoinStrategy, MergeConfig, MergeReport};
pub use outliers::{detect_outliers, OutlierMethod, OutlierReport};
pub use quality::{validate_data_quality, DataQualityReport};
pub use segmentation::{segment_by_column, SegmentationReport};
pub use suggest::{suggest_analysis, AnalysisSuggestions};
pub use time_series::{time_series_analysis, Frequency, TimeSeriesReport};
