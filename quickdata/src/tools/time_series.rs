//! Resampled trend analysis over a date column.

use std::collections::BTreeMap;
use std::str::FromStr;

use arrow::array::{ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, TimeUnit, TimestampMillisecondType};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::AnalyticsConfig;
use crate::error::{AnalyticsError, Result};
use crate::outcome::Outcome;
use crate::registry::DatasetRegistry;
use crate::stats::{self, round_to, Summary};
use crate::table::{self, is_numeric_type, is_string_type, is_temporal_type};

/// Resampling bucket width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Frequency {
    #[serde(rename = "D")]
    Daily,
    #[serde(rename = "W")]
    Weekly,
    #[serde(rename = "M")]
    Monthly,
}

impl Frequency {
    /// Picks the bucket width from the covered span.
    pub fn for_span(days: i64, config: &AnalyticsConfig) -> Self {
        if days > config.monthly_span_days {
            Self::Monthly
        } else if days > config.weekly_span_days {
            Self::Weekly
        } else {
            Self::Daily
        }
    }

    /// Label of the bucket containing `date`: the day itself, the Sunday
    /// closing its week, or the last day of its month.
    pub fn bucket(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Self::Daily => date,
            Self::Weekly => {
                let to_sunday = 6 - date.weekday().num_days_from_monday() as i64;
                date + Duration::days(to_sunday)
            }
            Self::Monthly => {
                let (year, month) = if date.month() == 12 {
                    (date.year() + 1, 1)
                } else {
                    (date.year(), date.month() + 1)
                };
                NaiveDate::from_ymd_opt(year, month, 1)
                    .and_then(|first| first.pred_opt())
                    .unwrap_or(date)
            }
        }
    }
}

/// `auto` or `None` mean "choose from the span".
fn parse_frequency(value: Option<&str>) -> Result<Option<Frequency>> {
    let Some(value) = value else { return Ok(None) };
    match value.to_ascii_lowercase().as_str() {
        "auto" => Ok(None),
        "d" | "day" | "daily" => Ok(Some(Frequency::Daily)),
        "w" | "week" | "weekly" => Ok(Some(Frequency::Weekly)),
        "m" | "me" | "month" | "monthly" => Ok(Some(Frequency::Monthly)),
        other => Err(AnalyticsError::invalid(format!(
            "Unsupported frequency '{other}'. Use 'auto', 'D', 'W' or 'M'."
        ))),
    }
}

impl FromStr for Frequency {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        parse_frequency(Some(s))?
            .ok_or_else(|| AnalyticsError::invalid("'auto' is not a concrete frequency"))
    }
}

struct DatePatterns {
    datetime_iso: Regex,
    date_iso: Regex,
    date_us: Regex,
    date_eu: Regex,
}

static DATE_PATTERNS: Lazy<DatePatterns> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    DatePatterns {
        datetime_iso: Regex::new(r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}").expect("valid regex"),
        date_iso: Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid regex"),
        date_us: Regex::new(r"^\d{1,2}/\d{1,2}/\d{4}$").expect("valid regex"),
        date_eu: Regex::new(r"^\d{1,2}\.\d{1,2}\.\d{4}$").expect("valid regex"),
    }
});

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parses common ISO, US (`m/d/Y`) and European (`d.m.Y`) date strings.
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    let patterns = &*DATE_PATTERNS;
    if patterns.datetime_iso.is_match(value) {
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(dt.naive_utc());
        }
        return DATETIME_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok());
    }
    let date = if patterns.date_iso.is_match(value) {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
    } else if patterns.date_us.is_match(value) {
        NaiveDate::parse_from_str(value, "%m/%d/%Y").ok()
    } else if patterns.date_eu.is_match(value) {
        NaiveDate::parse_from_str(value, "%d.%m.%Y").ok()
    } else {
        None
    };
    date.and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Converts a column to datetimes; unparseable entries become `None`.
pub fn datetime_values(array: &ArrayRef) -> Result<Vec<Option<NaiveDateTime>>> {
    let data_type = array.data_type();
    if is_temporal_type(data_type) {
        let millis = cast(array, &DataType::Timestamp(TimeUnit::Millisecond, None))?;
        return Ok(millis
            .as_primitive::<TimestampMillisecondType>()
            .iter()
            .map(|v| v.and_then(DateTime::from_timestamp_millis).map(|d| d.naive_utc()))
            .collect());
    }
    if is_string_type(data_type) {
        return Ok(table::column_strings(array)?
            .into_iter()
            .map(|v| v.as_deref().and_then(parse_datetime))
            .collect());
    }
    Ok(vec![None; array.len()])
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
    pub days: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trend {
    pub slope: f64,
    pub intercept: f64,
    pub direction: TrendDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub period: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesReport {
    pub dataset: String,
    pub date_column: String,
    pub value_column: String,
    pub frequency: Frequency,
    pub date_range: DateRange,
    pub data_points: usize,
    pub trend: Trend,
    pub statistics: Summary,
    pub series: Vec<SeriesPoint>,
}

async fn time_series(
    registry: &DatasetRegistry,
    dataset_name: &str,
    date_column: &str,
    value_column: &str,
    frequency: Option<&str>,
) -> Result<TimeSeriesReport> {
    let requested = parse_frequency(frequency)?;
    let table = registry.get(dataset_name).await?;
    let config = registry.config();

    let value_array = table.column(value_column)?;
    if !is_numeric_type(value_array.data_type()) {
        return Err(AnalyticsError::invalid(format!(
            "Value column '{value_column}' must be numerical"
        )));
    }
    let dates = datetime_values(table.column(date_column)?)?;
    let values = table::f64_values(value_array)?;

    // span covers every parsed date, even where the value is missing
    let (Some(start), Some(end)) = (
        dates.iter().flatten().min().copied(),
        dates.iter().flatten().max().copied(),
    ) else {
        return Err(AnalyticsError::invalid(
            "Not enough data points for time series analysis (need at least 2 after resampling)",
        ));
    };
    let days = (end - start).num_days();
    let frequency = requested.unwrap_or_else(|| Frequency::for_span(days, config));

    let observations: Vec<(NaiveDateTime, f64)> = dates
        .into_iter()
        .zip(values)
        .filter_map(|(d, v)| Some((d?, v?)))
        .collect();

    let mut buckets: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for (date, value) in &observations {
        let entry = buckets.entry(frequency.bucket(date.date())).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }
    let series: Vec<SeriesPoint> = buckets
        .into_iter()
        .map(|(period, (sum, count))| SeriesPoint {
            period: period.to_string(),
            value: sum / count as f64,
        })
        .collect();
    if series.len() < 2 {
        return Err(AnalyticsError::invalid(
            "Not enough data points for time series analysis (need at least 2 after resampling)",
        ));
    }

    let means: Vec<f64> = series.iter().map(|p| p.value).collect();
    let (slope, intercept) = stats::linear_trend(&means).unwrap_or((0.0, 0.0));
    let direction = if slope > config.trend_stability_epsilon {
        TrendDirection::Increasing
    } else if slope < -config.trend_stability_epsilon {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    };
    debug!(dataset = dataset_name, points = series.len(), slope, "Fitted trend");

    Ok(TimeSeriesReport {
        dataset: dataset_name.to_string(),
        date_column: date_column.to_string(),
        value_column: value_column.to_string(),
        frequency,
        date_range: DateRange {
            start: start.to_string(),
            end: end.to_string(),
            days,
        },
        data_points: series.len(),
        trend: Trend {
            slope: round_to(slope, 4),
            intercept: round_to(intercept, 4),
            direction,
        },
        statistics: Summary::of(&means),
        series,
    })
}

/// Resamples `value_column` over `date_column` and fits a linear trend.
#[instrument(skip(registry))]
pub async fn time_series_analysis(
    registry: &DatasetRegistry,
    dataset_name: &str,
    date_column: &str,
    value_column: &str,
    frequency: Option<&str>,
) -> Outcome<TimeSeriesReport> {
    Outcome::from_result(
        time_series(registry, dataset_name, date_column, value_column, frequency).await,
        "Time series analysis failed",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{column_ref, Table};
    use crate::test_fixtures::daily_series;
    use arrow::array::{Float64Array, StringArray};

    #[test]
    fn test_parse_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_datetime("2024-03-05"), Some(expected));
        assert_eq!(parse_datetime("03/05/2024"), Some(expected));
        assert_eq!(parse_datetime("05.03.2024"), Some(expected));
        assert!(parse_datetime("2024-03-05T10:30:00").is_some());
        assert!(parse_datetime("2024-03-05T10:30:00Z").is_some());
        assert_eq!(parse_datetime("yesterday"), None);
    }

    #[test]
    fn test_buckets() {
        let wednesday = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        assert_eq!(
            Frequency::Weekly.bucket(wednesday),
            NaiveDate::from_ymd_opt(2024, 1, 7).unwrap()
        );
        assert_eq!(
            Frequency::Monthly.bucket(NaiveDate::from_ymd_opt(2024, 2, 10).unwrap()),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert_eq!(
            Frequency::Monthly.bucket(NaiveDate::from_ymd_opt(2023, 12, 1).unwrap()),
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()
        );
    }

    #[test]
    fn test_auto_frequency() {
        let config = AnalyticsConfig::default();
        assert_eq!(Frequency::for_span(10, &config), Frequency::Daily);
        assert_eq!(Frequency::for_span(31, &config), Frequency::Weekly);
        assert_eq!(Frequency::for_span(366, &config), Frequency::Monthly);
    }

    #[tokio::test]
    async fn test_daily_increasing_trend() {
        let registry = DatasetRegistry::new();
        registry.load_table(daily_series(20), "ts").await.unwrap();
        let report = time_series_analysis(&registry, "ts", "date", "sales", None)
            .await
            .into_ok()
            .unwrap();
        assert_eq!(report.frequency, Frequency::Daily);
        assert_eq!(report.data_points, 20);
        assert_eq!(report.trend.direction, TrendDirection::Increasing);
        assert_eq!(report.trend.slope, 1.5);
        assert_eq!(report.date_range.days, 19);
    }

    #[tokio::test]
    async fn test_string_dates_and_unparseable_rows() {
        let table = Table::try_from_columns(vec![
            (
                "when",
                column_ref(StringArray::from(vec!["2024-01-01", "garbage", "2024-01-03"])),
            ),
            ("v", column_ref(Float64Array::from(vec![5.0, 6.0, 5.0]))),
        ])
        .unwrap();
        let registry = DatasetRegistry::new();
        registry.load_table(table, "s").await.unwrap();
        let report = time_series_analysis(&registry, "s", "when", "v", Some("D"))
            .await
            .into_ok()
            .unwrap();
        assert_eq!(report.data_points, 2);
        assert_eq!(report.trend.direction, TrendDirection::Stable);
    }

    #[tokio::test]
    async fn test_frequency_span_ignores_missing_values() {
        let first = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates: Vec<String> = (0..41)
            .map(|i| (first + Duration::days(i)).to_string())
            .collect();
        let values: Vec<Option<f64>> = (0..41).map(|i| (i < 10).then_some(i as f64)).collect();
        let table = Table::try_from_columns(vec![
            ("day", column_ref(StringArray::from(dates))),
            ("v", column_ref(Float64Array::from(values))),
        ])
        .unwrap();
        let registry = DatasetRegistry::new();
        registry.load_table(table, "sparse").await.unwrap();
        let report = time_series_analysis(&registry, "sparse", "day", "v", None)
            .await
            .into_ok()
            .unwrap();
        assert_eq!(report.date_range.days, 40);
        assert_eq!(report.frequency, Frequency::Weekly);
        // Jan 1-7 and Jan 8-10 are the only weeks with values
        assert_eq!(report.data_points, 2);
    }

    #[tokio::test]
    async fn test_single_point_fails_softly() {
        let registry = DatasetRegistry::new();
        registry.load_table(daily_series(1), "one").await.unwrap();
        let outcome = time_series_analysis(&registry, "one", "date", "sales", None).await;
        assert!(outcome.error_message().unwrap().contains("Not enough data points"));
    }
}
