//! Charts, dashboards and exports written into a temporary output tree.

mod common;

use common::data_dir;
use quickdata::config::OutputConfig;
use quickdata::registry::DatasetRegistry;
use quickdata::render::{self, ChartRequest, ExportFormat};
use serde_json::json;

async fn orders_registry(dir: &tempfile::TempDir) -> DatasetRegistry {
    let registry = DatasetRegistry::new();
    registry
        .load(dir.path().join("orders.json"), "orders")
        .await
        .unwrap();
    registry
}

#[tokio::test]
async fn test_dashboard_with_one_bad_chart() {
    let dir = data_dir();
    let registry = orders_registry(&dir).await;
    let output = OutputConfig::under(dir.path().join("out"));

    let configs = vec![
        json!({"chart_type": "bar", "x_column": "customer", "y_column": "amount"}),
        json!({"chart_type": "histogram", "x_column": "amount", "title": "Order sizes"}),
        json!({"chart_type": "line", "x_column": "shipping_date", "y_column": "amount"}),
    ];
    let report = render::generate_dashboard(&registry, &output, "orders", &configs)
        .await
        .into_ok()
        .unwrap();

    assert_eq!(report.summary.total_charts_requested, 3);
    assert_eq!(report.summary.successful_charts, 2);
    assert_eq!(report.summary.failed_charts, 1);
    let failed = &report.charts[2];
    assert_eq!(failed.chart_id, 3);
    assert!(failed.error.as_deref().unwrap().contains("shipping_date"));

    let written = std::fs::read_dir(&output.charts_dir).unwrap().count();
    assert_eq!(written, 2);
    assert!(output.charts_dir.join("Order_sizes.html").exists());
}

#[tokio::test]
async fn test_chart_with_explicit_save_path() {
    let dir = data_dir();
    let registry = orders_registry(&dir).await;
    let output = OutputConfig::under(dir.path().join("out"));
    let target = dir.path().join("custom").join("amounts.html");

    let result = render::create_chart(
        &registry,
        &output,
        "orders",
        &ChartRequest::new("box", "amount")
            .grouped_by("customer")
            .saved_to(&target),
    )
    .await
    .into_ok()
    .unwrap();
    assert_eq!(result.chart_config.title, "Box Chart: amount (grouped by customer)");
    assert!(target.exists());
}

#[tokio::test]
async fn test_export_every_format() {
    let dir = data_dir();
    let registry = orders_registry(&dir).await;
    let output = OutputConfig::under(dir.path().join("out"));

    for (format, extension) in [("json", "json"), ("csv", "csv"), ("html", "html")] {
        let result = render::export_insights(&registry, &output, "orders", Some(format), false)
            .await
            .into_ok()
            .unwrap();
        assert_eq!(result.export_format, format.parse::<ExportFormat>().unwrap());
        let expected = output.reports_dir.join(format!("insights_orders.{extension}"));
        assert!(expected.exists(), "missing {}", expected.display());
        let contents = std::fs::read_to_string(expected).unwrap();
        assert!(contents.contains('6'), "row count missing from {format} export");
    }

    let unsupported = render::export_insights(&registry, &output, "orders", Some("pdf"), false).await;
    assert!(unsupported.error_message().unwrap().contains("pdf"));
}

#[tokio::test]
async fn test_outputs_for_missing_dataset_are_soft_errors() {
    let dir = tempfile::tempdir().unwrap();
    let registry = DatasetRegistry::new();
    let output = OutputConfig::under(dir.path());

    let chart = render::create_chart(&registry, &output, "ghost", &ChartRequest::new("bar", "x")).await;
    assert!(chart.is_error());
    let dashboard =
        render::generate_dashboard(&registry, &output, "ghost", &[json!({"chart_type": "bar"})]).await;
    assert!(dashboard.is_error());
    assert!(!output.charts_dir.exists());
}
