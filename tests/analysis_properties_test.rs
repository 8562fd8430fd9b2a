use ads_metrics_etl::core::normalize::{normalize_field, normalize_text};
use ads_metrics_etl::core::tokenizer::split_line;
use ads_metrics_etl::{analyze_upload, AnalysisResponse, ColumnMapping, MetricsAggregator};
use serde_json::json;

const FULL_EXPORT: &str = "Amount spent (EUR),Impressions,Clicks (all),Purchases,Purchases conversion value\n\
                           100,1000,50,5,500\n\
                           50,500,25,2,200";

fn analyze(text: &str) -> serde_json::Value {
    let response = analyze_upload(Some(text.as_bytes()), &MetricsAggregator::default());
    serde_json::to_value(response).unwrap()
}

#[test]
fn test_normalizer_examples() {
    assert_eq!(normalize_text("1.234,56"), 1234.56);
    assert_eq!(normalize_text("1,234"), 1234.0);
    assert_eq!(normalize_text("123,45"), 123.45);
    assert_eq!(normalize_text(""), 0.0);
    assert_eq!(normalize_text("-"), 0.0);
    assert_eq!(normalize_field(None), 0.0);
}

#[test]
fn test_tokenizer_keeps_quoted_comma() {
    let fields = split_line("a,\"b,c\",d", ',');
    assert_eq!(fields, vec!["a", "b,c", "d"]);
}

#[test]
fn test_full_export_response() {
    let json = analyze(FULL_EXPORT);

    assert_eq!(
        json,
        json!({
            "ok": true,
            "rowCount": 2,
            "columnNames": [
                "Amount spent (EUR)",
                "Impressions",
                "Clicks (all)",
                "Purchases",
                "Purchases conversion value"
            ],
            "metrics": {
                "totalSpend": 150.0,
                "totalImpressions": 1500.0,
                "totalClicks": 75.0,
                "totalResults": 7.0,
                "totalRevenue": 700.0,
                "ctr": 5.0,
                "cpc": 2.0,
                "cpa": 21.43,
                "roas": 4.67
            }
        })
    );
}

#[test]
fn test_removing_impressions_only_affects_impressions_and_ctr() {
    let without_impressions = "Amount spent (EUR),Clicks (all),Purchases,Purchases conversion value\n\
                               100,50,5,500\n\
                               50,25,2,200";

    let full = analyze(FULL_EXPORT);
    let reduced = analyze(without_impressions);

    assert!(reduced["metrics"]["totalImpressions"].is_null());
    assert!(reduced["metrics"]["ctr"].is_null());
    for key in ["totalSpend", "totalClicks", "totalResults", "totalRevenue", "cpc", "cpa", "roas"] {
        assert_eq!(reduced["metrics"][key], full["metrics"][key], "{} changed", key);
    }
}

#[test]
fn test_zero_or_blank_clicks_never_produce_cpc() {
    let text = "Amount spent (EUR),Clicks (all)\n10,0\n20,\n30,-";
    let json = analyze(text);

    assert_eq!(json["metrics"]["totalSpend"], 60.0);
    assert_eq!(json["metrics"]["totalClicks"], 0.0);
    assert!(json["metrics"]["cpc"].is_null());
}

#[test]
fn test_repeated_analysis_is_identical() {
    let aggregator = MetricsAggregator::default();
    let first = analyze_upload(Some(FULL_EXPORT.as_bytes()), &aggregator);
    let second = analyze_upload(Some(FULL_EXPORT.as_bytes()), &aggregator);
    assert_eq!(first, second);
}

#[test]
fn test_failures() {
    assert_eq!(analyze(""), json!({"ok": false, "error": "CSV file is empty"}));
    assert_eq!(
        analyze("Amount spent (EUR),Impressions"),
        json!({"ok": false, "error": "CSV file has no data rows"})
    );

    let missing = analyze_upload(None, &MetricsAggregator::default());
    assert_eq!(
        missing,
        AnalysisResponse::Failure {
            ok: false,
            error: "No file uploaded".to_string()
        }
    );
}

#[test]
fn test_substituted_column_set() {
    let columns = ColumnMapping {
        spend: "Cost (USD)".to_string(),
        revenue: "Revenue".to_string(),
        ..ColumnMapping::default()
    };
    let aggregator = MetricsAggregator::new(columns, ',');
    let response = analyze_upload(
        Some(b"Cost (USD),Revenue\n\"$1,250.00\",\"$5,000.00\"".as_slice()),
        &aggregator,
    );

    let json = serde_json::to_value(response).unwrap();
    // 同時含有逗號與點時一律視為歐式格式
    assert_eq!(json["metrics"]["totalSpend"], 1.25);
    assert_eq!(json["metrics"]["totalRevenue"], 5.0);
    assert_eq!(json["metrics"]["roas"], 4.0);
}

#[test]
fn test_overflowing_spend_is_a_failure_not_a_null() {
    let json = analyze(
        "Amount spent (EUR),Clicks (all),Purchases conversion value\n1e308,10,5\n1e308,10,5",
    );

    assert_eq!(json["ok"], false);
    assert_eq!(
        json["error"],
        "Data processing error: totalSpend exceeds the representable numeric range"
    );
}
