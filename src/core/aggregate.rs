use crate::core::normalize::{normalize_field, normalize_value};
use crate::core::tokenizer::{split_line, DEFAULT_DELIMITER};
use crate::domain::model::{Analysis, AnalysisResponse, ColumnIndex, ColumnMapping, Metrics};
use crate::utils::error::{EtlError, Result};
use serde_json::{Map, Value};

const EMPTY_FILE: &str = "CSV file is empty";
const NO_DATA_ROWS: &str = "CSV file has no data rows";
const BYTE_ORDER_MARK: char = '\u{feff}';

/// Header line plus the non-blank data lines of an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable<'a> {
    pub header: &'a str,
    pub rows: Vec<&'a str>,
}

impl<'a> RawTable<'a> {
    pub fn parse(text: &'a str) -> Result<Self> {
        let text = text.trim_start_matches(BYTE_ORDER_MARK);
        if text.trim().is_empty() {
            return Err(EtlError::empty_input(EMPTY_FILE));
        }

        let mut lines = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .filter(|line| !line.trim().is_empty());

        let header = lines.next().ok_or_else(|| EtlError::empty_input(EMPTY_FILE))?;
        let rows: Vec<&str> = lines.collect();
        if rows.is_empty() {
            return Err(EtlError::empty_input(NO_DATA_ROWS));
        }

        Ok(Self { header, rows })
    }
}

#[derive(Debug, Default)]
struct Totals {
    spend: f64,
    impressions: f64,
    clicks: f64,
    results: f64,
    revenue: f64,
}

/// Sums the recognized columns of an export and derives ratio metrics.
///
/// Holds only configuration; each call to [`MetricsAggregator::aggregate`]
/// starts from fresh totals, so one aggregator can be shared across tasks.
#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    columns: ColumnMapping,
    delimiter: char,
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new(ColumnMapping::default(), DEFAULT_DELIMITER)
    }
}

impl MetricsAggregator {
    pub fn new(columns: ColumnMapping, delimiter: char) -> Self {
        Self { columns, delimiter }
    }

    pub fn aggregate(&self, text: &str) -> Result<Analysis> {
        let table = RawTable::parse(text)?;
        let column_names = split_line(table.header, self.delimiter);
        let index = self.resolve(&column_names);

        let mut totals = Totals::default();
        for line in &table.rows {
            let cells = split_line(line, self.delimiter);
            totals.add(&index, |i| normalize_field(cells.get(i).map(String::as_str)));
        }

        finish(column_names, table.rows.len(), &index, &totals)
    }

    /// Aggregates rows that arrive as JSON objects keyed by header name.
    /// Numeric cells are taken as-is; string cells go through the same
    /// normalisation as CSV text. The keys of the first record are the
    /// header.
    pub fn aggregate_records(&self, records: &[Map<String, Value>]) -> Result<Analysis> {
        let first = records
            .first()
            .ok_or_else(|| EtlError::empty_input(NO_DATA_ROWS))?;
        let column_names: Vec<String> = first.keys().cloned().collect();
        let index = self.resolve(&column_names);

        let mut totals = Totals::default();
        for record in records {
            totals.add(&index, |i| {
                record.get(&column_names[i]).map_or(0.0, normalize_value)
            });
        }

        finish(column_names, records.len(), &index, &totals)
    }

    fn resolve(&self, column_names: &[String]) -> ColumnIndex {
        let index = ColumnIndex::resolve(&self.columns, column_names);
        for (name, position) in self.columns.names().into_iter().zip(index_positions(&index)) {
            match position {
                Some(i) => tracing::debug!("Column '{}' found at position {}", name, i),
                None => tracing::warn!("Column '{}' not present in export", name),
            }
        }
        index
    }
}

impl Totals {
    fn add(&mut self, index: &ColumnIndex, cell: impl Fn(usize) -> f64) {
        let value = |position: Option<usize>| position.map_or(0.0, &cell);
        self.spend += value(index.spend);
        self.impressions += value(index.impressions);
        self.clicks += value(index.clicks);
        self.results += value(index.results);
        self.revenue += value(index.revenue);
    }
}

fn finish(
    column_names: Vec<String>,
    row_count: usize,
    index: &ColumnIndex,
    totals: &Totals,
) -> Result<Analysis> {
    let metrics = derive_metrics(index, totals);
    if let Some((name, _)) = metrics
        .entries()
        .into_iter()
        .find(|(_, value)| value.is_some_and(|v| !v.is_finite()))
    {
        tracing::warn!("Metric '{}' overflowed", name);
        return Err(EtlError::ProcessingError {
            message: format!("{} exceeds the representable numeric range", name),
        });
    }
    tracing::debug!("Aggregated {} data rows", row_count);

    Ok(Analysis {
        row_count,
        column_names,
        metrics,
    })
}

fn index_positions(index: &ColumnIndex) -> [Option<usize>; 5] {
    [
        index.spend,
        index.impressions,
        index.clicks,
        index.results,
        index.revenue,
    ]
}

fn derive_metrics(index: &ColumnIndex, totals: &Totals) -> Metrics {
    let present = |position: Option<usize>, value: f64| position.map(|_| value);

    // 金額四捨五入到小數第二位，計數欄位保持原值
    let total_spend = present(index.spend, round2(totals.spend));
    let total_impressions = present(index.impressions, totals.impressions);
    let total_clicks = present(index.clicks, totals.clicks);
    let total_results = present(index.results, totals.results);
    let total_revenue = present(index.revenue, round2(totals.revenue));

    Metrics {
        total_spend,
        total_impressions,
        total_clicks,
        total_results,
        total_revenue,
        ctr: ratio(total_clicks, total_impressions).map(|r| round2(r * 100.0)),
        cpc: ratio(total_spend, total_clicks).map(round2),
        cpa: ratio(total_spend, total_results).map(round2),
        roas: ratio(total_revenue, total_spend).map(round2),
    }
}

/// Numerator over denominator when both columns exist and the denominator is
/// strictly positive.
fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d > 0.0 => Some(n / d),
        _ => None,
    }
}

fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    // 極大值放大後會溢位，此時已無小數位可捨入
    if scaled.is_finite() {
        scaled.round() / 100.0
    } else {
        value
    }
}

/// Boundary used by callers that hold a raw upload. Never returns an error:
/// every failure is folded into [`AnalysisResponse::Failure`].
pub fn analyze_upload(payload: Option<&[u8]>, aggregator: &MetricsAggregator) -> AnalysisResponse {
    decode_payload(payload)
        .and_then(|text| aggregator.aggregate(text))
        .into()
}

pub fn decode_payload(payload: Option<&[u8]>) -> Result<&str> {
    let bytes = payload.ok_or(EtlError::MissingInput)?;
    std::str::from_utf8(bytes).map_err(|e| EtlError::UnreadableInput {
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "Amount spent (EUR),Impressions,Clicks (all),Purchases,Purchases conversion value";

    fn sample_table() -> String {
        format!("{}\n100,1000,50,5,500\n50,500,25,2,200", HEADER)
    }

    #[test]
    fn test_end_to_end_metrics() {
        let analysis = MetricsAggregator::default().aggregate(&sample_table()).unwrap();
        let m = analysis.metrics;

        assert_eq!(analysis.row_count, 2);
        assert_eq!(analysis.column_names.len(), 5);
        assert_eq!(m.total_spend, Some(150.0));
        assert_eq!(m.total_impressions, Some(1500.0));
        assert_eq!(m.total_clicks, Some(75.0));
        assert_eq!(m.total_results, Some(7.0));
        assert_eq!(m.total_revenue, Some(700.0));
        assert_eq!(m.ctr, Some(5.0));
        assert_eq!(m.cpc, Some(2.0));
        assert_eq!(m.cpa, Some(21.43));
        assert_eq!(m.roas, Some(4.67));
    }

    #[test]
    fn test_aggregation_is_repeatable() {
        let aggregator = MetricsAggregator::default();
        let first = aggregator.aggregate(&sample_table()).unwrap();
        let second = aggregator.aggregate(&sample_table()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_impressions_column_nulls_ctr_only() {
        let text = "Amount spent (EUR),Clicks (all),Purchases,Purchases conversion value\n\
                    100,50,5,500\n50,25,2,200";
        let m = MetricsAggregator::default().aggregate(text).unwrap().metrics;

        assert_eq!(m.total_impressions, None);
        assert_eq!(m.ctr, None);
        assert_eq!(m.total_spend, Some(150.0));
        assert_eq!(m.cpc, Some(2.0));
        assert_eq!(m.cpa, Some(21.43));
        assert_eq!(m.roas, Some(4.67));
    }

    #[test]
    fn test_zero_clicks_yield_no_cpc() {
        let text = format!("{}\n100,1000,0,5,500\n50,500,,2,200", HEADER);
        let m = MetricsAggregator::default().aggregate(&text).unwrap().metrics;

        assert_eq!(m.total_clicks, Some(0.0));
        assert_eq!(m.cpc, None);
        assert_eq!(m.ctr, Some(0.0));
    }

    #[test]
    fn test_zero_spend_is_not_absent_spend() {
        let text = format!("{}\n0,1000,10,0,0", HEADER);
        let m = MetricsAggregator::default().aggregate(&text).unwrap().metrics;

        assert_eq!(m.total_spend, Some(0.0));
        assert_eq!(m.roas, None);
        assert_eq!(m.cpa, None);
        assert_eq!(m.cpc, Some(0.0));
    }

    #[test]
    fn test_ragged_rows_and_eu_formatting() {
        let text = format!(
            "{}\r\n\"1.234,56\",\"1,000\",10\r\n\r\n\"€ 15,44\",500,5,1,\"99,99\"\r\n",
            HEADER
        );
        let analysis = MetricsAggregator::default().aggregate(&text).unwrap();
        let m = analysis.metrics;

        assert_eq!(analysis.row_count, 2);
        assert_eq!(m.total_spend, Some(1250.0));
        assert_eq!(m.total_impressions, Some(1500.0));
        assert_eq!(m.total_clicks, Some(15.0));
        assert_eq!(m.total_results, Some(1.0));
        assert_eq!(m.total_revenue, Some(99.99));
        assert_eq!(m.ctr, Some(1.0));
    }

    #[test]
    fn test_overflowing_totals_are_rejected() {
        let text = "Amount spent (EUR),Clicks (all),Purchases conversion value\n\
                    1e308,10,5\n1e308,10,5";
        let err = MetricsAggregator::default().aggregate(text).unwrap_err();

        assert!(matches!(err, EtlError::ProcessingError { .. }));
        assert!(err.to_string().contains("totalSpend"));

        let json = serde_json::to_value(analyze_upload(
            Some(text.as_bytes()),
            &MetricsAggregator::default(),
        ))
        .unwrap();
        assert_eq!(json["ok"], false);
        assert!(json.get("metrics").is_none());
    }

    #[test]
    fn test_overflowing_ratio_is_rejected() {
        let text = "Amount spent (EUR),Clicks (all)\n1e300,1e-300";
        let err = MetricsAggregator::default().aggregate(text).unwrap_err();
        assert!(err.to_string().contains("cpc"));
    }

    #[test]
    fn test_very_large_finite_totals_survive_rounding() {
        let text = "Amount spent (EUR),Clicks (all)\n1e307,10";
        let m = MetricsAggregator::default().aggregate(text).unwrap().metrics;

        assert_eq!(m.total_spend, Some(1e307));
        let cpc = m.cpc.unwrap();
        assert!(((cpc - 1e306) / 1e306).abs() < 1e-12);
    }

    #[test]
    fn test_json_records_accept_numeric_cells() {
        let records: Vec<Map<String, Value>> = serde_json::from_str(
            r#"[
                {"Amount spent (EUR)": 100, "Clicks (all)": 50, "Campaign name": "A"},
                {"Amount spent (EUR)": "50,00", "Clicks (all)": null, "Campaign name": "B"},
                {"Amount spent (EUR)": 0.004, "Campaign name": "C"}
            ]"#,
        )
        .unwrap();

        let analysis = MetricsAggregator::default()
            .aggregate_records(&records)
            .unwrap();

        assert_eq!(analysis.row_count, 3);
        assert_eq!(analysis.column_names.len(), 3);
        assert_eq!(analysis.metrics.total_spend, Some(150.0));
        assert_eq!(analysis.metrics.total_clicks, Some(50.0));
        assert_eq!(analysis.metrics.cpc, Some(3.0));
        assert_eq!(analysis.metrics.total_impressions, None);
    }

    #[test]
    fn test_empty_records_fail() {
        let err = MetricsAggregator::default().aggregate_records(&[]).unwrap_err();
        assert_eq!(err.to_string(), "CSV file has no data rows");
    }

    #[test]
    fn test_header_match_is_case_sensitive() {
        let text = "amount spent (eur),IMPRESSIONS\n10,100";
        let analysis = MetricsAggregator::default().aggregate(text).unwrap();
        assert_eq!(analysis.metrics, Metrics::default());
        assert_eq!(analysis.row_count, 1);
    }

    #[test]
    fn test_custom_column_mapping() {
        let columns = ColumnMapping {
            spend: "Cost".to_string(),
            clicks: "Clicks".to_string(),
            ..ColumnMapping::default()
        };
        let aggregator = MetricsAggregator::new(columns, ';');
        let m = aggregator
            .aggregate("Cost;Clicks\n\"12,50\";5\n7,50;5")
            .unwrap()
            .metrics;

        assert_eq!(m.total_spend, Some(20.0));
        assert_eq!(m.cpc, Some(2.0));
        assert_eq!(m.total_impressions, None);
    }

    #[test]
    fn test_byte_order_mark_is_ignored() {
        let text = format!("\u{feff}{}", sample_table());
        let analysis = MetricsAggregator::default().aggregate(&text).unwrap();
        assert_eq!(analysis.column_names[0], "Amount spent (EUR)");
        assert_eq!(analysis.metrics.total_spend, Some(150.0));
    }

    #[test]
    fn test_empty_and_header_only_inputs_fail() {
        let aggregator = MetricsAggregator::default();

        let err = aggregator.aggregate("").unwrap_err();
        assert_eq!(err.to_string(), "CSV file is empty");

        let err = aggregator.aggregate(" \n\r\n ").unwrap_err();
        assert_eq!(err.to_string(), "CSV file is empty");

        let err = aggregator.aggregate(HEADER).unwrap_err();
        assert_eq!(err.to_string(), "CSV file has no data rows");
    }

    #[test]
    fn test_analyze_upload_failure_shapes() {
        let aggregator = MetricsAggregator::default();

        let missing = serde_json::to_value(analyze_upload(None, &aggregator)).unwrap();
        assert_eq!(
            missing,
            serde_json::json!({"ok": false, "error": "No file uploaded"})
        );

        let unreadable = analyze_upload(Some(&[0xff_u8, 0xfe, 0x00][..]), &aggregator);
        assert!(!unreadable.is_ok());

        let empty = serde_json::to_value(analyze_upload(Some(b"".as_slice()), &aggregator)).unwrap();
        assert_eq!(
            empty,
            serde_json::json!({"ok": false, "error": "CSV file is empty"})
        );
    }

    #[test]
    fn test_analyze_upload_success_shape() {
        let table = sample_table();
        let response = analyze_upload(Some(table.as_bytes()), &MetricsAggregator::default());
        let json = serde_json::to_value(response).unwrap();

        assert_eq!(json["ok"], true);
        assert_eq!(json["rowCount"], 2);
        assert_eq!(json["columnNames"][2], "Clicks (all)");
        assert_eq!(json["metrics"]["totalSpend"], 150.0);
        assert_eq!(json["metrics"]["cpa"], 21.43);
    }

    #[test]
    fn test_absent_metrics_serialize_as_null() {
        let response = analyze_upload(
            Some(b"Impressions\n100\n200".as_slice()),
            &MetricsAggregator::default(),
        );
        let json = serde_json::to_value(response).unwrap();

        assert_eq!(json["metrics"]["totalImpressions"], 300.0);
        assert!(json["metrics"]["totalSpend"].is_null());
        assert!(json["metrics"]["ctr"].is_null());
    }
}
