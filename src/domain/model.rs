use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::utils::error::{EtlError, Result};
use crate::utils::monitor::RunStats;

/// 一列資料切割後的原始欄位
pub type RowValues = Vec<String>;

/// Header names that carry each semantic metric. Matching is exact and
/// case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub spend: String,
    pub impressions: String,
    pub clicks: String,
    pub results: String,
    pub revenue: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            spend: "Amount spent (EUR)".to_string(),
            impressions: "Impressions".to_string(),
            clicks: "Clicks (all)".to_string(),
            results: "Purchases".to_string(),
            revenue: "Purchases conversion value".to_string(),
        }
    }
}

impl ColumnMapping {
    pub fn names(&self) -> [&str; 5] {
        [
            &self.spend,
            &self.impressions,
            &self.clicks,
            &self.results,
            &self.revenue,
        ]
    }
}

/// Position of each recognized column in the header, `None` when the export
/// does not carry it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnIndex {
    pub spend: Option<usize>,
    pub impressions: Option<usize>,
    pub clicks: Option<usize>,
    pub results: Option<usize>,
    pub revenue: Option<usize>,
}

impl ColumnIndex {
    pub fn resolve(mapping: &ColumnMapping, column_names: &[String]) -> Self {
        let position = |name: &str| column_names.iter().position(|c| c == name);
        Self {
            spend: position(&mapping.spend),
            impressions: position(&mapping.impressions),
            clicks: position(&mapping.clicks),
            results: position(&mapping.results),
            revenue: position(&mapping.revenue),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub total_spend: Option<f64>,
    pub total_impressions: Option<f64>,
    pub total_clicks: Option<f64>,
    pub total_results: Option<f64>,
    pub total_revenue: Option<f64>,
    pub ctr: Option<f64>,
    pub cpc: Option<f64>,
    pub cpa: Option<f64>,
    pub roas: Option<f64>,
}

impl Metrics {
    /// `(name, value)` pairs in display order
    pub fn entries(&self) -> [(&'static str, Option<f64>); 9] {
        [
            ("totalSpend", self.total_spend),
            ("totalImpressions", self.total_impressions),
            ("totalClicks", self.total_clicks),
            ("totalResults", self.total_results),
            ("totalRevenue", self.total_revenue),
            ("ctr", self.ctr),
            ("cpc", self.cpc),
            ("cpa", self.cpa),
            ("roas", self.roas),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub row_count: usize,
    pub column_names: Vec<String>,
    pub metrics: Metrics,
}

/// Shape handed back to callers of the analysis boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnalysisResponse {
    #[serde(rename_all = "camelCase")]
    Success {
        ok: bool,
        row_count: usize,
        column_names: Vec<String>,
        metrics: Metrics,
    },
    Failure {
        ok: bool,
        error: String,
    },
}

impl AnalysisResponse {
    pub fn failure(error: &EtlError) -> Self {
        Self::Failure {
            ok: false,
            error: error.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl From<Analysis> for AnalysisResponse {
    fn from(analysis: Analysis) -> Self {
        Self::Success {
            ok: true,
            row_count: analysis.row_count,
            column_names: analysis.column_names,
            metrics: analysis.metrics,
        }
    }
}

impl From<Result<Analysis>> for AnalysisResponse {
    fn from(result: Result<Analysis>) -> Self {
        match result {
            Ok(analysis) => analysis.into(),
            Err(e) => Self::failure(&e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InsightKind {
    Analysis,
    MediaPlan,
    Recommendations,
}

impl InsightKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::MediaPlan => "media-plan",
            Self::Recommendations => "recommendations",
        }
    }
}

impl fmt::Display for InsightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InsightKind {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "analysis" => Ok(Self::Analysis),
            "media-plan" | "mediaplan" => Ok(Self::MediaPlan),
            "recommendations" | "recommendation" => Ok(Self::Recommendations),
            other => Err(EtlError::InvalidConfigValueError {
                field: "insights".to_string(),
                value: other.to_string(),
                reason: "Expected one of: analysis, media-plan, recommendations".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum InsightsOutcome {
    Generated {
        kind: InsightKind,
        raw: String,
        parsed: Option<serde_json::Value>,
    },
    Failed {
        kind: InsightKind,
        error: String,
    },
}

/// Output of a successful run. Serializes with the same `ok`, `rowCount`,
/// `columnNames` and `metrics` fields as [`AnalysisResponse::Success`].
#[derive(Debug, Clone)]
pub struct MetricsReport {
    pub generated_at: DateTime<Utc>,
    pub source: String,
    pub analysis: Analysis,
    pub insights: Option<InsightsOutcome>,
    pub stats: Option<RunStats>,
}

impl MetricsReport {
    pub fn metrics(&self) -> &Metrics {
        &self.analysis.metrics
    }
}

impl Serialize for MetricsReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Report<'a> {
            ok: bool,
            generated_at: &'a DateTime<Utc>,
            source: &'a str,
            #[serde(flatten)]
            analysis: &'a Analysis,
            #[serde(skip_serializing_if = "Option::is_none")]
            insights: Option<&'a InsightsOutcome>,
            #[serde(skip_serializing_if = "Option::is_none")]
            stats: Option<&'a RunStats>,
        }

        Report {
            ok: true,
            generated_at: &self.generated_at,
            source: &self.source,
            analysis: &self.analysis,
            insights: self.insights.as_ref(),
            stats: self.stats.as_ref(),
        }
        .serialize(serializer)
    }
}
