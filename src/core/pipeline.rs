use crate::core::aggregate::{decode_payload, MetricsAggregator};
use crate::core::narrative::generate_insights;
use crate::core::{ConfigProvider, MetricsReport, NarrativeClient, Pipeline, Storage};
use crate::domain::model::{InsightKind, InsightsOutcome, Metrics};
use crate::utils::error::{EtlError, Result};
use std::io::Write;
use std::sync::Arc;
use zip::write::{FileOptions, ZipWriter};

pub const BUNDLE_FILENAME: &str = "metrics_report.zip";

pub struct MetricsPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    aggregator: MetricsAggregator,
    narrative: Option<Arc<dyn NarrativeClient>>,
}

impl<S: Storage, C: ConfigProvider> MetricsPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        let aggregator = MetricsAggregator::new(config.columns().clone(), config.delimiter());
        Self {
            storage,
            config,
            aggregator,
            narrative: None,
        }
    }

    pub fn with_narrative(mut self, client: Arc<dyn NarrativeClient>) -> Self {
        self.narrative = Some(client);
        self
    }

    async fn load_answers(&self) -> Result<Option<serde_json::Value>> {
        match self.config.answers_path() {
            Some(path) => {
                let data = self.storage.read_file(path).await?;
                Ok(Some(serde_json::from_slice(&data)?))
            }
            None => Ok(None),
        }
    }

    async fn request_insights(&self, kind: InsightKind, metrics: &Metrics) -> InsightsOutcome {
        match self.load_answers().await {
            Ok(answers) => generate_insights(self.narrative.as_deref(), kind, metrics, answers).await,
            Err(e) => {
                tracing::warn!("⚠️ Could not read business answers: {}", e);
                InsightsOutcome::Failed {
                    kind,
                    error: e.to_string(),
                }
            }
        }
    }

    fn output_file(&self, name: &str) -> String {
        format!("{}/{}", self.config.output_path().trim_end_matches('/'), name)
    }
}

fn render_json(report: &MetricsReport) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(report)?)
}

/// 每個指標一列；缺少的指標輸出空白
fn render_table(metrics: &Metrics, delimiter: u8) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(["metric", "value"])?;
    for (name, value) in metrics.entries() {
        let value = value.map(|v| v.to_string()).unwrap_or_default();
        writer.write_record([name, value.as_str()])?;
    }

    writer
        .into_inner()
        .map_err(|e| EtlError::IoError(e.into_error()))
}

fn render_format(report: &MetricsReport, format: &str) -> Result<(String, Vec<u8>)> {
    let metrics = report.metrics();

    match format {
        "json" => Ok(("metrics.json".to_string(), render_json(report)?)),
        "csv" => Ok(("metrics.csv".to_string(), render_table(metrics, b',')?)),
        "tsv" => Ok(("metrics.tsv".to_string(), render_table(metrics, b'\t')?)),
        other => Err(EtlError::InvalidConfigValueError {
            field: "output_formats".to_string(),
            value: other.to_string(),
            reason: "Unsupported output format".to_string(),
        }),
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for MetricsPipeline<S, C> {
    async fn extract(&self) -> Result<Vec<u8>> {
        let path = self.config.input_path().ok_or(EtlError::MissingInput)?;

        tracing::debug!("Reading export from: {}", path);
        let data = self.storage.read_file(path).await.map_err(|e| match e {
            EtlError::IoError(io) if io.kind() == std::io::ErrorKind::NotFound => {
                EtlError::MissingInput
            }
            other => other,
        })?;

        tracing::debug!("Read {} bytes", data.len());
        Ok(data)
    }

    async fn transform(&self, payload: Vec<u8>) -> Result<MetricsReport> {
        let text = decode_payload(Some(payload.as_slice()))?;
        let analysis = self.aggregator.aggregate(text)?;
        tracing::info!(
            "Aggregated {} rows across {} columns",
            analysis.row_count,
            analysis.column_names.len()
        );

        let insights = match self.config.insight_kind() {
            Some(kind) => Some(self.request_insights(kind, &analysis.metrics).await),
            None => None,
        };

        Ok(MetricsReport {
            generated_at: chrono::Utc::now(),
            source: self.config.input_path().unwrap_or_default().to_string(),
            analysis,
            insights,
            stats: None,
        })
    }

    async fn load(&self, report: &MetricsReport) -> Result<Vec<String>> {
        let files = self
            .config
            .output_formats()
            .iter()
            .map(|format| render_format(report, format))
            .collect::<Result<Vec<_>>>()?;

        if !self.config.bundle_output() {
            let mut written = Vec::with_capacity(files.len());
            for (name, data) in files {
                let path = self.output_file(&name);
                self.storage.write_file(&path, &data).await?;
                tracing::debug!("Wrote {} ({} bytes)", path, data.len());
                written.push(path);
            }
            return Ok(written);
        }

        tracing::debug!("Creating ZIP bundle with {} files", files.len());
        let zip_data = {
            let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
            for (name, data) in &files {
                zip.start_file::<_, ()>(name.as_str(), FileOptions::default())?;
                zip.write_all(data)?;
            }
            let cursor = zip.finish()?;
            cursor.into_inner()
        };

        let path = self.output_file(BUNDLE_FILENAME);
        self.storage.write_file(&path, &zip_data).await?;
        tracing::debug!("Wrote {} ({} bytes)", path, zip_data.len());
        Ok(vec![path])
    }
}
