use crate::core::{MetricsReport, Pipeline};
use crate::utils::error::Result;
use crate::utils::monitor::RunMonitor;

/// Result of a complete run: the report plus every file that was written.
#[derive(Debug)]
pub struct RunOutput {
    pub report: MetricsReport,
    pub written: Vec<String>,
}

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: RunMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: RunMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<RunOutput> {
        tracing::info!("Starting metrics analysis");

        // Extract
        let payload = self.pipeline.extract().await?;
        tracing::info!("📥 Extracted {} bytes", payload.len());
        self.monitor.mark_phase("extract");

        // Transform
        let mut report = self.pipeline.transform(payload).await?;
        let metrics = report.metrics();
        tracing::info!(
            "📈 Spend: {:?}, Revenue: {:?}, ROAS: {:?}",
            metrics.total_spend,
            metrics.total_revenue,
            metrics.roas
        );
        self.monitor.mark_phase("transform");

        // Load
        let written = self.pipeline.load(&report).await?;
        for path in &written {
            tracing::info!("📁 Output saved to: {}", path);
        }
        self.monitor.mark_phase("load");

        self.monitor.log_final_stats();
        report.stats = self.monitor.stats();

        Ok(RunOutput { report, written })
    }
}
