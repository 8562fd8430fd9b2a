use crate::domain::model::{ColumnMapping, InsightKind, MetricsReport};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn input_path(&self) -> Option<&str>;
    fn output_path(&self) -> &str;
    fn output_formats(&self) -> &[String];
    fn bundle_output(&self) -> bool;
    fn delimiter(&self) -> char;
    fn columns(&self) -> &ColumnMapping;
    fn insight_kind(&self) -> Option<InsightKind>;
    fn answers_path(&self) -> Option<&str>;
}

/// Text-generation backend that turns a JSON payload into narrative output.
#[async_trait]
pub trait NarrativeClient: Send + Sync {
    async fn generate(&self, kind: InsightKind, payload: &serde_json::Value) -> Result<String>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<u8>>;
    async fn transform(&self, payload: Vec<u8>) -> Result<MetricsReport>;
    async fn load(&self, report: &MetricsReport) -> Result<Vec<String>>;
}
