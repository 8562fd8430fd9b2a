pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{toml_config::TomlConfig, LocalStorage};

pub use core::aggregate::{analyze_upload, MetricsAggregator};
pub use core::{etl::EtlEngine, pipeline::MetricsPipeline};
pub use domain::model::{AnalysisResponse, ColumnMapping, InsightKind, Metrics};
pub use utils::error::{EtlError, Result};
