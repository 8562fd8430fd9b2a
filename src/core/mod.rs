pub mod aggregate;
pub mod etl;
pub mod narrative;
pub mod normalize;
pub mod pipeline;
pub mod tokenizer;

pub use crate::domain::model::{Analysis, AnalysisResponse, Metrics, MetricsReport};
pub use crate::domain::ports::{ConfigProvider, NarrativeClient, Pipeline, Storage};
pub use crate::utils::error::Result;
