use ads_metrics_etl::config::lambda::LambdaConfig;
use ads_metrics_etl::core::aggregate::{analyze_upload, MetricsAggregator};
use ads_metrics_etl::core::narrative::{generate_insights, ChatCompletionsClient};
use ads_metrics_etl::domain::model::{AnalysisResponse, InsightKind, InsightsOutcome};
use ads_metrics_etl::domain::ports::NarrativeClient;
use ads_metrics_etl::utils::{logger, validation::Validate};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `csv` carries the raw export; `records` carries rows already decoded as
/// JSON objects. `csv` wins when both are present.
#[derive(Deserialize)]
pub struct Request {
    pub csv: Option<String>,
    pub records: Option<Vec<Map<String, Value>>>,
    pub insights: Option<InsightKind>,
    pub answers: Option<Value>,
}

#[derive(Serialize)]
pub struct Response {
    #[serde(flatten)]
    pub analysis: AnalysisResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights: Option<InsightsOutcome>,
}

async fn function_handler(event: LambdaEvent<Request>) -> Result<Response, Error> {
    tracing::info!("Starting metrics Lambda function");

    let config = LambdaConfig::from_env()?;
    config.validate()?;

    let aggregator = MetricsAggregator::new(config.columns.clone(), config.delimiter);
    let request = event.payload;
    let analysis = match (request.csv.as_deref(), request.records.as_deref()) {
        (None, Some(records)) => aggregator.aggregate_records(records).into(),
        (csv, _) => analyze_upload(csv.map(str::as_bytes), &aggregator),
    };

    let insights = match (&analysis, request.insights) {
        (AnalysisResponse::Success { metrics, .. }, Some(kind)) => {
            let client = config
                .narrative
                .clone()
                .map(ChatCompletionsClient::new)
                .transpose()?;
            let client = client.as_ref().map(|c| c as &dyn NarrativeClient);
            Some(generate_insights(client, kind, metrics, request.answers).await)
        }
        _ => None,
    };

    tracing::info!("Metrics Lambda function completed (ok: {})", analysis.is_ok());
    Ok(Response { analysis, insights })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    logger::init_lambda_logger();
    run(service_fn(function_handler)).await
}
