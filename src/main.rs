use ads_metrics_etl::core::narrative::ChatCompletionsClient;
use ads_metrics_etl::utils::error::ErrorSeverity;
use ads_metrics_etl::utils::{logger, validation::Validate};
use ads_metrics_etl::{AnalysisResponse, CliConfig, EtlEngine, LocalStorage, MetricsPipeline};
use anyhow::Context;
use clap::Parser;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(config.verbose);

    tracing::info!("Starting ads-metrics CLI");

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let monitor_enabled = config.monitor;
    let print = config.print;
    let narrative = match config.insights {
        Some(_) => Some(
            ChatCompletionsClient::new(config.narrative_settings())
                .context("failed to build narrative client")?,
        ),
        None => None,
    };

    // 創建存儲和管道
    let storage = LocalStorage::new(".");
    let mut pipeline = MetricsPipeline::new(storage, config);
    if let Some(client) = narrative {
        pipeline = pipeline.with_narrative(Arc::new(client));
    }

    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(output) => {
            if print {
                let json = serde_json::to_string_pretty(&output.report)
                    .context("failed to serialize report")?;
                println!("{}", json);
            }
            tracing::info!("✅ Analysis completed successfully!");
            for path in &output.written {
                eprintln!("📁 Output saved to: {}", path);
            }
        }
        Err(e) => {
            tracing::error!(
                "❌ Analysis failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            if print {
                let json = serde_json::to_string_pretty(&AnalysisResponse::failure(&e))
                    .context("failed to serialize failure response")?;
                println!("{}", json);
            }
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}
