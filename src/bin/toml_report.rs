use ads_metrics_etl::core::narrative::ChatCompletionsClient;
use ads_metrics_etl::core::ConfigProvider;
use ads_metrics_etl::utils::{logger, validation::Validate};
use ads_metrics_etl::{EtlEngine, LocalStorage, MetricsPipeline, TomlConfig};
use anyhow::Context;
use clap::Parser;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "toml-report")]
#[command(about = "Metrics report driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "ads-metrics.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Show what would be processed without executing
    #[arg(long)]
    dry_run: bool,
}

fn display_config_summary(config: &TomlConfig) {
    tracing::info!("📋 Report: {}", config.report.name);
    if let Some(description) = &config.report.description {
        tracing::info!("   {}", description);
    }
    tracing::info!(
        "📥 Input: {} (delimiter '{}')",
        config.input.path,
        config.delimiter()
    );
    tracing::info!(
        "🔎 Columns: {}",
        config.columns.names().join(" | ")
    );
    match config.insight_kind() {
        Some(kind) => tracing::info!("🧠 Insights: {}", kind),
        None => tracing::info!("🧠 Insights: disabled"),
    }
    tracing::info!(
        "📤 Output: {} as [{}]{}",
        config.output_path(),
        config.output_formats().join(", "),
        if config.bundle_output() { " (zip bundle)" } else { "" }
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logger::init_cli_logger(args.verbose);

    tracing::info!("🚀 Starting TOML-based metrics report");
    tracing::info!("📁 Loading configuration from: {}", args.config);

    let config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No actual processing will occur");
        return Ok(());
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    let narrative = config
        .narrative_settings()
        .map(ChatCompletionsClient::new)
        .transpose()
        .context("failed to build narrative client")?;

    let storage = LocalStorage::new(".");
    let mut pipeline = MetricsPipeline::new(storage, config);
    if let Some(client) = narrative {
        pipeline = pipeline.with_narrative(Arc::new(client));
    }

    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);
    match engine.run().await {
        Ok(output) => {
            tracing::info!("✅ Report completed successfully!");
            for path in &output.written {
                println!("📁 Output saved to: {}", path);
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("❌ Report failed: {}", e);
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    }
}
