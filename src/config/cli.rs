use crate::core::narrative::{NarrativeSettings, API_KEY_ENV, DEFAULT_ENDPOINT, DEFAULT_MODEL};
use crate::core::ConfigProvider;
use crate::domain::model::{ColumnMapping, InsightKind};
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_delimiter, validate_output_formats, validate_path, Validate,
};
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "ads-metrics")]
#[command(about = "Aggregate ad-performance exports into marketing metrics")]
pub struct CliConfig {
    /// Path of the exported CSV file
    #[arg(short, long)]
    pub input: Option<String>,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    #[arg(long, value_delimiter = ',', default_value = "json")]
    pub output_formats: Vec<String>,

    /// Bundle every output format into a single zip file
    #[arg(long)]
    pub bundle: bool,

    #[arg(long, default_value_t = ',')]
    pub delimiter: char,

    /// Request narrative insights: analysis, media-plan or recommendations
    #[arg(long)]
    pub insights: Option<InsightKind>,

    /// JSON file with business answers for media-plan and recommendations
    #[arg(long)]
    pub answers: Option<String>,

    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub narrative_endpoint: String,

    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Falls back to the NARRATIVE_API_KEY environment variable
    #[arg(long)]
    pub api_key: Option<String>,

    /// Print the analysis response as JSON on stdout
    #[arg(long)]
    pub print: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Record phase timings and peak memory")]
    pub monitor: bool,

    #[arg(skip)]
    pub columns: ColumnMapping,
}

impl CliConfig {
    pub fn narrative_settings(&self) -> NarrativeSettings {
        NarrativeSettings {
            endpoint: self.narrative_endpoint.clone(),
            model: self.model.clone(),
            api_key: self
                .api_key
                .clone()
                .or_else(|| std::env::var(API_KEY_ENV).ok()),
            ..NarrativeSettings::default()
        }
    }
}

impl ConfigProvider for CliConfig {
    fn input_path(&self) -> Option<&str> {
        self.input.as_deref()
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn output_formats(&self) -> &[String] {
        &self.output_formats
    }

    fn bundle_output(&self) -> bool {
        self.bundle
    }

    fn delimiter(&self) -> char {
        self.delimiter
    }

    fn columns(&self) -> &ColumnMapping {
        &self.columns
    }

    fn insight_kind(&self) -> Option<InsightKind> {
        self.insights
    }

    fn answers_path(&self) -> Option<&str> {
        self.answers.as_deref()
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_path("output_path", &self.output_path)?;
        validate_output_formats("output_formats", &self.output_formats)?;
        validate_delimiter("delimiter", self.delimiter)?;
        if let Some(answers) = &self.answers {
            validate_path("answers", answers)?;
        }
        if self.insights.is_some() {
            self.narrative_settings().validate()?;
        }
        Ok(())
    }
}
