use crate::core::narrative::{NarrativeSettings, API_KEY_ENV};
use crate::domain::model::ColumnMapping;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{validate_column_names, validate_delimiter, Validate};
use std::env;

/// Lambda settings read from the function environment. The export arrives in
/// the invocation payload, so there is no input or output path here.
#[derive(Debug, Clone)]
pub struct LambdaConfig {
    pub delimiter: char,
    pub columns: ColumnMapping,
    pub narrative: Option<NarrativeSettings>,
}

impl LambdaConfig {
    pub fn from_env() -> Result<Self> {
        let delimiter = match env::var("CSV_DELIMITER") {
            Ok(value) => single_char("CSV_DELIMITER", &value)?,
            Err(_) => ',',
        };

        let defaults = ColumnMapping::default();
        let columns = ColumnMapping {
            spend: env::var("COLUMN_SPEND").unwrap_or(defaults.spend),
            impressions: env::var("COLUMN_IMPRESSIONS").unwrap_or(defaults.impressions),
            clicks: env::var("COLUMN_CLICKS").unwrap_or(defaults.clicks),
            results: env::var("COLUMN_RESULTS").unwrap_or(defaults.results),
            revenue: env::var("COLUMN_REVENUE").unwrap_or(defaults.revenue),
        };

        // 沒有 API key 就不啟用敘述功能
        let narrative = env::var(API_KEY_ENV).ok().map(|api_key| {
            let defaults = NarrativeSettings::default();
            NarrativeSettings {
                endpoint: env::var("NARRATIVE_ENDPOINT").unwrap_or(defaults.endpoint.clone()),
                model: env::var("NARRATIVE_MODEL").unwrap_or(defaults.model.clone()),
                api_key: Some(api_key),
                timeout_seconds: env::var("NARRATIVE_TIMEOUT_SECONDS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.timeout_seconds),
                ..defaults
            }
        });

        Ok(Self {
            delimiter,
            columns,
            narrative,
        })
    }
}

fn single_char(field: &str, value: &str) -> Result<char> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(EtlError::InvalidConfigValueError {
            field: field.to_string(),
            value: value.to_string(),
            reason: "Expected exactly one character".to_string(),
        }),
    }
}

impl Validate for LambdaConfig {
    fn validate(&self) -> Result<()> {
        validate_delimiter("CSV_DELIMITER", self.delimiter)?;
        validate_column_names("COLUMN_*", &self.columns.names())?;
        if let Some(narrative) = &self.narrative {
            narrative.validate()?;
        }

        tracing::info!("✅ Lambda configuration validation passed");
        Ok(())
    }
}
