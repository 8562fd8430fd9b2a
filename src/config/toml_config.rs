use crate::core::narrative::{NarrativeSettings, API_KEY_ENV};
use crate::core::ConfigProvider;
use crate::domain::model::{ColumnMapping, InsightKind};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    validate_column_names, validate_delimiter, validate_output_formats, validate_path, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub report: ReportConfig,
    pub input: InputConfig,
    #[serde(default)]
    pub columns: ColumnMapping,
    pub narrative: Option<NarrativeConfig>,
    pub load: LoadConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub path: String,
    pub delimiter: Option<char>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeConfig {
    pub enabled: Option<bool>,
    pub kind: InsightKind,
    pub answers_path: Option<String>,
    #[serde(flatten)]
    pub settings: NarrativeSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_path: String,
    pub output_formats: Vec<String>,
    pub bundle: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${NARRATIVE_API_KEY})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 啟用中的敘述設定；未填 api_key 時改用環境變數
    pub fn narrative_settings(&self) -> Option<NarrativeSettings> {
        let narrative = self.active_narrative()?;
        let mut settings = narrative.settings.clone();
        // 未設定的 ${VAR} 會原樣保留
        let unresolved = |k: &str| k.trim().is_empty() || k.starts_with("${");
        if settings.api_key.as_deref().map_or(true, unresolved) {
            settings.api_key = std::env::var(API_KEY_ENV).ok();
        }
        Some(settings)
    }

    fn active_narrative(&self) -> Option<&NarrativeConfig> {
        self.narrative
            .as_ref()
            .filter(|n| n.enabled.unwrap_or(true))
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().is_some_and(|m| m.enabled)
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_path("input.path", &self.input.path)?;
        validate_delimiter("input.delimiter", self.delimiter())?;
        validate_column_names("columns", &self.columns.names())?;
        validate_path("load.output_path", &self.load.output_path)?;
        validate_output_formats("load.output_formats", &self.load.output_formats)?;

        if let Some(narrative) = self.active_narrative() {
            narrative.settings.validate()?;
            if let Some(answers) = &narrative.answers_path {
                validate_path("narrative.answers_path", answers)?;
            }
        }

        Ok(())
    }
}

impl ConfigProvider for TomlConfig {
    fn input_path(&self) -> Option<&str> {
        Some(&self.input.path)
    }

    fn output_path(&self) -> &str {
        &self.load.output_path
    }

    fn output_formats(&self) -> &[String] {
        &self.load.output_formats
    }

    fn bundle_output(&self) -> bool {
        self.load.bundle.unwrap_or(false)
    }

    fn delimiter(&self) -> char {
        self.input.delimiter.unwrap_or(',')
    }

    fn columns(&self) -> &ColumnMapping {
        &self.columns
    }

    fn insight_kind(&self) -> Option<InsightKind> {
        self.active_narrative().map(|n| n.kind)
    }

    fn answers_path(&self) -> Option<&str> {
        self.active_narrative()?.answers_path.as_deref()
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
