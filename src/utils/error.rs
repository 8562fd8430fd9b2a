use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("No file uploaded")]
    MissingInput,

    #[error("Could not read file: {reason}")]
    UnreadableInput { reason: String },

    #[error("{0}")]
    EmptyInput(String),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Narrative generation failed: {message}")]
    NarrativeError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Configuration,
    Network,
    Storage,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn empty_input(message: impl Into<String>) -> Self {
        Self::EmptyInput(message.into())
    }

    pub fn narrative(message: impl Into<String>) -> Self {
        Self::NarrativeError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingInput | Self::UnreadableInput { .. } | Self::EmptyInput(_) => {
                ErrorCategory::Input
            }
            Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. } => ErrorCategory::Configuration,
            Self::ApiError(_) | Self::NarrativeError { .. } => ErrorCategory::Network,
            Self::IoError(_) | Self::ZipError(_) => ErrorCategory::Storage,
            Self::CsvError(_) | Self::SerializationError(_) | Self::ProcessingError { .. } => {
                ErrorCategory::Processing
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 上游服務問題，可重試
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Input | ErrorCategory::Configuration | ErrorCategory::Processing => {
                ErrorSeverity::High
            }
            ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::MissingInput | Self::UnreadableInput { .. } | Self::EmptyInput(_) => {
                self.to_string()
            }
            Self::InvalidConfigValueError { field, reason, .. } => {
                format!("Configuration value '{}' is invalid: {}", field, reason)
            }
            Self::ApiError(_) | Self::NarrativeError { .. } => {
                "The insights service could not be reached or returned an error".to_string()
            }
            Self::IoError(e) => format!("File system error: {}", e),
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::MissingInput => "Pass the path of the exported CSV file with --input",
            Self::UnreadableInput { .. } => "Re-export the report as UTF-8 encoded CSV",
            Self::EmptyInput(_) => {
                "Make sure the export contains a header row followed by at least one data row"
            }
            Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. } => {
                "Check the command line flags or the TOML configuration file"
            }
            Self::ApiError(_) | Self::NarrativeError { .. } => {
                "Verify the narrative endpoint, model and API key, then retry"
            }
            Self::IoError(_) | Self::ZipError(_) => {
                "Check that the output directory exists and is writable"
            }
            Self::CsvError(_) | Self::SerializationError(_) | Self::ProcessingError { .. } => {
                "Inspect the input data for unexpected content"
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
