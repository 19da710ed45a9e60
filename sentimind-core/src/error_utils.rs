use crate::error::*;
use std::fmt;
use std::time::Duration;
use tracing::{error, info, warn};

/// Classification and logging helpers shared by every error type in the workspace.
pub trait ErrorExt: fmt::Display + fmt::Debug {
    fn error_code(&self) -> &'static str;

    fn user_friendly_message(&self) -> String;

    fn is_retryable(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn log_error(&self) -> &Self
    where
        Self: Sized,
    {
        error!(code = self.error_code(), details = ?self, "{}", self);
        self
    }

    fn log_warn(&self) -> &Self
    where
        Self: Sized,
    {
        warn!(code = self.error_code(), "{}", self);
        self
    }
}

impl CoreError {
    fn inner(&self) -> Option<&dyn ErrorExt> {
        match self {
            CoreError::Harvest(e) => Some(e),
            CoreError::DataParse(e) => Some(e),
            CoreError::Database(e) => Some(e),
            CoreError::ModelLoad(e) => Some(e),
            CoreError::Classification(e) => Some(e),
            CoreError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl ErrorExt for CoreError {
    fn error_code(&self) -> &'static str {
        match self {
            CoreError::Harvest(_) => "HARVEST",
            CoreError::DataParse(_) => "DATA_PARSE",
            CoreError::Database(_) => "DATABASE",
            CoreError::ModelLoad(_) => "MODEL_LOAD",
            CoreError::Classification(_) => "CLASSIFICATION",
            CoreError::Config(_) => "CONFIG",
            CoreError::Io(_) => "IO",
            CoreError::Serialization(_) => "SERIALIZATION",
            CoreError::Cancelled { .. } => "CANCELLED",
        }
    }

    fn user_friendly_message(&self) -> String {
        if let Some(inner) = self.inner() {
            return inner.user_friendly_message();
        }
        match self {
            CoreError::Cancelled { operation } => format!("{} was cancelled.", operation),
            CoreError::Io(e) => format!("A file could not be read or written: {}", e),
            CoreError::Serialization(_) => "The result could not be written as JSON.".to_string(),
            _ => "Something went wrong inside sentimind. Check the logs for details.".to_string(),
        }
    }

    fn is_retryable(&self) -> bool {
        match self.inner() {
            Some(inner) => inner.is_retryable(),
            None => matches!(self, CoreError::Io(_)),
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self.inner() {
            Some(inner) => inner.retry_after(),
            None if self.is_retryable() => Some(Duration::from_secs(5)),
            None => None,
        }
    }

    fn log_error(&self) -> &Self {
        let inner_code = self.inner().map(|inner| inner.error_code()).unwrap_or("-");
        error!(code = self.error_code(), inner_code, "{}", self);
        self
    }
}

impl ErrorExt for HarvestError {
    fn error_code(&self) -> &'static str {
        match self {
            HarvestError::Timeout { .. } => "HARVEST_TIMEOUT",
            HarvestError::AuthInvalid { .. } => "HARVEST_AUTH_INVALID",
            HarvestError::ToolFailure { .. } => "HARVEST_TOOL_FAILURE",
            HarvestError::NoData => "HARVEST_NO_DATA",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            HarvestError::Timeout { seconds } => format!(
                "Harvesting timed out after {} seconds. Try a smaller count or wait before retrying.",
                seconds
            ),
            HarvestError::AuthInvalid { .. } => {
                "The harvesting credential is invalid or expired. Please update your token."
                    .to_string()
            }
            HarvestError::ToolFailure { .. } => {
                "The harvesting tool failed. Check that it is installed and try again.".to_string()
            }
            HarvestError::NoData => "No posts were found for this search.".to_string(),
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            HarvestError::Timeout { .. } | HarvestError::ToolFailure { .. }
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            HarvestError::Timeout { .. } => Some(Duration::from_secs(15 * 60)),
            HarvestError::ToolFailure { .. } => Some(Duration::from_secs(60)),
            _ => None,
        }
    }
}

impl ErrorExt for DataParseError {
    fn error_code(&self) -> &'static str {
        match self {
            DataParseError::Malformed { .. } => "PARSE_MALFORMED",
            DataParseError::MissingColumn { .. } => "PARSE_MISSING_COLUMN",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            DataParseError::Malformed { .. } => {
                "The harvested batch could not be read and was skipped.".to_string()
            }
            DataParseError::MissingColumn { column } => format!(
                "The harvested batch is missing the '{}' column and was skipped.",
                column
            ),
        }
    }
}

impl ErrorExt for DatabaseError {
    fn error_code(&self) -> &'static str {
        match self {
            DatabaseError::ConnectionFailed { .. } => "DB_CONNECTION_FAILED",
            DatabaseError::MigrationFailed { .. } => "DB_MIGRATION_FAILED",
            DatabaseError::TransactionFailed { .. } => "DB_TRANSACTION_FAILED",
            DatabaseError::ConstraintViolation { .. } => "DB_CONSTRAINT_VIOLATION",
            DatabaseError::DatabaseLocked => "DB_LOCKED",
            DatabaseError::Sql(_) => "DB_SQL_ERROR",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            DatabaseError::ConnectionFailed { reason } => {
                format!("Could not open the post database: {}", reason)
            }
            DatabaseError::MigrationFailed { .. } => {
                "The post database schema could not be updated.".to_string()
            }
            DatabaseError::DatabaseLocked => {
                "The post database is busy with another process. Try again shortly.".to_string()
            }
            DatabaseError::ConstraintViolation { constraint } => format!(
                "A record conflicts with stored data ({}). Nothing was saved.",
                constraint
            ),
            DatabaseError::TransactionFailed { .. } | DatabaseError::Sql(_) => {
                "Saving to the post database failed. Nothing was saved.".to_string()
            }
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            DatabaseError::DatabaseLocked
                | DatabaseError::ConnectionFailed { .. }
                | DatabaseError::TransactionFailed { .. }
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            DatabaseError::DatabaseLocked => Some(Duration::from_millis(100)),
            DatabaseError::ConnectionFailed { .. } | DatabaseError::TransactionFailed { .. } => {
                Some(Duration::from_secs(1))
            }
            _ => None,
        }
    }
}

impl ErrorExt for ModelLoadError {
    fn error_code(&self) -> &'static str {
        match self {
            ModelLoadError::ArtifactNotFound { .. } => "MODEL_ARTIFACT_NOT_FOUND",
            ModelLoadError::InvalidArtifact { .. } => "MODEL_INVALID_ARTIFACT",
            ModelLoadError::UnknownLabel { .. } => "MODEL_UNKNOWN_LABEL",
            ModelLoadError::DimensionMismatch { .. } => "MODEL_DIMENSION_MISMATCH",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ModelLoadError::ArtifactNotFound { path } => format!(
                "Model file '{}' is missing. Place the trained artifacts in the models directory.",
                path
            ),
            ModelLoadError::InvalidArtifact { path, .. } => {
                format!("Model file '{}' could not be read.", path)
            }
            ModelLoadError::UnknownLabel { label } => {
                format!("The classifier uses an unsupported label '{}'.", label)
            }
            ModelLoadError::DimensionMismatch { .. } => {
                "The classifier does not match the word vectors it was trained with.".to_string()
            }
        }
    }
}

impl ErrorExt for ClassificationError {
    fn error_code(&self) -> &'static str {
        match self {
            ClassificationError::DimensionMismatch { .. } => "CLASSIFY_DIMENSION_MISMATCH",
            ClassificationError::InferenceFailed { .. } => "CLASSIFY_INFERENCE_FAILED",
            ClassificationError::LabelOutOfRange { .. } => "CLASSIFY_LABEL_OUT_OF_RANGE",
        }
    }

    fn user_friendly_message(&self) -> String {
        "The sentiment of this text could not be predicted.".to_string()
    }
}

impl ErrorExt for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND",
            ConfigError::MissingCredential { .. } => "CONFIG_MISSING_CREDENTIAL",
            ConfigError::InvalidDateRange { .. } => "CONFIG_INVALID_DATE_RANGE",
            ConfigError::InvalidDate { .. } => "CONFIG_INVALID_DATE",
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE",
            ConfigError::MissingEnvironmentVariable { .. } => "CONFIG_MISSING_ENV_VAR",
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { path } => format!("Config file '{}' does not exist.", path),
            ConfigError::MissingCredential { name } => {
                format!("The {} credential is required but was not provided.", name)
            }
            ConfigError::InvalidDateRange { since, until } => format!(
                "The start date {} is after the end date {}.",
                since, until
            ),
            ConfigError::InvalidDate { field, .. } => {
                format!("Invalid date for '{}'. Use the YYYY-MM-DD format.", field)
            }
            ConfigError::InvalidValue { field, value } => {
                format!("'{}' is not a valid value for {}.", value, field)
            }
            ConfigError::MissingEnvironmentVariable { var_name } => {
                format!("Set the {} environment variable (or add it to .env).", var_name)
            }
            ConfigError::Parse(e) => format!("The config file is not valid TOML: {}", e),
        }
    }
}

/// Logs a `CoreError` with its code, user message and retry hint.
#[derive(Debug, Clone, Copy)]
pub struct ErrorReporter {
    report_errors: bool,
    report_warnings: bool,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self {
            report_errors: true,
            report_warnings: true,
        }
    }

    pub fn with_error_reporting(self, enabled: bool) -> Self {
        Self {
            report_errors: enabled,
            ..self
        }
    }

    pub fn with_warning_reporting(self, enabled: bool) -> Self {
        Self {
            report_warnings: enabled,
            ..self
        }
    }

    pub fn report_error(&self, error: &CoreError) {
        if !self.report_errors {
            return;
        }
        error.log_error();
        match error.retry_after().filter(|_| error.is_retryable()) {
            Some(wait) => info!(
                code = error.error_code(),
                "{} (retry in {:?})",
                error.user_friendly_message(),
                wait
            ),
            None => info!(code = error.error_code(), "{}", error.user_friendly_message()),
        }
    }

    pub fn report_warning(&self, error: &CoreError) {
        if self.report_warnings {
            error.log_warn();
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}
