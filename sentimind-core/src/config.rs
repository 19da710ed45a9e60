use crate::error::{ConfigError, CoreError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const TOKEN_ENV_VAR: &str = "TWITTER_BEARER_TOKEN";
pub const DATABASE_URL_ENV_VAR: &str = "SENTIMIND_DATABASE_URL";
pub const MODELS_DIR_ENV_VAR: &str = "SENTIMIND_MODELS_DIR";
pub const DEFAULT_CONFIG_FILE: &str = "sentimind.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_url: String,
    pub models_dir: PathBuf,
    pub harvester: HarvesterConfig,
    pub scrape: ScrapeConfig,
    pub analysis: AnalysisConfig,
    #[serde(skip)]
    pub auth_token: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://sentimind.db".to_string(),
            models_dir: PathBuf::from("models"),
            harvester: HarvesterConfig::default(),
            scrape: ScrapeConfig::default(),
            analysis: AnalysisConfig::default(),
            auth_token: None,
        }
    }
}

/// How the external search tool is launched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvesterConfig {
    pub program: String,
    pub base_args: Vec<String>,
    pub tab: String,
    /// Parent directory for per-batch scratch directories; system temp when unset.
    pub work_dir: Option<PathBuf>,
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            program: "npx".to_string(),
            base_args: vec!["-y".to_string(), "tweet-harvest@latest".to_string()],
            tab: "LATEST".to_string(),
            work_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub batch_size: usize,
    pub inter_batch_delay_secs: u64,
    pub default_limit: usize,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,            // Rows requested per harvester call
            inter_batch_delay_secs: 60, // Pause between calls to respect search rate limits
            default_limit: 500,
        }
    }
}

impl ScrapeConfig {
    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_secs(self.inter_batch_delay_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub workers: usize,
    pub default_limit: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            default_limit: 100,
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Read a config file; a missing file is only an error when `required`.
    pub fn from_file(path: &Path, required: bool) -> Result<Self, CoreError> {
        if !path.exists() {
            if required {
                return Err(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                }
                .into());
            }
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load `.env`, the config file, and environment overrides, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self, CoreError> {
        if let Ok(env_path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", env_path.display());
        }

        let mut config = match path {
            Some(path) => Self::from_file(path, true)?,
            None => Self::from_file(Path::new(DEFAULT_CONFIG_FILE), false)?,
        };
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(DATABASE_URL_ENV_VAR).filter(|v| !v.trim().is_empty()) {
            self.database_url = url;
        }
        if let Some(dir) = lookup(MODELS_DIR_ENV_VAR).filter(|v| !v.trim().is_empty()) {
            self.models_dir = PathBuf::from(dir);
        }
        self.auth_token = lookup(TOKEN_ENV_VAR).filter(|v| !v.trim().is_empty());
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("scrape.batch_size", self.scrape.batch_size),
            ("scrape.default_limit", self.scrape.default_limit),
            ("analysis.workers", self.analysis.workers),
            ("analysis.default_limit", self.analysis.default_limit),
        ];
        for (field, value) in checks {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                });
            }
        }
        if self.harvester.program.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "harvester.program".to_string(),
                value: self.harvester.program.clone(),
            });
        }
        Ok(())
    }

    /// The harvester credential, required before any scrape runs.
    pub fn require_auth_token(&self) -> Result<&str, ConfigError> {
        self.auth_token
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvironmentVariable {
                var_name: TOKEN_ENV_VAR.to_string(),
            })
    }
}
