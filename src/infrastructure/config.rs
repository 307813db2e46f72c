//! Configuration infrastructure
//!
//! Settings are read from a config file (any format the `config` crate
//! understands, TOML in practice) and overridden by environment variables
//! prefixed with `SAMPLER__`, nested keys separated by `__`
//! (e.g. `SAMPLER__API__TOKEN`). Every section falls back to defaults.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::domain::ListingQuery;
use crate::sampling::retry::RetryPolicies;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    Load {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },
}

impl ConfigError {
    fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Complete sampler configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub api: ApiConfig,
    pub sampling: SamplingConfig,
    pub retry: RetryPolicies,
    pub logging: LoggingConfig,
}

/// Listing endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL the resource path is appended to (e.g. `https://host/api`)
    pub url: String,
    /// Bearer token sent with every request
    pub token: String,
    pub resource_path: String,
    pub top_param: String,
    pub skip_param: String,
    /// Field selection passed verbatim as `fields=`
    pub fields: String,
    pub page_size: usize,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: defaults::API_URL.to_string(),
            token: String::new(),
            resource_path: defaults::RESOURCE_PATH.to_string(),
            top_param: defaults::TOP_PARAM.to_string(),
            skip_param: defaults::SKIP_PARAM.to_string(),
            fields: defaults::work_item_fields(),
            page_size: defaults::PAGE_SIZE,
            connect_timeout_secs: defaults::CONNECT_TIMEOUT_SECONDS,
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECONDS,
            user_agent: defaults::USER_AGENT.to_string(),
        }
    }
}

impl ApiConfig {
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Sampling run settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Number of independent samples to take
    pub sample_count: usize,
    /// Worker pool size
    pub threads: usize,
    /// Directory receiving sample artifacts and the log file
    pub target_dir: PathBuf,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Global wait for all samples; stragglers are abandoned afterwards
    pub wait_timeout_secs: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        let today = Utc::now().date_naive();
        Self {
            sample_count: defaults::SAMPLE_COUNT,
            threads: defaults::THREADS,
            target_dir: PathBuf::from(defaults::TARGET_DIR),
            start_date: today,
            end_date: today,
            wait_timeout_secs: defaults::WAIT_TIMEOUT_SECONDS,
        }
    }
}

impl SamplingConfig {
    pub const fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted file logs
    pub json_format: bool,

    pub console_output: bool,

    /// Write a log file into the sampling target directory
    pub file_output: bool,

    pub file_name: String,

    /// Module-specific log level filters (e.g., "reqwest": "info")
    pub module_filters: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: true,
            file_name: defaults::LOG_FILE_NAME.to_string(),
            module_filters: BTreeMap::from([
                ("reqwest".to_string(), "info".to_string()),
                ("hyper".to_string(), "warn".to_string()),
                ("h2".to_string(), "warn".to_string()),
                ("tokio".to_string(), "info".to_string()),
            ]),
        }
    }
}

impl SamplerConfig {
    /// Loads `path` (extension optional) plus `SAMPLER__*` overrides
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(
                config::Environment::with_prefix(defaults::ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        info!("Loaded sampler configuration from {}", path);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampling.sample_count == 0 {
            return Err(ConfigError::validation("sampling.sample_count must be greater than 0"));
        }
        if self.sampling.threads == 0 {
            return Err(ConfigError::validation("sampling.threads must be greater than 0"));
        }
        if self.sampling.start_date > self.sampling.end_date {
            return Err(ConfigError::validation(
                "sampling.start_date cannot be after sampling.end_date",
            ));
        }
        if self.api.page_size == 0 {
            return Err(ConfigError::validation("api.page_size must be greater than 0"));
        }
        url::Url::parse(&self.api.url)
            .map_err(|e| ConfigError::validation(format!("api.url '{}' is invalid: {e}", self.api.url)))?;
        self.retry.validate().map_err(ConfigError::validation)?;
        Ok(())
    }

    pub fn listing_query(&self) -> ListingQuery {
        ListingQuery {
            resource_path: self.api.resource_path.clone(),
            top_param: self.api.top_param.clone(),
            skip_param: self.api.skip_param.clone(),
            fields: self.api.fields.clone(),
            page_size: self.api.page_size,
            start_date: self.sampling.start_date,
            end_date: self.sampling.end_date,
        }
    }
}

/// Default configuration values
pub mod defaults {
    pub const ENV_PREFIX: &str = "SAMPLER";

    pub const API_URL: &str = "http://localhost:8080/api";

    pub const RESOURCE_PATH: &str = "/workItems";

    pub const TOP_PARAM: &str = "$top";

    pub const SKIP_PARAM: &str = "$skip";

    /// Items per page request
    pub const PAGE_SIZE: usize = 400;

    pub const CONNECT_TIMEOUT_SECONDS: u64 = 5;

    pub const REQUEST_TIMEOUT_SECONDS: u64 = 60;

    pub const USER_AGENT: &str = "pagination-sampler/0.2";

    pub const SAMPLE_COUNT: usize = 10;

    pub const THREADS: usize = 4;

    pub const TARGET_DIR: &str = "samples";

    /// 30 minutes
    pub const WAIT_TIMEOUT_SECONDS: u64 = 30 * 60;

    pub const LOG_LEVEL: &str = "info";

    pub const LOG_FILE_NAME: &str = "sampler.log";

    const USER_FIELDS: &str = "id,login,fullName,email";

    const ISSUE_FIELDS: &str = "idReadable,resolved,project(shortName,name),summary,wikifiedDescription,customFields(name,localizedName,aliases,value(name))";

    pub fn work_item_fields() -> String {
        format!(
            "id,author({USER_FIELDS}),creator({USER_FIELDS}),type(name),text,duration(minutes,presentation),date,created,updated,issue({ISSUE_FIELDS})"
        )
    }
}
