//! Run configuration, loaded from TOML or JSON and overridden by CLI flags.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::batch::DelayPolicy;
use crate::export::OutputFormat;
use crate::extract::lookup::Field;
use crate::scrapers::{ChromeOptions, SearchParams};

/// Sample configuration written by `--create-config`.
pub const DEFAULT_CONFIG: &str = include_str!("../config/places-scout.toml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to parse JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported configuration format '{0}' (expected .toml or .json)")]
    UnsupportedFormat(String),

    #[error("Invalid configuration:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScraperConfig {
    /// Business categories to search for
    pub queries: Vec<String>,
    /// Locations to search in
    pub areas: Vec<String>,
    pub max_results_per_search: usize,
    pub max_concurrent_searches: usize,
    pub delay_between_searches_secs: f64,
    pub delay_jitter_secs: f64,
    pub timeout_per_search_secs: u64,
    pub results_wait_secs: u64,
    pub detail_wait_secs: u64,
    /// Total attempts per search, the first one included
    pub max_retries: u32,
    pub retry_delay_secs: f64,
    pub stagnation_rounds: u32,
    pub max_consecutive_failures: u32,
    pub output_filename: String,
    pub output_format: OutputFormat,
    pub include_timestamp: bool,
    pub headless: bool,
    /// Field name to CSS selector, tried before the built-in lookups
    pub custom_selectors: BTreeMap<String, String>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            queries: Vec::new(),
            areas: Vec::new(),
            max_results_per_search: 10,
            max_concurrent_searches: 1,
            delay_between_searches_secs: 2.0,
            delay_jitter_secs: 1.0,
            timeout_per_search_secs: 300,
            results_wait_secs: 20,
            detail_wait_secs: 15,
            max_retries: 3,
            retry_delay_secs: 5.0,
            stagnation_rounds: 3,
            max_consecutive_failures: 5,
            output_filename: "places_results.csv".to_string(),
            output_format: OutputFormat::Csv,
            include_timestamp: true,
            headless: true,
            custom_selectors: BTreeMap::new(),
        }
    }
}

impl ScraperConfig {
    /// Load from a `.toml` or `.json` file. Missing fields take their defaults.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();

        match extension.as_str() {
            "toml" => Ok(toml::from_str(&content)?),
            "json" => Ok(serde_json::from_str(&content)?),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Check every value and report all problems at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.queries.is_empty() {
            problems.push("at least one search query is required".to_string());
        }
        if self.queries.iter().any(|q| q.trim().is_empty()) {
            problems.push("search queries cannot be blank".to_string());
        }
        if self.areas.is_empty() {
            problems.push("at least one search area is required".to_string());
        }
        if self.areas.iter().any(|a| a.trim().is_empty()) {
            problems.push("search areas cannot be blank".to_string());
        }

        if !(1..=100).contains(&self.max_results_per_search) {
            problems.push(format!(
                "max_results_per_search must be between 1 and 100 (got {})",
                self.max_results_per_search
            ));
        }
        if !(1..=5).contains(&self.max_concurrent_searches) {
            problems.push(format!(
                "max_concurrent_searches must be between 1 and 5 (got {})",
                self.max_concurrent_searches
            ));
        }

        for (name, value) in [
            ("delay_between_searches_secs", self.delay_between_searches_secs),
            ("delay_jitter_secs", self.delay_jitter_secs),
            ("retry_delay_secs", self.retry_delay_secs),
        ] {
            if !value.is_finite() || value < 0.0 {
                problems.push(format!("{} must be a non-negative number (got {})", name, value));
            }
        }

        if self.timeout_per_search_secs < 30 {
            problems.push(format!(
                "timeout_per_search_secs must be at least 30 (got {})",
                self.timeout_per_search_secs
            ));
        }
        if self.results_wait_secs == 0 {
            problems.push("results_wait_secs must be greater than 0".to_string());
        }
        if self.detail_wait_secs == 0 {
            problems.push("detail_wait_secs must be greater than 0".to_string());
        }
        if self.max_retries == 0 {
            problems.push("max_retries must be at least 1".to_string());
        }
        if self.stagnation_rounds == 0 {
            problems.push("stagnation_rounds must be at least 1".to_string());
        }
        if self.max_consecutive_failures == 0 {
            problems.push("max_consecutive_failures must be at least 1".to_string());
        }
        if self.output_filename.trim().is_empty() {
            problems.push("output_filename cannot be empty".to_string());
        }

        for (key, selector) in &self.custom_selectors {
            if Field::from_key(key).is_none() {
                let known: Vec<&str> = Field::ALL.iter().map(|f| f.key()).collect();
                problems.push(format!(
                    "custom_selectors: unknown field '{}' (expected one of {})",
                    key,
                    known.join(", ")
                ));
            }
            if let Err(e) = scraper::Selector::parse(selector) {
                problems.push(format!("custom_selectors.{}: invalid selector '{}': {}", key, selector, e));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }

    pub fn total_searches(&self) -> usize {
        self.queries.len() * self.areas.len()
    }

    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            max_results: self.max_results_per_search,
            results_timeout: Duration::from_secs(self.results_wait_secs),
            detail_timeout: Duration::from_secs(self.detail_wait_secs),
            stagnation_rounds: self.stagnation_rounds,
            max_consecutive_failures: self.max_consecutive_failures,
            max_attempts: self.max_retries,
            retry_backoff: secs(self.retry_delay_secs),
            task_timeout: Duration::from_secs(self.timeout_per_search_secs),
            ..SearchParams::default()
        }
    }

    pub fn delay_policy(&self) -> DelayPolicy {
        DelayPolicy {
            base: secs(self.delay_between_searches_secs),
            jitter: secs(self.delay_jitter_secs),
        }
    }

    pub fn chrome_options(&self) -> ChromeOptions {
        ChromeOptions {
            headless: self.headless,
            ..ChromeOptions::default()
        }
    }
}

/// Seconds as a duration; invalid values collapse to zero.
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}

/// Write the sample configuration to `path`, creating parent directories.
pub fn write_sample(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, DEFAULT_CONFIG)?;
    Ok(())
}
