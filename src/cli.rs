use clap::Parser;
use std::path::PathBuf;

use crate::config::ScraperConfig;
use crate::export::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "places-scout")]
#[command(about = "Collects business listings from Google Maps for every query and area combination")]
#[command(version)]
pub struct Cli {
    /// Configuration file (.toml or .json)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write a sample configuration file to PATH and exit
    #[arg(long, value_name = "PATH")]
    pub create_config: Option<PathBuf>,

    /// Search query (repeatable)
    #[arg(short, long = "query", value_name = "QUERY")]
    pub query: Vec<String>,

    /// Search area (repeatable)
    #[arg(short, long = "area", visible_alias = "location", value_name = "AREA")]
    pub area: Vec<String>,

    /// Comma-separated search queries
    #[arg(long, value_name = "LIST")]
    pub queries: Option<String>,

    /// Comma-separated search areas
    #[arg(long, value_name = "LIST")]
    pub areas: Option<String>,

    /// Maximum results processed per search
    #[arg(long, value_name = "N")]
    pub max_results: Option<usize>,

    /// Output filename; the extension follows --format
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<String>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Do not add a timestamp to output filenames
    #[arg(long)]
    pub no_timestamp: bool,

    /// Number of searches run in parallel (one browser each)
    #[arg(short = 'j', long, value_name = "N")]
    pub concurrent: Option<usize>,

    /// Seconds to wait between searches
    #[arg(long, value_name = "SECS")]
    pub delay: Option<f64>,

    /// Time limit per search in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Show the browser window
    #[arg(long)]
    pub no_headless: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

fn split_list(list: &str) -> impl Iterator<Item = String> + '_ {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl Cli {
    fn collected(single: &[String], list: Option<&str>) -> Vec<String> {
        let mut values: Vec<String> = single.iter().map(|s| s.trim().to_string()).collect();
        values.extend(list.into_iter().flat_map(split_list));
        values
    }

    pub fn search_queries(&self) -> Vec<String> {
        Self::collected(&self.query, self.queries.as_deref())
    }

    pub fn search_areas(&self) -> Vec<String> {
        Self::collected(&self.area, self.areas.as_deref())
    }

    /// Replace config values with the ones given on the command line.
    pub fn apply_overrides(&self, config: &mut ScraperConfig) {
        let queries = self.search_queries();
        if !queries.is_empty() {
            config.queries = queries;
        }
        let areas = self.search_areas();
        if !areas.is_empty() {
            config.areas = areas;
        }
        if let Some(n) = self.max_results {
            config.max_results_per_search = n;
        }
        if let Some(output) = &self.output {
            config.output_filename = output.clone();
        }
        if let Some(format) = self.format {
            config.output_format = format;
        }
        if self.no_timestamp {
            config.include_timestamp = false;
        }
        if let Some(n) = self.concurrent {
            config.max_concurrent_searches = n;
        }
        if let Some(delay) = self.delay {
            config.delay_between_searches_secs = delay;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_per_search_secs = timeout;
        }
        if self.no_headless {
            config.headless = false;
        }
    }
}
