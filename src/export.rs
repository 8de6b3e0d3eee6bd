use chrono::{DateTime, Local};
use clap::ValueEnum;
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::batch::{BatchReport, RunSummary, TaskReport};
use crate::error::{ExitCode, SaveError};
use crate::models::BusinessRecord;

const DEFAULT_STEM: &str = "places_results";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

/// Where the results and the run summary are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub data: PathBuf,
    pub summary: PathBuf,
}

impl OutputPaths {
    /// `dir/stem[_YYYYmmdd_HHMMSS].ext` plus `dir/stem[_...]_summary.json`.
    /// The extension always follows `format`, whatever `filename` ends with.
    pub fn resolve(filename: &str, format: OutputFormat, timestamp: Option<DateTime<Local>>) -> Self {
        let path = Path::new(filename);
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_STEM)
            .to_string();
        if let Some(ts) = timestamp {
            stem = format!("{}_{}", stem, ts.format("%Y%m%d_%H%M%S"));
        }

        Self {
            data: dir.join(format!("{}.{}", stem, format.extension())),
            summary: dir.join(format!("{}_summary.json", stem)),
        }
    }
}

/// Contents of the `_summary.json` file.
#[derive(Debug, Serialize)]
pub struct ExportSummary<'a> {
    pub total_results: usize,
    pub unique_businesses: usize,
    pub search_queries: Vec<&'a str>,
    pub search_areas: Vec<&'a str>,
    pub generated_at: String,
    pub output_file: String,
    pub run: &'a RunSummary,
    pub tasks: Vec<TaskReport>,
}

impl<'a> ExportSummary<'a> {
    pub fn new(records: &'a [BusinessRecord], report: &'a BatchReport, output: &Path) -> Self {
        let unique: HashSet<_> = records.iter().map(BusinessRecord::identifier).collect();
        let queries: BTreeSet<&str> = records.iter().map(|r| r.search_query.as_str()).collect();
        let areas: BTreeSet<&str> = records.iter().map(|r| r.search_area.as_str()).collect();

        Self {
            total_results: records.len(),
            unique_businesses: unique.len(),
            search_queries: queries.into_iter().collect(),
            search_areas: areas.into_iter().collect(),
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            output_file: output.display().to_string(),
            run: &report.summary,
            tasks: report.task_reports(),
        }
    }
}

fn create_parent(path: &Path) -> Result<(), SaveError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir).map_err(|source| SaveError::Io {
            path: dir.to_path_buf(),
            source,
        }),
        _ => Ok(()),
    }
}

/// Write records as CSV with a header row, even when there are none.
pub fn export_csv(records: &[BusinessRecord], path: &Path) -> Result<(), SaveError> {
    debug!("Exporting {} records to CSV: {}", records.len(), path.display());
    create_parent(path)?;

    let csv_err = |source| SaveError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_err)?;
    writer.write_record(BusinessRecord::COLUMNS).map_err(csv_err)?;
    for record in records {
        writer.serialize(record).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| SaveError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

pub fn export_json(records: &[BusinessRecord], path: &Path) -> Result<(), SaveError> {
    debug!("Exporting {} records to JSON: {}", records.len(), path.display());
    write_json(records, path)
}

pub fn export_summary(summary: &ExportSummary<'_>, path: &Path) -> Result<(), SaveError> {
    write_json(summary, path)
}

fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<(), SaveError> {
    create_parent(path)?;
    let json = serde_json::to_string_pretty(value).map_err(|source| SaveError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| SaveError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the records in `format` and the summary next to them.
pub fn save_all(
    records: &[BusinessRecord],
    report: &BatchReport,
    paths: &OutputPaths,
    format: OutputFormat,
) -> Result<(), SaveError> {
    match format {
        OutputFormat::Csv => export_csv(records, &paths.data)?,
        OutputFormat::Json => export_json(records, &paths.data)?,
    }
    info!("💾 Saved {} record(s) to {}", records.len(), paths.data.display());

    let summary = ExportSummary::new(records, report, &paths.data);
    export_summary(&summary, &paths.summary)?;
    info!("📝 Summary saved to {}", paths.summary.display());
    Ok(())
}

/// Save what the run collected and pick the process exit status.
///
/// Nothing is written when there are no records. A failed write maps to
/// [`ExitCode::SaveError`], otherwise the report decides.
pub fn save_results(
    records: &[BusinessRecord],
    report: &BatchReport,
    paths: &OutputPaths,
    format: OutputFormat,
) -> ExitCode {
    if records.is_empty() {
        warn!("No results to save");
        return report.exit_code(0);
    }
    if let Err(e) = save_all(records, report, paths, format) {
        error!("❌ Failed to save results: {}", e);
        return ExitCode::SaveError;
    }
    report.exit_code(records.len())
}
