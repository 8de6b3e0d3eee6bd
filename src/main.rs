use anyhow::Result;
use chrono::Local;
use clap::Parser;
use std::process;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use places_scout::batch::BatchRunner;
use places_scout::cli::Cli;
use places_scout::config::{self, ScraperConfig};
use places_scout::dedup::ResultCollection;
use places_scout::error::ExitCode;
use places_scout::export::{self, OutputPaths};
use places_scout::extract::FieldExtractor;
use places_scout::logging;
use places_scout::models::SearchTask;
use places_scout::scrapers::{ChromeSessionFactory, MapsLayout, SearchOrchestrator, SessionFactory};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::ConfigError
        }
    };
    process::exit(code.code());
}

async fn run(cli: Cli) -> Result<ExitCode> {
    if let Some(path) = &cli.create_config {
        config::write_sample(path)?;
        println!("Sample configuration written to {}", path.display());
        return Ok(ExitCode::Success);
    }

    logging::init(&cli.log_level, cli.log_file.as_deref())?;

    let mut config = match &cli.config {
        Some(path) => match ScraperConfig::load_from_path(path) {
            Ok(config) => config,
            Err(e) => {
                error!("{}", e);
                return Ok(ExitCode::ConfigError);
            }
        },
        None => ScraperConfig::default(),
    };
    cli.apply_overrides(&mut config);
    if let Err(e) = config.validate() {
        error!("{}", e);
        return Ok(ExitCode::ConfigError);
    }

    info!("📍 Places Scout - Google Maps business collector");
    info!("==========================================");
    let tasks = SearchTask::cartesian(&config.queries, &config.areas);
    info!(
        "{} quer(ies) x {} area(s) = {} search(es), up to {} result(s) each",
        config.queries.len(),
        config.areas.len(),
        tasks.len(),
        config.max_results_per_search
    );

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Interrupt received, stopping searches and saving collected results...");
            interrupt.cancel();
        }
    });

    let results = ResultCollection::new();
    let extractor = FieldExtractor::default().with_custom_selectors(&config.custom_selectors);
    let orchestrator = SearchOrchestrator::new(
        MapsLayout::default(),
        extractor,
        config.search_params(),
        results.clone(),
    );
    let factory: Arc<dyn SessionFactory> = Arc::new(ChromeSessionFactory::new(config.chrome_options()));
    let runner = BatchRunner::new(
        orchestrator,
        factory,
        config.max_concurrent_searches,
        config.delay_policy(),
        cancel,
    );

    let report = match runner.run(tasks).await {
        Ok(report) => report,
        Err(e) => {
            error!("❌ Could not start a browser session: {}", e);
            return Ok(ExitCode::ScrapingError);
        }
    };
    report.log_summary();

    let records = results.snapshot().await;
    let timestamp = config.include_timestamp.then(Local::now);
    let paths = OutputPaths::resolve(&config.output_filename, config.output_format, timestamp);
    Ok(export::save_results(&records, &report, &paths, config.output_format))
}
