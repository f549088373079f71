//! # Press Summary Report
//!
//! Daily press coverage report for one company. Articles mentioning the
//! company are fetched from a news-search API, each article is scored 0-10 for
//! how favorably it portrays the company, and the results are rendered into an
//! HTML report with color-coded scores and an average.
//!
//! ## Usage
//!
//! ```sh
//! NEWSCATCHER_API_KEY=... OPENAI_API_KEY=... press_summary_report -o ./output
//! ```
//!
//! ## Architecture
//!
//! 1. **Fetching**: one page of articles from the search provider
//! 2. **Filtering**: articles without a summary are dropped
//! 3. **Scoring**: one completion call per article, with a fallback on failure
//! 4. **Rendering**: rows stamped into the HTML template, average filled in
//! 5. **Output**: `{prefix}MM_DD_YYYY.html` in the output directory

use std::error::Error;
use std::time::Duration;

use chrono::Local;
use clap::Parser;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod error;
mod models;
mod outputs;
mod pipeline;
mod sentiment;
mod sources;
mod utils;

use api::{OpenAiCompletions, Retry};
use cli::Cli;
use config::{Credentials, Settings};
use models::ReportModel;
use outputs::{file, html::ReportRenderer};
use pipeline::{Pipeline, RunOutcome};
use sentiment::SentimentScorer;
use sources::newscatcher::NewsCatcherClient;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("press_summary_report starting up");

    let args = Cli::parse();
    debug!(company = %args.company, output_dir = %args.output_dir.display(), "Parsed CLI arguments");

    if let Err(e) = run(&args).await {
        error!(error = %e, "Run failed");
        return Err(e);
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

async fn run(args: &Cli) -> Result<(), Box<dyn Error>> {
    // ---- Configuration ----
    let settings = Settings::load(args.settings.as_deref())?;
    let credentials = Credentials::resolve(
        args.newscatcher_api_key.clone(),
        args.openai_api_key.clone(),
        &args.config_dir,
    )?;

    // ---- Template (validated before any API call) ----
    let template = match &args.template {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path).await.map_err(|source| {
                error::ConfigError::Read {
                    path: path.clone(),
                    source,
                }
            })?;
            info!(path = %path.display(), "Loaded template");
            raw
        }
        None => outputs::html::DEFAULT_TEMPLATE.to_string(),
    };
    let renderer = ReportRenderer::new(&template)?;

    // ---- Providers ----
    let timeout = settings.request_timeout();
    let source = NewsCatcherClient::new(&settings.search_url()?, &credentials.newscatcher, timeout)?;
    let completions = OpenAiCompletions::new(
        &settings.completion_url()?,
        &credentials.openai,
        &settings.model,
        settings.max_tokens,
        timeout,
    )?;
    let provider = Retry::new(completions, args.max_retries, Duration::from_secs(1));
    let scorer = SentimentScorer::new(provider, &args.company, &args.language, args.fallback_policy());
    info!(
        company = %args.company,
        model = %settings.model,
        fallback = %args.fallback_policy(),
        concurrency = args.concurrency,
        "Pipeline configured"
    );

    let pipeline =
        Pipeline::new(source, scorer, renderer.clone()).with_concurrency(args.concurrency as usize);
    let request = args.search_request();

    // ---- Run ----
    let report = match pipeline.run(&request).await? {
        RunOutcome::Rendered(report) => {
            info!(
                rows = report.rows,
                average = %report.average.map(|a| a.to_string()).unwrap_or_else(|| "-".to_string()),
                skipped = report.stats.skipped,
                degraded = report.stats.degraded,
                "Report rendered"
            );
            report.html
        }
        RunOutcome::NothingToReport if args.write_empty => {
            warn!("No articles found; writing an empty report");
            renderer.render(&ReportModel::new())?
        }
        RunOutcome::NothingToReport => {
            warn!("No articles found; no report written");
            println!("No articles found for {}; no report written", request.query);
            return Ok(());
        }
    };

    // ---- Output ----
    let path = file::write_report(
        &args.output_dir,
        &args.output_prefix,
        Local::now().date_naive(),
        &report,
    )
    .await?;
    println!("Report successfully generated: {}", path.display());
    Ok(())
}
