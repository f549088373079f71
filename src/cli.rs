//! Command-line interface definitions for the press summary report.
//!
//! All provider credentials can be given as flags or environment variables;
//! when neither is set they are read from key files in `--config-dir`.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{NEWSCATCHER_KEY_ENV, OPENAI_KEY_ENV};
use crate::models::Score;
use crate::sentiment::{FallbackKind, FallbackPolicy};
use crate::sources::SearchRequest;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Daily S-OIL report with defaults
/// press_summary_report
///
/// # Another company, English coverage, custom template
/// press_summary_report --company "ACME" --language en --template ./acme.html
///
/// # Never invent scores: drop articles the model could not score
/// press_summary_report --fallback omit
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Company the report is about
    #[arg(long, default_value = "S-OIL")]
    pub company: String,

    /// Search query; defaults to the quoted company name (exact phrase)
    #[arg(short, long)]
    pub query: Option<String>,

    /// Article language code
    #[arg(short, long, default_value = "ko")]
    pub language: String,

    /// Articles per page
    #[arg(long, default_value_t = 25, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub page_size: u32,

    /// Result page to fetch (1-based)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub page: u32,

    /// HTML template; the bundled template is used when omitted
    #[arg(short, long)]
    pub template: Option<PathBuf>,

    /// Output directory for the report
    #[arg(short, long, default_value = "output")]
    pub output_dir: PathBuf,

    /// Report file name prefix; the date and `.html` are appended
    #[arg(long, default_value = "S_OIL_PSR_")]
    pub output_prefix: String,

    /// Directory holding fallback API key files
    #[arg(long, default_value = "config")]
    pub config_dir: PathBuf,

    /// Optional YAML settings file (endpoints, model, limits)
    #[arg(short, long)]
    pub settings: Option<PathBuf>,

    /// NewsCatcher API key
    #[arg(long, env = NEWSCATCHER_KEY_ENV, hide_env_values = true)]
    pub newscatcher_api_key: Option<String>,

    /// OpenAI API key
    #[arg(long, env = OPENAI_KEY_ENV, hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// What to do when a scoring call fails: random, constant, or omit
    #[arg(long, default_value = "random")]
    pub fallback: FallbackKind,

    /// Score used by `--fallback constant`
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub fallback_score: u8,

    /// Scoring calls in flight at once; rows keep fetch order regardless
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=32))]
    pub concurrency: u32,

    /// Retries per scoring call before the fallback applies
    #[arg(long, default_value_t = 2)]
    pub max_retries: usize,

    /// Write a report even when the search returns nothing
    #[arg(long)]
    pub write_empty: bool,
}

impl Cli {
    pub fn search_request(&self) -> SearchRequest {
        let mut request = SearchRequest::for_company(&self.company, &self.language);
        if let Some(query) = &self.query {
            request.query = query.clone();
        }
        request.page_size = self.page_size;
        request.page = self.page;
        request
    }

    pub fn fallback_policy(&self) -> FallbackPolicy {
        self.fallback
            .with_score(Score::new(self.fallback_score).unwrap_or(Score::MIN))
    }
}
