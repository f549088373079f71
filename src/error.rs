//! Error taxonomy for a report run.
//!
//! Fatal conditions ([`FetchError`], [`RenderError`], [`PersistenceError`],
//! [`ConfigError`]) abort the run with a descriptive message. Scoring
//! failures ([`ScoreError`]) never escape the sentiment scorer: they are
//! logged and replaced by the configured fallback.

use std::path::PathBuf;
use thiserror::Error;

/// The news-search provider could not deliver an article list.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("search request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("search provider returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("search response was not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The completion provider call failed. Never fatal to a run.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("completion request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("completion provider returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("completion response was not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("completion response contained no choices")]
    NoChoices,
}

/// The template cannot be turned into a report.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("template has no element with id=\"{0}\" (row prototype)")]
    MissingPrototype(String),
    #[error("template has no aggregate display (id=\"{0}\" or a second <table>)")]
    MissingAggregate(String),
    #[error("row prototype has {found} <td> cells, expected at least {expected}")]
    MissingCells { found: usize, expected: usize },
    #[error("template has no <body> element")]
    MissingBody,
    #[error("report could not be serialized: {0}")]
    Serialize(String),
}

/// The rendered report could not be written.
#[derive(Debug, Error)]
#[error("failed to write report to {path}: {source}")]
pub struct PersistenceError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Startup configuration is incomplete or unreadable.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is not set: export {env} or create {}", file.display())]
    MissingCredential {
        name: &'static str,
        env: &'static str,
        file: PathBuf,
    },
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file {}: {source}", path.display())]
    Settings {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid endpoint {value}: {source}")]
    Endpoint {
        value: String,
        #[source]
        source: url::ParseError,
    },
}

/// A fatal pipeline failure.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Render(#[from] RenderError),
}
