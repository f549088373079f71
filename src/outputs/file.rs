//! Report persistence.
//!
//! One file per day: `{output_dir}/{prefix}MM_DD_YYYY.html`. A second run on
//! the same day overwrites the first.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tokio::fs;
use tracing::{info, instrument};

use crate::error::PersistenceError;
use crate::utils::report_filename;

/// Write `report` for `date` into `output_dir`, creating the directory if needed.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display(), %date))]
pub async fn write_report(
    output_dir: &Path,
    prefix: &str,
    date: NaiveDate,
    report: &[u8],
) -> Result<PathBuf, PersistenceError> {
    fs::create_dir_all(output_dir)
        .await
        .map_err(|source| PersistenceError {
            path: output_dir.to_path_buf(),
            source,
        })?;

    let path = output_dir.join(report_filename(prefix, date));
    fs::write(&path, report)
        .await
        .map_err(|source| PersistenceError {
            path: path.clone(),
            source,
        })?;

    info!(path = %path.display(), bytes = report.len(), "Wrote report");
    Ok(path)
}
