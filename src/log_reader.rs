//! Reads xEdit's sibling log files after a cleaning attempt.
//!
//! xEdit writes `<Base>_log.txt` and `<Base>Exception.log` next to its own
//! executable rather than to stdout, so the authoritative cleaning
//! statistics come from this file, not the piped stdout the process
//! executor parses live.

use crate::models::CleaningStatistics;
use crate::output_parser::parse_batch;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::time::{Duration, SystemTime};
use thiserror::Error;

/// Exception-log substrings the teacher's Python predecessor matched to
/// flag a plugin with missing masters or no editable records.
const MISSING_REQUIREMENTS_MARKERS: &[&str] =
    &["which can not be found", "which it does not have"];

const STALE_RETRY_DELAY: Duration = Duration::from_millis(200);

#[derive(Error, Debug)]
pub enum LogReadError {
    #[error("log file not found: {0}")]
    NotFound(Utf8PathBuf),
    #[error("log file at {0} predates the xEdit process start and was not refreshed in time")]
    Stale(Utf8PathBuf),
}

/// The two log file paths xEdit writes for a given executable/game combination.
pub fn log_paths(xedit_exe_path: &Utf8Path, game_type: Option<&str>) -> (Utf8PathBuf, Utf8PathBuf) {
    let xedit_dir = xedit_exe_path.parent().expect("xEdit path must have a parent directory");
    let xedit_stem = xedit_exe_path.file_stem().expect("xEdit path must have a file stem");

    let log_base = if let Some(game) = game_type {
        format!("{}Edit", game.to_uppercase())
    } else {
        xedit_stem.to_uppercase()
    };

    let main_log = xedit_dir.join(format!("{log_base}_log.txt"));
    let exception_log = xedit_dir.join(format!("{log_base}Exception.log"));
    (main_log, exception_log)
}

/// Remove both log files so the next run's read is unambiguous.
pub fn clear_logs(main_log: &Utf8Path, exception_log: &Utf8Path) -> Result<()> {
    if main_log.exists() {
        fs::remove_file(main_log).with_context(|| format!("Failed to remove main log: {main_log}"))?;
    }
    if exception_log.exists() {
        fs::remove_file(exception_log)
            .with_context(|| format!("Failed to remove exception log: {exception_log}"))?;
    }
    Ok(())
}

/// Returns `true` if the exception log reports a plugin with missing
/// masters or no cleanable records.
pub fn check_exception_log(exception_log: &Utf8Path) -> Result<bool> {
    if !exception_log.exists() {
        return Ok(false);
    }

    let content = fs::read_to_string(exception_log)
        .with_context(|| format!("Failed to read exception log: {exception_log}"))?;

    let has_error = MISSING_REQUIREMENTS_MARKERS.iter().any(|marker| content.contains(marker));
    if has_error {
        tracing::warn!("Exception log indicates missing requirements or empty plugin");
    }
    Ok(has_error)
}

/// Read and parse the main log, retrying once after [`STALE_RETRY_DELAY`] if
/// the file's mtime predates `process_start`. xEdit can take a moment to
/// flush its log after exit; a log older than the process that was
/// supposed to have written it is a sign the filesystem hasn't caught up
/// yet, not that nothing happened.
pub async fn read_stats(
    main_log: &Utf8Path,
    process_start: SystemTime,
) -> std::result::Result<CleaningStatistics, LogReadError> {
    for attempt in 0..2 {
        if main_log.exists() {
            let stale = fs::metadata(main_log)
                .and_then(|m| m.modified())
                .map(|mtime| mtime < process_start)
                .unwrap_or(false);

            if !stale {
                let content = fs::read_to_string(main_log).unwrap_or_default();
                return Ok(parse_batch(&content));
            }
        }

        if attempt == 0 {
            tokio::time::sleep(STALE_RETRY_DELAY).await;
        }
    }

    if main_log.exists() {
        Err(LogReadError::Stale(main_log.to_path_buf()))
    } else {
        Err(LogReadError::NotFound(main_log.to_path_buf()))
    }
}
