//! Data model entities shared by the orchestrator, process executor, and
//! backup manager: [`PluginEntry`], [`CleaningStatistics`], [`PluginResult`],
//! [`SessionResult`], [`BackupSession`], [`DryRunResult`], [`TerminationResult`].

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Why a load-order entry could not be resolved to a real plugin file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WarningKind {
    /// Resolved fine; no warning.
    None,
    /// Line parsed to a plugin file name but no file exists there, or the
    /// entry couldn't be resolved to an absolute path at all (no data
    /// directory configured) — both are "we have nothing to clean here".
    NotFound,
    /// File exists but couldn't be opened/read (permissions, I/O error).
    Unreadable,
    /// File exists but is empty.
    ZeroByte,
    /// Load order line didn't parse into a recognizable plugin file name.
    MalformedEntry,
    /// Parsed name lacks a `.esp`/`.esm`/`.esl` extension.
    InvalidExtension,
}

/// A single entry from the load order, after enumeration and skip-list filtering.
#[derive(Clone, Debug)]
pub struct PluginEntry {
    pub file_name: String,
    pub resolved_path: Option<Utf8PathBuf>,
    pub is_selected: bool,
    pub is_in_skip_list: bool,
    /// Game type the session resolved for this entry (e.g. `FO4`, `SSE`,
    /// `FO4VR`), stamped on every entry once the orchestrator has detected it.
    pub detected_game: Option<String>,
    pub warning_kind: WarningKind,
}

impl PluginEntry {
    /// Whether the orchestrator should launch xEdit on this entry: selected
    /// by the caller, not on the active skip list, and not a parse/path
    /// warning that would make cleaning it unsafe or meaningless.
    pub fn should_process(&self) -> bool {
        self.is_selected && !self.is_in_skip_list && self.warning_kind == WarningKind::None
    }
}

impl Default for PluginEntry {
    fn default() -> Self {
        Self {
            file_name: String::new(),
            resolved_path: None,
            is_selected: true,
            is_in_skip_list: false,
            detected_game: None,
            warning_kind: WarningKind::None,
        }
    }
}

/// Per-plugin counters parsed from xEdit's log/stdout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CleaningStatistics {
    pub undeleted: usize,
    pub removed: usize,
    pub skipped: usize,
    pub partial_forms: usize,
}

impl CleaningStatistics {
    pub fn total(&self) -> usize {
        self.undeleted + self.removed + self.skipped + self.partial_forms
    }

    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }

    pub fn merge(&mut self, other: &CleaningStatistics) {
        self.undeleted += other.undeleted;
        self.removed += other.removed;
        self.skipped += other.skipped;
        self.partial_forms += other.partial_forms;
    }
}

/// Final disposition of a single plugin's cleaning attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PluginStatus {
    Cleaned,
    Failed,
    Skipped,
}

/// The outcome of processing one plugin, independent of how it's displayed.
#[derive(Clone, Debug)]
pub struct PluginResult {
    pub plugin: String,
    pub status: PluginStatus,
    pub message: String,
    pub stats: CleaningStatistics,
    pub duration: Duration,
    pub attempts: u32,
    /// Set when the xEdit log file couldn't be read/parsed and stdout-derived
    /// stats were kept as a fallback; the result is still published, not dropped.
    pub log_parse_warning: Option<String>,
}

/// Aggregate counters across an entire session, computed once at finalization.
#[derive(Clone, Copy, Debug, Default)]
pub struct SessionSummary {
    pub cleaned: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_stats: CleaningStatistics,
}

/// The result of a completed (or cancelled) cleaning session.
#[derive(Clone, Debug)]
pub struct SessionResult {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub plugin_results: Vec<PluginResult>,
    pub was_cancelled: bool,
    pub session_summary: SessionSummary,
    pub backup_session: Option<BackupSession>,
}

impl SessionResult {
    pub fn summarize(
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        plugin_results: Vec<PluginResult>,
        was_cancelled: bool,
        backup_session: Option<BackupSession>,
    ) -> Self {
        let mut summary = SessionSummary::default();
        for result in &plugin_results {
            match result.status {
                PluginStatus::Cleaned => summary.cleaned += 1,
                PluginStatus::Failed => summary.failed += 1,
                PluginStatus::Skipped => summary.skipped += 1,
            }
            summary.total_stats.merge(&result.stats);
        }

        Self {
            started_at,
            finished_at,
            plugin_results,
            was_cancelled,
            session_summary: summary,
            backup_session,
        }
    }
}

/// Metadata describing one backup directory on disk.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackupSession {
    pub directory: Utf8PathBuf,
    pub created_at: DateTime<Utc>,
    pub game: String,
    pub plugins: Vec<BackedUpPlugin>,
}

/// A single plugin copy recorded within a backup session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackedUpPlugin {
    pub original_path: Utf8PathBuf,
    pub backup_path: Utf8PathBuf,
    pub size_bytes: u64,
}

/// What a dry run would have done, without touching any files.
#[derive(Clone, Debug, Default)]
pub struct DryRunResult {
    pub would_process: Vec<String>,
    pub would_skip: Vec<(String, WarningKind)>,
}

/// Outcome of the kill-escalation ladder for one subprocess.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminationOutcome {
    ExitedGracefully,
    ExitedAfterSignal,
    /// Grace period elapsed with no escalation; the child was left running.
    GracePeriodExpired,
    ForceKilled,
    HandleStillHeld,
}

/// Full record of how a subprocess termination went, for logging/metrics.
#[derive(Clone, Debug)]
pub struct TerminationResult {
    pub outcome: TerminationOutcome,
    pub wall_time: Duration,
    pub handle_release_retries: u32,
}
