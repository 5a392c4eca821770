//! The session state machine: composes the config store, enumerator,
//! skip-list filter, game detector, command builder, process executor,
//! log reader, and backup manager into one full cleaning run.
//!
//! New module; the teacher had no equivalent — cleaning was driven
//! directly from the GUI controller, one plugin at a time, with no
//! retry loop, no backup step, and no session-level result type. This
//! is the largest module in the crate by design: every other component
//! exists to be called from here, in the order and with the failure
//! handling spec.md §4.3 describes.

use crate::backup::BackupManager;
use crate::command_builder::{self, build_cleaning_command};
use crate::config::ConfigManager;
use crate::error::AutoQacError;
use crate::log_reader;
use crate::metrics::Metrics;
use crate::models::{
    BackupSession, CleaningStatistics, PluginEntry, PluginResult, PluginStatus, SessionResult,
    WarningKind,
};
use crate::plugin_enumerator::enumerate_plugins;
use crate::process_executor::ProcessExecutor;
use crate::game_detection::{detect_game_from_load_order, detect_xedit_game};
use crate::skip_list::SkipList;
use crate::state::StateManager;
use camino::Utf8PathBuf;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How many times a single plugin is attempted before giving up, per
/// spec.md's `max_retry_attempts`. Retries only happen on timeout, and
/// only when [`SessionCallbacks::on_timeout`] says to.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// What to do when copying a plugin into the backup session fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackupFailureAction {
    /// Record the plugin as skipped and move on.
    SkipPlugin,
    /// Abort the whole session, writing whatever backup metadata exists so far.
    AbortSession,
    /// Proceed with cleaning this plugin without a backup copy.
    ContinueWithoutBackup,
}

/// Caller-supplied decision points. Both are optional; their absence
/// resolves to the conservative default spec.md names for an unattended
/// run (stop retrying, continue without backup).
#[derive(Clone, Default)]
pub struct SessionCallbacks {
    /// Invoked when a plugin times out and attempts remain. Arguments:
    /// plugin name, timeout, attempt number (1-based). Return `true` to
    /// retry, `false` to record the attempt as a timeout failure.
    pub on_timeout: Option<Arc<dyn Fn(&str, Duration, u32) -> bool + Send + Sync>>,
    /// Invoked when copying a plugin into the backup session fails.
    pub on_backup_failure: Option<Arc<dyn Fn(&str) -> BackupFailureAction + Send + Sync>>,
}

/// Settings that shape one cleaning session; a narrowed view of
/// [`crate::models::AppState`] so the orchestrator doesn't depend on the
/// whole state shape.
#[derive(Clone, Debug)]
pub struct CleaningSettings {
    pub load_order_path: Utf8PathBuf,
    pub xedit_exe_path: Utf8PathBuf,
    pub mo2_exe_path: Option<Utf8PathBuf>,
    pub mo2_mode: bool,
    pub partial_forms_enabled: bool,
    pub disable_skip_lists: bool,
    pub backup_enabled: bool,
    pub max_backup_sessions: usize,
    pub cleaning_timeout: Duration,
    pub game_type: Option<String>,
    pub data_dir: Option<Utf8PathBuf>,
}

/// Drives one cleaning session from validated settings to a published
/// [`SessionResult`]. Holds no session state between calls to
/// [`Self::start_cleaning`]; each call owns its own plugin loop and
/// process executor.
pub struct Orchestrator {
    state: StateManager,
    config: ConfigManager,
    executor: Arc<ProcessExecutor>,
    metrics: Arc<Metrics>,
}

impl Orchestrator {
    pub fn new(state: StateManager, config: ConfigManager) -> Self {
        Self {
            state,
            config,
            executor: Arc::new(ProcessExecutor::new()),
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Metrics accumulated across every session this orchestrator has run.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Subscribe to hang-detection events for the in-flight (or next) xEdit
    /// process. Informational only: a hang never terminates the process by
    /// itself, so the UI decides whether to surface a force-kill affordance.
    pub fn subscribe_hang(&self) -> tokio::sync::broadcast::Receiver<crate::process_executor::HangChangedEvent> {
        self.executor.subscribe_hang()
    }

    /// Request a graceful stop of the in-progress session. First call asks
    /// the running subprocess to exit cooperatively; a second call before
    /// that takes effect escalates to a forced kill, matching the two-click
    /// protocol in spec.md §4.3.
    pub fn stop_cleaning(&self) {
        let escalated = self.executor.request_stop(false);
        self.state.set_terminating(true);
        if escalated {
            tracing::warn!("Second stop request received; escalating to a forced kill");
        }
    }

    /// Immediately escalate to a forced kill, regardless of whether a
    /// graceful stop was already requested.
    pub fn force_stop_cleaning(&self) {
        self.executor.request_stop(true);
        self.state.set_terminating(true);
    }

    /// Run one full cleaning session to completion (or cancellation).
    ///
    /// Validates preconditions, runs the setup sequence (orphan cleanup,
    /// config flush, game detection, skip-list filtering, conditional file
    /// validation and backup session creation), processes each selected
    /// plugin in sequence, and finalizes with retention and a published
    /// [`SessionResult`]. Partial results are published even when the
    /// session is cancelled or a non-cancellation error interrupts it; the
    /// error (if any) is still returned to the caller after publication.
    pub async fn start_cleaning(
        &self,
        settings: CleaningSettings,
        callbacks: SessionCallbacks,
    ) -> Result<SessionResult, AutoQacError> {
        self.executor.reset_stop();
        self.state.set_terminating(false);
        let started_at = Utc::now();

        let result = self.run_session(&settings, &callbacks, started_at).await;

        match result {
            Ok(session_result) => Ok(session_result),
            Err(SessionFailure::Cancelled { partial }) => {
                self.state.finish_session(true);
                Ok(partial)
            }
            Err(SessionFailure::Error { partial, error }) => {
                if let Some(partial) = partial {
                    self.state.finish_session(false);
                    tracing::error!("Cleaning session failed after partial progress: {error}");
                    let _ = partial;
                }
                self.executor.reset_stop();
                self.state.set_terminating(false);
                Err(error)
            }
        }
    }

    async fn run_session(
        &self,
        settings: &CleaningSettings,
        callbacks: &SessionCallbacks,
        started_at: chrono::DateTime<Utc>,
    ) -> Result<SessionResult, SessionFailure> {
        self.validate_preconditions(settings)?;

        // Setup sequence.
        clean_orphaned_processes(&settings.xedit_exe_path).await;
        self.config.flush_pending_saves().map_err(|e| SessionFailure::fatal(e.into()))?;

        let game_type = self.resolve_game_type(settings)?;
        let base_game = base_game_type(&game_type);
        let variant = if base_game != game_type { Some(game_type.as_str()) } else { None };

        let main_config =
            self.config.load_main_config().map_err(|e| SessionFailure::fatal(e.into()))?;

        let mut entries =
            enumerate_plugins(&settings.load_order_path, settings.data_dir.as_deref(), settings.mo2_mode)
                .map_err(|e| SessionFailure::fatal(e.into()))?;

        for entry in &mut entries {
            entry.detected_game = Some(game_type.clone());
        }

        if !settings.disable_skip_lists {
            let skip_list = SkipList::from_config(&main_config, base_game, variant);
            skip_list.annotate(&mut entries);
        }

        if !settings.mo2_mode {
            validate_file_existence(&mut entries);
        }

        let backup_manager_and_session = self.maybe_create_backup_session(settings, &entries, &game_type)?;

        let to_process: Vec<PluginEntry> =
            entries.into_iter().filter(|e| e.should_process()).collect();

        self.state.start_cleaning(to_process.clone());

        let (backup_manager, mut backup_session) = match backup_manager_and_session {
            Some((manager, session)) => (Some(manager), Some(session)),
            None => (None, None),
        };

        let mut results = Vec::with_capacity(to_process.len());
        let mut was_cancelled = false;

        for entry in &to_process {
            if self.executor.stop_requested() {
                was_cancelled = true;
                break;
            }

            self.state.update_progress(entry.file_name.clone(), format!("Cleaning {}...", entry.file_name));

            let backup_outcome = self.backup_plugin(
                &backup_manager,
                &mut backup_session,
                entry,
                callbacks,
            );

            if backup_outcome == BackupOutcome::AbortSession {
                was_cancelled = true;
                break;
            }
            if backup_outcome == BackupOutcome::SkipPlugin {
                continue;
            }

            let result = self
                .run_plugin_attempts(entry, settings, &game_type, callbacks)
                .await;
            self.record_metrics(&result);
            self.state.record_plugin_result(&result);
            results.push(result);
        }

        let session_result = self.finalize(
            settings,
            started_at,
            results,
            was_cancelled,
            backup_manager,
            backup_session,
        );

        if was_cancelled {
            Err(SessionFailure::Cancelled { partial: session_result })
        } else {
            self.state.finish_session(false);
            Ok(session_result)
        }
    }

    fn validate_preconditions(&self, settings: &CleaningSettings) -> Result<(), SessionFailure> {
        if !settings.xedit_exe_path.exists() {
            return Err(SessionFailure::fatal(AutoQacError::ConfigInvalid(format!(
                "xEdit executable not found: {}",
                settings.xedit_exe_path
            ))));
        }
        if !settings.load_order_path.exists() {
            return Err(SessionFailure::fatal(AutoQacError::ConfigInvalid(format!(
                "load order file not found: {}",
                settings.load_order_path
            ))));
        }
        if settings.mo2_mode {
            match &settings.mo2_exe_path {
                Some(path) if path.exists() => {}
                Some(path) => {
                    return Err(SessionFailure::fatal(AutoQacError::ConfigInvalid(format!(
                        "MO2 executable not found: {path}"
                    ))));
                }
                None => {
                    return Err(SessionFailure::fatal(AutoQacError::ConfigInvalid(
                        "MO2 mode is enabled but no MO2 executable path is configured".to_string(),
                    )));
                }
            }
        }
        Ok(())
    }

    /// Resolve the game type from settings, the executable filename, or the
    /// load order's first master. An unresolvable game aborts the session:
    /// skip lists cannot be applied safely against an unknown game.
    fn resolve_game_type(&self, settings: &CleaningSettings) -> Result<String, SessionFailure> {
        if let Some(game) = &settings.game_type {
            return Ok(game.clone());
        }

        if let Some(game) = detect_xedit_game(settings.xedit_exe_path.as_str(), Some(&settings.load_order_path)) {
            return Ok(game);
        }

        if let Ok(Some(game)) = detect_game_from_load_order(&settings.load_order_path) {
            return Ok(game);
        }

        Err(SessionFailure::fatal(AutoQacError::ConfigInvalid(
            "could not determine the game type from the xEdit executable or load order; set it explicitly".to_string(),
        )))
    }

    fn maybe_create_backup_session(
        &self,
        settings: &CleaningSettings,
        entries: &[PluginEntry],
        game_type: &str,
    ) -> Result<Option<(BackupManager, BackupSession)>, SessionFailure> {
        if !settings.backup_enabled || settings.mo2_mode {
            return Ok(None);
        }

        let Some(data_dir) = entries
            .iter()
            .filter(|e| e.is_selected)
            .find_map(|e| e.resolved_path.as_ref())
            .and_then(|p| p.parent())
        else {
            tracing::warn!("Backup is enabled but no plugin has a rooted path; skipping backup for this session");
            return Ok(None);
        };

        let manager = BackupManager::new(data_dir);
        let session = manager
            .create_session(game_type, Utc::now())
            .map_err(|e| SessionFailure::fatal(e.into()))?;
        Ok(Some((manager, session)))
    }

    fn backup_plugin(
        &self,
        backup_manager: &Option<BackupManager>,
        backup_session: &mut Option<BackupSession>,
        entry: &PluginEntry,
        callbacks: &SessionCallbacks,
    ) -> BackupOutcome {
        let (Some(manager), Some(session)) = (backup_manager, backup_session) else {
            return BackupOutcome::Proceeded;
        };
        let Some(path) = &entry.resolved_path else {
            return BackupOutcome::Proceeded;
        };

        match manager.copy_plugin(session, path) {
            Ok(()) => BackupOutcome::Proceeded,
            Err(err) => {
                tracing::warn!("Failed to back up {}: {err}", entry.file_name);
                let action = callbacks
                    .on_backup_failure
                    .as_ref()
                    .map(|cb| cb(&entry.file_name))
                    .unwrap_or(BackupFailureAction::ContinueWithoutBackup);

                match action {
                    BackupFailureAction::SkipPlugin => BackupOutcome::SkipPlugin,
                    BackupFailureAction::AbortSession => {
                        let _ = manager.write_metadata(session);
                        BackupOutcome::AbortSession
                    }
                    BackupFailureAction::ContinueWithoutBackup => BackupOutcome::Proceeded,
                }
            }
        }
    }

    async fn run_plugin_attempts(
        &self,
        entry: &PluginEntry,
        settings: &CleaningSettings,
        game_type: &str,
        callbacks: &SessionCallbacks,
    ) -> PluginResult {
        let start = Instant::now();
        let game_flag = command_builder::is_universal_xedit(&settings.xedit_exe_path).then_some(game_type);

        let command = match build_cleaning_command(
            &settings.xedit_exe_path,
            &entry.file_name,
            game_flag,
            settings.mo2_exe_path.as_deref(),
            settings.partial_forms_enabled,
        ) {
            Ok(command) => command,
            Err(reason) => {
                return PluginResult {
                    plugin: entry.file_name.clone(),
                    status: PluginStatus::Failed,
                    message: reason,
                    stats: CleaningStatistics::default(),
                    duration: start.elapsed(),
                    attempts: 0,
                    log_parse_warning: None,
                };
            }
        };

        let (main_log, exception_log) = log_reader::log_paths(&settings.xedit_exe_path, game_flag);
        let _ = log_reader::clear_logs(&main_log, &exception_log);

        self.executor.reset_stop();

        let mut attempt = 1;
        loop {
            let process_start = std::time::SystemTime::now();
            let outcome = self
                .executor
                .run(
                    &command.program,
                    &command.args,
                    command.working_dir.as_deref(),
                    settings.cleaning_timeout,
                    entry.resolved_path.as_deref(),
                )
                .await;

            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(err) => {
                    return PluginResult {
                        plugin: entry.file_name.clone(),
                        status: PluginStatus::Failed,
                        message: format!("failed to launch xEdit: {err}"),
                        stats: CleaningStatistics::default(),
                        duration: start.elapsed(),
                        attempts: attempt,
                        log_parse_warning: None,
                    };
                }
            };

            if let Some(termination) = &outcome.termination {
                self.metrics.record_termination(termination.outcome);
            }

            let is_timeout = matches!(outcome.error, Some(crate::error::ProcessError::Timeout(_)));
            if is_timeout && attempt < MAX_RETRY_ATTEMPTS {
                let should_retry = callbacks
                    .on_timeout
                    .as_ref()
                    .map(|cb| cb(&entry.file_name, settings.cleaning_timeout, attempt))
                    .unwrap_or(false);

                if should_retry {
                    attempt += 1;
                    continue;
                }
            }

            return self
                .build_plugin_result(entry, &main_log, &exception_log, process_start, outcome, start.elapsed(), attempt)
                .await;
        }
    }

    async fn build_plugin_result(
        &self,
        entry: &PluginEntry,
        main_log: &camino::Utf8Path,
        exception_log: &camino::Utf8Path,
        process_start: std::time::SystemTime,
        outcome: crate::process_executor::ExecutionOutcome,
        duration: Duration,
        attempts: u32,
    ) -> PluginResult {
        if let Some(err) = &outcome.error {
            return PluginResult {
                plugin: entry.file_name.clone(),
                status: PluginStatus::Failed,
                message: err.to_string(),
                stats: outcome.stats,
                duration,
                attempts,
                log_parse_warning: None,
            };
        }

        let has_missing_requirements = log_reader::check_exception_log(exception_log).unwrap_or(false);
        if has_missing_requirements {
            return PluginResult {
                plugin: entry.file_name.clone(),
                status: PluginStatus::Failed,
                message: "xEdit reported missing masters or no editable records".to_string(),
                stats: outcome.stats,
                duration,
                attempts,
                log_parse_warning: None,
            };
        }

        let (stats, log_parse_warning) = match log_reader::read_stats(main_log, process_start).await {
            Ok(log_stats) => (log_stats, None),
            Err(err) => (outcome.stats, Some(err.to_string())),
        };

        // spec.md §9(a): a non-zero exit with no cleanable records is still
        // a successful run, not a skip or a failure.
        let message = if stats.has_changes() {
            format!(
                "removed {} ITMs, undeleted {} UDRs, {} skipped, {} partial forms",
                stats.removed, stats.undeleted, stats.skipped, stats.partial_forms
            )
        } else {
            "no ITMs or UDRs found".to_string()
        };

        PluginResult {
            plugin: entry.file_name.clone(),
            status: PluginStatus::Cleaned,
            message,
            stats,
            duration,
            attempts,
            log_parse_warning,
        }
    }

    fn finalize(
        &self,
        settings: &CleaningSettings,
        started_at: chrono::DateTime<Utc>,
        results: Vec<PluginResult>,
        was_cancelled: bool,
        backup_manager: Option<BackupManager>,
        backup_session: Option<BackupSession>,
    ) -> SessionResult {
        if let (Some(manager), Some(session)) = (&backup_manager, &backup_session) {
            if let Err(err) = manager.write_metadata(session) {
                tracing::warn!("Failed to write backup session metadata: {err}");
            }
            if let Err(err) = manager.enforce_retention(settings.max_backup_sessions) {
                tracing::warn!("Failed to enforce backup retention: {err}");
            }
        }

        self.metrics.log_summary();
        SessionResult::summarize(started_at, Utc::now(), results, was_cancelled, backup_session)
    }

    /// Feed one plugin's outcome into the running metrics counters.
    fn record_metrics(&self, result: &PluginResult) {
        match result.status {
            PluginStatus::Cleaned => self.metrics.record_plugin_cleaned(),
            PluginStatus::Failed => self.metrics.record_plugin_failed(),
            PluginStatus::Skipped => self.metrics.record_plugin_skipped(),
        }
        self.metrics.record_cleaning_time(result.duration);
        self.metrics.record_item_statistics(&result.stats);
    }
}

#[derive(PartialEq, Eq)]
enum BackupOutcome {
    Proceeded,
    SkipPlugin,
    AbortSession,
}

/// Internal control-flow error distinguishing cancellation (not an error to
/// the caller) from a genuine failure, both of which still carry whatever
/// partial `SessionResult` was built before the break.
enum SessionFailure {
    Cancelled { partial: SessionResult },
    Error { partial: Option<SessionResult>, error: AutoQacError },
}

impl SessionFailure {
    fn fatal(error: AutoQacError) -> Self {
        SessionFailure::Error { partial: None, error }
    }
}

impl From<AutoQacError> for SessionFailure {
    fn from(error: AutoQacError) -> Self {
        SessionFailure::fatal(error)
    }
}

/// Best-effort cleanup of leftover xEdit processes from a previous crashed
/// run, keyed off the configured executable's file stem. Never fatal: a
/// failure here just means a stray process survives, not that this session
/// can't proceed.
async fn clean_orphaned_processes(xedit_exe_path: &camino::Utf8Path) {
    let Some(stem) = xedit_exe_path.file_stem() else { return };

    #[cfg(target_os = "windows")]
    {
        let image_name = format!("{stem}.exe");
        let _ = tokio::process::Command::new("taskkill")
            .args(["/IM", &image_name, "/F"])
            .output()
            .await;
    }

    #[cfg(not(target_os = "windows"))]
    {
        let _ = tokio::process::Command::new("pkill").args(["-f", stem]).output().await;
    }
}

/// Mark entries without a resolved, existing file as missing, when not in
/// MO2 mode (where physical paths are virtualized and unchecked).
fn validate_file_existence(entries: &mut [PluginEntry]) {
    for entry in entries {
        if entry.warning_kind != WarningKind::None {
            continue;
        }
        match &entry.resolved_path {
            Some(path) if path.exists() => {}
            _ => entry.warning_kind = WarningKind::NotFound,
        }
    }
}

/// Maps a variant game type back to the base game whose universal skip list
/// it shares (FO4VR runs on FO4's engine, SkyrimVR on SSE's), so the skip
/// list for a VR session is the base list plus the variant-specific one
/// layered on top, not the variant list alone.
fn base_game_type(game_type: &str) -> &str {
    match game_type {
        "FO4VR" => "FO4",
        "SkyrimVR" => "SSE",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigManager;
    use crate::state::StateManager;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Orchestrator, Utf8PathBuf, Utf8PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();

        let xedit_path = root.join("SSEEdit.exe");
        fs::write(&xedit_path, b"fake exe").unwrap();

        let load_order_path = root.join("loadorder.txt");
        fs::write(&load_order_path, "Skyrim.esm\nA.esp\nB.esp\n").unwrap();

        let config = ConfigManager::new(root.join("config")).unwrap();
        let state = StateManager::new();
        let orchestrator = Orchestrator::new(state, config);

        (dir, orchestrator, xedit_path, load_order_path)
    }

    #[tokio::test]
    async fn test_preconditions_reject_missing_xedit_executable() {
        let (_dir, orchestrator, _xedit_path, load_order_path) = setup();
        let settings = CleaningSettings {
            load_order_path,
            xedit_exe_path: Utf8PathBuf::from("/nonexistent/xEdit.exe"),
            mo2_exe_path: None,
            mo2_mode: false,
            partial_forms_enabled: false,
            disable_skip_lists: true,
            backup_enabled: false,
            max_backup_sessions: 5,
            cleaning_timeout: Duration::from_secs(5),
            game_type: Some("SSE".to_string()),
            data_dir: None,
        };

        let result = orchestrator.start_cleaning(settings, SessionCallbacks::default()).await;
        assert!(matches!(result, Err(AutoQacError::ConfigInvalid(_))));
    }

    #[tokio::test]
    async fn test_preconditions_reject_mo2_mode_without_mo2_path() {
        let (_dir, orchestrator, xedit_path, load_order_path) = setup();
        let settings = CleaningSettings {
            load_order_path,
            xedit_exe_path: xedit_path,
            mo2_exe_path: None,
            mo2_mode: true,
            partial_forms_enabled: false,
            disable_skip_lists: true,
            backup_enabled: false,
            max_backup_sessions: 5,
            cleaning_timeout: Duration::from_secs(5),
            game_type: Some("SSE".to_string()),
            data_dir: None,
        };

        let result = orchestrator.start_cleaning(settings, SessionCallbacks::default()).await;
        assert!(matches!(result, Err(AutoQacError::ConfigInvalid(_))));
    }

    #[test]
    fn test_validate_file_existence_flags_missing_files() {
        let mut entries = vec![PluginEntry {
            file_name: "Ghost.esp".to_string(),
            resolved_path: Some(Utf8PathBuf::from("/nonexistent/Ghost.esp")),
            ..PluginEntry::default()
        }];

        validate_file_existence(&mut entries);
        assert_eq!(entries[0].warning_kind, WarningKind::NotFound);
    }

    #[test]
    fn test_base_game_type_maps_vr_variants_to_base() {
        assert_eq!(base_game_type("FO4VR"), "FO4");
        assert_eq!(base_game_type("SkyrimVR"), "SSE");
        assert_eq!(base_game_type("FO4"), "FO4");
        assert_eq!(base_game_type("SSE"), "SSE");
    }
}
