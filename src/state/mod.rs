// State management module
//
// Provides StateManager, the single writer onto AppState. Readers get a
// cloned snapshot or a read-lock closure; mutations always go through
// `update()`, which computes the new snapshot under the write lock and then
// drops the lock *before* publishing to any broadcast channel.
//
// This ordering matters: a subscriber callback that calls back into
// StateManager (directly, or via a task it spawns) would deadlock against
// an RwLock write guard still held on the sending thread. Four independent
// broadcast streams are exposed instead of one combined enum so a listener
// that only cares about plugin results isn't forced to filter a shared
// event type.

use crate::models::{AppState, CleaningStatistics, PluginEntry, PluginResult};
use camino::Utf8PathBuf;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

/// Coarse-grained state change, published on the `state_changed` stream.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    ConfigurationChanged { is_fully_configured: bool },
    ProgressUpdated { current: usize, total: usize, current_plugin: Option<String> },
    CleaningStarted { total_plugins: usize },
    CleaningFinished { cleaned: usize, failed: usize, skipped: usize },
    OperationChanged { operation: String },
    SettingsChanged,
    StateReset,
}

/// Per-plugin result, published on the `detailed_plugin_result` stream.
#[derive(Clone, Debug, PartialEq)]
pub struct PluginResultEvent {
    pub plugin: String,
    pub status: String,
    pub message: String,
}

/// Published once on the `cleaning_completed` stream when a session ends.
#[derive(Clone, Debug, PartialEq)]
pub struct CleaningCompletedEvent {
    pub cleaned: usize,
    pub failed: usize,
    pub skipped: usize,
    pub was_cancelled: bool,
}

/// Published on the `is_terminating_changed` stream by the two-click
/// stop/force-stop protocol in the orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TerminatingChangedEvent {
    pub is_terminating: bool,
}

/// Thread-safe state manager with four independent broadcast streams.
///
/// Always use `StateManager` instead of touching [`AppState`] directly:
/// - [`snapshot()`](Self::snapshot) / [`read()`](Self::read) for reads
/// - [`update()`](Self::update) for mutations with automatic event emission
/// - `subscribe_*()` for listening to one of the four named streams
#[derive(Clone)]
pub struct StateManager {
    state: Arc<RwLock<AppState>>,
    state_tx: broadcast::Sender<StateChange>,
    plugin_result_tx: broadcast::Sender<PluginResultEvent>,
    cleaning_completed_tx: broadcast::Sender<CleaningCompletedEvent>,
    is_terminating_tx: broadcast::Sender<TerminatingChangedEvent>,
}

impl StateManager {
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(100);
        let (plugin_result_tx, _) = broadcast::channel(256);
        let (cleaning_completed_tx, _) = broadcast::channel(16);
        let (is_terminating_tx, _) = broadcast::channel(16);
        Self {
            state: Arc::new(RwLock::new(AppState::default())),
            state_tx,
            plugin_result_tx,
            cleaning_completed_tx,
            is_terminating_tx,
        }
    }

    /// Get a read-only snapshot of the current state (clones `AppState`).
    pub fn snapshot(&self) -> AppState {
        self.state.read().unwrap().clone()
    }

    /// Execute a function with read access to the state.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&AppState) -> R,
    {
        let state = self.state.read().unwrap();
        f(&state)
    }

    /// Apply `update_fn`, compute which [`StateChange`]s occurred, then
    /// publish them. The write guard is dropped before any `send()` call so
    /// a subscriber reacting synchronously can safely call back into
    /// `StateManager` without deadlocking.
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut AppState),
    {
        let changes = {
            let mut state = self.state.write().unwrap();
            let old_state = state.clone();
            update_fn(&mut state);
            self.detect_changes(&old_state, &state)
        };

        for change in &changes {
            let _ = self.state_tx.send(change.clone());
        }

        changes
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    pub fn subscribe_plugin_results(&self) -> broadcast::Receiver<PluginResultEvent> {
        self.plugin_result_tx.subscribe()
    }

    pub fn subscribe_cleaning_completed(&self) -> broadcast::Receiver<CleaningCompletedEvent> {
        self.cleaning_completed_tx.subscribe()
    }

    pub fn subscribe_is_terminating(&self) -> broadcast::Receiver<TerminatingChangedEvent> {
        self.is_terminating_tx.subscribe()
    }

    fn detect_changes(&self, old: &AppState, new: &AppState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if old.is_load_order_configured != new.is_load_order_configured
            || old.is_mo2_configured != new.is_mo2_configured
            || old.is_xedit_configured != new.is_xedit_configured
        {
            changes.push(StateChange::ConfigurationChanged {
                is_fully_configured: new.is_fully_configured(),
            });
        }

        if old.is_cleaning != new.is_cleaning {
            if new.is_cleaning {
                changes.push(StateChange::CleaningStarted { total_plugins: new.total_plugins });
            } else {
                changes.push(StateChange::CleaningFinished {
                    cleaned: new.cleaned_plugins.len(),
                    failed: new.failed_plugins.len(),
                    skipped: new.skipped_plugins.len(),
                });
            }
        }

        if old.progress != new.progress
            || old.total_plugins != new.total_plugins
            || old.current_plugin != new.current_plugin
        {
            changes.push(StateChange::ProgressUpdated {
                current: new.progress,
                total: new.total_plugins,
                current_plugin: new.current_plugin.clone(),
            });
        }

        if old.current_operation != new.current_operation {
            changes.push(StateChange::OperationChanged { operation: new.current_operation.clone() });
        }

        if old.journal_expiration != new.journal_expiration
            || old.cleaning_timeout != new.cleaning_timeout
            || old.cpu_threshold != new.cpu_threshold
            || old.mo2_mode != new.mo2_mode
            || old.partial_forms_enabled != new.partial_forms_enabled
        {
            changes.push(StateChange::SettingsChanged);
        }

        changes
    }

    // Convenience mutators

    pub fn set_load_order_path(&self, path: Option<Utf8PathBuf>) -> Vec<StateChange> {
        self.update(|state| {
            state.load_order_path = path.clone();
            state.is_load_order_configured = path.is_some();
        })
    }

    pub fn set_xedit_exe_path(&self, path: Option<Utf8PathBuf>) -> Vec<StateChange> {
        self.update(|state| {
            state.xedit_exe_path = path.clone();
            state.is_xedit_configured = path.is_some();
        })
    }

    pub fn set_mo2_exe_path(&self, path: Option<Utf8PathBuf>) -> Vec<StateChange> {
        self.update(|state| {
            state.mo2_exe_path = path.clone();
            state.is_mo2_configured = path.is_some();
        })
    }

    pub fn start_cleaning(&self, plugins: Vec<PluginEntry>) -> Vec<StateChange> {
        self.update(|state| {
            state.is_cleaning = true;
            state.progress = 0;
            state.total_plugins = plugins.len();
            state.plugin_entries = plugins;
            state.current_plugin = None;
            state.current_operation = "Starting cleaning...".to_string();
            state.cleaned_plugins.clear();
            state.failed_plugins.clear();
            state.skipped_plugins.clear();
        })
    }

    pub fn stop_cleaning(&self) -> Vec<StateChange> {
        self.update(|state| {
            state.is_cleaning = false;
            state.current_plugin = None;
            state.current_operation.clear();
        })
    }

    pub fn update_progress(&self, plugin: String, operation: String) -> Vec<StateChange> {
        self.update(|state| {
            state.current_plugin = Some(plugin);
            state.current_operation = operation;
        })
    }

    /// Record a plugin's result, updating aggregate statistics and
    /// publishing on the `detailed_plugin_result` stream.
    pub fn add_plugin_result(
        &self,
        plugin: String,
        status: &str,
        message: String,
        stats: Option<CleaningStatistics>,
    ) -> Vec<StateChange> {
        let changes = self.update(|state| {
            state.add_result(plugin.clone(), status);

            if let Some(stats) = stats {
                state.current_undeleted = stats.undeleted;
                state.current_removed = stats.removed;
                state.current_skipped = stats.skipped;
                state.current_partial_forms = stats.partial_forms;
                state.current_total_processed = stats.total();
                state.aggregate_current_stats();
            }
        });

        let _ = self.plugin_result_tx.send(PluginResultEvent {
            plugin,
            status: status.to_string(),
            message,
        });

        changes
    }

    /// Record the typed [`PluginResult`] the orchestrator produces, as a
    /// thin wrapper over [`add_plugin_result`](Self::add_plugin_result).
    pub fn record_plugin_result(&self, result: &PluginResult) -> Vec<StateChange> {
        let status = match result.status {
            crate::models::PluginStatus::Cleaned => "cleaned",
            crate::models::PluginStatus::Failed => "failed",
            crate::models::PluginStatus::Skipped => "skipped",
        };
        self.add_plugin_result(
            result.plugin.clone(),
            status,
            result.message.clone(),
            Some(result.stats),
        )
    }

    pub fn reset_cleaning_state(&self) -> Vec<StateChange> {
        let mut changes = self.update(|state| {
            state.reset_cleaning_state();
        });
        changes.push(StateChange::StateReset);
        let _ = self.state_tx.send(StateChange::StateReset);
        changes
    }

    /// Publish completion on the dedicated `cleaning_completed` stream and
    /// reset cleaning state. Call once per session, after all plugins (or a
    /// cancellation) have been processed.
    pub fn finish_session(&self, was_cancelled: bool) {
        let (cleaned, failed, skipped) = self.read(|s| {
            (s.cleaned_plugins.len(), s.failed_plugins.len(), s.skipped_plugins.len())
        });
        self.stop_cleaning();
        let _ = self.cleaning_completed_tx.send(CleaningCompletedEvent {
            cleaned,
            failed,
            skipped,
            was_cancelled,
        });
    }

    /// Publish an `is_terminating_changed` event for the two-click
    /// stop/force-stop protocol.
    pub fn set_terminating(&self, is_terminating: bool) {
        let _ = self.is_terminating_tx.send(TerminatingChangedEvent { is_terminating });
    }

    pub fn update_settings<F>(&self, settings_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut AppState),
    {
        self.update(settings_fn)
    }

    /// Load configuration from `UserConfig` into state (paths, timeouts,
    /// user preferences).
    pub fn load_from_user_config(&self, user_config: &crate::models::UserConfig) -> Vec<StateChange> {
        use std::time::Duration;

        self.update(|state| {
            let settings = &user_config.pact_settings;

            if !settings.loadorder_txt.is_empty() {
                state.load_order_path = Some(Utf8PathBuf::from(&settings.loadorder_txt));
                state.is_load_order_configured = true;
            }

            if !settings.xedit_exe.is_empty() {
                state.xedit_exe_path = Some(Utf8PathBuf::from(&settings.xedit_exe));
                state.is_xedit_configured = true;
            }

            if !settings.mo2_exe.is_empty() {
                state.mo2_exe_path = Some(Utf8PathBuf::from(&settings.mo2_exe));
                state.is_mo2_configured = true;
            }

            state.partial_forms_enabled = settings.partial_forms;
            state.cleaning_timeout = Duration::from_secs(settings.cleaning_timeout as u64);
            state.journal_expiration = settings.journal_expiration;
            state.mo2_mode = settings.mo2_mode;
            state.disable_skip_lists = settings.disable_skip_lists;
            state.backup_enabled = settings.backup_enabled;
            state.max_backup_sessions = settings.max_backup_sessions;
            state.cpu_threshold = settings.cpu_threshold;
            if !settings.selected_game.is_empty() {
                state.game_type = Some(settings.selected_game.clone());
            }

            tracing::info!(
                "Loaded user config: load_order={}, xedit={}, mo2={}, partial_forms={}, timeout={}s",
                state.is_load_order_configured,
                state.is_xedit_configured,
                state.is_mo2_configured,
                state.partial_forms_enabled,
                settings.cleaning_timeout
            );
        })
    }

    /// Get an `Arc` reference to the state for advanced callers that need to
    /// hold a lock across several operations. Prefer `read`/`update`.
    pub fn state_arc(&self) -> Arc<RwLock<AppState>> {
        Arc::clone(&self.state)
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}
