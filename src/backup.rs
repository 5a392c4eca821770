//! Pre-clean backups of target plugins, one timestamped session directory
//! per cleaning run, with retention and restore.
//!
//! New module; the teacher had no backup story at all — xEdit rewrote
//! plugins in place with nothing to undo a bad clean. Session directories
//! live under `<game_data_dir>/AutoQAC Data/backups/<YYYYMMDD_HHMMSSZ>/`,
//! one copy per to-be-cleaned plugin plus a `session.json` manifest written
//! once at session end (or as a partial manifest if the session is
//! cancelled mid-loop). Retention keeps the newest `max_sessions`
//! directories and deletes the rest; directory names that fail to parse as
//! timestamps sort after every valid one, so a hand-placed or foreign
//! directory under the backups root is retention's first casualty rather
//! than its last.

use crate::error::BackupError;
use crate::models::{BackedUpPlugin, BackupSession};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fs;

const SESSION_DIR_FORMAT: &str = "%Y%m%d_%H%M%SZ";
const SESSION_METADATA_FILE: &str = "session.json";

/// Manages the `<game_data_dir>/AutoQAC Data/backups` tree for one game.
pub struct BackupManager {
    root: Utf8PathBuf,
}

impl BackupManager {
    pub fn new(game_data_dir: &Utf8Path) -> Self {
        Self { root: game_data_dir.join("AutoQAC Data").join("backups") }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Create a new, empty, timestamped session directory and return the
    /// in-progress [`BackupSession`] builder. Call [`Self::copy_plugin`] for
    /// each plugin, then [`Self::write_metadata`] once at session end.
    pub fn create_session(&self, game: &str, created_at: DateTime<Utc>) -> Result<BackupSession, BackupError> {
        let dir_name = created_at.format(SESSION_DIR_FORMAT).to_string();
        let directory = self.root.join(&dir_name);

        fs::create_dir_all(&directory)
            .map_err(|source| BackupError::CreateSessionDir { path: directory.clone(), source })?;

        Ok(BackupSession { directory, created_at, game: game.to_string(), plugins: Vec::new() })
    }

    /// Copy `plugin_path` into `session`'s directory and record its size.
    /// Appends a [`BackedUpPlugin`] entry to `session.plugins` on success.
    pub fn copy_plugin(&self, session: &mut BackupSession, plugin_path: &Utf8Path) -> Result<(), BackupError> {
        let file_name = plugin_path.file_name().unwrap_or("plugin");
        let backup_path = session.directory.join(file_name);

        fs::copy(plugin_path, &backup_path)
            .map_err(|source| BackupError::CopyFailed { plugin: file_name.to_string(), source })?;

        let size_bytes = fs::metadata(&backup_path)
            .map_err(|source| BackupError::CopyFailed { plugin: file_name.to_string(), source })?
            .len();

        session.plugins.push(BackedUpPlugin {
            original_path: plugin_path.to_path_buf(),
            backup_path,
            size_bytes,
        });
        Ok(())
    }

    /// Write (or overwrite) `session.json` in `session.directory`. Called at
    /// normal session end with the full plugin list, or earlier with a
    /// partial list if the session is cancelled or aborted mid-loop.
    pub fn write_metadata(&self, session: &BackupSession) -> Result<(), BackupError> {
        let path = session.directory.join(SESSION_METADATA_FILE);
        let json = serde_json::to_string_pretty(session)?;

        fs::write(&path, json).map_err(|source| BackupError::MetadataWrite { path, source })?;
        Ok(())
    }

    /// List every session directory under the backups root, newest first.
    /// Directories whose name fails to parse as a `SESSION_DIR_FORMAT`
    /// timestamp sort after every parseable one.
    fn list_sessions_newest_first(&self) -> Vec<(Option<NaiveDateTime>, Utf8PathBuf)> {
        let mut sessions = Vec::new();
        let Ok(read_dir) = fs::read_dir(&self.root) else {
            return sessions;
        };

        for entry in read_dir.flatten() {
            let Ok(path) = Utf8PathBuf::try_from(entry.path()) else { continue };
            if !path.is_dir() {
                continue;
            }
            let name = path.file_name().unwrap_or_default();
            let parsed = NaiveDateTime::parse_from_str(name, SESSION_DIR_FORMAT).ok();
            sessions.push((parsed, path));
        }

        sessions.sort_by(|a, b| match (a.0, b.0) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => b.1.cmp(&a.1),
        });

        sessions
    }

    /// Keep the `max_sessions` newest directories (including the one just
    /// completed); delete everything older, recursively. Never touches
    /// anything outside the backups root.
    pub fn enforce_retention(&self, max_sessions: usize) -> Result<Vec<Utf8PathBuf>, BackupError> {
        let sessions = self.list_sessions_newest_first();
        let mut removed = Vec::new();

        for (_, path) in sessions.into_iter().skip(max_sessions) {
            fs::remove_dir_all(&path)
                .map_err(|source| BackupError::CreateSessionDir { path: path.clone(), source })?;
            removed.push(path);
        }

        Ok(removed)
    }

    /// Restore every plugin in `session` to its original path, overwriting.
    /// Failures for individual plugins are collected rather than aborting
    /// the whole restore; the caller decides whether partial success is
    /// acceptable.
    pub fn restore_session(&self, session: &BackupSession) -> RestoreReport {
        let mut restored = Vec::new();
        let mut failed = Vec::new();

        for plugin in &session.plugins {
            match fs::copy(&plugin.backup_path, &plugin.original_path) {
                Ok(_) => restored.push(plugin.original_path.clone()),
                Err(source) => failed.push((
                    plugin.original_path.clone(),
                    BackupError::CopyFailed {
                        plugin: plugin.original_path.file_name().unwrap_or_default().to_string(),
                        source,
                    },
                )),
            }
        }

        RestoreReport { restored, failed }
    }

    /// Load a session's metadata back from its `session.json`, for restore
    /// callers that only have a directory path.
    pub fn load_session(directory: &Utf8Path) -> Result<BackupSession, BackupError> {
        let path = directory.join(SESSION_METADATA_FILE);
        if !path.exists() {
            return Err(BackupError::SessionNotFound(directory.to_string()));
        }
        let content = fs::read_to_string(&path)
            .map_err(|source| BackupError::MetadataWrite { path: path.clone(), source })?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Outcome of [`BackupManager::restore_session`]: which plugins were
/// restored, and which failed with why.
#[derive(Debug, Default)]
pub struct RestoreReport {
    pub restored: Vec<Utf8PathBuf>,
    pub failed: Vec<(Utf8PathBuf, BackupError)>,
}

impl RestoreReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn ts(year: i32, month: u32, day: u32, h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, h, m, s).unwrap()
    }

    #[test]
    fn test_create_session_makes_timestamped_directory() {
        let root = TempDir::new().unwrap();
        let data_dir = Utf8PathBuf::try_from(root.path().to_path_buf()).unwrap();
        let manager = BackupManager::new(&data_dir);

        let session = manager.create_session("SSE", ts(2026, 7, 28, 12, 30, 0)).unwrap();

        assert!(session.directory.exists());
        assert!(session.directory.as_str().ends_with("20260728_123000Z"));
    }

    #[test]
    fn test_copy_plugin_records_size_and_path() {
        let root = TempDir::new().unwrap();
        let data_dir = Utf8PathBuf::try_from(root.path().to_path_buf()).unwrap();
        let manager = BackupManager::new(&data_dir);
        let mut session = manager.create_session("SSE", ts(2026, 1, 1, 0, 0, 0)).unwrap();

        let plugin_dir = TempDir::new().unwrap();
        let plugin_path = Utf8PathBuf::try_from(plugin_dir.path().to_path_buf()).unwrap().join("Test.esp");
        fs::write(&plugin_path, b"plugin bytes").unwrap();

        manager.copy_plugin(&mut session, &plugin_path).unwrap();

        assert_eq!(session.plugins.len(), 1);
        assert_eq!(session.plugins[0].size_bytes, 12);
        assert!(session.plugins[0].backup_path.exists());
    }

    #[test]
    fn test_write_and_load_metadata_round_trips() {
        let root = TempDir::new().unwrap();
        let data_dir = Utf8PathBuf::try_from(root.path().to_path_buf()).unwrap();
        let manager = BackupManager::new(&data_dir);
        let mut session = manager.create_session("FO4", ts(2026, 2, 2, 0, 0, 0)).unwrap();

        let plugin_dir = TempDir::new().unwrap();
        let plugin_path = Utf8PathBuf::try_from(plugin_dir.path().to_path_buf()).unwrap().join("A.esp");
        fs::write(&plugin_path, b"abc").unwrap();
        manager.copy_plugin(&mut session, &plugin_path).unwrap();

        manager.write_metadata(&session).unwrap();

        let loaded = BackupManager::load_session(&session.directory).unwrap();
        assert_eq!(loaded.game, "FO4");
        assert_eq!(loaded.plugins.len(), 1);
    }

    #[test]
    fn test_retention_keeps_newest_n_sessions() {
        let root = TempDir::new().unwrap();
        let data_dir = Utf8PathBuf::try_from(root.path().to_path_buf()).unwrap();
        let manager = BackupManager::new(&data_dir);

        for day in 1..=8 {
            manager.create_session("SSE", ts(2026, 1, day, 0, 0, 0)).unwrap();
        }

        let removed = manager.enforce_retention(5).unwrap();
        assert_eq!(removed.len(), 3);

        let remaining = manager.list_sessions_newest_first();
        assert_eq!(remaining.len(), 5);
        // Newest five days (4..=8) survive; oldest three (1..=3) are gone.
        assert!(remaining[0].1.as_str().ends_with("20260108_000000Z"));
        assert!(remaining[4].1.as_str().ends_with("20260104_000000Z"));
    }

    #[test]
    fn test_retention_sorts_unparseable_names_last() {
        let root = TempDir::new().unwrap();
        let data_dir = Utf8PathBuf::try_from(root.path().to_path_buf()).unwrap();
        let manager = BackupManager::new(&data_dir);

        manager.create_session("SSE", ts(2026, 1, 1, 0, 0, 0)).unwrap();
        fs::create_dir_all(manager.root().join("not-a-timestamp")).unwrap();

        let removed = manager.enforce_retention(1).unwrap();
        assert_eq!(removed.len(), 1);
        assert!(removed[0].as_str().ends_with("not-a-timestamp"));
    }

    #[test]
    fn test_restore_session_copies_files_back() {
        let root = TempDir::new().unwrap();
        let data_dir = Utf8PathBuf::try_from(root.path().to_path_buf()).unwrap();
        let manager = BackupManager::new(&data_dir);
        let mut session = manager.create_session("SSE", ts(2026, 1, 1, 0, 0, 0)).unwrap();

        let plugin_dir = TempDir::new().unwrap();
        let original_path =
            Utf8PathBuf::try_from(plugin_dir.path().to_path_buf()).unwrap().join("Mod.esp");
        fs::write(&original_path, b"original").unwrap();
        manager.copy_plugin(&mut session, &original_path).unwrap();

        // Simulate xEdit having rewritten the plugin.
        fs::write(&original_path, b"cleaned-but-wrong").unwrap();

        let report = manager.restore_session(&session);
        assert!(report.all_succeeded());
        assert_eq!(fs::read(&original_path).unwrap(), b"original");
    }

    #[test]
    fn test_restore_session_reports_partial_failure() {
        let root = TempDir::new().unwrap();
        let data_dir = Utf8PathBuf::try_from(root.path().to_path_buf()).unwrap();
        let manager = BackupManager::new(&data_dir);
        let mut session = manager.create_session("SSE", ts(2026, 1, 1, 0, 0, 0)).unwrap();

        session.plugins.push(BackedUpPlugin {
            original_path: Utf8PathBuf::from("/nonexistent/original.esp"),
            backup_path: Utf8PathBuf::from("/nonexistent/backup.esp"),
            size_bytes: 0,
        });

        let report = manager.restore_session(&session);
        assert!(!report.all_succeeded());
        assert_eq!(report.failed.len(), 1);
    }
}
