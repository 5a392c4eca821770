// Configuration persistence
//
// Two YAML documents on disk (main config: defaults + skip lists; user
// config: paths/settings) plus a legacy ignore list. Every write goes
// through the atomic write protocol: serialize to a sibling `.tmp` file,
// `File::sync_all`, then `fs::rename` over the target. A plain `fs::write`
// can leave a half-written file behind if the process is killed mid-write;
// the rename is what makes the replacement atomic on both Windows and Unix.
//
// Mutations are classified by `Criticality`: `Immediate` writes (paths,
// skip lists, game selection) flush synchronously before the call returns.
// `Deferred` writes (timeouts, cosmetic toggles) mark the config dirty and
// schedule a flush after a short debounce window, coalescing further edits
// that land inside it, so a user dragging a slider doesn't fsync on every
// tick.

use crate::error::ConfigError;
use crate::models::{IgnoreConfig, MainConfig, UserConfig};
use anyhow::{bail, Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{self, File};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Published on [`ConfigManager::subscribe`] whenever a typed mutator
/// changes the in-memory config cache, mirroring the state hub's
/// broadcast-on-mutation pattern so a UI can react without polling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigChange {
    SkipListUpdated { game: String },
    SelectedGameChanged { game: String },
}

/// How urgently a configuration mutation must reach disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Criticality {
    /// Flush synchronously before the call returns.
    Immediate,
    /// Mark dirty and flush after the debounce window, coalescing
    /// further deferred writes that land inside it.
    Deferred,
}

const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// Best-effort "line:column" description of where a YAML document failed to
/// parse, for [`ConfigError::Corrupt`].
fn yaml_error_position(err: &serde_yaml_ng::Error) -> String {
    match err.location() {
        Some(location) => format!("line {}, column {}", location.line(), location.column()),
        None => err.to_string(),
    }
}

/// Configuration manager for loading and saving YAML configuration files.
///
/// Manages two primary configuration files:
/// - Main config (`AutoQAC Main.yaml`): Game configurations, skip lists
/// - User config (`AutoQAC Config.yaml` or `PACT Settings.yaml`): User settings, paths
#[derive(Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    main_config_path: Utf8PathBuf,
    user_config_path: Utf8PathBuf,
    ignore_config_path: Utf8PathBuf,
    pending_user_config: Arc<Mutex<Option<UserConfig>>>,
    debounce_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
    /// In-memory main config cache, populated lazily on first access and
    /// kept in sync by every mutator so repeated reads don't re-parse YAML.
    main_config_cache: Arc<Mutex<Option<MainConfig>>>,
    config_tx: broadcast::Sender<ConfigChange>,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config directory: {}", config_dir))?;

        let (config_tx, _) = broadcast::channel(32);

        Ok(Self {
            main_config_path: config_dir.join("AutoQAC Main.yaml"),
            user_config_path: config_dir.join("AutoQAC Config.yaml"),
            ignore_config_path: config_dir.join("PACT Ignore.yaml"),
            config_dir,
            pending_user_config: Arc::new(Mutex::new(None)),
            debounce_handle: Arc::new(Mutex::new(None)),
            main_config_cache: Arc::new(Mutex::new(None)),
            config_tx,
        })
    }

    /// Subscribe to generic change notifications emitted by the typed
    /// mutators (`update_skip_list`, `set_selected_game`).
    pub fn subscribe(&self) -> broadcast::Receiver<ConfigChange> {
        self.config_tx.subscribe()
    }

    /// Load the main config into the cache if it isn't already there, and
    /// return a clone of the cached value.
    fn cached_main_config(&self) -> Result<MainConfig, ConfigError> {
        let mut cache = self.main_config_cache.lock().unwrap();
        if cache.is_none() {
            *cache = Some(self.load_main_config()?);
        }
        Ok(cache.as_ref().unwrap().clone())
    }

    /// Serialize to a sibling `.tmp` file, fsync it, then atomically rename
    /// it over `path`. Never truncates `path` in place.
    fn write_atomic(path: &Utf8Path, contents: &str) -> Result<()> {
        let tmp_path = path.with_extension("tmp");

        {
            let mut file = File::create(&tmp_path)
                .with_context(|| format!("Failed to create temp file: {}", tmp_path))?;
            std::io::Write::write_all(&mut file, contents.as_bytes())
                .with_context(|| format!("Failed to write temp file: {}", tmp_path))?;
            file.sync_all()
                .with_context(|| format!("Failed to fsync temp file: {}", tmp_path))?;
        }

        fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to replace {} with {}", path, tmp_path))?;

        Ok(())
    }

    pub fn load_main_config(&self) -> Result<MainConfig, ConfigError> {
        if !self.main_config_path.exists() {
            tracing::warn!(
                "Main config file not found at {}, using defaults",
                self.main_config_path
            );
            return self.create_default_main_config().map_err(|err| ConfigError::Invalid {
                path: self.main_config_path.clone(),
                reason: err.to_string(),
            });
        }

        let file_contents =
            fs::read_to_string(&self.main_config_path).map_err(|source| ConfigError::Io {
                path: self.main_config_path.clone(),
                source,
            })?;

        let config: MainConfig =
            serde_yaml_ng::from_str(&file_contents).map_err(|err| ConfigError::Corrupt {
                path: self.main_config_path.clone(),
                position: yaml_error_position(&err),
            })?;

        tracing::info!("Loaded main config from {}", self.main_config_path);
        Ok(config)
    }

    /// Always an immediate write: the main config (skip lists, game
    /// mappings) is edited rarely and its correctness gates cleaning
    /// sessions, so it is never worth deferring.
    pub fn save_main_config(&self, config: &MainConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize main config to YAML")?;

        Self::write_atomic(&self.main_config_path, &yaml_string)?;
        *self.main_config_cache.lock().unwrap() = Some(config.clone());

        tracing::info!("Saved main config to {}", self.main_config_path);
        Ok(())
    }

    /// Combined, ordered skip list for `game`, plus `variant`'s own list
    /// layered on top when one is given (e.g. FO4's universal list plus
    /// FO4VR's variant-specific entries).
    pub fn get_skip_list(&self, game: &str, variant: Option<&str>) -> Result<Vec<String>, ConfigError> {
        let config = self.cached_main_config()?;
        let mut combined = config.get_skip_list(game).cloned().unwrap_or_default();
        if let Some(variant) = variant {
            if let Some(extra) = config.get_skip_list(variant) {
                combined.extend(extra.iter().cloned());
            }
        }
        Ok(combined)
    }

    /// Replace `game`'s skip list, flush the main config synchronously
    /// (skip-list edits are always `Immediate`, never debounced), and
    /// notify subscribers.
    pub fn update_skip_list(&self, game: &str, new_list: Vec<String>) -> Result<()> {
        if game.trim().is_empty() {
            bail!("skip list update rejected: game identifier is empty");
        }

        let mut config = self.cached_main_config()?;
        config.pact_data.skip_lists.insert(game.to_string(), new_list);
        self.save_main_config(&config)?;

        let _ = self.config_tx.send(ConfigChange::SkipListUpdated { game: game.to_string() });
        Ok(())
    }

    /// Set the selected game in the user config, flush synchronously (game
    /// selection is `Immediate`), and notify subscribers.
    pub fn set_selected_game(&self, game: &str) -> Result<()> {
        if game.trim().is_empty() {
            bail!("selected game update rejected: game identifier is empty");
        }

        let mut config = self.load_user_config()?;
        config.pact_settings.selected_game = game.to_string();
        self.write_user_config_now(&config)?;

        let _ = self.config_tx.send(ConfigChange::SelectedGameChanged { game: game.to_string() });
        Ok(())
    }

    pub fn load_user_config(&self) -> Result<UserConfig, ConfigError> {
        let legacy_path = self.config_dir.join("PACT Settings.yaml");

        let config_path = if self.user_config_path.exists() {
            &self.user_config_path
        } else if legacy_path.exists() {
            tracing::info!("Using legacy config file: {}", legacy_path);
            &legacy_path
        } else {
            tracing::warn!(
                "User config file not found at {} or {}, using defaults",
                self.user_config_path,
                legacy_path
            );
            return Ok(UserConfig::default());
        };

        let file_contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Io {
            path: config_path.clone(),
            source,
        })?;

        let config: UserConfig =
            serde_yaml_ng::from_str(&file_contents).map_err(|err| ConfigError::Corrupt {
                path: config_path.clone(),
                position: yaml_error_position(&err),
            })?;

        tracing::info!("Loaded user config from {}", config_path);
        Ok(config)
    }

    /// Save the user config with the given [`Criticality`].
    ///
    /// `Immediate` flushes synchronously. `Deferred` records the pending
    /// config and (re)schedules a debounce task; repeated deferred saves
    /// inside the debounce window replace the pending value without
    /// touching disk until the window elapses.
    pub fn save_user_config(&self, config: &UserConfig, criticality: Criticality) -> Result<()> {
        match criticality {
            Criticality::Immediate => self.write_user_config_now(config),
            Criticality::Deferred => {
                *self.pending_user_config.lock().unwrap() = Some(config.clone());
                self.schedule_debounced_flush();
                Ok(())
            }
        }
    }

    fn write_user_config_now(&self, config: &UserConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize user config to YAML")?;

        Self::write_atomic(&self.user_config_path, &yaml_string)?;

        tracing::info!("Saved user config to {}", self.user_config_path);
        Ok(())
    }

    fn schedule_debounced_flush(&self) {
        let mut handle_guard = self.debounce_handle.lock().unwrap();
        if let Some(handle) = handle_guard.take() {
            handle.abort();
        }

        let this = self.clone();
        *handle_guard = Some(tokio::spawn(async move {
            tokio::time::sleep(DEBOUNCE_WINDOW).await;
            if let Err(err) = this.flush_pending_saves() {
                tracing::warn!("Debounced config flush failed: {}", err);
            }
        }));
    }

    /// Force any pending deferred write to disk immediately. Called before
    /// every cleaning session starts and on orderly shutdown, so a crash
    /// between a deferred edit and its debounce window never loses data at
    /// the moments that matter most.
    pub fn flush_pending_saves(&self) -> Result<()> {
        if let Some(handle) = self.debounce_handle.lock().unwrap().take() {
            handle.abort();
        }

        let pending = self.pending_user_config.lock().unwrap().take();
        if let Some(config) = pending {
            self.write_user_config_now(&config)?;
        }
        Ok(())
    }

    pub fn load_ignore_config(&self) -> Result<IgnoreConfig> {
        if !self.ignore_config_path.exists() {
            tracing::warn!(
                "Ignore config file not found at {}, using defaults",
                self.ignore_config_path
            );
            return Ok(IgnoreConfig::default());
        }

        let file_contents = fs::read_to_string(&self.ignore_config_path).with_context(|| {
            format!("Failed to read ignore config: {}", self.ignore_config_path)
        })?;

        let config: IgnoreConfig = serde_yaml_ng::from_str(&file_contents).with_context(|| {
            format!("Failed to parse ignore config: {}", self.ignore_config_path)
        })?;

        tracing::info!("Loaded ignore config from {}", self.ignore_config_path);
        Ok(config)
    }

    pub fn save_ignore_config(&self, config: &IgnoreConfig) -> Result<()> {
        let yaml_string = serde_yaml_ng::to_string(config)
            .context("Failed to serialize ignore config to YAML")?;

        Self::write_atomic(&self.ignore_config_path, &yaml_string)?;

        tracing::info!("Saved ignore config to {}", self.ignore_config_path);
        Ok(())
    }

    /// Create a default main configuration with the full skip lists and
    /// xEdit executable mappings shipped with the application.
    fn create_default_main_config(&self) -> Result<MainConfig> {
        use crate::models::PactData;
        use indexmap::IndexMap;

        let mut xedit_lists = IndexMap::new();
        xedit_lists.insert(
            "FO3".to_string(),
            vec!["FO3Edit.exe".to_string(), "FO3Edit64.exe".to_string()],
        );
        xedit_lists.insert(
            "FNV".to_string(),
            vec!["FNVEdit.exe".to_string(), "FNVEdit64.exe".to_string()],
        );
        xedit_lists.insert(
            "FO4".to_string(),
            vec!["FO4Edit.exe".to_string(), "FO4Edit64.exe".to_string()],
        );
        xedit_lists.insert(
            "SSE".to_string(),
            vec!["SSEEdit.exe".to_string(), "SSEEdit64.exe".to_string()],
        );
        xedit_lists.insert(
            "FO4VR".to_string(),
            vec!["FO4VREdit.exe".to_string(), "FO4VREdit64.exe".to_string()],
        );
        xedit_lists.insert("SkyrimVR".to_string(), vec!["TES5VREdit.exe".to_string()]);
        xedit_lists.insert("TES4".to_string(), vec!["TES4Edit.exe".to_string(), "TES4Edit64.exe".to_string()]);
        xedit_lists.insert(
            "Universal".to_string(),
            vec![
                "xEdit.exe".to_string(),
                "xEdit64.exe".to_string(),
                "xfoedit.exe".to_string(),
                "xfoedit64.exe".to_string(),
            ],
        );

        let mut skip_lists = IndexMap::new();

        skip_lists.insert(
            "FO3".to_string(),
            vec![
                "".to_string(),
                "Fallout3.esm".to_string(),
                "Anchorage.esm".to_string(),
                "ThePitt.esm".to_string(),
                "BrokenSteel.esm".to_string(),
                "PointLookout.esm".to_string(),
                "Zeta.esm".to_string(),
                "Unofficial Fallout 3 Patch.esm".to_string(),
            ],
        );

        skip_lists.insert(
            "FNV".to_string(),
            vec![
                "".to_string(),
                "FalloutNV.esm".to_string(),
                "DeadMoney.esm".to_string(),
                "OldWorldBlues.esm".to_string(),
                "HonestHearts.esm".to_string(),
                "LonesomeRoad.esm".to_string(),
                "TribalPack.esm".to_string(),
                "MercenaryPack.esm".to_string(),
                "ClassicPack.esm".to_string(),
                "CaravanPack.esm".to_string(),
                "GunRunnersArsenal.esm".to_string(),
                "Unofficial Patch NVSE Plus.esp".to_string(),
                "TaleOfTwoWastelands.esm".to_string(),
                "TTWInteriors_Core.esm".to_string(),
                "TTWInteriorsProject_Combo.esm".to_string(),
                "TTWInteriorsProject_ComboHotfix.esm".to_string(),
                "TTWInteriorsProject_Merged.esm".to_string(),
                "TTWInteriors_Core_Hotfix.esm".to_string(),
            ],
        );

        skip_lists.insert(
            "FO4".to_string(),
            vec![
                "".to_string(),
                "Fallout4.esm".to_string(),
                "DLCCoast.esm".to_string(),
                "DLCNukaWorld.esm".to_string(),
                "DLCRobot.esm".to_string(),
                "DLCworkshop01.esm".to_string(),
                "DLCworkshop02.esm".to_string(),
                "DLCworkshop03.esm".to_string(),
                "Unofficial Fallout 4 Patch.esp".to_string(),
                "PPF.esm".to_string(),
                "PRP.esp".to_string(),
                "PRP-Compat".to_string(),
                "SS2.esm".to_string(),
                "SS2_XPAC_Chapter2.esm".to_string(),
                "SS2_XPAC_Chapter3.esm".to_string(),
                "SS2Extended.esp".to_string(),
            ],
        );

        skip_lists.insert(
            "SSE".to_string(),
            vec![
                "".to_string(),
                "Skyrim.esm".to_string(),
                "Update.esm".to_string(),
                "HearthFires.esm".to_string(),
                "Dragonborn.esm".to_string(),
                "Dawnguard.esm".to_string(),
                "Unofficial Skyrim Special Edition Patch.esp".to_string(),
                "_ResourcePack.esl".to_string(),
            ],
        );

        let pact_data = PactData {
            version: "3.0.0".to_string(),
            version_date: "25.01.14".to_string(),
            default_settings: String::new(),
            default_ignorefile: String::new(),
            xedit_lists,
            skip_lists,
            errors: IndexMap::new(),
            warnings: IndexMap::new(),
        };

        Ok(MainConfig { pact_data })
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }
}
