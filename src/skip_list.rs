//! Case-insensitive skip-list filtering, grounded in the teacher's
//! `MainConfig::should_skip_plugin` but lifted into its own module and
//! extended to combine a game-universal list with a game-variant list
//! (e.g. FO4 base game plus FO4VR-specific entries).

use crate::models::{MainConfig, PluginEntry};
use std::collections::HashSet;

/// Case-insensitive membership set built from one or more skip lists.
pub struct SkipList {
    entries: HashSet<String>,
}

impl SkipList {
    /// Build from the game-universal list plus an optional variant-specific
    /// list (both from [`MainConfig::skip_lists`][crate::models::MainConfig]).
    pub fn from_config(config: &MainConfig, game_type: &str, variant: Option<&str>) -> Self {
        let mut entries = HashSet::new();

        if let Some(list) = config.get_skip_list(game_type) {
            entries.extend(list.iter().map(|s| s.to_lowercase()));
        }
        if let Some(variant) = variant {
            if let Some(list) = config.get_skip_list(variant) {
                entries.extend(list.iter().map(|s| s.to_lowercase()));
            }
        }

        Self { entries }
    }

    pub fn contains(&self, plugin_name: &str) -> bool {
        self.entries.contains(&plugin_name.to_lowercase())
    }

    /// Annotate each entry's `is_in_skip_list` field in place.
    pub fn annotate(&self, entries: &mut [PluginEntry]) {
        for entry in entries {
            entry.is_in_skip_list = self.contains(&entry.file_name);
        }
    }
}
