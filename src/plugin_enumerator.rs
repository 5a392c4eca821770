//! Parses a load-order file into [`PluginEntry`] records.
//!
//! This module is the single place that turns a `loadorder.txt`/`plugins.txt`
//! into plugin entries, resolving each to an absolute path when a data
//! directory is known.

use crate::models::{PluginEntry, WarningKind};
use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs;

/// Parse `load_order_path`, optionally resolving each entry against
/// `data_dir`. UTF-8 with an optional BOM; blank lines, `#`-comments, and
/// the `*`/`+`/`-` load-order prefix markers are skipped/stripped.
///
/// In `mo2_mode`, plugin files live in MO2's virtual filesystem and are not
/// present at any real path the host process can see, so they are never
/// pre-checked against disk — every entry is classified [`WarningKind::None`].
pub fn enumerate_plugins(
    load_order_path: &Utf8Path,
    data_dir: Option<&Utf8Path>,
    mo2_mode: bool,
) -> Result<Vec<PluginEntry>> {
    let raw = fs::read_to_string(load_order_path)
        .with_context(|| format!("Failed to read load order file: {load_order_path}"))?;
    let content = raw.strip_prefix('\u{feff}').unwrap_or(&raw);

    let mut entries = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let file_name = strip_prefix_marker(line).to_string();
        if file_name.is_empty() {
            entries.push(PluginEntry {
                file_name: line.to_string(),
                warning_kind: WarningKind::MalformedEntry,
                ..PluginEntry::default()
            });
            continue;
        }
        if !is_plugin_file_name(&file_name) {
            entries.push(PluginEntry {
                file_name,
                warning_kind: WarningKind::InvalidExtension,
                ..PluginEntry::default()
            });
            continue;
        }

        let resolved_path = data_dir.map(|dir| dir.join(&file_name));
        let warning_kind = if mo2_mode {
            WarningKind::None
        } else {
            classify_resolved_path(resolved_path.as_deref())
        };

        entries.push(PluginEntry {
            file_name,
            resolved_path,
            warning_kind,
            ..PluginEntry::default()
        });
    }

    Ok(entries)
}

/// Classify a resolved (or unresolved) path into the warning it deserves:
/// missing, present but empty, present but unreadable, or none of the above.
/// An entry that couldn't be resolved to any path (no data directory
/// configured) is treated the same as one resolved-but-missing: there is
/// nothing on disk to clean either way.
fn classify_resolved_path(resolved_path: Option<&Utf8Path>) -> WarningKind {
    let Some(path) = resolved_path else {
        return WarningKind::NotFound;
    };

    match fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => WarningKind::ZeroByte,
        Ok(_) => WarningKind::None,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => WarningKind::NotFound,
        Err(_) => WarningKind::Unreadable,
    }
}

fn strip_prefix_marker(line: &str) -> &str {
    match line.chars().next() {
        Some('*') | Some('+') | Some('-') => line[1..].trim(),
        _ => line,
    }
}

fn is_plugin_file_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(".esp") || lower.ends_with(".esm") || lower.ends_with(".esl")
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_enumerate_skips_comments_and_blank_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# a comment").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "*Skyrim.esm").unwrap();
        writeln!(file, "+Dawnguard.esm").unwrap();
        writeln!(file, "Unofficial Patch.esp").unwrap();
        file.flush().unwrap();

        let path = Utf8PathBuf::try_from(file.path().to_path_buf()).unwrap();
        let entries = enumerate_plugins(&path, None, false).unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].file_name, "Skyrim.esm");
        assert_eq!(entries[1].file_name, "Dawnguard.esm");
        assert_eq!(entries[2].file_name, "Unofficial Patch.esp");
        assert!(entries.iter().all(|e| e.warning_kind == WarningKind::NotFound));
    }

    #[test]
    fn test_enumerate_resolves_against_data_dir() {
        let data_dir = TempDir::new().unwrap();
        let data_path = Utf8PathBuf::try_from(data_dir.path().to_path_buf()).unwrap();
        fs::write(data_path.join("Existing.esp"), b"dummy").unwrap();

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Existing.esp").unwrap();
        writeln!(file, "Missing.esp").unwrap();
        file.flush().unwrap();

        let lo_path = Utf8PathBuf::try_from(file.path().to_path_buf()).unwrap();
        let entries = enumerate_plugins(&lo_path, Some(&data_path), false).unwrap();

        assert_eq!(entries[0].warning_kind, WarningKind::None);
        assert_eq!(entries[1].warning_kind, WarningKind::NotFound);
    }

    #[test]
    fn test_non_plugin_extension_is_flagged_not_dropped() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "readme.txt").unwrap();
        writeln!(file, "Valid.esp").unwrap();
        file.flush().unwrap();

        let path = Utf8PathBuf::try_from(file.path().to_path_buf()).unwrap();
        let entries = enumerate_plugins(&path, None, false).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].file_name, "readme.txt");
        assert_eq!(entries[0].warning_kind, WarningKind::InvalidExtension);
        assert!(!entries[0].should_process());
        assert_eq!(entries[1].file_name, "Valid.esp");
    }

    #[test]
    fn test_bare_prefix_marker_is_flagged_malformed() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "*").unwrap();
        writeln!(file, "Valid.esp").unwrap();
        file.flush().unwrap();

        let path = Utf8PathBuf::try_from(file.path().to_path_buf()).unwrap();
        let entries = enumerate_plugins(&path, None, false).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].warning_kind, WarningKind::MalformedEntry);
        assert!(!entries[0].should_process());
    }

    #[test]
    fn test_enumerate_mo2_mode_ignores_virtualized_paths() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Virtualized.esp").unwrap();
        file.flush().unwrap();

        // No data dir at all, mirroring the common MO2 invocation; without
        // mo2_mode every entry would come back NotFound.
        let path = Utf8PathBuf::try_from(file.path().to_path_buf()).unwrap();
        let entries = enumerate_plugins(&path, None, true).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].warning_kind, WarningKind::None);
        assert!(entries[0].should_process());
    }
}
