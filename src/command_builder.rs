//! Builds the argv vector used to invoke xEdit in Quick Auto Clean mode.
//!
//! The teacher built a single shell-command *string* and ran it through
//! `sh -c` / `cmd /C`, manually quoting the plugin name into that string.
//! Plugin file names come from a user-controlled load order file, so a
//! crafted name (`"; rm -rf ~ #.esp`) would be interpreted by the shell
//! rather than passed through as one argument. This module instead returns
//! an argv `Vec<String>` that [`crate::process_executor::ProcessExecutor`]
//! passes straight to `Command::args`, with no shell in between, and
//! rejects plugin names outside a strict allowlist before they ever reach
//! argv construction.

use camino::{Utf8Path, Utf8PathBuf};

/// Characters permitted in a plugin file name, beyond alphanumerics.
const ALLOWED_SPECIAL_CHARS: &[char] = &['-', '_', '.', '(', ')', '[', ']', '\'', ' '];

/// Returns `true` if `name` is safe to pass as a single xEdit argument: only
/// letters, digits, whitespace, and the punctuation load orders commonly
/// contain, ending in a recognized plugin extension.
pub fn is_allowed_plugin_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }

    let lower = name.to_lowercase();
    let has_valid_extension =
        lower.ends_with(".esp") || lower.ends_with(".esm") || lower.ends_with(".esl");
    if !has_valid_extension {
        return false;
    }

    name.chars()
        .all(|c| c.is_alphanumeric() || ALLOWED_SPECIAL_CHARS.contains(&c))
}

/// Whether `xedit_exe_path` is the universal xEdit build, which needs an
/// explicit `-<GAME>` flag to know which game it's cleaning. A
/// game-specific build (`SSEEdit.exe`, `FO4Edit.exe`, ...) already knows.
pub fn is_universal_xedit(xedit_exe_path: &Utf8Path) -> bool {
    xedit_exe_path
        .file_stem()
        .is_some_and(|stem| stem.eq_ignore_ascii_case("xedit") || stem.eq_ignore_ascii_case("xedit64"))
}

/// What's needed to build one xEdit invocation.
#[derive(Debug, Clone)]
pub struct CleaningCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory the command must be spawned in. Set for MO2
    /// launches, since `ModOrganizer.exe` resolves its own relative paths
    /// against its own install directory, not the caller's cwd.
    pub working_dir: Option<Utf8PathBuf>,
}

/// Build the argv for one xEdit Quick Auto Clean invocation.
///
/// # Arguments
/// * `xedit_exe_path` - Path to the xEdit executable.
/// * `plugin_name` - Plugin to clean; validated against [`is_allowed_plugin_name`].
/// * `game_type` - Game flag for universal xEdit builds (e.g. `SSE`, `FO4`).
/// * `mo2_exe_path` - When set, wraps the invocation in `ModOrganizer.exe run ...`.
/// * `partial_forms_enabled` - Adds the experimental partial-forms flags.
///
/// # Errors
/// Returns an error string if `plugin_name` fails the allowlist check —
/// callers should treat this as a validation failure, not attempt the
/// command anyway.
pub fn build_cleaning_command(
    xedit_exe_path: &Utf8Path,
    plugin_name: &str,
    game_type: Option<&str>,
    mo2_exe_path: Option<&Utf8Path>,
    partial_forms_enabled: bool,
) -> Result<CleaningCommand, String> {
    if !is_allowed_plugin_name(plugin_name) {
        return Err(format!(
            "plugin name '{plugin_name}' contains characters outside the allowed set or lacks a .esp/.esm/.esl extension"
        ));
    }

    let mut inner_args = vec!["-QAC".to_string()];
    if let Some(game) = game_type {
        inner_args.push(format!("-{game}"));
    }
    inner_args.push("-autoexit".to_string());
    if partial_forms_enabled {
        inner_args.push("-iknowwhatimdoing".to_string());
        inner_args.push("-allowmakepartial".to_string());
    }
    // `-autoload` takes the plugin name as its very next argument; nothing
    // may be inserted between them or xEdit parses the filename as a
    // separate, unrecognized switch.
    inner_args.push("-autoload".to_string());
    inner_args.push(plugin_name.to_string());

    if let Some(mo2_path) = mo2_exe_path {
        // MO2's `run` subcommand takes the wrapped executable as its own
        // argv element and the inner command line as a single `-a` argument;
        // this is MO2's own CLI contract, not a shell, so there is no
        // injection surface as long as plugin_name is itself allowlisted.
        let escaped_inner = inner_args.join(" ").replace('"', "\\\"");

        Ok(CleaningCommand {
            program: mo2_path.to_string(),
            args: vec!["run".to_string(), xedit_exe_path.to_string(), "-a".to_string(), escaped_inner],
            working_dir: mo2_path.parent().map(|p| p.to_path_buf()),
        })
    } else {
        Ok(CleaningCommand {
            program: xedit_exe_path.to_string(),
            args: inner_args,
            working_dir: xedit_exe_path.parent().map(|p| p.to_path_buf()),
        })
    }
}
