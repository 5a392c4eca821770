//! Argument parsing for the reference CLI driver.
//!
//! Not a deliverable UI — proves the library's contract end-to-end
//! (config → orchestrator → session summary) without the presentation
//! layer the teacher built in Slint.

use camino::Utf8PathBuf;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "autoqac", version, about = "Quick Auto Clean orchestration for Bethesda game plugins")]
pub struct Cli {
    /// Path to the load order file (loadorder.txt / plugins.txt).
    #[arg(long)]
    pub load_order: Utf8PathBuf,

    /// Path to the xEdit executable to invoke.
    #[arg(long)]
    pub xedit_exe: Utf8PathBuf,

    /// Path to ModOrganizer.exe, required when --mo2-mode is set.
    #[arg(long)]
    pub mo2_exe: Option<Utf8PathBuf>,

    /// Run xEdit through Mod Organizer 2's virtual filesystem.
    #[arg(long)]
    pub mo2_mode: bool,

    /// Enable the experimental partial-forms cleaning flags.
    #[arg(long)]
    pub partial_forms: bool,

    /// Ignore the configured skip lists entirely.
    #[arg(long)]
    pub disable_skip_lists: bool,

    /// Disable pre-clean plugin backups for this session.
    #[arg(long)]
    pub no_backup: bool,

    /// Number of backup sessions to retain.
    #[arg(long, default_value_t = 5)]
    pub max_backup_sessions: usize,

    /// Per-plugin cleaning timeout, in seconds.
    #[arg(long, default_value_t = 300)]
    pub timeout_secs: u64,

    /// Game type (SSE, FO4, FO3, FNV, ...); auto-detected when omitted.
    #[arg(long)]
    pub game: Option<String>,

    /// Directory holding the data files the load order resolves against.
    #[arg(long)]
    pub data_dir: Option<Utf8PathBuf>,

    /// Directory for configuration YAML files.
    #[arg(long, default_value = "AutoQAC Data")]
    pub config_dir: Utf8PathBuf,

    /// Enable debug-level logging.
    #[arg(long)]
    pub debug: bool,

    /// List what would be processed without launching xEdit.
    #[arg(long)]
    pub dry_run: bool,
}
