// AutoQAC - Automatic Quick Auto Clean for Bethesda Game Plugins
//
// Reference CLI driver: loads configuration, builds an Orchestrator, runs
// one cleaning session to completion (or `--dry-run`'s plugin listing), and
// prints a session summary. Proves the library's contract end-to-end; not
// the deliverable UI, which is out of scope for this crate.

mod cli;

use anyhow::{Context, Result};
use autoqac::orchestrator::{CleaningSettings, Orchestrator, SessionCallbacks};
use autoqac::{ConfigManager, StateManager, APP_NAME, VERSION};
use clap::Parser;
use cli::Cli;
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    let args = Cli::parse();

    // Config directory read has to happen before logging so the log
    // retention setting (itself part of the user config) is available.
    let log_retention = ConfigManager::new(&args.config_dir)
        .and_then(|mgr| mgr.load_user_config().map_err(anyhow::Error::from))
        .map(|cfg| cfg.pact_settings.log_retention)
        .unwrap_or_else(|_| autoqac::models::UserConfig::default().pact_settings.log_retention);

    let _guard = autoqac::logging::setup_logging_with_console(
        "logs",
        "autoqac",
        args.debug,
        true,
        log_retention,
    )?;
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(4)
        .thread_name("autoqac-worker")
        .build()?;

    runtime.block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let config_manager = ConfigManager::new(&args.config_dir)?;
    let user_config = config_manager.load_user_config()?;

    let state_manager = StateManager::new();
    state_manager.load_from_user_config(&user_config);

    if args.dry_run {
        return run_dry_run(&args);
    }

    let settings = CleaningSettings {
        load_order_path: args.load_order.clone(),
        xedit_exe_path: args.xedit_exe.clone(),
        mo2_exe_path: args.mo2_exe.clone(),
        mo2_mode: args.mo2_mode,
        partial_forms_enabled: args.partial_forms,
        disable_skip_lists: args.disable_skip_lists,
        backup_enabled: !args.no_backup,
        max_backup_sessions: args.max_backup_sessions,
        cleaning_timeout: Duration::from_secs(args.timeout_secs),
        game_type: args.game.clone(),
        data_dir: args.data_dir.clone(),
    };

    let orchestrator = Arc::new(Orchestrator::new(state_manager, config_manager));

    let ctrl_c_orchestrator = Arc::clone(&orchestrator);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, requesting cancellation");
            ctrl_c_orchestrator.stop_cleaning();
        }
    });

    let result = orchestrator.start_cleaning(settings, SessionCallbacks::default()).await;

    match result {
        Ok(session) => {
            print_summary(&session);
            if session.was_cancelled {
                tracing::info!("Session was cancelled by the user");
            }
            Ok(())
        }
        Err(err) => {
            tracing::error!("Cleaning session failed: {err}");
            Err(err.into())
        }
    }
}

fn run_dry_run(args: &Cli) -> Result<()> {
    let entries =
        autoqac::plugin_enumerator::enumerate_plugins(&args.load_order, args.data_dir.as_deref(), args.mo2_mode)
            .with_context(|| format!("Failed to enumerate load order: {}", args.load_order))?;

    println!("Dry run: {} entries in load order", entries.len());
    for entry in &entries {
        if entry.should_process() {
            println!("  would process: {}", entry.file_name);
        } else {
            println!("  would skip:    {} ({:?})", entry.file_name, entry.warning_kind);
        }
    }
    Ok(())
}

fn print_summary(session: &autoqac::models::SessionResult) {
    let summary = &session.session_summary;
    println!(
        "Session complete: {} cleaned, {} failed, {} skipped (cancelled: {})",
        summary.cleaned, summary.failed, summary.skipped, session.was_cancelled
    );
    println!(
        "Totals: {} ITMs removed, {} UDRs undeleted, {} skipped, {} partial forms",
        summary.total_stats.removed,
        summary.total_stats.undeleted,
        summary.total_stats.skipped,
        summary.total_stats.partial_forms
    );
    for result in &session.plugin_results {
        println!("  {:?} {} - {}", result.status, result.plugin, result.message);
    }
}
