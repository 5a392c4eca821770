//! Integration tests covering command building, log path generation, and
//! their interplay with StateManager during a cleaning workflow.
//!
//! These tests verify:
//! - Command building for various scenarios
//! - Log file path generation
//! - Integration with StateManager
//! - Error handling workflows

use autoqac::command_builder::build_cleaning_command;
use autoqac::models::PluginEntry;
use camino::Utf8Path;

fn entry(name: &str) -> PluginEntry {
    PluginEntry { file_name: name.to_string(), ..PluginEntry::default() }
}

#[test]
fn test_build_cleaning_command_basic() {
    let cmd = build_cleaning_command(
        Utf8Path::new("C:/Tools/FO4Edit.exe"),
        "MyPlugin.esp",
        None,  // No game mode (FO4Edit knows it's FO4)
        None,  // No MO2
        false, // No partial forms
    )
    .unwrap();

    assert_eq!(cmd.program, "C:/Tools/FO4Edit.exe");
    assert!(cmd.args.contains(&"-QAC".to_string()));
    assert!(cmd.args.contains(&"-autoexit".to_string()));
    assert!(cmd.args.contains(&"-autoload".to_string()));
    assert!(cmd.args.contains(&"MyPlugin.esp".to_string()));
}

#[test]
fn test_build_cleaning_command_with_game_mode() {
    let cmd = build_cleaning_command(
        Utf8Path::new("C:/Tools/xEdit.exe"), // Universal xEdit
        "MyPlugin.esp",
        Some("FO4"), // Specify game mode
        None,
        false,
    )
    .unwrap();

    assert!(cmd.args.contains(&"-FO4".to_string()));
}

#[test]
fn test_build_cleaning_command_with_mo2() {
    let cmd = build_cleaning_command(
        Utf8Path::new("C:/Tools/FO4Edit.exe"),
        "MyPlugin.esp",
        None,
        Some(Utf8Path::new("C:/MO2/ModOrganizer.exe")), // MO2 path
        false,
    )
    .unwrap();

    // With MO2, the program is ModOrganizer.exe, which runs xEdit as its own
    // argv element via `-a "<inner args>"`.
    assert_eq!(cmd.program, "C:/MO2/ModOrganizer.exe");
    assert_eq!(cmd.args[0], "run");
    assert_eq!(cmd.args[1], "C:/Tools/FO4Edit.exe");
    assert_eq!(cmd.args[2], "-a");
    assert_eq!(cmd.working_dir, Some(camino::Utf8PathBuf::from("C:/MO2")));
}

#[test]
fn test_build_cleaning_command_with_partial_forms() {
    let cmd = build_cleaning_command(
        Utf8Path::new("C:/Tools/FO4Edit.exe"),
        "MyPlugin.esp",
        None,
        None,
        true, // Enable partial forms
    )
    .unwrap();

    assert!(cmd.args.contains(&"-iknowwhatimdoing".to_string()));
    assert!(cmd.args.contains(&"-allowmakepartial".to_string()));
}

#[test]
fn test_build_cleaning_command_all_options() {
    let cmd = build_cleaning_command(
        Utf8Path::new("C:/Tools/xEdit.exe"),
        "MyPlugin.esp",
        Some("SSE"),                                      // Game mode
        Some(Utf8Path::new("C:/MO2/ModOrganizer.exe")), // MO2
        true,                                             // Partial forms
    )
    .unwrap();

    assert_eq!(cmd.program, "C:/MO2/ModOrganizer.exe");
    assert_eq!(cmd.args[0], "run");
    assert_eq!(cmd.args[1], "C:/Tools/xEdit.exe");
    assert_eq!(cmd.args[2], "-a");
    let inner_args = &cmd.args[3];
    assert!(inner_args.contains("-SSE"));
    assert!(inner_args.contains("-QAC"));
    assert!(inner_args.contains("-autoexit"));
    assert!(inner_args.contains("-autoload"));
    assert!(inner_args.contains("-iknowwhatimdoing"));
    assert!(inner_args.contains("-allowmakepartial"));
}

#[test]
fn test_get_log_paths() {
    let (main_log, exception_log) =
        autoqac::log_reader::log_paths(Utf8Path::new("C:/Tools/FO4Edit.exe"), None);

    // Main log file should be in same directory as xEdit
    assert!(main_log.starts_with("C:/Tools"));
    assert!(main_log.as_str().contains("FO4EDIT"));

    // Exception log should also be in same directory
    assert!(exception_log.starts_with("C:/Tools"));
    assert!(exception_log.as_str().contains("FO4EDIT"));
    assert!(exception_log.as_str().contains("Exception"));
}

#[test]
fn test_get_log_paths_with_game_type() {
    let (main_log, exception_log) = autoqac::log_reader::log_paths(
        Utf8Path::new("C:/Tools/xEdit.exe"),
        Some("SSE"), // Universal xEdit with game mode
    );

    // Log files should use game-specific names: SSEEdit_log.txt
    assert!(main_log.as_str().contains("SSEEdit_log.txt"));
    assert!(exception_log.as_str().contains("SSEEditException.log"));
}

#[test]
fn test_command_rejects_plugin_name_outside_allowlist() {
    let result = build_cleaning_command(
        Utf8Path::new("C:/Tools/FO4Edit.exe"),
        "evil; rm -rf ~ #.esp",
        None,
        None,
        false,
    );

    assert!(result.is_err());
}

#[test]
fn test_command_preserves_spaces_in_plugin_names() {
    let cmd = build_cleaning_command(
        Utf8Path::new("C:/Tools/FO4Edit.exe"),
        "My Awesome Plugin.esp",
        None,
        None,
        false,
    )
    .unwrap();

    // Passed as one argv element, not split or re-quoted.
    assert!(cmd.args.contains(&"My Awesome Plugin.esp".to_string()));
}

#[test]
fn test_integration_with_state_manager() {
    use autoqac::StateManager;
    use std::sync::Arc;

    let state = Arc::new(StateManager::new());

    // Start cleaning workflow
    state.start_cleaning(vec![entry("plugin1.esp"), entry("plugin2.esp")]);

    // Verify state
    let snapshot = state.snapshot();
    assert!(snapshot.is_cleaning);
    assert_eq!(snapshot.total_plugins, 2);

    // Simulate updating progress
    state.update_progress("plugin1.esp".to_string(), "Cleaning...".to_string());

    let snapshot = state.snapshot();
    assert_eq!(snapshot.current_plugin, Some("plugin1.esp".to_string()));

    // Simulate adding result
    state.add_plugin_result(
        "plugin1.esp".to_string(),
        "cleaned",
        "Removed 5 ITMs".to_string(),
        None,
    );

    let snapshot = state.snapshot();
    assert_eq!(snapshot.cleaned_plugins.len(), 1);
    assert!(snapshot.cleaned_plugins.contains("plugin1.esp"));

    // Stop cleaning
    state.stop_cleaning();

    let snapshot = state.snapshot();
    assert!(!snapshot.is_cleaning);
}

#[test]
fn test_cleaning_workflow_state_transitions() {
    use autoqac::StateManager;
    use std::sync::Arc;

    let state = Arc::new(StateManager::new());

    // Initial state
    assert!(!state.read(|s| s.is_cleaning));

    // Start cleaning
    state.start_cleaning(vec![
        entry("plugin1.esp"),
        entry("plugin2.esp"),
        entry("plugin3.esp"),
    ]);

    assert!(state.read(|s| s.is_cleaning));
    assert_eq!(state.read(|s| s.total_plugins), 3);

    // Process plugins
    for (i, plugin) in ["plugin1.esp", "plugin2.esp", "plugin3.esp"]
        .iter()
        .enumerate()
    {
        state.update_progress(plugin.to_string(), format!("Cleaning {}", plugin));
        state.add_plugin_result(
            plugin.to_string(),
            "cleaned",
            format!("Done with {}", plugin),
            None,
        );

        let progress = state.read(|s| s.progress);
        assert_eq!(progress, i + 1);
    }

    // Final state
    assert_eq!(state.read(|s| s.cleaned_plugins.len()), 3);

    // Stop cleaning
    state.stop_cleaning();
    assert!(!state.read(|s| s.is_cleaning));
}

#[test]
fn test_error_handling_workflow() {
    use autoqac::StateManager;
    use std::sync::Arc;

    let state = Arc::new(StateManager::new());

    state.start_cleaning(vec![entry("good_plugin.esp"), entry("bad_plugin.esp")]);

    // First plugin succeeds
    state.add_plugin_result(
        "good_plugin.esp".to_string(),
        "cleaned",
        "Success".to_string(),
        None,
    );

    // Second plugin fails
    state.add_plugin_result(
        "bad_plugin.esp".to_string(),
        "failed",
        "Missing masters".to_string(),
        None,
    );

    let snapshot = state.snapshot();
    assert_eq!(snapshot.cleaned_plugins.len(), 1);
    assert_eq!(snapshot.failed_plugins.len(), 1);
    assert!(snapshot.cleaned_plugins.contains("good_plugin.esp"));
    assert!(snapshot.failed_plugins.contains("bad_plugin.esp"));
}

#[test]
fn test_skip_plugin_workflow() {
    use autoqac::StateManager;
    use std::sync::Arc;

    let state = Arc::new(StateManager::new());

    state.start_cleaning(vec![
        entry("regular_plugin.esp"),
        entry("Fallout4.esm"), // Base game file - should skip
    ]);

    // Regular plugin cleaned
    state.add_plugin_result(
        "regular_plugin.esp".to_string(),
        "cleaned",
        "Done".to_string(),
        None,
    );

    // Base game file skipped
    state.add_plugin_result(
        "Fallout4.esm".to_string(),
        "skipped",
        "In skip list".to_string(),
        None,
    );

    let snapshot = state.snapshot();
    assert_eq!(snapshot.cleaned_plugins.len(), 1);
    assert_eq!(snapshot.skipped_plugins.len(), 1);
    assert!(snapshot.skipped_plugins.contains("Fallout4.esm"));
}

#[test]
fn test_statistics_tracking_workflow() {
    use autoqac::models::CleaningStatistics;
    use autoqac::StateManager;
    use std::sync::Arc;

    let state = Arc::new(StateManager::new());

    state.start_cleaning(vec![entry("plugin1.esp"), entry("plugin2.esp")]);

    // Plugin 1 with stats
    let stats1 = CleaningStatistics {
        undeleted: 3,
        removed: 5,
        skipped: 1,
        partial_forms: 0,
    };

    state.add_plugin_result(
        "plugin1.esp".to_string(),
        "cleaned",
        "Done".to_string(),
        Some(stats1),
    );

    // Plugin 2 with different stats
    let stats2 = CleaningStatistics {
        undeleted: 2,
        removed: 8,
        skipped: 0,
        partial_forms: 1,
    };

    state.add_plugin_result(
        "plugin2.esp".to_string(),
        "cleaned",
        "Done".to_string(),
        Some(stats2),
    );

    // Verify aggregate statistics
    let snapshot = state.snapshot();
    assert_eq!(snapshot.total_undeleted, 5); // 3 + 2
    assert_eq!(snapshot.total_removed, 13); // 5 + 8
    assert_eq!(snapshot.total_skipped, 1); // 1 + 0
    assert_eq!(snapshot.total_partial_forms, 1); // 0 + 1
}
