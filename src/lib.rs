// AutoQAC - Automatic Quick Auto Clean for Bethesda Game Plugins
//
// This is the library crate containing the core business logic and data
// structures. The binary crate (main.rs) provides a CLI reference driver.

pub mod backup;
pub mod command_builder;
pub mod config;
pub mod error;
pub mod game_detection;
pub mod log_reader;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod output_parser;
pub mod plugin_enumerator;
pub mod skip_list;
pub mod state;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use error::AutoQacError;
pub use models::{AppState, IgnoreConfig, MainConfig, UserConfig};
pub use orchestrator::{CleaningSettings, Orchestrator, SessionCallbacks};
pub use state::{StateChange, StateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
