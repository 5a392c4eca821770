// Performance metrics module
//
// Provides lightweight metrics tracking for monitoring application performance

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Global performance metrics
///
/// Uses atomic operations for thread-safe metric tracking without locks.
/// Metrics are collected throughout the application lifecycle and can be
/// logged periodically or on shutdown for performance analysis.
#[derive(Debug)]
pub struct Metrics {
    /// Total number of plugins successfully cleaned
    pub plugins_cleaned: AtomicUsize,

    /// Total number of plugins that failed to clean
    pub plugins_failed: AtomicUsize,

    /// Total number of plugins skipped
    pub plugins_skipped: AtomicUsize,

    /// Total cleaning time in milliseconds
    pub total_cleaning_time_ms: AtomicU64,

    /// Number of state updates performed
    pub state_updates: AtomicU64,

    /// Number of UI updates sent
    pub ui_updates: AtomicU64,

    /// Number of state broadcasts sent
    pub state_broadcasts: AtomicU64,

    /// Number of state broadcast errors (channel full or closed)
    pub state_broadcast_errors: AtomicU64,

    /// Number of UI update channel full errors
    pub ui_update_channel_full: AtomicU64,

    /// Subprocess terminations that exited after the cooperative/graceful
    /// signal, without needing a forced tree-kill
    pub graceful_terminations: AtomicU64,

    /// Subprocess terminations that required a forced kill of the process tree
    pub forced_terminations: AtomicU64,

    /// Terminations where the target plugin's file handle was still held
    /// after the handle-release polling window expired
    pub handle_release_failures: AtomicU64,

    /// Total ITM (identical-to-master) records removed, summed across every
    /// processed plugin's parsed xEdit output
    pub items_removed: AtomicU64,

    /// Total UDR (undisabled/deleted reference) records restored, summed
    /// across every processed plugin
    pub items_undeleted: AtomicU64,

    /// Total records xEdit reported as skipped during cleaning
    pub items_skipped: AtomicU64,

    /// Total partial forms created (only nonzero when partial-forms mode is on)
    pub partial_forms_created: AtomicU64,

    /// Application start time
    start_time: Instant,
}

impl Metrics {
    /// Create a new Metrics instance
    pub fn new() -> Self {
        Self {
            plugins_cleaned: AtomicUsize::new(0),
            plugins_failed: AtomicUsize::new(0),
            plugins_skipped: AtomicUsize::new(0),
            total_cleaning_time_ms: AtomicU64::new(0),
            state_updates: AtomicU64::new(0),
            ui_updates: AtomicU64::new(0),
            state_broadcasts: AtomicU64::new(0),
            state_broadcast_errors: AtomicU64::new(0),
            ui_update_channel_full: AtomicU64::new(0),
            graceful_terminations: AtomicU64::new(0),
            forced_terminations: AtomicU64::new(0),
            handle_release_failures: AtomicU64::new(0),
            items_removed: AtomicU64::new(0),
            items_undeleted: AtomicU64::new(0),
            items_skipped: AtomicU64::new(0),
            partial_forms_created: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a plugin cleaning operation
    pub fn record_plugin_cleaned(&self) {
        self.plugins_cleaned.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a plugin failure
    pub fn record_plugin_failed(&self) {
        self.plugins_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a plugin skip
    pub fn record_plugin_skipped(&self) {
        self.plugins_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record cleaning time for a plugin
    pub fn record_cleaning_time(&self, duration: Duration) {
        self.total_cleaning_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Record a state update
    pub fn record_state_update(&self) {
        self.state_updates.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a UI update
    pub fn record_ui_update(&self) {
        self.ui_updates.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a state broadcast
    pub fn record_state_broadcast(&self) {
        self.state_broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a state broadcast error
    pub fn record_state_broadcast_error(&self) {
        self.state_broadcast_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a UI update channel full error
    pub fn record_ui_channel_full(&self) {
        self.ui_update_channel_full.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a subprocess termination outcome from the kill escalation ladder.
    pub fn record_termination(&self, outcome: crate::models::TerminationOutcome) {
        use crate::models::TerminationOutcome;
        match outcome {
            TerminationOutcome::ExitedGracefully | TerminationOutcome::ExitedAfterSignal => {
                self.graceful_terminations.fetch_add(1, Ordering::Relaxed);
            }
            TerminationOutcome::GracePeriodExpired => {}
            TerminationOutcome::ForceKilled => {
                self.forced_terminations.fetch_add(1, Ordering::Relaxed);
            }
            TerminationOutcome::HandleStillHeld => {
                self.handle_release_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Fold one plugin's parsed xEdit record counts into the running totals.
    /// Distinct from [`Self::record_plugin_cleaned`] et al., which count
    /// plugins; this counts the records xEdit reported acting on inside them.
    pub fn record_item_statistics(&self, stats: &crate::models::CleaningStatistics) {
        self.items_removed.fetch_add(stats.removed as u64, Ordering::Relaxed);
        self.items_undeleted.fetch_add(stats.undeleted as u64, Ordering::Relaxed);
        self.items_skipped.fetch_add(stats.skipped as u64, Ordering::Relaxed);
        self.partial_forms_created.fetch_add(stats.partial_forms as u64, Ordering::Relaxed);
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get average cleaning time per plugin in milliseconds
    pub fn avg_cleaning_time_ms(&self) -> f64 {
        let total = self.total_cleaning_time_ms.load(Ordering::Relaxed);
        let count = self.plugins_cleaned.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        let uptime = self.uptime();
        tracing::info!("=== Performance Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", uptime.as_secs_f64());
        tracing::info!(
            "Plugins: {} cleaned, {} failed, {} skipped",
            self.plugins_cleaned.load(Ordering::Relaxed),
            self.plugins_failed.load(Ordering::Relaxed),
            self.plugins_skipped.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Total cleaning time: {:.2}s (avg: {:.2}ms per plugin)",
            self.total_cleaning_time_ms.load(Ordering::Relaxed) as f64 / 1000.0,
            self.avg_cleaning_time_ms()
        );
        tracing::info!(
            "State updates: {}, broadcasts: {}, errors: {}",
            self.state_updates.load(Ordering::Relaxed),
            self.state_broadcasts.load(Ordering::Relaxed),
            self.state_broadcast_errors.load(Ordering::Relaxed)
        );
        tracing::info!(
            "UI updates: {}, channel full errors: {}",
            self.ui_updates.load(Ordering::Relaxed),
            self.ui_update_channel_full.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Terminations: {} graceful, {} forced, {} handle-release failures",
            self.graceful_terminations.load(Ordering::Relaxed),
            self.forced_terminations.load(Ordering::Relaxed),
            self.handle_release_failures.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Records: {} removed, {} undeleted, {} skipped, {} partial forms created",
            self.items_removed.load(Ordering::Relaxed),
            self.items_undeleted.load(Ordering::Relaxed),
            self.items_skipped.load(Ordering::Relaxed),
            self.partial_forms_created.load(Ordering::Relaxed)
        );
    }

    /// Log periodic metrics (for long-running operations)
    pub fn log_periodic(&self) {
        tracing::info!(
            "Metrics: {} plugins processed, {} state updates, {} UI updates, uptime {:.0}s",
            self.plugins_cleaned.load(Ordering::Relaxed)
                + self.plugins_failed.load(Ordering::Relaxed)
                + self.plugins_skipped.load(Ordering::Relaxed),
            self.state_updates.load(Ordering::Relaxed),
            self.ui_updates.load(Ordering::Relaxed),
            self.uptime().as_secs_f64()
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
