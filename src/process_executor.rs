//! Runs one xEdit invocation to completion, with hang detection and a
//! termination escalation ladder.
//!
//! The teacher's `execute_cleaning_command` spawned the process and raced a
//! single `tokio::time::timeout` against `child.wait_with_output()` — no
//! hang detection, no kill escalation, and a plain `Command::kill()` (which
//! only sends the immediate force signal) on timeout. This module replaces
//! it: a slot [`tokio::sync::Semaphore`] of capacity
//! [`crate::models::MAX_CONCURRENT_XEDIT_PROCESSES`] serializes execution,
//! stdout/stderr are drained on separate tasks so a full pipe buffer can't
//! stall xEdit, a periodic CPU-time sample distinguishes "still working" from
//! "hung", and termination walks: cooperative exit request → grace period
//! (expiring without killing, if not already escalated) → forced kill of the
//! process tree → bounded wait → handle-release polling.

use crate::error::ProcessError;
use crate::models::{CleaningStatistics, TerminationOutcome, TerminationResult};
use crate::output_parser::IncrementalParser;
use camino::Utf8Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysinfo::{Pid, System};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, Notify, Semaphore};

/// CPU usage (percent of one core) below which a process is considered idle
/// for hang-detection purposes.
const HANG_CPU_THRESHOLD_PERCENT: f32 = 1.0;
/// How long CPU usage must stay below the threshold before we call it hung.
const HANG_WINDOW: Duration = Duration::from_secs(30);
/// How often to sample CPU usage while waiting on the child.
const HANG_SAMPLE_INTERVAL: Duration = Duration::from_secs(2);
/// How long to wait after a cooperative exit request before escalating.
const GRACE_PERIOD: Duration = Duration::from_millis(2000);
/// How long to wait for the OS to reap the process after a forced kill.
const FORCE_KILL_WAIT: Duration = Duration::from_secs(5);
/// Handle-release polling: initial delay, multiplier, and attempt cap.
const HANDLE_POLL_INITIAL_DELAY: Duration = Duration::from_millis(50);
const HANDLE_POLL_MAX_ATTEMPTS: u32 = 6;

/// Published on [`ProcessExecutor::subscribe_hang`] when the running child's
/// CPU usage crosses the hang threshold in either direction. Informational
/// only: hang detection never terminates the child by itself, it just gives
/// the UI something to surface a force-kill affordance against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HangChangedEvent {
    pub hang_detected: bool,
}

/// Outcome of running one xEdit process to completion or termination.
///
/// `error` is set on timeout/hang/handle-release failure; `stats` and
/// `saw_completion_line` are still populated from whatever output was
/// parsed before termination, since a timed-out plugin with partial
/// progress is a meaningful (if failed) result, not a discarded one.
#[derive(Debug)]
pub struct ExecutionOutcome {
    pub exit_code: Option<i32>,
    pub stats: CleaningStatistics,
    pub saw_completion_line: bool,
    pub duration: Duration,
    pub termination: Option<TerminationResult>,
    pub error: Option<ProcessError>,
}

/// Shared stop flag checked by an in-flight [`ProcessExecutor::run`]. Models
/// the two-click stop protocol: the first request asks xEdit to exit
/// gracefully; a second request (while the first is still pending) escalates
/// straight to a forced kill of the process tree.
#[derive(Default)]
struct StopSignal {
    stop_requested: AtomicBool,
    force_requested: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    /// Returns `true` if this call escalated an already-pending stop to a
    /// forced one (the second click).
    fn request(&self, force: bool) -> bool {
        let already_requested = self.stop_requested.swap(true, Ordering::SeqCst);
        let escalated = force || already_requested;
        if escalated {
            self.force_requested.store(true, Ordering::SeqCst);
        }
        self.notify.notify_waiters();
        escalated
    }

    fn is_force(&self) -> bool {
        self.force_requested.load(Ordering::SeqCst)
    }

    async fn wait_for_request(&self) {
        loop {
            if self.stop_requested.load(Ordering::SeqCst) {
                return;
            }
            self.notify.notified().await;
        }
    }
}

/// Executes xEdit invocations one at a time.
pub struct ProcessExecutor {
    slot: Arc<Semaphore>,
    stop: Arc<StopSignal>,
    hang_tx: broadcast::Sender<HangChangedEvent>,
}

impl ProcessExecutor {
    pub fn new() -> Self {
        let (hang_tx, _) = broadcast::channel(16);
        Self {
            slot: Arc::new(Semaphore::new(crate::models::MAX_CONCURRENT_XEDIT_PROCESSES)),
            stop: Arc::new(StopSignal::default()),
            hang_tx,
        }
    }

    /// Subscribe to hang-detection transitions for the process this executor
    /// is currently (or about to be) running.
    pub fn subscribe_hang(&self) -> broadcast::Receiver<HangChangedEvent> {
        self.hang_tx.subscribe()
    }

    /// Request termination of whatever process is currently running (or
    /// about to run). The first call asks for a graceful stop; a second call
    /// before it takes effect escalates to a forced kill. Returns whether
    /// this call escalated to a forced stop.
    pub fn request_stop(&self, force: bool) -> bool {
        self.stop.request(force)
    }

    /// Whether a stop has been requested since the last [`Self::reset_stop`].
    pub fn stop_requested(&self) -> bool {
        self.stop.stop_requested.load(Ordering::SeqCst)
    }

    /// Clear the stop flag ahead of the next plugin's run.
    pub fn reset_stop(&self) {
        self.stop.stop_requested.store(false, Ordering::SeqCst);
        self.stop.force_requested.store(false, Ordering::SeqCst);
    }

    /// Run `program args...` to completion, enforcing `timeout` and hang
    /// detection, returning accumulated output-parser statistics regardless
    /// of whether the process finished, was killed, or hung.
    pub async fn run(
        &self,
        program: &str,
        args: &[String],
        working_dir: Option<&Utf8Path>,
        timeout: Duration,
        target_file: Option<&Utf8Path>,
    ) -> Result<ExecutionOutcome, ProcessError> {
        let _permit = self.slot.acquire().await.expect("semaphore never closed");

        let start = Instant::now();
        let mut command = Command::new(program);
        command.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());
        if let Some(dir) = working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(ProcessError::Spawn)?;
        let pid = child.id();

        let stdout = child.stdout.take().expect("stdout was piped");
        let stderr = child.stderr.take().expect("stderr was piped");

        let parser = Arc::new(std::sync::Mutex::new(IncrementalParser::new()));
        let stdout_parser = Arc::clone(&parser);
        let stdout_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                stdout_parser.lock().unwrap().feed_line(&line);
            }
        });
        // Drained but not parsed: xEdit's diagnostic noise on stderr isn't
        // part of the cleaning-result contract, only its exception log is.
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(_line)) = lines.next_line().await {}
        });

        let hang_flag = Arc::new(AtomicBool::new(false));
        let hang_task = pid.map(|pid| {
            let hang_flag = Arc::clone(&hang_flag);
            let hang_tx = self.hang_tx.clone();
            tokio::spawn(async move { watch_for_hang(pid, hang_flag, hang_tx).await })
        });

        // Hang detection is deliberately not a branch of this select: it only
        // samples CPU usage and publishes an informational event. The child
        // is terminated here for exactly two reasons, a timeout or a stop
        // request, never because it was merely observed idle.
        let wait_result = tokio::select! {
            result = child.wait() => Some(result),
            _ = tokio::time::sleep(timeout) => None,
            _ = self.stop.wait_for_request() => None,
        };

        if let Some(task) = hang_task {
            task.abort();
        }

        let (exit_code, termination, error) = match wait_result {
            Some(Ok(status)) => (status.code(), None, None),
            Some(Err(err)) => return Err(ProcessError::Io(err)),
            None => {
                let was_hang = hang_flag.load(Ordering::Relaxed);
                let was_stop_request = self.stop.stop_requested.load(Ordering::SeqCst);
                let force = self.stop.is_force();
                // Only a first, non-escalated stop click gets the cooperative
                // grace period; a timeout or an already-escalated stop forces
                // the kill immediately. A concurrently-hung process does not
                // change this: hang detection never drives termination.
                let force_kill = !(was_stop_request && !force);
                let termination_result = terminate_child(&mut child, target_file, force_kill).await;

                let (termination, error) = match termination_result {
                    Ok(termination) => {
                        let err = if was_stop_request {
                            if termination.outcome == TerminationOutcome::GracePeriodExpired {
                                ProcessError::GracePeriodExpired
                            } else {
                                ProcessError::Killed
                            }
                        } else if was_hang {
                            ProcessError::Hung(HANG_WINDOW)
                        } else {
                            ProcessError::Timeout(timeout)
                        };
                        tracing::warn!(
                            "xEdit terminated via {:?} after {:?}: {err}",
                            termination.outcome,
                            termination.wall_time
                        );
                        (Some(termination), Some(err))
                    }
                    Err(handle_err) => (None, Some(handle_err)),
                };

                // A GracePeriodExpired outcome leaves the child running; its
                // stdout/stderr pipes may never hit EOF, so abort the reader
                // tasks instead of awaiting them.
                if matches!(termination.as_ref().map(|t| t.outcome), Some(TerminationOutcome::GracePeriodExpired)) {
                    stdout_task.abort();
                    stderr_task.abort();
                } else {
                    let _ = stdout_task.await;
                    let _ = stderr_task.await;
                }
                let stats = parser.lock().unwrap().stats();
                let saw_completion_line = parser.lock().unwrap().saw_completion_line();
                return Ok(ExecutionOutcome {
                    exit_code: None,
                    stats,
                    saw_completion_line,
                    duration: start.elapsed(),
                    termination,
                    error,
                });
            }
        };

        let _ = stdout_task.await;
        let _ = stderr_task.await;

        let stats = parser.lock().unwrap().stats();
        let saw_completion_line = parser.lock().unwrap().saw_completion_line();

        Ok(ExecutionOutcome {
            exit_code,
            stats,
            saw_completion_line,
            duration: start.elapsed(),
            termination,
            error,
        })
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Periodically samples CPU time for `pid`; sets `flag` and publishes a
/// [`HangChangedEvent`] whenever usage crosses [`HANG_CPU_THRESHOLD_PERCENT`]
/// for longer than [`HANG_WINDOW`] in either direction. Runs until the
/// process disappears or the caller aborts the task; never terminates the
/// child itself.
async fn watch_for_hang(pid: u32, flag: Arc<AtomicBool>, hang_tx: broadcast::Sender<HangChangedEvent>) {
    let mut system = System::new();
    let sys_pid = Pid::from_u32(pid);
    let mut idle_since: Option<Instant> = None;
    let mut is_hung = false;

    loop {
        tokio::time::sleep(HANG_SAMPLE_INTERVAL).await;
        system.refresh_process(sys_pid);

        let Some(process) = system.process(sys_pid) else {
            return;
        };

        if process.cpu_usage() < HANG_CPU_THRESHOLD_PERCENT {
            let since = idle_since.get_or_insert_with(Instant::now);
            if !is_hung && since.elapsed() >= HANG_WINDOW {
                is_hung = true;
                flag.store(true, Ordering::Relaxed);
                let _ = hang_tx.send(HangChangedEvent { hang_detected: true });
            }
        } else {
            idle_since = None;
            if is_hung {
                is_hung = false;
                flag.store(false, Ordering::Relaxed);
                let _ = hang_tx.send(HangChangedEvent { hang_detected: false });
            }
        }
    }
}

/// The kill escalation ladder: cooperative exit request, grace period,
/// forced kill of the process tree, bounded wait, handle-release
/// verification.
///
/// `force_kill` skips straight to the forced branch: used for timeouts,
/// hangs, and an already-escalated (second-click) stop. Otherwise the child
/// gets a cooperative exit request and [`GRACE_PERIOD`] to act on it; if it
/// hasn't exited by then, this returns [`TerminationOutcome::GracePeriodExpired`]
/// without killing it, leaving escalation to a subsequent call.
async fn terminate_child(
    child: &mut Child,
    target_file: Option<&Utf8Path>,
    force_kill: bool,
) -> Result<TerminationResult, ProcessError> {
    let ladder_start = Instant::now();

    if !force_kill {
        if let Some(pid) = child.id() {
            request_graceful_exit(pid).await;
        }

        return match tokio::time::timeout(GRACE_PERIOD, child.wait()).await {
            Ok(_) => Ok(TerminationResult {
                outcome: TerminationOutcome::ExitedAfterSignal,
                wall_time: ladder_start.elapsed(),
                handle_release_retries: 0,
            }),
            Err(_) => Ok(TerminationResult {
                outcome: TerminationOutcome::GracePeriodExpired,
                wall_time: ladder_start.elapsed(),
                handle_release_retries: 0,
            }),
        };
    }

    // Force-kill the whole tree (covers MO2-wrapped launches, where xEdit is
    // a grandchild of the process we spawned) and the direct child handle.
    if let Some(pid) = child.id() {
        force_kill_tree(pid).await;
    }
    let _ = child.start_kill();

    // Tolerate "already exited" races: the process may have died between
    // our liveness check and the kill call above.
    match tokio::time::timeout(FORCE_KILL_WAIT, child.wait()).await {
        Ok(Ok(_)) | Err(_) => {}
        Ok(Err(_)) => {}
    }

    let retries = poll_handle_release(target_file).await;
    let outcome = match target_file {
        Some(path) if path.exists() && retries >= HANDLE_POLL_MAX_ATTEMPTS => {
            return Err(ProcessError::HandleStillHeld(path.to_path_buf()));
        }
        _ => TerminationOutcome::ForceKilled,
    };

    Ok(TerminationResult { outcome, wall_time: ladder_start.elapsed(), handle_release_retries: retries })
}

/// Ask the process to exit cooperatively, without forcing it. Lets xEdit
/// flush its log/exception files before any tree-level force-kill.
#[cfg(target_os = "windows")]
async fn request_graceful_exit(pid: u32) {
    // Without /F, taskkill asks the process to close rather than forcing it.
    let _ = Command::new("taskkill").args(["/PID", &pid.to_string()]).output().await;
}

#[cfg(not(target_os = "windows"))]
async fn request_graceful_exit(pid: u32) {
    let _ = Command::new("kill").args(["-TERM", &pid.to_string()]).output().await;
}

/// Force-kill a process and its descendants.
#[cfg(target_os = "windows")]
async fn force_kill_tree(pid: u32) {
    let _ = Command::new("taskkill").args(["/PID", &pid.to_string(), "/T", "/F"]).output().await;
}

#[cfg(not(target_os = "windows"))]
async fn force_kill_tree(pid: u32) {
    let _ = Command::new("kill").args(["-KILL", &format!("-{pid}")]).output().await;
    let _ = Command::new("kill").args(["-KILL", &pid.to_string()]).output().await;
}

/// Poll for the target file to become exclusively openable, with
/// exponentially increasing backoff, to close the race where the OS hasn't
/// yet released xEdit's memory-mapped handle on the plugin at the moment
/// the process table shows it as dead.
async fn poll_handle_release(target_file: Option<&Utf8Path>) -> u32 {
    let Some(path) = target_file else {
        return 0;
    };
    if !path.exists() {
        return 0;
    }

    let mut delay = HANDLE_POLL_INITIAL_DELAY;
    for attempt in 0..HANDLE_POLL_MAX_ATTEMPTS {
        if std::fs::OpenOptions::new().write(true).open(path).is_ok() {
            return attempt;
        }
        tokio::time::sleep(delay).await;
        delay *= 2;
    }
    HANDLE_POLL_MAX_ATTEMPTS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[cfg(unix)]
    async fn test_executor_runs_quick_process_to_completion() {
        let executor = ProcessExecutor::new();
        let outcome = executor
            .run(
                "sh",
                &["-c".to_string(), "echo 'Removing: [1] <A.esp>'; echo Done.".to_string()],
                None,
                Duration::from_secs(5),
                None,
            )
            .await
            .unwrap();

        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(outcome.stats.removed, 1);
        assert!(outcome.saw_completion_line);
        assert!(outcome.termination.is_none());
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_executor_times_out_and_kills() {
        let executor = ProcessExecutor::new();
        let outcome = executor
            .run("sh", &["-c".to_string(), "sleep 30".to_string()], None, Duration::from_millis(200), None)
            .await
            .unwrap();

        assert!(outcome.exit_code.is_none());
        assert!(outcome.termination.is_some());
        match outcome.error {
            Some(ProcessError::Timeout(_)) => {}
            other => panic!("expected Timeout error, got {other:?}"),
        }
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_hang_subscription_emits_nothing_for_quick_process() {
        let executor = ProcessExecutor::new();
        let mut hang_rx = executor.subscribe_hang();

        let outcome = executor
            .run("sh", &["-c".to_string(), "echo Done.".to_string()], None, Duration::from_secs(5), None)
            .await
            .unwrap();

        assert_eq!(outcome.exit_code, Some(0));
        assert!(hang_rx.try_recv().is_err(), "a process that never idles should never publish a hang event");
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_request_stop_kills_running_process() {
        let executor = Arc::new(ProcessExecutor::new());
        let runner = Arc::clone(&executor);
        let handle = tokio::spawn(async move {
            runner.run("sh", &["-c".to_string(), "sleep 30".to_string()], None, Duration::from_secs(30), None).await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        let escalated_first = executor.request_stop(false);
        assert!(!escalated_first);

        let outcome = handle.await.unwrap().unwrap();
        assert!(outcome.exit_code.is_none());
        match outcome.error {
            Some(ProcessError::Killed) => {}
            other => panic!("expected Killed error, got {other:?}"),
        }
    }

    #[test]
    fn test_second_stop_request_escalates_to_force() {
        let signal = StopSignal::default();
        assert!(!signal.request(false));
        assert!(signal.request(false));
        assert!(signal.is_force());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_executor_serializes_concurrent_runs() {
        let executor = Arc::new(ProcessExecutor::new());
        let e1 = Arc::clone(&executor);
        let e2 = Arc::clone(&executor);

        let t1 = tokio::spawn(async move {
            e1.run("sh", &["-c".to_string(), "sleep 0.1".to_string()], None, Duration::from_secs(5), None).await
        });
        let t2 = tokio::spawn(async move {
            e2.run("sh", &["-c".to_string(), "sleep 0.1".to_string()], None, Duration::from_secs(5), None).await
        });

        let (r1, r2) = tokio::join!(t1, t2);
        assert!(r1.unwrap().is_ok());
        assert!(r2.unwrap().is_ok());
    }
}
