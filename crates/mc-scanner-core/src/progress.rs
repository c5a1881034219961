use crate::engine::{RunPhase, ScanRun};
use std::path::Path;

/// Running totals handed to the reporter after each scan task.
#[derive(Debug, Clone, Copy)]
pub struct TaskProgress<'a> {
    pub completed: usize,
    pub total: usize,
    pub processed_bytes: u64,
    pub total_bytes: u64,
    pub bytes_per_sec: f64,
    pub results: usize,
    pub current: &'a Path,
}

/// Trait for reporting scan progress.
///
/// The CLI implements it with indicatif. All methods have default no-op
/// implementations and may be called from any worker thread.
pub trait ProgressReporter: Send + Sync {
    fn on_phase(&self, _phase: RunPhase) {}
    fn on_haystack(&self, _files: usize, _total_bytes: u64) {}
    fn on_task_complete(&self, _progress: &TaskProgress<'_>) {}
    fn on_task_failed(&self, _path: &Path, _error: &str) {}
    fn on_run_complete(&self, _run: &ScanRun) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
