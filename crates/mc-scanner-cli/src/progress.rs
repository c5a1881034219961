use colored::*;
use console::Term;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use mc_scanner_core::{ProgressReporter, RunPhase, ScanRun, TaskProgress};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

// The bar currently on screen; log output suspends it while writing.
static ACTIVE_BAR: Mutex<Option<ProgressBar>> = Mutex::new(None);

/// Runs `f` with the active progress bar, if any, cleared from the terminal.
pub fn suspend<F: FnOnce() -> R, R>(f: F) -> R {
    let bar = ACTIVE_BAR.lock().ok().and_then(|guard| guard.clone());
    match bar {
        Some(pb) => pb.suspend(f),
        None => f(),
    }
}

fn set_bar(pb: ProgressBar) {
    if let Ok(mut guard) = ACTIVE_BAR.lock() {
        if let Some(old) = guard.take() {
            old.finish_and_clear();
        }
        *guard = Some(pb);
    }
}

fn finish_bar() {
    let bar = ACTIVE_BAR.lock().ok().and_then(|mut guard| guard.take());
    if let Some(pb) = bar {
        pb.finish_and_clear();
    }
}

/// CLI progress reporter: one bar per run, counting scanned files, with
/// byte throughput and the running result count as its message.
pub struct CliReporter {
    term: Term,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
        }
    }
}

impl Drop for CliReporter {
    fn drop(&mut self) {
        finish_bar();
        let _ = self.term.show_cursor();
    }
}

impl ProgressReporter for CliReporter {
    fn on_phase(&self, phase: RunPhase) {
        debug!("Run phase: {}", phase);
    }

    fn on_haystack(&self, files: usize, total_bytes: u64) {
        let pb = ProgressBar::new(files as u64);
        let style = ProgressStyle::with_template(
            "  {spinner:.cyan} [{bar:30.cyan/dim}] {pos}/{len} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸─")
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        pb.set_style(style);
        pb.set_message(format!("0 B/{} 0 results", HumanBytes(total_bytes)));
        pb.enable_steady_tick(Duration::from_millis(80));
        let _ = self.term.hide_cursor();
        set_bar(pb);
    }

    fn on_task_complete(&self, progress: &TaskProgress<'_>) {
        let bar = ACTIVE_BAR.lock().ok().and_then(|guard| guard.clone());
        if let Some(pb) = bar {
            pb.set_position(progress.completed as u64);
            pb.set_message(format!(
                "{}/{} {}/s {} results",
                HumanBytes(progress.processed_bytes),
                HumanBytes(progress.total_bytes),
                HumanBytes(progress.bytes_per_sec as u64),
                progress.results
            ));
        }
    }

    fn on_run_complete(&self, run: &ScanRun) {
        finish_bar();
        let _ = self.term.show_cursor();
        if run.nothing_to_search {
            return;
        }
        eprintln!(
            "  {} Scan complete: {} files, {} results in {:.2}s",
            "✓".green(),
            run.scanned_files,
            run.results.len(),
            run.duration.as_secs_f64()
        );
    }
}
