use crate::decompress::Decompressor;
use crate::encode;
use crate::error::{Error, Result};
use crate::model::{NeedleSet, SearchResult};
use crate::policy::ScanPolicy;
use crate::progress::{ProgressReporter, TaskProgress};
use crate::scanner::{self, ScanContext, Scannable};
use crate::tables::StatsTable;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fmt;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Where a run currently is. Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunPhase {
    Collecting,
    Dispatching,
    Aggregating,
    PostProcessing,
    Encoding,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Collecting => "collecting",
            RunPhase::Dispatching => "dispatching",
            RunPhase::Aggregating => "aggregating",
            RunPhase::PostProcessing => "post-processing",
            RunPhase::Encoding => "encoding",
            RunPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// What to scan for, and where.
#[derive(Debug, Clone, Default)]
pub struct ScanRequest {
    pub roots: Vec<PathBuf>,
    pub ignore_patterns: Vec<String>,
    pub needles: NeedleSet,
    /// Stats mode when set.
    pub stats: Option<StatsTable>,
}

impl ScanRequest {
    pub fn is_stats(&self) -> bool {
        self.stats.is_some()
    }
}

#[derive(Debug, Default)]
pub struct ScanRun {
    pub results: Vec<SearchResult>,
    pub scanned_files: usize,
    pub failed_files: usize,
    pub total_bytes: u64,
    pub duration: Duration,
    /// The run stopped before collecting because there were no needles.
    pub nothing_to_search: bool,
}

/// Runs scans on a worker pool built once and reused for every run.
pub struct ScanEngine {
    pool: ThreadPool,
    decompressor: Decompressor,
}

impl ScanEngine {
    /// `threads == 0` sizes the pool to the machine; `1` scans sequentially.
    pub fn new(threads: usize, decompressor: Decompressor) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("mc-scanner-{}", index))
            .build()
            .map_err(|err| Error::InvalidArgument(format!("cannot start worker pool: {}", err)))?;
        debug!(
            "Worker pool ready with {} threads, {} decompressor",
            pool.current_num_threads(),
            decompressor
        );
        Ok(Self { pool, decompressor })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn decompressor(&self) -> Decompressor {
        self.decompressor
    }

    /// Runs one full scan: collect the haystack, scan every accepted file on
    /// the pool, merge batches under a lock, let the policy post-process,
    /// then optionally encode the merged results as JSON.
    ///
    /// A file that fails, or whose task panics, is logged and contributes
    /// nothing. Only policy and encoding failures abort the run.
    pub fn run(
        &self,
        request: &ScanRequest,
        policy: &dyn ScanPolicy,
        reporter: &dyn ProgressReporter,
        json: Option<&mut dyn Write>,
    ) -> Result<ScanRun> {
        let start = Instant::now();
        if request.needles.is_empty() && !request.is_stats() {
            info!("Nothing to search for.");
            let run = ScanRun {
                nothing_to_search: true,
                ..ScanRun::default()
            };
            reporter.on_run_complete(&run);
            return Ok(run);
        }

        let ctx = ScanContext::new(self.decompressor, &request.needles, request.stats.as_ref());

        reporter.on_phase(RunPhase::Collecting);
        let haystack: Vec<Scannable> = self.pool.install(|| {
            scanner::collect_haystack(&request.roots, &request.ignore_patterns)
                .into_iter()
                .filter(|scannable| policy.accepts(scannable, &ctx))
                .collect()
        });
        let total_bytes: u64 = haystack.iter().map(Scannable::size).sum();
        info!(
            "Scanning {} files ({} bytes) for {} needles ({} expanded)",
            haystack.len(),
            total_bytes,
            request.needles.len(),
            request.needles.expanded_len()
        );
        reporter.on_haystack(haystack.len(), total_bytes);

        reporter.on_phase(RunPhase::Dispatching);
        let tasks = TaskState {
            aggregate: Mutex::new(Vec::new()),
            processed_bytes: AtomicU64::new(0),
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            result_count: AtomicUsize::new(0),
            total: haystack.len(),
            total_bytes,
            start,
        };
        self.pool.install(|| {
            haystack
                .par_iter()
                .for_each(|scannable| tasks.run(scannable, policy, &ctx, reporter));
        });

        reporter.on_phase(RunPhase::Aggregating);
        let failed_files = tasks.failed.into_inner();
        let results = tasks
            .aggregate
            .into_inner()
            .map_err(|_| Error::Policy("result aggregate poisoned".into()))?;

        reporter.on_phase(RunPhase::PostProcessing);
        policy.after(&results)?;

        if let Some(out) = json {
            reporter.on_phase(RunPhase::Encoding);
            encode::write_json(&results, out)?;
        }

        reporter.on_phase(RunPhase::Done);
        let run = ScanRun {
            results,
            scanned_files: haystack.len(),
            failed_files,
            total_bytes,
            duration: start.elapsed(),
            nothing_to_search: false,
        };
        info!(
            "Scan finished in {:.2}s with {} results, {} failed files",
            run.duration.as_secs_f64(),
            run.results.len(),
            run.failed_files
        );
        reporter.on_run_complete(&run);
        Ok(run)
    }
}

struct TaskState {
    aggregate: Mutex<Vec<SearchResult>>,
    processed_bytes: AtomicU64,
    completed: AtomicUsize,
    failed: AtomicUsize,
    result_count: AtomicUsize,
    total: usize,
    total_bytes: u64,
    start: Instant,
}

impl TaskState {
    fn run(
        &self,
        scannable: &Scannable,
        policy: &dyn ScanPolicy,
        ctx: &ScanContext<'_>,
        reporter: &dyn ProgressReporter,
    ) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| policy.scan(scannable, ctx)));
        let results = match outcome {
            Ok(Ok(results)) => results,
            Ok(Err(err)) => {
                error!("Error scanning {}: {}", scannable, err);
                self.failed.fetch_add(1, Ordering::Relaxed);
                reporter.on_task_failed(scannable.path(), &err.to_string());
                Vec::new()
            }
            Err(_) => {
                error!("Scan of {} panicked", scannable);
                self.failed.fetch_add(1, Ordering::Relaxed);
                reporter.on_task_failed(scannable.path(), "scan panicked");
                Vec::new()
            }
        };

        let batch = results.len();
        {
            let mut aggregate = match self.aggregate.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let first = aggregate.len();
            aggregate.extend(results);
            if let Err(err) = policy.on_results(&aggregate[first..]) {
                error!("Result hook failed for {}: {}", scannable, err);
            }
        }

        let processed_bytes =
            self.processed_bytes.fetch_add(scannable.size(), Ordering::Relaxed) + scannable.size();
        let results = self.result_count.fetch_add(batch, Ordering::Relaxed) + batch;
        let completed = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        let elapsed = self.start.elapsed().as_secs_f64();
        let bytes_per_sec = if elapsed > 0.0 {
            processed_bytes as f64 / elapsed
        } else {
            0.0
        };
        reporter.on_task_complete(&TaskProgress {
            completed,
            total: self.total,
            processed_bytes,
            total_bytes: self.total_bytes,
            bytes_per_sec,
            results,
            current: scannable.path(),
        });
    }
}
