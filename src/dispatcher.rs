//! Run orchestration: resolve contexts, fan jobs out to a worker pool,
//! wait for completion and publish the report

use crate::config::RunConfig;
use crate::context::{ContextDataSource, ContextFactory};
use crate::error::{ReconError, Result};
use crate::job::{ComparisonJob, JobOutcome, RunContext};
use crate::jobs::{JobConfig, JobSource};
use crate::progress::ProgressReporter;
use crate::report::{FileReportPublisher, Report, ReportPublisher};
use crate::sink::{Category, ResultSink, RunSummary, Status};
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// What a completed run produced
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub destination: PathBuf,
    pub report: Report,
    /// Jobs actually executed
    pub jobs_run: usize,
    /// Duplicate namespace records that were skipped
    pub jobs_skipped: usize,
}

impl RunOutcome {
    pub fn summary(&self) -> &RunSummary {
        &self.report.summary
    }

    pub fn has_failures(&self) -> bool {
        self.report.has_failures()
    }
}

/// Drives a reconciliation run end to end.
///
/// At most one run is active per dispatcher; a concurrent `run` call is
/// rejected with a warning and does no work.
pub struct Dispatcher {
    factory: Arc<dyn ContextFactory>,
    publisher: Arc<dyn ReportPublisher>,
    active_run: Mutex<Option<Uuid>>,
}

/// Clears the active run marker on every exit path
struct ActiveRunGuard<'a> {
    slot: &'a Mutex<Option<Uuid>>,
}

impl Drop for ActiveRunGuard<'_> {
    fn drop(&mut self) {
        *lock_slot(self.slot) = None;
        log::info!("Cleaning up complete.");
    }
}

fn lock_slot(slot: &Mutex<Option<Uuid>>) -> MutexGuard<'_, Option<Uuid>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Dispatcher {
    pub fn new(factory: Arc<dyn ContextFactory>) -> Self {
        Self {
            factory,
            publisher: Arc::new(FileReportPublisher::default()),
            active_run: Mutex::new(None),
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn ReportPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Id of the run in progress, if any
    pub fn active_run(&self) -> Option<Uuid> {
        *lock_slot(&self.active_run)
    }

    pub fn is_running(&self) -> bool {
        self.active_run().is_some()
    }

    /// Run every job from `source` and publish the report.
    ///
    /// Returns `Ok(None)` when another run is already in progress. Failing to
    /// resolve either context is fatal for the whole run.
    pub fn run(&self, config: &RunConfig, source: &mut dyn JobSource) -> Result<Option<RunOutcome>> {
        let run_id = Uuid::new_v4();
        let _guard = {
            let mut slot = lock_slot(&self.active_run);
            if let Some(current) = *slot {
                log::warn!(
                    "Context comparison already in progress (run {}), ignoring new request.",
                    current
                );
                return Ok(None);
            }
            *slot = Some(run_id);
            ActiveRunGuard {
                slot: &self.active_run,
            }
        };

        config.validate()?;
        log::info!(
            "Starting run {}: {} vs {}",
            run_id,
            config.context1,
            config.context2
        );

        let mut progress = if config.show_progress {
            ProgressReporter::new_for_run()
        } else {
            ProgressReporter::new_minimal()
        };

        let context1 = self.resolve_context(&config.context1)?;
        let context2 = self.resolve_context(&config.context2)?;

        let sink = Arc::new(ResultSink::new());
        let mut run = RunContext::new(context1, context2, Arc::clone(&sink))
            .with_default_tolerance(config.default_tolerance_percent)
            .with_job_timeout(config.job_timeout());
        run.run_id = run_id;

        let jobs = source.load_jobs()?;
        log::info!("Loaded {} job records from {}", jobs.len(), source.describe());
        let (jobs, duplicates) = dedupe_jobs(jobs);
        for namespace in &duplicates {
            log::warn!("Duplicate job record for '{}', skipping", namespace);
            sink.add_result(
                namespace,
                Category::Sanity,
                Status::Skipped,
                Some("Duplicate job record".to_string()),
            );
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_count())
            .thread_name(|i| format!("recon-worker-{}", i))
            .build()
            .map_err(|e| ReconError::config(format!("Failed to build worker pool: {}", e)))?;

        progress.start_jobs(jobs.len() as u64);
        let jobs_run = jobs.len();
        {
            let run = &run;
            let progress = &progress;
            pool.scope(|scope| {
                for job in jobs {
                    scope.spawn(move |_| {
                        let namespace = job.namespace.clone();
                        let outcome = run_contained(job, run);
                        log::debug!("Namespace '{}' finished: {:?}", namespace, outcome);
                        progress.job_finished(&namespace, outcome);
                    });
                }
                log::info!("Waiting for completion.");
            });
        }
        drop(pool);
        progress.finish();

        let report = Report::from_sink(
            &config.report,
            run_id,
            run.context1.name(),
            run.context2.name(),
            jobs_run,
            &sink,
        );
        let destination = config.report_destination();
        self.publisher.publish(&report, &destination)?;

        log::info!(
            "Run {} finished: {} passed, {} failed entries",
            run_id,
            report.summary.total_passed(),
            report.summary.total_failed()
        );

        Ok(Some(RunOutcome {
            run_id,
            destination,
            report,
            jobs_run,
            jobs_skipped: duplicates.len(),
        }))
    }

    fn resolve_context(&self, name: &str) -> Result<Arc<dyn ContextDataSource>> {
        self.factory.resolve(name).ok_or_else(|| {
            log::error!("Context not found: {}", name);
            ReconError::context_not_found(name)
        })
    }
}

/// Run one job, turning a panic inside it into a failed sanity entry
fn run_contained(job: JobConfig, run: &RunContext) -> JobOutcome {
    let namespace = job.namespace.clone();
    match panic::catch_unwind(AssertUnwindSafe(|| ComparisonJob::new(job, run).run())) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::error!("Namespace '{}': job panicked: {}", namespace, message);
            run.sink.add_result(
                &namespace,
                Category::Sanity,
                Status::Failed,
                Some(format!("Job aborted: {}", message)),
            );
            JobOutcome::Aborted
        }
    }
}

/// Keep the first record per namespace; return the names of dropped duplicates
fn dedupe_jobs(jobs: Vec<JobConfig>) -> (Vec<JobConfig>, Vec<String>) {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(jobs.len());
    let mut duplicates = Vec::new();
    for job in jobs {
        if seen.insert(job.namespace.clone()) {
            unique.push(job);
        } else {
            duplicates.push(job.namespace);
        }
    }
    (unique, duplicates)
}
