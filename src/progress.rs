//! Progress reporting utilities

use crate::job::JobOutcome;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Progress reporter for a comparison run.
///
/// Shared by reference between workers; all updates go through `&self`.
#[derive(Debug)]
pub struct ProgressReporter {
    pub resolve_pb: Option<ProgressBar>,
    pub jobs_pb: Option<ProgressBar>,
    failed: AtomicUsize,
    start_time: std::time::Instant,
}

impl ProgressReporter {
    /// Create progress reporter for context resolution and job execution
    pub fn new_for_run() -> Self {
        Self {
            resolve_pb: Some(create_spinner("Resolving contexts...")),
            jobs_pb: None,
            failed: AtomicUsize::new(0),
            start_time: std::time::Instant::now(),
        }
    }

    /// Create minimal progress reporter (no progress bars)
    pub fn new_minimal() -> Self {
        Self {
            resolve_pb: None,
            jobs_pb: None,
            failed: AtomicUsize::new(0),
            start_time: std::time::Instant::now(),
        }
    }

    /// Finish context resolution and start the job bar
    pub fn start_jobs(&mut self, total: u64) {
        if let Some(pb) = self.resolve_pb.take() {
            pb.finish_with_message("Contexts resolved");
            self.jobs_pb = Some(create_progress_bar(total, "Comparing namespaces"));
        }
    }

    /// Record one completed job
    pub fn job_finished(&self, namespace: &str, outcome: JobOutcome) {
        if outcome != JobOutcome::Passed {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(pb) = &self.jobs_pb {
            pb.set_message(namespace.to_string());
            pb.inc(1);
        }
    }

    /// Namespaces that did not fully pass so far
    pub fn failed_jobs(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn finish(&mut self) {
        let elapsed = self.start_time.elapsed();
        if let Some(pb) = self.resolve_pb.take() {
            pb.finish_and_clear();
        }
        if let Some(pb) = self.jobs_pb.take() {
            pb.finish_with_message(format!(
                "done in {:.1}s, {} namespaces with issues",
                elapsed.as_secs_f64(),
                self.failed_jobs()
            ));
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if let Some(pb) = self.resolve_pb.take() {
            pb.finish_and_clear();
        }
        if let Some(pb) = self.jobs_pb.take() {
            pb.finish_and_clear();
        }
    }
}

/// Create a spinner progress bar
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.green} {msg}")
            .expect("Invalid progress template"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Create a progress bar with known total
fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>7}/{len:7} {eta} {msg}")
            .expect("Invalid progress template")
            .progress_chars("#>-"),
    );
    pb.set_message(message.to_string());
    pb
}
