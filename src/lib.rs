//! # ctxrecon
//!
//! Reconciles two independently sourced datasets ("contexts") namespace by
//! namespace: row counts, key sets and column values within a configurable
//! numeric tolerance, aggregated into one categorized report.

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod data;
pub mod dispatcher;
pub mod error;
pub mod job;
pub mod jobs;
pub mod output;
pub mod progress;
pub mod report;
pub mod sink;

pub use config::{ContextSpec, ReportOptions, RunConfig};
pub use context::{CancelToken, ContextDataSource, ContextFactory, ContextRegistry, InMemoryContext, NamespaceData, RowData};
pub use dispatcher::{Dispatcher, RunOutcome};
pub use error::{ReconError, Result};
pub use job::{ComparisonJob, JobOutcome, RunContext};
pub use jobs::{JobConfig, JobSource, JsonJobSource, StaticJobSource};
pub use report::{Report, ReportPublisher};
pub use sink::{Category, ResultEntry, ResultSink, Status};

/// Current report format version
pub const FORMAT_VERSION: &str = "1.0.0";

/// Tolerance applied when neither the job nor the run sets one
pub const DEFAULT_TOLERANCE_PERCENTAGE: f64 = 0.0;

/// Worker count used when available parallelism cannot be determined
pub const DEFAULT_WORKERS: usize = 4;

/// Default report file name prefix, followed by epoch millis and the extension
pub const DEFAULT_REPORT_FILE_NAME: &str = "ContextComparison_";

pub const DEFAULT_REPORT_FILE_EXTENSION: &str = ".html";
