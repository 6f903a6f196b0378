//! Run configuration

use crate::error::{ReconError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Everything a single reconciliation run needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Name of the first context
    pub context1: String,
    /// Name of the second context
    pub context2: String,
    /// Context definitions keyed by name
    #[serde(default)]
    pub contexts: IndexMap<String, ContextSpec>,
    /// Job-queue file listing the namespaces to compare
    #[serde(default)]
    pub jobs: Option<PathBuf>,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub default_tolerance_percent: f64,
    /// Worker pool size, defaults to available parallelism
    #[serde(default)]
    pub workers: Option<usize>,
    /// Per-job deadline; no deadline when absent
    #[serde(default)]
    pub job_timeout_secs: Option<u64>,
    #[serde(default)]
    pub show_progress: bool,
}

impl RunConfig {
    /// Minimal configuration comparing two named contexts
    pub fn new(context1: impl Into<String>, context2: impl Into<String>) -> Self {
        Self {
            context1: context1.into(),
            context2: context2.into(),
            contexts: IndexMap::new(),
            jobs: None,
            report: ReportConfig::default(),
            default_tolerance_percent: crate::DEFAULT_TOLERANCE_PERCENTAGE,
            workers: None,
            job_timeout_secs: None,
            show_progress: false,
        }
    }

    /// Load configuration from a JSON file.
    ///
    /// Relative paths inside the file are resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ReconError::config(format!("Failed to read config '{}': {}", path.display(), e))
        })?;
        let mut config: RunConfig = serde_json::from_str(&content).map_err(|e| {
            ReconError::config(format!("Invalid config '{}': {}", path.display(), e))
        })?;

        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        config.validate()?;
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };

        if let Some(jobs) = self.jobs.as_mut() {
            rebase(jobs);
        }
        if let Some(file) = self.report.file.as_mut() {
            rebase(file);
        }
        for spec in self.contexts.values_mut() {
            match spec {
                ContextSpec::Directory { path, .. } | ContextSpec::Database { path, .. } => rebase(path),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.context1.trim().is_empty() || self.context2.trim().is_empty() {
            return Err(ReconError::config("context1 and context2 must be set"));
        }
        if self.context1 == self.context2 {
            return Err(ReconError::config(format!(
                "context1 and context2 must differ (both are '{}')",
                self.context1
            )));
        }
        if self.workers == Some(0) {
            return Err(ReconError::config("workers must be greater than 0"));
        }
        if !self.default_tolerance_percent.is_finite() || self.default_tolerance_percent < 0.0 {
            return Err(ReconError::config(format!(
                "default_tolerance_percent must be a non-negative number, got {}",
                self.default_tolerance_percent
            )));
        }
        if self.job_timeout_secs == Some(0) {
            return Err(ReconError::config("job_timeout_secs must be greater than 0"));
        }
        for (name, spec) in &self.contexts {
            if spec.key_columns().is_empty() {
                return Err(ReconError::config(format!(
                    "context '{}' must declare at least one key column",
                    name
                )));
            }
        }
        Ok(())
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(crate::DEFAULT_WORKERS)
        })
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_secs.map(Duration::from_secs)
    }

    /// Report destination, defaulting to a timestamped file name
    pub fn report_destination(&self) -> PathBuf {
        match &self.report.file {
            Some(file) => file.clone(),
            None => PathBuf::from(format!(
                "{}{}{}",
                crate::DEFAULT_REPORT_FILE_NAME,
                chrono::Utc::now().timestamp_millis(),
                self.report.format.unwrap_or_default().extension()
            )),
        }
    }
}

/// Where a context's data lives
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContextSpec {
    /// One data file per namespace (`<namespace>.csv`, `.parquet` or `.json`)
    Directory { path: PathBuf, key_columns: Vec<String> },
    /// A DuckDB database file with one table per namespace
    Database { path: PathBuf, key_columns: Vec<String> },
}

impl ContextSpec {
    pub fn key_columns(&self) -> &[String] {
        match self {
            ContextSpec::Directory { key_columns, .. } | ContextSpec::Database { key_columns, .. } => {
                key_columns
            }
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ContextSpec::Directory { path, .. } | ContextSpec::Database { path, .. } => path,
        }
    }
}

/// Report rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// Explicit format; inferred from the file extension when absent
    #[serde(default)]
    pub format: Option<ReportFormat>,
    #[serde(default)]
    pub options: ReportOptions,
}

fn default_title() -> String {
    "Context Comparison".to_string()
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            subtitle: None,
            file: None,
            format: None,
            options: ReportOptions::default(),
        }
    }
}

impl ReportConfig {
    pub fn resolved_format(&self, destination: &Path) -> ReportFormat {
        self.format.unwrap_or_else(|| ReportFormat::from_path(destination))
    }
}

/// Named presentation switches for the rendered report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportOptions {
    /// Group entries into one section per category
    #[serde(default = "enabled")]
    pub categorize: bool,
    /// Include the detail column
    #[serde(default = "enabled")]
    pub comments: bool,
    /// Render the title block
    #[serde(default = "enabled")]
    pub header: bool,
    /// Include the status column
    #[serde(default = "enabled")]
    pub status: bool,
}

fn enabled() -> bool {
    true
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            categorize: true,
            comments: true,
            header: true,
            status: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Html,
    Json,
}

impl ReportFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ReportFormat::Json,
            _ => ReportFormat::Html,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Html => crate::DEFAULT_REPORT_FILE_EXTENSION,
            ReportFormat::Json => ".json",
        }
    }

    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        match s.to_lowercase().as_str() {
            "html" => Ok(Self::Html),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid report format: {}. Use 'html' or 'json'", s)),
        }
    }
}
