//! Job-queue sources: the namespaces to compare and how to compare them

use crate::error::{ReconError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Comparison settings for one namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub namespace: String,
    /// Columns compared numerically with tolerance
    pub count_columns: Vec<String>,
    /// Columns compared for exact string equality
    pub reference_columns: Vec<String>,
    /// Overrides the run-wide default tolerance when set
    pub tolerance_percent: Option<f64>,
}

impl JobConfig {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            count_columns: Vec::new(),
            reference_columns: Vec::new(),
            tolerance_percent: None,
        }
    }

    pub fn with_count_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.count_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_reference_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reference_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tolerance(mut self, tolerance_percent: f64) -> Self {
        self.tolerance_percent = Some(tolerance_percent);
        self
    }

    /// Effective tolerance given the run-wide default
    pub fn tolerance(&self, default: f64) -> f64 {
        self.tolerance_percent.unwrap_or(default)
    }
}

/// A job record as stored in a job-queue document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(rename = "name")]
    pub namespace: String,
    #[serde(rename = "countColumns", default)]
    pub count_columns: Vec<String>,
    #[serde(rename = "refColumns", default)]
    pub reference_columns: Vec<String>,
    /// Number or numeric string
    #[serde(rename = "tolerancePercent", default, skip_serializing_if = "Option::is_none")]
    pub tolerance_percent: Option<Value>,
}

impl JobRecord {
    /// Convert into a job config.
    ///
    /// An unusable tolerance is dropped with a warning so the run default applies.
    pub fn into_config(self) -> JobConfig {
        let tolerance_percent = match &self.tolerance_percent {
            None | Some(Value::Null) => None,
            Some(raw) => match parse_tolerance(raw) {
                Some(t) => Some(t),
                None => {
                    log::warn!(
                        "Unable to parse tolerance percentage {} for '{}', falling back to default.",
                        raw,
                        self.namespace
                    );
                    None
                }
            },
        };

        JobConfig {
            namespace: self.namespace,
            count_columns: self.count_columns,
            reference_columns: self.reference_columns,
            tolerance_percent,
        }
    }
}

impl From<&JobConfig> for JobRecord {
    fn from(config: &JobConfig) -> Self {
        Self {
            namespace: config.namespace.clone(),
            count_columns: config.count_columns.clone(),
            reference_columns: config.reference_columns.clone(),
            tolerance_percent: config.tolerance_percent.map(Value::from),
        }
    }
}

fn parse_tolerance(raw: &Value) -> Option<f64> {
    let value = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if value.is_finite() && value >= 0.0 {
        Some(value)
    } else {
        None
    }
}

/// Supplies the job records of one run
pub trait JobSource {
    /// Human readable origin, used in logs
    fn describe(&self) -> String;

    /// Consume the source and return every job config
    fn load_jobs(&mut self) -> Result<Vec<JobConfig>>;
}

/// Jobs held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticJobSource {
    jobs: Vec<JobConfig>,
}

impl StaticJobSource {
    pub fn new(jobs: Vec<JobConfig>) -> Self {
        Self { jobs }
    }
}

impl JobSource for StaticJobSource {
    fn describe(&self) -> String {
        format!("{} in-memory jobs", self.jobs.len())
    }

    fn load_jobs(&mut self) -> Result<Vec<JobConfig>> {
        Ok(std::mem::take(&mut self.jobs))
    }
}

/// Jobs read from a JSON array or JSON-lines file
#[derive(Debug, Clone)]
pub struct JsonJobSource {
    path: PathBuf,
}

impl JsonJobSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parse job records from text
    pub fn parse(content: &str) -> Result<Vec<JobRecord>> {
        let trimmed = content.trim_start();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        if trimmed.starts_with('[') {
            return serde_json::from_str(trimmed)
                .map_err(|e| ReconError::job_source(format!("Invalid job array: {}", e)));
        }

        let mut records = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let record: JobRecord = serde_json::from_str(line).map_err(|e| {
                ReconError::job_source(format!("Invalid job record on line {}: {}", line_no + 1, e))
            })?;
            records.push(record);
        }
        Ok(records)
    }

    /// Write job records as a pretty JSON array
    pub fn write(path: &Path, jobs: &[JobConfig]) -> Result<()> {
        let records: Vec<JobRecord> = jobs.iter().map(JobRecord::from).collect();
        fs::write(path, serde_json::to_string_pretty(&records)?)?;
        Ok(())
    }
}

impl JobSource for JsonJobSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load_jobs(&mut self) -> Result<Vec<JobConfig>> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            ReconError::job_source(format!(
                "Failed to read job file '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        let records = Self::parse(&content)?;
        for record in &records {
            if record.namespace.trim().is_empty() {
                return Err(ReconError::job_source(format!(
                    "Job record with empty name in '{}'",
                    self.path.display()
                )));
            }
        }
        Ok(records.into_iter().map(JobRecord::into_config).collect())
    }
}
