//! Per-namespace comparison job

use crate::context::{CancelToken, ContextDataSource, NamespaceData, RowData};
use crate::error::ReconError;
use crate::jobs::JobConfig;
use crate::sink::{Category, ResultSink, Status};
use num_bigint::BigInt;
use num_traits::{Float, Signed, ToPrimitive, Zero};
use std::collections::BTreeSet;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// State shared by every job of one run
pub struct RunContext {
    pub run_id: Uuid,
    pub context1: Arc<dyn ContextDataSource>,
    pub context2: Arc<dyn ContextDataSource>,
    pub sink: Arc<ResultSink>,
    pub default_tolerance_percent: f64,
    pub job_timeout: Option<Duration>,
}

impl RunContext {
    pub fn new(
        context1: Arc<dyn ContextDataSource>,
        context2: Arc<dyn ContextDataSource>,
        sink: Arc<ResultSink>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            context1,
            context2,
            sink,
            default_tolerance_percent: crate::DEFAULT_TOLERANCE_PERCENTAGE,
            job_timeout: None,
        }
    }

    pub fn with_default_tolerance(mut self, tolerance_percent: f64) -> Self {
        self.default_tolerance_percent = tolerance_percent;
        self
    }

    pub fn with_job_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.job_timeout = timeout;
        self
    }
}

/// How a job ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Every configured column on every compared key matched
    Passed,
    /// At least one row-level check failed
    Failed,
    /// Sanity check failed; nothing else was compared
    Aborted,
    /// The job deadline expired
    TimedOut,
}

/// Result of comparing two count column values
#[derive(Debug, Clone, PartialEq)]
pub enum CountComparison {
    Equal,
    WithinTolerance { error_percent: f64 },
    OutsideTolerance { error_percent: f64 },
    Unparseable,
}

impl CountComparison {
    pub fn passed(&self) -> bool {
        matches!(self, Self::Equal | Self::WithinTolerance { .. })
    }
}

/// Compare two integer values with a relative tolerance.
///
/// The error is `|v1 - v2| / |v1| * 100`; a zero `v1` against a nonzero `v2`
/// counts as 100%. Passing requires the error to be strictly below tolerance,
/// decided on exact integers so a value sitting on the tolerance never passes.
pub fn compare_counts(raw1: &str, raw2: &str, tolerance_percent: f64) -> CountComparison {
    let (v1, v2) = match (parse_integer(raw1), parse_integer(raw2)) {
        (Some(v1), Some(v2)) => (v1, v2),
        _ => return CountComparison::Unparseable,
    };

    if v1 == v2 {
        return CountComparison::Equal;
    }

    let diff = (&v1 - &v2).abs();
    let base = v1.abs();
    let error_percent = percentage_error(&diff, &base);
    if below_tolerance(&diff, &base, tolerance_percent) {
        CountComparison::WithinTolerance { error_percent }
    } else {
        CountComparison::OutsideTolerance { error_percent }
    }
}

/// Optional sign followed by ASCII digits; anything else is not a count
fn parse_integer(raw: &str) -> Option<BigInt> {
    let digits = raw.strip_prefix(['+', '-']).unwrap_or(raw);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

fn percentage_error(diff: &BigInt, base: &BigInt) -> f64 {
    if base.is_zero() {
        return 100.0;
    }
    let scaled = (diff * 100u32).to_f64().unwrap_or(f64::INFINITY);
    scaled / base.to_f64().unwrap_or(f64::INFINITY)
}

/// `diff * 100 < tolerance * base`, with the tolerance expanded to its exact
/// binary value
fn below_tolerance(diff: &BigInt, base: &BigInt, tolerance_percent: f64) -> bool {
    if tolerance_percent.is_nan() || tolerance_percent <= 0.0 {
        return false;
    }
    if tolerance_percent.is_infinite() {
        return true;
    }
    if base.is_zero() {
        return 100.0 < tolerance_percent;
    }

    let (mantissa, exponent, _) = tolerance_percent.integer_decode();
    let mut lhs = diff * 100u32;
    let mut rhs = base * BigInt::from(mantissa);
    if exponent >= 0 {
        rhs <<= exponent as usize;
    } else {
        lhs <<= exponent.unsigned_abs() as usize;
    }
    lhs < rhs
}

enum Fetched {
    Found(NamespaceData),
    Missing,
    Unreadable(String),
}

struct DeadlineExceeded;

/// Which side of the comparison a check refers to
#[derive(Clone, Copy)]
enum Side {
    First,
    Second,
}

/// Compares one namespace across both contexts and records the outcome.
///
/// Stages run strictly in order: sanity, row count, key set, per-row columns,
/// aggregate. A sanity failure or an expired deadline ends the job.
pub struct ComparisonJob<'a> {
    config: JobConfig,
    run: &'a RunContext,
    tolerance_percent: f64,
    deadline: Option<Instant>,
    cancel: CancelToken,
}

impl<'a> ComparisonJob<'a> {
    pub fn new(config: JobConfig, run: &'a RunContext) -> Self {
        let tolerance_percent = config.tolerance(run.default_tolerance_percent);
        Self {
            config,
            run,
            tolerance_percent,
            deadline: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    /// Run every stage and return how the job ended
    pub fn run(mut self) -> JobOutcome {
        self.deadline = self.run.job_timeout.map(|t| Instant::now() + t);
        log::debug!("Comparing namespace '{}'", self.namespace());

        let (data1, data2) = match self.check_sanity() {
            Ok(Some(pair)) => pair,
            Ok(None) => return JobOutcome::Aborted,
            Err(DeadlineExceeded) => return JobOutcome::TimedOut,
        };

        // Advisory only; later stages always run.
        self.check_row_count(data1.len(), data2.len());

        let common_keys = self.check_key_set(&data1, &data2);

        let mut all_passed = true;
        for (i, key) in common_keys.iter().enumerate() {
            if self.deadline_passed() {
                self.record_timeout(format!(
                    "Deadline exceeded after comparing {} of {} rows",
                    i,
                    common_keys.len()
                ));
                return JobOutcome::TimedOut;
            }
            if let (Some(row1), Some(row2)) = (data1.get(*key), data2.get(*key)) {
                let row_passed = self.check_row(row1, row2, key);
                all_passed = all_passed && row_passed;
            }
        }

        if all_passed {
            self.add(Category::DataQuality, Status::Passed, None);
            JobOutcome::Passed
        } else {
            JobOutcome::Failed
        }
    }

    fn add(&self, category: Category, status: Status, detail: Option<String>) {
        self.run
            .sink
            .add_result(&self.config.namespace, category, status, detail);
    }

    fn context_name(&self, side: Side) -> &str {
        match side {
            Side::First => self.run.context1.name(),
            Side::Second => self.run.context2.name(),
        }
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.map(|d| Instant::now() >= d).unwrap_or(false)
    }

    fn record_timeout(&self, detail: String) {
        self.cancel.cancel();
        log::warn!("Namespace '{}': {}", self.namespace(), detail);
        self.add(Category::Timeout, Status::Failed, Some(detail));
    }

    fn check_sanity(&self) -> Result<Option<(NamespaceData, NamespaceData)>, DeadlineExceeded> {
        let fetched1 = self.fetch(Side::First)?;
        let fetched2 = self.fetch(Side::Second)?;

        let mut failed = false;
        for (side, fetched) in [(Side::First, &fetched1), (Side::Second, &fetched2)] {
            let detail = match fetched {
                Fetched::Found(_) => continue,
                Fetched::Missing => format!("Not found in {}", self.context_name(side)),
                Fetched::Unreadable(reason) => {
                    format!("Unable to read from {}: {}", self.context_name(side), reason)
                }
            };
            log::error!("Namespace '{}': {}", self.namespace(), detail);
            self.add(Category::Sanity, Status::Failed, Some(detail));
            failed = true;
        }

        match (fetched1, fetched2) {
            (Fetched::Found(data1), Fetched::Found(data2)) if !failed => {
                self.add(Category::Sanity, Status::Passed, None);
                Ok(Some((data1, data2)))
            }
            _ => Ok(None),
        }
    }

    fn fetch(&self, side: Side) -> Result<Fetched, DeadlineExceeded> {
        let source = match side {
            Side::First => &self.run.context1,
            Side::Second => &self.run.context2,
        };

        let result = match self.deadline {
            None => source.namespace_data(self.namespace(), &self.cancel),
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    self.record_fetch_timeout(side);
                    return Err(DeadlineExceeded);
                }
                match self.fetch_with_deadline(source, remaining) {
                    Ok(result) => result,
                    Err(DeadlineExceeded) => {
                        self.record_fetch_timeout(side);
                        return Err(DeadlineExceeded);
                    }
                }
            }
        };

        Ok(match result {
            Ok(Some(data)) => Fetched::Found(data),
            Ok(None) => Fetched::Missing,
            Err(e) => Fetched::Unreadable(e.to_string()),
        })
    }

    /// Run the fetch on a helper thread so a hung source cannot hold the worker
    /// past the deadline. The cancel token is fired when the deadline expires.
    fn fetch_with_deadline(
        &self,
        source: &Arc<dyn ContextDataSource>,
        remaining: Duration,
    ) -> Result<crate::error::Result<Option<NamespaceData>>, DeadlineExceeded> {
        let (tx, rx) = mpsc::channel();
        let source = Arc::clone(source);
        let namespace = self.config.namespace.clone();
        let cancel = self.cancel.clone();

        let spawned = thread::Builder::new()
            .name(format!("fetch-{}", namespace))
            .spawn(move || {
                let _ = tx.send(source.namespace_data(&namespace, &cancel));
            });
        if let Err(e) = spawned {
            return Ok(Err(ReconError::Io(e)));
        }

        match rx.recv_timeout(remaining) {
            Ok(result) => Ok(result),
            Err(RecvTimeoutError::Timeout) => {
                self.cancel.cancel();
                Err(DeadlineExceeded)
            }
            Err(RecvTimeoutError::Disconnected) => Ok(Err(ReconError::data_source(
                "fetch thread terminated without a result",
            ))),
        }
    }

    fn record_fetch_timeout(&self, side: Side) {
        let timeout = self.run.job_timeout.unwrap_or_default();
        self.record_timeout(format!(
            "Deadline of {:?} exceeded while fetching from {}",
            timeout,
            self.context_name(side)
        ));
    }

    fn check_row_count(&self, size1: usize, size2: usize) {
        if size1 == size2 {
            self.add(Category::RowCount, Status::Passed, None);
            return;
        }

        log::error!("Namespace '{}': count of rows doesn't match", self.namespace());
        self.add(
            Category::RowCount,
            Status::Failed,
            Some(format!(
                "{} : {}, {} : {}",
                self.context_name(Side::First),
                size1,
                self.context_name(Side::Second),
                size2
            )),
        );
    }

    /// Returns the keys to compare row by row, sorted
    fn check_key_set<'d>(&self, data1: &'d NamespaceData, data2: &'d NamespaceData) -> Vec<&'d str> {
        let keys1: BTreeSet<&str> = data1.keys().map(String::as_str).collect();
        let keys2: BTreeSet<&str> = data2.keys().map(String::as_str).collect();

        if keys1 == keys2 {
            self.add(Category::KeySet, Status::Passed, None);
            return keys1.into_iter().collect();
        }

        log::error!("Namespace '{}': key sets don't match", self.namespace());
        let only1: Vec<&str> = keys1.difference(&keys2).copied().collect();
        let only2: Vec<&str> = keys2.difference(&keys1).copied().collect();
        self.add(
            Category::KeySet,
            Status::Failed,
            Some(format!(
                "Extra keys in {}: [{}]. Extra keys in {}: [{}]",
                self.context_name(Side::First),
                only1.join(", "),
                self.context_name(Side::Second),
                only2.join(", ")
            )),
        );

        keys1.intersection(&keys2).copied().collect()
    }

    fn check_row(&self, row1: &RowData, row2: &RowData, key: &str) -> bool {
        let mut passed = true;

        for column in &self.config.count_columns {
            if !self.check_presence(row1, row2, column, key) {
                passed = false;
                continue;
            }
            let ok = self.compare_count_values(&row1[column], &row2[column], column, key);
            passed = passed && ok;
        }

        for column in &self.config.reference_columns {
            if !self.check_presence(row1, row2, column, key) {
                passed = false;
                continue;
            }
            let ok = self.compare_reference_values(&row1[column], &row2[column], column, key);
            passed = passed && ok;
        }

        passed
    }

    /// Records a column-list failure for each side missing `column`
    fn check_presence(&self, row1: &RowData, row2: &RowData, column: &str, key: &str) -> bool {
        let mut present = true;
        for (side, row) in [(Side::First, row1), (Side::Second, row2)] {
            if !row.contains_key(column) {
                self.add(
                    Category::ColumnList,
                    Status::Failed,
                    Some(format!(
                        "{} column missing in {} for key: {}",
                        column,
                        self.context_name(side),
                        key
                    )),
                );
                present = false;
            }
        }
        present
    }

    fn compare_count_values(&self, data1: &str, data2: &str, column: &str, key: &str) -> bool {
        let detail = match compare_counts(data1, data2, self.tolerance_percent) {
            CountComparison::Equal | CountComparison::WithinTolerance { .. } => return true,
            CountComparison::Unparseable => {
                log::error!(
                    "Namespace '{}': unable to parse count in {} for key: {}",
                    self.namespace(),
                    column,
                    key
                );
                format!(
                    "Parse exception for {} and key {}. {}: {}, {}: {}",
                    column,
                    key,
                    self.context_name(Side::First),
                    data1,
                    self.context_name(Side::Second),
                    data2
                )
            }
            CountComparison::OutsideTolerance { error_percent } => format!(
                "{:.2}% error for {} and key {}. {}: {}, {}: {}",
                error_percent,
                column,
                key,
                self.context_name(Side::First),
                data1,
                self.context_name(Side::Second),
                data2
            ),
        };

        self.add(Category::CountValues, Status::Failed, Some(detail));
        false
    }

    fn compare_reference_values(&self, data1: &str, data2: &str, column: &str, key: &str) -> bool {
        if data1 == data2 {
            return true;
        }

        self.add(
            Category::ColumnValues,
            Status::Failed,
            Some(format!(
                "Mismatch for {} for key {}. {}: {}, {}: {}",
                column,
                key,
                self.context_name(Side::First),
                data1,
                self.context_name(Side::Second),
                data2
            )),
        );
        false
    }
}
