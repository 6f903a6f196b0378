//! Thread-safe categorized result aggregation

use blake3::Hasher;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, MutexGuard};

/// A named dimension of the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Sanity,
    RowCount,
    KeySet,
    ColumnList,
    CountValues,
    ColumnValues,
    DataQuality,
    Timeout,
}

impl Category {
    /// All categories in report order
    pub const ALL: [Category; 8] = [
        Category::Sanity,
        Category::RowCount,
        Category::KeySet,
        Category::ColumnList,
        Category::CountValues,
        Category::ColumnValues,
        Category::DataQuality,
        Category::Timeout,
    ];

    /// Human readable label used by report renderers
    pub fn label(&self) -> &'static str {
        match self {
            Category::Sanity => "Sanity",
            Category::RowCount => "Count of rows",
            Category::KeySet => "Key set comparison",
            Category::ColumnList => "Column sanity",
            Category::CountValues => "Count column data",
            Category::ColumnValues => "Other column data",
            Category::DataQuality => "Data quality",
            Category::Timeout => "Timeout",
        }
    }

    /// Stable machine identifier
    pub fn key(&self) -> &'static str {
        match self {
            Category::Sanity => "sanity",
            Category::RowCount => "row_count",
            Category::KeySet => "key_set",
            Category::ColumnList => "column_list",
            Category::CountValues => "count_values",
            Category::ColumnValues => "column_values",
            Category::DataQuality => "data_quality",
            Category::Timeout => "timeout",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Passed,
    Failed,
    Skipped,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::Passed => "Passed",
            Status::Failed => "Failed",
            Status::Skipped => "Skipped",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One reported outcome
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResultEntry {
    pub namespace: String,
    pub category: Category,
    pub status: Status,
    pub detail: Option<String>,
}

/// Entries grouped by category, in report order
pub type CategorizedResults = IndexMap<Category, Vec<ResultEntry>>;

/// Single append target shared by all concurrently running jobs.
///
/// Every `add_result` call takes the lock once, so an entry is never observed
/// half-written and no update is lost.
#[derive(Debug)]
pub struct ResultSink {
    entries: Mutex<CategorizedResults>,
}

impl Default for ResultSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultSink {
    pub fn new() -> Self {
        let mut entries = IndexMap::with_capacity(Category::ALL.len());
        for category in Category::ALL {
            entries.insert(category, Vec::new());
        }
        Self {
            entries: Mutex::new(entries),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CategorizedResults> {
        // A panicking writer cannot leave a half-pushed entry behind, so the
        // data is still consistent after poisoning.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append one result
    pub fn add_result(
        &self,
        namespace: &str,
        category: Category,
        status: Status,
        detail: Option<String>,
    ) {
        let entry = ResultEntry {
            namespace: namespace.to_string(),
            category,
            status,
            detail,
        };
        self.lock().entry(category).or_default().push(entry);
    }

    /// Copy of all entries grouped by category
    pub fn categorized(&self) -> CategorizedResults {
        self.lock().clone()
    }

    /// Flat copy of all entries in category order
    pub fn entries(&self) -> Vec<ResultEntry> {
        self.lock().values().flatten().cloned().collect()
    }

    /// Per-category status counts
    pub fn summary(&self) -> RunSummary {
        let guard = self.lock();
        let mut summary = RunSummary::default();
        for (category, entries) in guard.iter() {
            let counts = summary.categories.entry(*category).or_default();
            for entry in entries {
                counts.record(entry.status);
            }
        }
        summary
    }

    /// Order-independent digest of the recorded content.
    ///
    /// Two runs that produced the same entries in any order share a digest.
    pub fn digest(&self) -> String {
        let mut entries = self.entries();
        entries.sort();

        let mut hasher = Hasher::new();
        for entry in &entries {
            hasher.update(entry.namespace.as_bytes());
            hasher.update(b"|");
            hasher.update(entry.category.key().as_bytes());
            hasher.update(b"|");
            hasher.update(entry.status.label().as_bytes());
            hasher.update(b"|");
            match &entry.detail {
                Some(detail) => {
                    hasher.update(b"+");
                    hasher.update(detail.as_bytes());
                }
                None => {
                    hasher.update(b"-");
                }
            }
            hasher.update(b"||");
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Status counts for one category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl StatusCounts {
    fn record(&mut self, status: Status) {
        match status {
            Status::Passed => self.passed += 1,
            Status::Failed => self.failed += 1,
            Status::Skipped => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }
}

/// Aggregated counts across a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub categories: IndexMap<Category, StatusCounts>,
}

impl RunSummary {
    pub fn total_failed(&self) -> usize {
        self.categories.values().map(|c| c.failed).sum()
    }

    pub fn total_passed(&self) -> usize {
        self.categories.values().map(|c| c.passed).sum()
    }

    pub fn has_failures(&self) -> bool {
        self.total_failed() > 0
    }

    pub fn counts(&self, category: Category) -> StatusCounts {
        self.categories.get(&category).copied().unwrap_or_default()
    }
}
