use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

pub const SCHEMA_VERSION: u32 = 1;

pub const WEEKDAY_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Feature,
    Fix,
    Refactor,
    Docs,
    Test,
}

impl ChangeKind {
    pub const ALL: [ChangeKind; 5] = [
        ChangeKind::Feature,
        ChangeKind::Fix,
        ChangeKind::Refactor,
        ChangeKind::Docs,
        ChangeKind::Test,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Feature => "feature",
            ChangeKind::Fix => "fix",
            ChangeKind::Refactor => "refactor",
            ChangeKind::Docs => "docs",
            ChangeKind::Test => "test",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the executor reports back for one successful commit unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedChange {
    pub file_path: String,
    pub kind: ChangeKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileStats {
    pub commits: u64,
    #[serde(default, with = "crate::util::opt_timestamp")]
    pub last_modified: Option<NaiveDateTime>,
    #[serde(default)]
    pub changes_per_month: BTreeMap<String, u64>,
    #[serde(default)]
    pub complexity_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryStats {
    pub total_commits: u64,
    #[serde(default)]
    pub files: BTreeMap<String, FileStats>,
    #[serde(default, with = "crate::util::opt_timestamp")]
    pub last_commit: Option<NaiveDateTime>,
    #[serde(default)]
    pub commit_types: BTreeMap<String, u64>,
    pub active_hours: [u64; 24],
    /// Index 0 is Monday.
    pub active_days: [u64; 7],
}

impl RepositoryStats {
    pub fn new() -> Self {
        Self {
            total_commits: 0,
            files: BTreeMap::new(),
            last_commit: None,
            commit_types: BTreeMap::new(),
            active_hours: [0; 24],
            active_days: [0; 7],
        }
    }

    /// Busiest hour of day; ties resolve to the earliest hour.
    pub fn peak_hour(&self) -> usize {
        first_max(&self.active_hours)
    }

    /// Busiest weekday (0 = Monday); ties resolve to the earliest day.
    pub fn peak_day(&self) -> usize {
        first_max(&self.active_days)
    }
}

impl Default for RepositoryStats {
    fn default() -> Self {
        Self::new()
    }
}

fn first_max(buckets: &[u64]) -> usize {
    let max = buckets.iter().copied().max().unwrap_or(0);
    buckets.iter().position(|&v| v == max).unwrap_or(0)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStreak {
    pub current: u32,
    pub longest: u32,
    #[serde(default, with = "crate::util::opt_date")]
    pub last_commit_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalStats {
    pub total_commits: u64,
    #[serde(default)]
    pub commit_streaks: CommitStreak,
}

/// The persisted statistics document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsDocument {
    #[serde(default)]
    pub repositories: BTreeMap<String, RepositoryStats>,
    #[serde(flatten)]
    pub global: GlobalStats,
    // Reserved sections, carried through untouched.
    #[serde(default)]
    pub commit_history: Vec<Value>,
    #[serde(default)]
    pub developer_patterns: Map<String, Value>,
    #[serde(default)]
    pub most_active_times: Map<String, Value>,
    #[serde(default)]
    pub file_complexity: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSummary {
    pub path: String,
    pub commits: u64,
    pub last_modified: Option<String>,
    pub complexity_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositorySummary {
    pub path: String,
    pub total_commits: u64,
    pub last_commit: Option<String>,
    pub peak_hour: usize,
    pub peak_day: String,
    pub commit_types: BTreeMap<String, u64>,
    pub files: Vec<FileSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportOutput {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub stats_path: String,
    pub total_commits: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub repositories: Vec<RepositorySummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoBatchEntry {
    pub path: String,
    pub allocated: u32,
    pub committed: u32,
    pub abandoned: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackEntry {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutput {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub excluded: Vec<String>,
    pub repositories: Vec<RepoBatchEntry>,
    pub unsaved_commits: usize,
    pub rolled_back: Option<Vec<String>>,
    pub rollback_failures: Vec<RollbackEntry>,
}
