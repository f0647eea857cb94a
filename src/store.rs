use crate::complexity;
use crate::error::Result;
use crate::model::{ChangeKind, GlobalStats, StatsDocument};
use crate::util::{hour_index, month_key, weekday_index};
use chrono::NaiveDateTime;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_STATS_FILE: &str = "repository_stats.json";

/// Durable commit statistics, rewritten in full after every mutation.
///
/// The store is the single writer of its document. Two processes sharing one
/// file will overwrite each other; callers must serialize access themselves.
pub struct ActivityStore {
    path: PathBuf,
    stats: StatsDocument,
}

impl ActivityStore {
    /// Open the store at `path`, starting empty when it cannot be read.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let stats = Self::load(&path);
        Self { path, stats }
    }

    /// Read the persisted document. Missing, unreadable, or corrupt files
    /// all yield a fresh empty document.
    pub fn load(path: &Path) -> StatsDocument {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no stats file yet, starting empty");
                return StatsDocument::default();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read stats file, starting empty");
                return StatsDocument::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(stats) => stats,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to parse stats file, starting empty");
                StatsDocument::default()
            }
        }
    }

    /// Write the whole document, replacing any previous content.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.path.with_extension("tmp");
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.stats)?;
        writer.flush()?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stats(&self) -> &StatsDocument {
        &self.stats
    }

    pub fn global(&self) -> &GlobalStats {
        &self.stats.global
    }

    /// Record one commit and persist.
    ///
    /// The in-memory document is updated before the write, so an `Err` here
    /// means the commit is counted but not yet durable.
    pub fn record_commit(
        &mut self,
        repo: &str,
        file_path: &str,
        kind: ChangeKind,
        timestamp: NaiveDateTime,
    ) -> Result<()> {
        let repo_stats = self.stats.repositories.entry(repo.to_string()).or_default();
        repo_stats.total_commits += 1;
        repo_stats.last_commit = Some(timestamp);
        *repo_stats.commit_types.entry(kind.as_str().to_string()).or_insert(0) += 1;

        let file_stats = repo_stats.files.entry(file_path.to_string()).or_default();
        file_stats.commits += 1;
        file_stats.last_modified = Some(timestamp);
        *file_stats.changes_per_month.entry(month_key(&timestamp)).or_insert(0) += 1;

        repo_stats.active_hours[hour_index(&timestamp)] += 1;
        repo_stats.active_days[weekday_index(&timestamp)] += 1;

        self.stats.global.total_commits += 1;
        self.stats.global.commit_streaks.update(timestamp.date());

        debug!(repo, file = file_path, kind = %kind, "recorded commit");
        self.save()
    }

    /// Recompute and store the complexity score of a tracked file.
    ///
    /// Relative file paths resolve against the repository path. Returns
    /// `Ok(None)` when the file has no recorded commits.
    pub fn refresh_complexity(&mut self, repo: &str, file_path: &str) -> Result<Option<f64>> {
        let Some(file_stats) = self
            .stats
            .repositories
            .get_mut(repo)
            .and_then(|r| r.files.get_mut(file_path))
        else {
            return Ok(None);
        };

        let score = complexity::score_file(&Path::new(repo).join(file_path));
        file_stats.complexity_score = score;
        self.save()?;
        Ok(Some(score))
    }
}
