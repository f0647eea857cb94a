use crate::counts::{random_count, split_total};
use crate::error::{PulseError, Result};
use crate::ports::{AccessChecker, Executor, Rollbacker};
use crate::store::ActivityStore;
use chrono::{Local, NaiveDateTime};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationMode {
    /// Independent exponential draw per repository.
    Random,
    /// Distribute exactly this many commits over the selected repositories.
    FixedTotal(u32),
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub mode: AllocationMode,
    /// When false the batch is rolled back after it completes.
    pub keep_on_success: bool,
    /// Fixed subset size; drawn uniformly from `1..=N` when unset.
    pub subset_size: Option<usize>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            mode: AllocationMode::Random,
            keep_on_success: true,
            subset_size: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoPlan {
    pub repo: PathBuf,
    pub allocated: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoOutcome {
    pub repo: PathBuf,
    pub allocated: u32,
    pub committed: u32,
    /// Set when a failed commit cut this repository's allocation short.
    pub abandoned: bool,
}

/// Repositories that received at least one commit, with how many.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackSet {
    commits: BTreeMap<PathBuf, u32>,
}

impl RollbackSet {
    pub fn add(&mut self, repo: &Path) {
        *self.commits.entry(repo.to_path_buf()).or_insert(0) += 1;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, u32)> {
        self.commits.iter().map(|(repo, n)| (repo.as_path(), *n))
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub excluded: Vec<PathBuf>,
    pub outcomes: Vec<RepoOutcome>,
    /// Commits that were recorded in memory but could not be persisted.
    pub unsaved_commits: usize,
    pub rollback_set: RollbackSet,
}

impl BatchReport {
    pub fn total_allocated(&self) -> u32 {
        self.outcomes.iter().map(|o| o.allocated).sum()
    }

    pub fn total_committed(&self) -> u32 {
        self.outcomes.iter().map(|o| o.committed).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackSummary {
    pub reverted: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl RollbackSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

type Clock = Box<dyn Fn() -> NaiveDateTime>;

/// Plans and drives one batch of commits, one repository at a time.
pub struct AllocationScheduler<R: Rng> {
    rng: R,
    clock: Clock,
}

impl<R: Rng> AllocationScheduler<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            clock: Box::new(|| Local::now().naive_local()),
        }
    }

    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> NaiveDateTime + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    /// Split candidates into (accessible, excluded).
    pub fn filter_accessible(
        candidates: &[PathBuf],
        access: &dyn AccessChecker,
    ) -> (Vec<PathBuf>, Vec<PathBuf>) {
        let mut accessible = Vec::new();
        let mut excluded = Vec::new();
        for repo in candidates {
            info!(repo = %repo.display(), "checking push access");
            if access.can_push(repo) {
                accessible.push(repo.clone());
            } else {
                error!(repo = %repo.display(), "repository is not pushable, excluding it");
                excluded.push(repo.clone());
            }
        }
        (accessible, excluded)
    }

    /// Pick a random subset of `accessible` and assign commit counts.
    pub fn plan(&mut self, accessible: &[PathBuf], config: &BatchConfig) -> Result<Vec<RepoPlan>> {
        if accessible.is_empty() {
            return Err(PulseError::NoAvailableRepositories);
        }

        let size = match (config.subset_size, config.mode) {
            (Some(n), _) => n.clamp(1, accessible.len()),
            // Never draw more repositories than a fixed budget can cover.
            (None, AllocationMode::FixedTotal(total)) => {
                let cap = accessible.len().min(total.max(1) as usize);
                self.rng.gen_range(1..=cap)
            }
            (None, AllocationMode::Random) => self.rng.gen_range(1..=accessible.len()),
        };

        let mut selected = accessible.to_vec();
        selected.shuffle(&mut self.rng);
        selected.truncate(size);

        let counts = match config.mode {
            AllocationMode::FixedTotal(total) => {
                if (total as usize) < selected.len() {
                    return Err(PulseError::InsufficientBudget {
                        total,
                        repos: selected.len(),
                    });
                }
                split_total(total, selected.len(), &mut self.rng)
            }
            AllocationMode::Random => selected
                .iter()
                .map(|_| random_count(&mut self.rng))
                .collect(),
        };

        info!(repos = selected.len(), "selected repositories for batch");
        Ok(selected
            .into_iter()
            .zip(counts)
            .map(|(repo, allocated)| RepoPlan { repo, allocated })
            .collect())
    }

    /// Run one batch end to end.
    ///
    /// Fails before touching anything when no candidate is pushable or the
    /// budget cannot cover the selection. After that, failures stay local to
    /// the repository they happen in.
    pub fn run_batch(
        &mut self,
        candidates: &[PathBuf],
        config: &BatchConfig,
        access: &dyn AccessChecker,
        executor: &mut dyn Executor,
        store: &mut ActivityStore,
    ) -> Result<BatchReport> {
        let (accessible, excluded) = Self::filter_accessible(candidates, access);
        if accessible.is_empty() {
            error!("no available repositories, aborting batch");
            return Err(PulseError::NoAvailableRepositories);
        }

        let plans = self.plan(&accessible, config)?;
        let mut report = BatchReport {
            excluded,
            ..BatchReport::default()
        };

        for plan in plans {
            let key = plan.repo.to_string_lossy().to_string();
            info!(repo = %key, commits = plan.allocated, "processing repository");

            let mut outcome = RepoOutcome {
                repo: plan.repo.clone(),
                allocated: plan.allocated,
                committed: 0,
                abandoned: false,
            };

            for unit in 0..plan.allocated {
                let change = match executor.commit(&plan.repo) {
                    Ok(change) => change,
                    Err(e) => {
                        error!(repo = %key, unit = unit + 1, error = %e, "commit failed, abandoning repository");
                        outcome.abandoned = true;
                        break;
                    }
                };

                outcome.committed += 1;
                report.rollback_set.add(&plan.repo);

                let now = (self.clock)();
                if let Err(e) = store.record_commit(&key, &change.file_path, change.kind, now) {
                    warn!(repo = %key, error = %e, "commit recorded in memory only");
                    report.unsaved_commits += 1;
                }
            }

            report.outcomes.push(outcome);
        }

        info!(
            allocated = report.total_allocated(),
            committed = report.total_committed(),
            "batch finished"
        );
        Ok(report)
    }
}

/// Revert every repository in `set` once, best effort.
///
/// Failures are collected per repository and never retried.
pub fn rollback(set: &RollbackSet, rollbacker: &mut dyn Rollbacker) -> RollbackSummary {
    let mut summary = RollbackSummary::default();
    for (repo, count) in set.iter() {
        match rollbacker.revert(repo, count) {
            Ok(()) => {
                info!(repo = %repo.display(), commits = count, "rolled back");
                summary.reverted.push(repo.to_path_buf());
            }
            Err(e) => {
                error!(repo = %repo.display(), error = %e, "rollback failed");
                summary.failed.push((repo.to_path_buf(), e.to_string()));
            }
        }
    }
    summary
}

/// Apply the keep-or-discard decision from `config` to a finished batch.
pub fn settle(
    report: &BatchReport,
    config: &BatchConfig,
    rollbacker: &mut dyn Rollbacker,
) -> Option<RollbackSummary> {
    if config.keep_on_success || report.rollback_set.is_empty() {
        return None;
    }
    Some(rollback(&report.rollback_set, rollbacker))
}
