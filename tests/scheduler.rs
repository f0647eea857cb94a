use chrono::{NaiveDate, NaiveDateTime};
use commitpulse::error::{PulseError, Result};
use commitpulse::model::{ChangeKind, CommittedChange};
use commitpulse::ports::{AccessChecker, Executor, Rollbacker};
use commitpulse::scheduler::{
    rollback, settle, AllocationMode, AllocationScheduler, BatchConfig,
};
use commitpulse::store::ActivityStore;
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

struct AllowList(HashSet<PathBuf>);

impl AccessChecker for AllowList {
    fn can_push(&self, repo: &Path) -> bool {
        self.0.contains(repo)
    }
}

/// Succeeds unless the repository has a failure scheduled at that call number.
#[derive(Default)]
struct FakeExecutor {
    calls: Vec<PathBuf>,
    fail_at: HashMap<PathBuf, usize>,
}

impl Executor for FakeExecutor {
    fn commit(&mut self, repo: &Path) -> Result<CommittedChange> {
        self.calls.push(repo.to_path_buf());
        let nth = self.calls.iter().filter(|p| p.as_path() == repo).count();
        if self.fail_at.get(repo) == Some(&nth) {
            return Err(PulseError::Executor {
                repo: repo.to_string_lossy().to_string(),
                message: "push rejected".to_string(),
            });
        }
        Ok(CommittedChange {
            file_path: "main.py".to_string(),
            kind: ChangeKind::Feature,
        })
    }
}

#[derive(Default)]
struct FakeRollback {
    calls: Vec<(PathBuf, u32)>,
    broken: HashSet<PathBuf>,
}

impl Rollbacker for FakeRollback {
    fn revert(&mut self, repo: &Path, count: u32) -> Result<()> {
        self.calls.push((repo.to_path_buf(), count));
        if self.broken.contains(repo) {
            return Err(PulseError::Rollback {
                repo: repo.to_string_lossy().to_string(),
                message: "force push denied".to_string(),
            });
        }
        Ok(())
    }
}

fn repos(names: &[&str]) -> Vec<PathBuf> {
    names.iter().map(|n| PathBuf::from(format!("/repos/{n}"))).collect()
}

fn fixed_clock() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap()
}

fn scheduler(seed: u64) -> AllocationScheduler<StdRng> {
    AllocationScheduler::new(StdRng::seed_from_u64(seed)).with_clock(fixed_clock)
}

#[test]
fn fixed_budget_is_spread_over_forced_subset() {
    let dir = tempdir().unwrap();
    let mut store = ActivityStore::open(dir.path().join("stats.json"));
    let candidates = repos(&["a", "b", "c"]);
    let access = AllowList(candidates.iter().cloned().collect());
    let mut executor = FakeExecutor::default();
    let config = BatchConfig {
        mode: AllocationMode::FixedTotal(5),
        keep_on_success: true,
        subset_size: Some(3),
    };

    for seed in 0..20 {
        let report = scheduler(seed)
            .run_batch(&candidates, &config, &access, &mut executor, &mut store)
            .unwrap();
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.total_allocated(), 5);
        assert!(report.outcomes.iter().all(|o| o.allocated >= 1));
        assert_eq!(report.total_committed(), 5);
    }

    assert_eq!(executor.calls.len(), 100);
    assert_eq!(store.global().total_commits, 100);
}

#[test]
fn random_mode_selects_non_empty_subset() {
    let dir = tempdir().unwrap();
    let mut store = ActivityStore::open(dir.path().join("stats.json"));
    let candidates = repos(&["a", "b", "c", "d"]);
    let access = AllowList(candidates.iter().cloned().collect());

    for seed in 0..20 {
        let mut executor = FakeExecutor::default();
        let report = scheduler(seed)
            .run_batch(&candidates, &BatchConfig::default(), &access, &mut executor, &mut store)
            .unwrap();
        let n = report.outcomes.len();
        assert!((1..=4).contains(&n));
        let distinct: HashSet<_> = report.outcomes.iter().map(|o| o.repo.clone()).collect();
        assert_eq!(distinct.len(), n);
        assert!(report.outcomes.iter().all(|o| (1..=50).contains(&o.allocated)));
        assert_eq!(executor.calls.len() as u32, report.total_allocated());
    }
}

#[test]
fn inaccessible_repositories_are_excluded() {
    let dir = tempdir().unwrap();
    let mut store = ActivityStore::open(dir.path().join("stats.json"));
    let candidates = repos(&["a", "b"]);
    let access = AllowList(repos(&["b"]).into_iter().collect());
    let mut executor = FakeExecutor::default();
    let config = BatchConfig {
        mode: AllocationMode::FixedTotal(3),
        ..BatchConfig::default()
    };

    let report = scheduler(3)
        .run_batch(&candidates, &config, &access, &mut executor, &mut store)
        .unwrap();
    assert_eq!(report.excluded, repos(&["a"]));
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].repo, repos(&["b"])[0]);
    assert_eq!(report.outcomes[0].committed, 3);
}

#[test]
fn no_accessible_repository_aborts_before_any_work() {
    let dir = tempdir().unwrap();
    let stats_path = dir.path().join("stats.json");
    let mut store = ActivityStore::open(&stats_path);
    let candidates = repos(&["a", "b"]);
    let access = AllowList(HashSet::new());
    let mut executor = FakeExecutor::default();

    let result = scheduler(1).run_batch(
        &candidates,
        &BatchConfig::default(),
        &access,
        &mut executor,
        &mut store,
    );
    assert!(matches!(result, Err(PulseError::NoAvailableRepositories)));
    assert!(executor.calls.is_empty());
    assert_eq!(store.global().total_commits, 0);
    assert!(!stats_path.exists());
}

#[test]
fn budget_smaller_than_subset_aborts() {
    let dir = tempdir().unwrap();
    let mut store = ActivityStore::open(dir.path().join("stats.json"));
    let candidates = repos(&["a", "b", "c"]);
    let access = AllowList(candidates.iter().cloned().collect());
    let mut executor = FakeExecutor::default();
    let config = BatchConfig {
        mode: AllocationMode::FixedTotal(2),
        keep_on_success: true,
        subset_size: Some(3),
    };

    let result = scheduler(1).run_batch(&candidates, &config, &access, &mut executor, &mut store);
    assert!(matches!(
        result,
        Err(PulseError::InsufficientBudget { total: 2, repos: 3 })
    ));
    assert!(executor.calls.is_empty());
}

#[test]
fn small_budget_caps_random_subset() {
    let candidates = repos(&["a", "b", "c", "d", "e"]);
    let config = BatchConfig {
        mode: AllocationMode::FixedTotal(2),
        ..BatchConfig::default()
    };
    for seed in 0..20 {
        let plans = scheduler(seed).plan(&candidates, &config).unwrap();
        assert!(plans.len() <= 2);
        assert_eq!(plans.iter().map(|p| p.allocated).sum::<u32>(), 2);
    }
}

#[test]
fn executor_failure_abandons_only_that_repository() {
    let dir = tempdir().unwrap();
    let mut store = ActivityStore::open(dir.path().join("stats.json"));
    let candidates = repos(&["a", "b"]);
    let access = AllowList(candidates.iter().cloned().collect());
    let mut executor = FakeExecutor::default();
    executor.fail_at.insert(candidates[1].clone(), 1);
    let config = BatchConfig {
        mode: AllocationMode::FixedTotal(6),
        keep_on_success: true,
        subset_size: Some(2),
    };

    let report = scheduler(9)
        .run_batch(&candidates, &config, &access, &mut executor, &mut store)
        .unwrap();

    let a = report.outcomes.iter().find(|o| o.repo == candidates[0]).unwrap();
    let b = report.outcomes.iter().find(|o| o.repo == candidates[1]).unwrap();
    assert_eq!(a.committed, a.allocated);
    assert!(!a.abandoned);
    assert_eq!(b.committed, 0);
    assert!(b.abandoned);

    // One failed attempt, no retries.
    let b_calls = executor.calls.iter().filter(|p| **p == candidates[1]).count();
    assert_eq!(b_calls, 1);

    assert_eq!(report.rollback_set.len(), 1);
    assert_eq!(store.global().total_commits, u64::from(a.committed));
}

#[test]
fn failure_after_successes_rolls_back_only_the_pushed_commits() {
    let dir = tempdir().unwrap();
    let mut store = ActivityStore::open(dir.path().join("stats.json"));
    let candidates = repos(&["a"]);
    let access = AllowList(candidates.iter().cloned().collect());
    let mut executor = FakeExecutor::default();
    executor.fail_at.insert(candidates[0].clone(), 3);
    let config = BatchConfig {
        mode: AllocationMode::FixedTotal(5),
        keep_on_success: false,
        subset_size: Some(1),
    };

    let report = scheduler(13)
        .run_batch(&candidates, &config, &access, &mut executor, &mut store)
        .unwrap();

    let outcome = &report.outcomes[0];
    assert_eq!(outcome.allocated, 5);
    assert_eq!(outcome.committed, 2);
    assert!(outcome.abandoned);
    assert_eq!(executor.calls.len(), 3);
    assert_eq!(report.rollback_set.iter().collect::<Vec<_>>(), vec![(candidates[0].as_path(), 2)]);
    assert_eq!(store.global().total_commits, 2);

    let mut rollbacker = FakeRollback::default();
    let summary = settle(&report, &config, &mut rollbacker).unwrap();
    assert_eq!(rollbacker.calls, vec![(candidates[0].clone(), 2)]);
    assert!(summary.is_clean());
}

#[test]
fn unsaved_commits_still_join_the_rollback_set() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "").unwrap();
    let mut store = ActivityStore::open(blocker.join("stats.json"));
    let candidates = repos(&["a"]);
    let access = AllowList(candidates.iter().cloned().collect());
    let mut executor = FakeExecutor::default();
    let config = BatchConfig {
        mode: AllocationMode::FixedTotal(2),
        ..BatchConfig::default()
    };

    let report = scheduler(5)
        .run_batch(&candidates, &config, &access, &mut executor, &mut store)
        .unwrap();
    assert_eq!(report.unsaved_commits, 2);
    assert_eq!(report.total_committed(), 2);
    assert_eq!(report.rollback_set.iter().collect::<Vec<_>>(), vec![(candidates[0].as_path(), 2)]);
}

#[test]
fn discard_reverts_once_per_repository() {
    let dir = tempdir().unwrap();
    let mut store = ActivityStore::open(dir.path().join("stats.json"));
    let candidates = repos(&["a", "b"]);
    let access = AllowList(candidates.iter().cloned().collect());
    let mut executor = FakeExecutor::default();
    let config = BatchConfig {
        mode: AllocationMode::FixedTotal(4),
        keep_on_success: false,
        subset_size: Some(2),
    };

    let report = scheduler(11)
        .run_batch(&candidates, &config, &access, &mut executor, &mut store)
        .unwrap();
    assert_eq!(report.total_committed(), 4);

    let mut rollbacker = FakeRollback::default();
    let summary = settle(&report, &config, &mut rollbacker).unwrap();

    assert_eq!(rollbacker.calls.len(), 2);
    assert_eq!(rollbacker.calls.iter().map(|(_, n)| n).sum::<u32>(), 4);
    assert!(summary.is_clean());
    assert_eq!(summary.reverted.len(), 2);
}

#[test]
fn keep_skips_rollback() {
    let dir = tempdir().unwrap();
    let mut store = ActivityStore::open(dir.path().join("stats.json"));
    let candidates = repos(&["a"]);
    let access = AllowList(candidates.iter().cloned().collect());
    let mut executor = FakeExecutor::default();
    let config = BatchConfig::default();

    let report = scheduler(2)
        .run_batch(&candidates, &config, &access, &mut executor, &mut store)
        .unwrap();
    let mut rollbacker = FakeRollback::default();
    assert!(settle(&report, &config, &mut rollbacker).is_none());
    assert!(rollbacker.calls.is_empty());
}

#[test]
fn rollback_failures_are_reported_per_repository() {
    let dir = tempdir().unwrap();
    let mut store = ActivityStore::open(dir.path().join("stats.json"));
    let candidates = repos(&["a", "b", "c"]);
    let access = AllowList(candidates.iter().cloned().collect());
    let mut executor = FakeExecutor::default();
    let config = BatchConfig {
        mode: AllocationMode::FixedTotal(3),
        keep_on_success: false,
        subset_size: Some(3),
    };
    let report = scheduler(4)
        .run_batch(&candidates, &config, &access, &mut executor, &mut store)
        .unwrap();

    let mut rollbacker = FakeRollback::default();
    rollbacker.broken.insert(candidates[1].clone());
    let summary = rollback(&report.rollback_set, &mut rollbacker);

    assert_eq!(rollbacker.calls.len(), 3);
    assert_eq!(summary.reverted.len(), 2);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, candidates[1]);
    assert!(summary.failed[0].1.contains("force push denied"));
}
