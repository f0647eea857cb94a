use crate::cli::CommonArgs;
use crate::complexity;
use crate::error::Result;
use crate::git::{GitAccess, GitExecutor, GitRollback};
use crate::model::{BatchOutput, CommittedChange, RepoBatchEntry, RollbackEntry, SCHEMA_VERSION};
use crate::ports::Executor;
use crate::report;
use crate::scheduler::{settle, AllocationMode, AllocationScheduler, BatchConfig, BatchReport, RollbackSummary};
use crate::store::ActivityStore;
use anyhow::Context;
use chrono::Utc;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};

pub struct RunOptions {
    pub repos: Vec<PathBuf>,
    pub total: Option<u32>,
    pub subset: Option<usize>,
    pub discard: bool,
    pub seed: Option<u64>,
    pub json: bool,
}

/// Ticks a spinner after every successful commit unit.
struct ProgressExecutor<E: Executor> {
    inner: E,
    pb: ProgressBar,
}

impl<E: Executor> Executor for ProgressExecutor<E> {
    fn commit(&mut self, repo: &Path) -> Result<CommittedChange> {
        let change = self.inner.commit(repo)?;
        self.pb.inc(1);
        self.pb.set_message(format!("{} commits ({})", self.pb.position(), repo.display()));
        Ok(change)
    }
}

pub fn exec(common: CommonArgs, options: RunOptions) -> anyhow::Result<()> {
    let mut store = ActivityStore::open(&common.stats);

    let config = BatchConfig {
        mode: options.total.map_or(AllocationMode::Random, AllocationMode::FixedTotal),
        keep_on_success: !options.discard,
        subset_size: options.subset,
    };

    let (scheduler_rng, executor_rng) = match options.seed {
        Some(seed) => (StdRng::seed_from_u64(seed), StdRng::seed_from_u64(seed.wrapping_add(1))),
        None => (StdRng::from_entropy(), StdRng::from_entropy()),
    };

    let pb = if options.json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message("Committing...");

    let mut executor = ProgressExecutor {
        inner: GitExecutor::new(executor_rng),
        pb: pb.clone(),
    };

    let mut scheduler = AllocationScheduler::new(scheduler_rng);
    let batch = scheduler
        .run_batch(&options.repos, &config, &GitAccess, &mut executor, &mut store)
        .context("Batch aborted")?;
    pb.finish_with_message(format!("{} commits pushed", batch.total_committed()));

    let rollback = settle(&batch, &config, &mut GitRollback);

    if options.json {
        output_json(&batch, rollback.as_ref())?;
    } else {
        output_summary(&batch, rollback.as_ref());
    }

    if let Some(summary) = &rollback {
        if !summary.is_clean() {
            anyhow::bail!("{} repositories could not be rolled back", summary.failed.len());
        }
    }
    Ok(())
}

fn lossy(p: &Path) -> String {
    p.to_string_lossy().to_string()
}

fn output_json(batch: &BatchReport, rollback: Option<&RollbackSummary>) -> anyhow::Result<()> {
    let output = BatchOutput {
        version: SCHEMA_VERSION,
        generated_at: Utc::now(),
        excluded: batch.excluded.iter().map(|p| lossy(p)).collect(),
        repositories: batch
            .outcomes
            .iter()
            .map(|o| RepoBatchEntry {
                path: lossy(&o.repo),
                allocated: o.allocated,
                committed: o.committed,
                abandoned: o.abandoned,
            })
            .collect(),
        unsaved_commits: batch.unsaved_commits,
        rolled_back: rollback.map(|r| r.reverted.iter().map(|p| lossy(p)).collect()),
        rollback_failures: rollback
            .map(|r| {
                r.failed
                    .iter()
                    .map(|(p, e)| RollbackEntry { path: lossy(p), error: e.clone() })
                    .collect()
            })
            .unwrap_or_default(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn output_summary(batch: &BatchReport, rollback: Option<&RollbackSummary>) {
    println!("{}", style("Batch Summary").bold());
    println!("{}", "─".repeat(50));
    for repo in &batch.excluded {
        println!("{} {}", style("excluded").red(), repo.display());
    }
    for o in &batch.outcomes {
        let status = if o.abandoned {
            style("abandoned").yellow()
        } else {
            style("done").green()
        };
        println!(
            "{:<40} {:>3}/{:<3} {}",
            o.repo.display(),
            o.committed,
            o.allocated,
            status
        );
    }
    println!(
        "Total: {} of {} commits",
        style(batch.total_committed()).cyan(),
        batch.total_allocated()
    );
    if batch.unsaved_commits > 0 {
        println!(
            "{} {} commits were not persisted to the statistics file",
            style("warning:").yellow(),
            batch.unsaved_commits
        );
    }
    if let Some(summary) = rollback {
        println!("Rolled back: {}", summary.reverted.len());
        for (repo, err) in &summary.failed {
            println!("{} {}: {}", style("rollback failed").red(), repo.display(), err);
        }
    }
}

pub fn show_report(common: CommonArgs, json: bool) -> anyhow::Result<()> {
    let store = ActivityStore::open(&common.stats);
    let summary = report::summarize(store.stats(), &lossy(store.path()));
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", style("Activity Report").bold());
        print!("{}", report::render_text(&summary));
    }
    Ok(())
}

pub fn score(common: CommonArgs, repo: PathBuf, file: String, save: bool) -> anyhow::Result<()> {
    let value = if save {
        let mut store = ActivityStore::open(&common.stats);
        let key = repo.to_string_lossy().to_string();
        match store
            .refresh_complexity(&key, &file)
            .context("Failed to store complexity score")?
        {
            Some(v) => v,
            None => {
                eprintln!("{} {file} has no recorded commits in {key}", style("note:").yellow());
                complexity::score_file(&repo.join(&file))
            }
        }
    } else {
        complexity::score_file(&repo.join(&file))
    };
    println!("{value:.2}");
    Ok(())
}
