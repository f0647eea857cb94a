use super::repo::GitRepo;
use crate::error::{PulseError, Result};
use crate::model::{ChangeKind, CommittedChange};
use crate::ports::{AccessChecker, Executor, Rollbacker};
use crate::util::TIMESTAMP_FORMAT;
use chrono::Local;
use rand::seq::SliceRandom;
use rand::Rng;
use std::fs;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Access check backed by `git push --dry-run`.
pub struct GitAccess;

impl AccessChecker for GitAccess {
    fn can_push(&self, repo: &Path) -> bool {
        match GitRepo::open(repo).and_then(|r| r.push_dry_run()) {
            Ok(()) => true,
            Err(e) => {
                warn!(repo = %repo.display(), error = %e, "push dry-run failed");
                false
            }
        }
    }
}

/// Touches one random source file per call, then commits and pushes only that file.
///
/// A unit that fails at any step leaves the branch, index and file as they were.
pub struct GitExecutor<R: Rng> {
    rng: R,
}

impl<R: Rng> GitExecutor<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> Executor for GitExecutor<R> {
    fn commit(&mut self, repo: &Path) -> Result<CommittedChange> {
        let git = GitRepo::open(repo)?;
        let files = git.source_files();
        let file = files.choose(&mut self.rng).ok_or_else(|| PulseError::Executor {
            repo: repo.to_string_lossy().to_string(),
            message: "no files with supported extensions".to_string(),
        })?;
        let kind = *ChangeKind::ALL
            .choose(&mut self.rng)
            .unwrap_or(&ChangeKind::Feature);

        let relative = file
            .strip_prefix(git.path())
            .unwrap_or(file)
            .to_string_lossy()
            .replace('\\', "/");
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| relative.clone());

        let original = fs::read(file)?;
        insert_marker(file, kind, &mut self.rng)?;

        if let Err(e) = git
            .stage(&relative)
            .and_then(|_| git.commit_path(&format!("{kind}: update {name}"), &relative))
        {
            restore(&git, file, &relative, &original, false);
            return Err(e);
        }
        if let Err(e) = git.push() {
            restore(&git, file, &relative, &original, true);
            return Err(e);
        }

        if let Ok(id) = git.head_id() {
            debug!(repo = %repo.display(), commit = %id, "pushed commit");
        }

        Ok(CommittedChange {
            file_path: relative,
            kind,
        })
    }
}

/// Rollback via `git reset --hard HEAD~N` and a force push.
pub struct GitRollback;

impl Rollbacker for GitRollback {
    fn revert(&mut self, repo: &Path, count: u32) -> Result<()> {
        let wrap = |e: PulseError| PulseError::Rollback {
            repo: repo.to_string_lossy().to_string(),
            message: e.to_string(),
        };
        let git = GitRepo::open(repo).map_err(wrap)?;
        git.reset_and_force_push(count).map_err(wrap)?;
        if let Ok(id) = git.head_id() {
            info!(repo = %repo.display(), head = %id, "history restored");
        }
        Ok(())
    }
}

fn comment_prefix(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("py") => "#",
        Some("sql") => "--",
        _ => "//",
    }
}

/// Put the work tree back the way it was before a failed commit unit.
///
/// With `committed` set the unpushed local commit is dropped first, so the
/// branch never carries a commit the scheduler did not count.
fn restore(git: &GitRepo, file: &Path, relative: &str, original: &[u8], committed: bool) {
    if committed {
        if let Err(e) = git.drop_last_commit() {
            error!(file = relative, error = %e, "failed to drop unpushed commit");
        }
    }
    if let Err(e) = git.unstage(relative) {
        warn!(file = relative, error = %e, "failed to unstage file");
    }
    if let Err(e) = fs::write(file, original) {
        error!(file = %file.display(), error = %e, "failed to restore file");
    }
}

/// Insert one timestamped comment line at a random position.
fn insert_marker<R: Rng + ?Sized>(path: &Path, kind: ChangeKind, rng: &mut R) -> Result<()> {
    let marker = format!(
        "{} {} - {}",
        comment_prefix(path),
        kind,
        Local::now().format(TIMESTAMP_FORMAT)
    );
    let content = fs::read_to_string(path)?;
    let at = rng.gen_range(0..=content.split_inclusive('\n').count());
    fs::write(path, insert_line(&content, &marker, at))?;
    debug!(file = %path.display(), line = at, "inserted marker");
    Ok(())
}

/// Insert `line` before line `at` (clamped to the end), leaving every
/// existing byte in place.
///
/// The new line uses the file's own line ending. A file without a trailing
/// newline keeps lacking one.
pub fn insert_line(content: &str, line: &str, at: usize) -> String {
    let eol = if content.contains("\r\n") { "\r\n" } else { "\n" };
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let at = at.min(lines.len());

    let mut out = String::with_capacity(content.len() + line.len() + eol.len() * 2);
    for (i, existing) in lines.iter().enumerate() {
        if i == at {
            out.push_str(line);
            out.push_str(eol);
        }
        out.push_str(existing);
    }
    if at == lines.len() {
        if content.is_empty() || content.ends_with('\n') {
            out.push_str(line);
            out.push_str(eol);
        } else {
            out.push_str(eol);
            out.push_str(line);
        }
    }
    out
}
