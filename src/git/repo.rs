use crate::error::{PulseError, Result};
use gix::{discover, Repository};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Extensions the executor is allowed to touch.
pub const SUPPORTED_EXTENSIONS: &[&str] =
    &["py", "sql", "cpp", "hpp", "cxx", "h", "kt", "kts", "swift", "rs"];

pub struct GitRepo {
    repo: Repository,
    path: PathBuf,
}

impl GitRepo {
    /// Open the repository containing `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = discover(path.as_ref())?;
        let path = repo.workdir().unwrap_or_else(|| repo.path()).to_path_buf();
        Ok(Self { repo, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Id of the commit HEAD points at.
    pub fn head_id(&self) -> Result<String> {
        let mut head = self.repo.head()?;
        let commit = head.peel_to_commit_in_place()?;
        Ok(commit.id.to_string())
    }

    /// Tracked-looking source files, honoring `.gitignore`.
    pub fn source_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkBuilder::new(&self.path)
            .hidden(true)
            .build()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        files
    }

    pub fn push_dry_run(&self) -> Result<()> {
        self.git(&["push", "--dry-run"]).map(|_| ())
    }

    /// Stage a single path relative to the work tree.
    pub fn stage(&self, path: &str) -> Result<()> {
        self.git(&["add", "--", path]).map(|_| ())
    }

    /// Commit only `path`, leaving anything else in the index alone.
    pub fn commit_path(&self, message: &str, path: &str) -> Result<()> {
        self.git(&["commit", "-m", message, "--", path]).map(|_| ())
    }

    pub fn unstage(&self, path: &str) -> Result<()> {
        self.git(&["reset", "-q", "--", path]).map(|_| ())
    }

    /// Drop the last local commit, keeping the work tree as is.
    pub fn drop_last_commit(&self) -> Result<()> {
        self.git(&["reset", "-q", "--soft", "HEAD~1"]).map(|_| ())
    }

    pub fn push(&self) -> Result<()> {
        self.git(&["push"]).map(|_| ())
    }

    /// Drop the last `count` commits from the local branch and force the remote to match.
    pub fn reset_and_force_push(&self, count: u32) -> Result<()> {
        let target = format!("HEAD~{count}");
        self.git(&["rev-parse", "--verify", &target])?;
        self.git(&["reset", "--hard", &target])?;
        self.git(&["push", "--force"]).map(|_| ())
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.path)
            .output()?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(PulseError::GitCommand {
                repo: self.path.to_string_lossy().to_string(),
                command: format!("git {}", args.join(" ")),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}
