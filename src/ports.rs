use crate::error::Result;
use crate::model::CommittedChange;
use std::path::Path;

/// Pushability check.
///
/// Implementations must not mutate the repository (dry-run semantics).
pub trait AccessChecker {
    fn can_push(&self, repo: &Path) -> bool;
}

/// Performs one commit unit: a single file mutation followed by commit and push.
///
/// At most one file may be touched per call.
pub trait Executor {
    fn commit(&mut self, repo: &Path) -> Result<CommittedChange>;
}

/// Undoes the last `count` commits locally and on the remote.
pub trait Rollbacker {
    fn revert(&mut self, repo: &Path, count: u32) -> Result<()>;
}
