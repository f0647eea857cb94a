pub mod adapters;
pub mod repo;

pub use adapters::{GitAccess, GitExecutor, GitRollback};
pub use repo::GitRepo;
