use thiserror::Error;

pub type Result<T> = std::result::Result<T, PulseError>;

#[derive(Error, Debug)]
pub enum PulseError {
    #[error("Git discover error: {0}")]
    GitDiscover(#[from] Box<gix::discover::Error>),
    #[error("Reference find error: {0}")]
    RefFind(#[from] Box<gix::reference::find::existing::Error>),
    #[error("Head peel error: {0}")]
    HeadPeel(#[from] Box<gix::head::peel::to_commit::Error>),
    #[error("Git command `{command}` failed in {repo}: {message}")]
    GitCommand {
        repo: String,
        command: String,
        message: String,
    },
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No available repositories")]
    NoAvailableRepositories,
    #[error("Budget of {total} commits cannot cover {repos} repositories")]
    InsufficientBudget { total: u32, repos: usize },
    #[error("Commit failed in {repo}: {message}")]
    Executor { repo: String, message: String },
    #[error("Rollback failed in {repo}: {message}")]
    Rollback { repo: String, message: String },
}

// Manual From implementations for unboxed to boxed conversions
impl From<gix::discover::Error> for PulseError {
    fn from(err: gix::discover::Error) -> Self {
        PulseError::GitDiscover(Box::new(err))
    }
}

impl From<gix::reference::find::existing::Error> for PulseError {
    fn from(err: gix::reference::find::existing::Error) -> Self {
        PulseError::RefFind(Box::new(err))
    }
}

impl From<gix::head::peel::to_commit::Error> for PulseError {
    fn from(err: gix::head::peel::to_commit::Error) -> Self {
        PulseError::HeadPeel(Box::new(err))
    }
}
