use thiserror::Error;

pub type Result<T> = std::result::Result<T, GitError>;

#[derive(Error, Debug)]
pub enum GitError {
    #[error("Failed to run git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("`git {command}` failed ({status}): {stderr}")]
    QueryFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("`git {command}` timed out after {timeout_ms} ms")]
    Timeout { command: String, timeout_ms: u64 },

    #[error("Not a git repository: {0}")]
    NotARepository(String),

    #[error("No blame information for {path}:{line}")]
    NoBlame { path: String, line: usize },
}
