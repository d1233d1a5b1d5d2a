use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Repository query failed: {0}")]
    Git(#[from] crisk_git::GitError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] crisk_snapshot::SnapshotError),

    #[error("Backend error: {0}")]
    Backend(#[from] crisk_backend::BackendError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line {line} is outside {path} ({lines} lines)")]
    LineOutOfRange {
        path: String,
        line: usize,
        lines: usize,
    },

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
