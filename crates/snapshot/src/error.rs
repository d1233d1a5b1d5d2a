use thiserror::Error;

pub type Result<T> = std::result::Result<T, SnapshotError>;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Failed to list tracked files: {0}")]
    Listing(#[from] crisk_git::GitError),
}
