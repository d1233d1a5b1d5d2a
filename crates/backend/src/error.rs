use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BackendError>;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Request timed out after {}s", .after.as_secs())]
    Timeout { after: Duration },

    #[error("Authentication rejected by backend: {body}")]
    Unauthorized { body: String },

    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Generation returned no text")]
    EmptyGeneration,
}

impl BackendError {
    /// Connection-level failures, as opposed to answers the backend gave us.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout { .. })
    }
}
