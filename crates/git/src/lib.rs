//! # CRISK git
//!
//! Read-only queries over the working repository, answered by the `git` binary.
//!
//! Required queries (staged diff, staged files, tracked files) fail with
//! [`GitError::QueryFailed`]; identity lookups are best-effort and return `None`.

mod blame;
mod error;
mod inspector;

pub use blame::{parse_line_porcelain, parse_single_line_blame, Authorship, LineBlame};
pub use error::{GitError, Result};
pub use inspector::{GitCli, RepositoryInspector, DEFAULT_GIT_TIMEOUT};
