use crate::blame::{parse_line_porcelain, parse_single_line_blame, Authorship, LineBlame};
use crate::{GitError, Result};
use async_trait::async_trait;
use crisk_protocol::{ChangeSet, RepoIdentity};
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::time::{timeout, Duration};

/// Upper bound for a single git invocation. Blame on large files is the slow path.
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Read-only view of a version-controlled working tree.
#[async_trait]
pub trait RepositoryInspector: Send + Sync {
    /// Root that relative paths returned by this inspector are resolved against.
    fn root(&self) -> &Path;

    async fn change_set(&self) -> Result<ChangeSet>;

    async fn tracked_files(&self) -> Result<Vec<String>>;

    async fn remote_identity(&self) -> Option<String>;

    async fn revision_id(&self) -> Option<String>;

    /// One entry per line currently attributed to `path`.
    async fn authorship_history(&self, path: &str) -> Result<Vec<Authorship>>;

    async fn line_blame(&self, path: &str, line: usize) -> Result<LineBlame>;

    async fn repo_identity(&self) -> RepoIdentity {
        RepoIdentity {
            remote: self.remote_identity().await,
            revision: self.revision_id().await,
        }
    }
}

/// [`RepositoryInspector`] backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
    timeout: Duration,
}

impl GitCli {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            timeout: DEFAULT_GIT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolves the top-level directory of the repository containing `start`.
    pub async fn discover(start: impl AsRef<Path>) -> Result<Self> {
        let probe = Self::new(start.as_ref());
        let output = probe
            .output(&["rev-parse", "--show-toplevel"])
            .await?;
        if !output.status.success() {
            return Err(GitError::NotARepository(
                start.as_ref().display().to_string(),
            ));
        }
        let top = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if top.is_empty() {
            return Err(GitError::NotARepository(
                start.as_ref().display().to_string(),
            ));
        }
        log::debug!("Repository root: {top}");
        Ok(Self {
            root: PathBuf::from(top),
            timeout: probe.timeout,
        })
    }

    async fn output(&self, args: &[&str]) -> Result<Output> {
        let command = args.join(" ");
        log::debug!("git {command}");
        let mut cmd = tokio::process::Command::new("git");
        cmd.arg("-C").arg(&self.root).args(args).kill_on_drop(true);
        match timeout(self.timeout, cmd.output()).await {
            Ok(output) => Ok(output?),
            Err(_) => Err(GitError::Timeout {
                command,
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }

    /// Runs a query whose failure must stop the caller.
    async fn required(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args).await?;
        if !output.status.success() {
            return Err(GitError::QueryFailed {
                command: args.join(" "),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Runs a best-effort query; any failure collapses to `None`.
    async fn optional(&self, args: &[&str]) -> Option<String> {
        match self.required(args).await {
            Ok(stdout) => {
                let value = stdout.trim();
                (!value.is_empty()).then(|| value.to_string())
            }
            Err(err) => {
                log::debug!("Ignoring failed best-effort query: {err}");
                None
            }
        }
    }
}

fn split_nul(raw: &str) -> Vec<String> {
    raw.split('\0')
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl RepositoryInspector for GitCli {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn change_set(&self) -> Result<ChangeSet> {
        let diff_text = self
            .required(&["diff", "--cached", "--no-color", "--no-ext-diff"])
            .await?;
        let staged_files = split_nul(
            &self
                .required(&["diff", "--cached", "--name-only", "-z"])
                .await?,
        );
        log::info!("Found {} staged file(s)", staged_files.len());
        Ok(ChangeSet {
            diff_text,
            staged_files,
        })
    }

    async fn tracked_files(&self) -> Result<Vec<String>> {
        let files = split_nul(&self.required(&["ls-files", "-z"]).await?);
        log::debug!("Repository tracks {} file(s)", files.len());
        Ok(files)
    }

    async fn remote_identity(&self) -> Option<String> {
        self.optional(&["remote", "get-url", "origin"]).await
    }

    async fn revision_id(&self) -> Option<String> {
        self.optional(&["rev-parse", "HEAD"]).await
    }

    async fn authorship_history(&self, path: &str) -> Result<Vec<Authorship>> {
        let raw = self
            .required(&["blame", "--line-porcelain", "--", path])
            .await?;
        Ok(parse_line_porcelain(&raw))
    }

    async fn line_blame(&self, path: &str, line: usize) -> Result<LineBlame> {
        let range = format!("{line},{line}");
        let raw = self
            .required(&["blame", "-L", &range, "--porcelain", "--", path])
            .await?;
        parse_single_line_blame(&raw).ok_or_else(|| GitError::NoBlame {
            path: path.to_string(),
            line,
        })
    }
}
