use async_trait::async_trait;
use crisk_protocol::{ChangeSet, RelatedFile, RepoIdentity};
use std::fmt;

/// States of one pipeline run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    ExtractChange,
    BuildSnapshot,
    RankRelated,
    ResolveOwners,
    GenerateDraft,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::ExtractChange => "extract-change",
            Self::BuildSnapshot => "build-snapshot",
            Self::RankRelated => "rank-related",
            Self::ResolveOwners => "resolve-owners",
            Self::GenerateDraft => "generate-draft",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Yes/no decision the pipeline asks for before drafting a notification.
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, question: &str) -> bool;
}

/// Fixed answer, for flag-driven and non-interactive runs.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

#[async_trait]
impl Confirm for AutoConfirm {
    async fn confirm(&self, _question: &str) -> bool {
        self.0
    }
}

/// Progress callbacks. Every method defaults to doing nothing.
pub trait PipelineObserver: Send + Sync {
    fn stage(&self, _stage: Stage) {}

    fn change_extracted(&self, _change: &ChangeSet, _repo: &RepoIdentity) {}

    fn snapshot_built(&self, _files: usize, _bytes: usize) {}

    fn owners_resolved(&self, _related: &[RelatedFile]) {}

    fn draft_skipped(&self, _reason: &str) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SilentObserver;

impl PipelineObserver for SilentObserver {}
