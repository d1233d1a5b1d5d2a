use crate::Result;
use async_trait::async_trait;
use crisk_protocol::wire::ScoredFile;
use crisk_protocol::{ChangeSet, CodebaseSnapshot, RelatedFile, RepoIdentity};
use std::collections::HashSet;

pub const DEFAULT_RELEVANCE_THRESHOLD: f64 = 0.3;
pub const DEFAULT_MAX_RELATED: usize = 10;
pub const DEFAULT_TOKEN_LIMIT: u32 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingPolicy {
    /// Results must score strictly above this.
    pub threshold: f64,
    pub max_related: usize,
    /// Forwarded to the scoring service, which enforces it.
    pub token_limit: u32,
}

impl Default for RankingPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_RELEVANCE_THRESHOLD,
            max_related: DEFAULT_MAX_RELATED,
            token_limit: DEFAULT_TOKEN_LIMIT,
        }
    }
}

/// Related files for one change set. Owners are never set here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ranking {
    pub related: Vec<RelatedFile>,
    /// Draft already produced server-side, when the backend does that work.
    pub server_draft: Option<String>,
}

impl Ranking {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Scores the codebase against a change set.
///
/// Implementations return an empty ranking when the service answers with a
/// non-success status; only transport failures, timeouts and rejected credentials
/// surface as errors.
#[async_trait]
pub trait RelatednessClient: Send + Sync {
    fn name(&self) -> &'static str;

    async fn rank(
        &self,
        change: &ChangeSet,
        snapshot: &CodebaseSnapshot,
        repo: &RepoIdentity,
    ) -> Result<Ranking>;
}

/// Natural-language query sent along with the codebase.
pub fn impact_query(diff: &str) -> String {
    format!(
        "Find files that are semantically related to these code changes and might be impacted:\n\n{diff}\n\nWhat other files in this codebase might need to be updated, reviewed, or could be affected by these changes?"
    )
}

/// Applies the selection rules to a service ranking, in order: first occurrence of
/// each path wins, staged paths are dropped, scores at or below the threshold are
/// dropped, survivors are stably sorted by descending score and capped.
pub fn select_related(
    results: Vec<ScoredFile>,
    change: &ChangeSet,
    policy: &RankingPolicy,
) -> Vec<RelatedFile> {
    let received = results.len();
    let mut seen = HashSet::new();
    let mut related: Vec<RelatedFile> = results
        .into_iter()
        .filter(|result| seen.insert(result.filename.clone()))
        .filter(|result| !change.is_staged(&result.filename))
        .filter(|result| result.score.is_finite() && result.score > policy.threshold)
        .map(|result| RelatedFile::new(result.filename, result.score))
        .collect();

    related.sort_by(|a, b| b.score.total_cmp(&a.score));
    related.truncate(policy.max_related);
    log::info!(
        "Kept {} of {received} ranked file(s) (threshold {}, max {})",
        related.len(),
        policy.threshold,
        policy.max_related
    );
    related
}
