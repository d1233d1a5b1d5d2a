use crisk_git::{Authorship, RepositoryInspector};
use crisk_protocol::OwnerIdentity;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub const DEFAULT_OWNER_CONCURRENCY: usize = 4;
pub const MAX_OWNER_CONCURRENCY: usize = 8;

/// Author with the most attributed lines.
///
/// Ties go to the lexicographically smallest identity.
pub fn dominant_owner(history: &[Authorship]) -> OwnerIdentity {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for entry in history {
        *counts.entry(entry.author.as_str()).or_default() += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for (author, count) in counts {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((author, count));
        }
    }
    best.map_or(OwnerIdentity::Unknown, |(author, _)| {
        OwnerIdentity::Known(author.to_string())
    })
}

/// Attributes files to their dominant historical author.
#[derive(Clone)]
pub struct OwnershipResolver {
    inspector: Arc<dyn RepositoryInspector>,
}

impl OwnershipResolver {
    pub fn new(inspector: Arc<dyn RepositoryInspector>) -> Self {
        Self { inspector }
    }

    /// Never fails: an unreadable history resolves to [`OwnerIdentity::Unknown`].
    pub async fn resolve(&self, path: &str) -> OwnerIdentity {
        match self.inspector.authorship_history(path).await {
            Ok(history) => {
                let owner = dominant_owner(&history);
                log::debug!("Owner of {path}: {owner} ({} line(s))", history.len());
                owner
            }
            Err(err) => {
                log::warn!("Ownership lookup failed for {path}: {err}");
                OwnerIdentity::Unknown
            }
        }
    }

    /// Resolves every path with at most `concurrency` lookups in flight.
    /// Output is index-aligned with `paths`.
    pub async fn resolve_all(&self, paths: &[String], concurrency: usize) -> Vec<OwnerIdentity> {
        let limit = concurrency.clamp(1, MAX_OWNER_CONCURRENCY);
        let permits = Arc::new(Semaphore::new(limit));
        let mut tasks = JoinSet::new();

        for (idx, path) in paths.iter().cloned().enumerate() {
            let resolver = self.clone();
            let permits = permits.clone();
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                (idx, resolver.resolve(&path).await)
            });
        }

        let mut owners = vec![OwnerIdentity::Unknown; paths.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, owner)) => owners[idx] = owner,
                Err(err) => log::warn!("Ownership task failed: {err}"),
            }
        }
        owners
    }
}
