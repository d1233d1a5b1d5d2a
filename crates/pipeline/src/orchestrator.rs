use crate::hooks::{Confirm, PipelineObserver, SilentObserver, Stage};
use crate::ownership::{OwnershipResolver, DEFAULT_OWNER_CONCURRENCY};
use crate::Result;
use crisk_backend::{draft_notification_prompt, BackendError, RelatednessClient, TextGenerator};
use crisk_git::RepositoryInspector;
use crisk_protocol::{ChangeSet, RelatedFile, RepoIdentity, Report};
use crisk_snapshot::{SnapshotBuilder, SnapshotError};
use std::sync::Arc;
use tokio::sync::watch;

pub const DRAFT_QUESTION: &str = "Generate draft message to owners?";

#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub owner_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            owner_concurrency: DEFAULT_OWNER_CONCURRENCY,
        }
    }
}

/// Terminal state of a run.
#[derive(Debug)]
pub enum Outcome {
    /// Nothing staged (or an empty diff).
    NoChange,
    /// The ranking came back empty: the change looks isolated.
    NoneRelated {
        change_set: ChangeSet,
        repository: RepoIdentity,
    },
    /// The ranking collaborator could not be used.
    BackendFailed(BackendError),
    /// Shutdown was requested; the run stopped after `Stage`.
    Interrupted(Stage),
    Done(Report),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::NoneRelated { .. } | Self::Done(_))
    }
}

/// Sequences inspector → snapshot → ranking → ownership → draft.
pub struct Orchestrator {
    inspector: Arc<dyn RepositoryInspector>,
    snapshot: SnapshotBuilder,
    ranker: Arc<dyn RelatednessClient>,
    generator: Option<Arc<dyn TextGenerator>>,
    confirm: Arc<dyn Confirm>,
    observer: Arc<dyn PipelineObserver>,
    config: PipelineConfig,
    shutdown: Option<watch::Receiver<bool>>,
}

impl Orchestrator {
    pub fn new(
        inspector: Arc<dyn RepositoryInspector>,
        snapshot: SnapshotBuilder,
        ranker: Arc<dyn RelatednessClient>,
        confirm: Arc<dyn Confirm>,
    ) -> Self {
        Self {
            inspector,
            snapshot,
            ranker,
            generator: None,
            confirm,
            observer: Arc::new(SilentObserver),
            config: PipelineConfig::default(),
            shutdown: None,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Stops the run at the next state boundary once the channel reads `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn enter(&self, stage: Stage) {
        log::debug!("Pipeline stage: {stage}");
        self.observer.stage(stage);
    }

    fn interrupted(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    pub async fn run(&self) -> Result<Outcome> {
        self.enter(Stage::Init);
        if self.interrupted() {
            return Ok(Outcome::Interrupted(Stage::Init));
        }

        self.enter(Stage::ExtractChange);
        let change = self.inspector.change_set().await?;
        if change.is_empty() {
            log::info!("No staged changes found");
            return Ok(Outcome::NoChange);
        }
        let repository = self.inspector.repo_identity().await;
        log::info!(
            "Found {} staged file(s): {:?}",
            change.staged_files.len(),
            change.staged_files
        );
        self.observer.change_extracted(&change, &repository);
        if self.interrupted() {
            return Ok(Outcome::Interrupted(Stage::ExtractChange));
        }

        self.enter(Stage::BuildSnapshot);
        let tracked = self
            .inspector
            .tracked_files()
            .await
            .map_err(SnapshotError::from)?;
        let builder = self.snapshot.clone();
        let snapshot = tokio::task::spawn_blocking(move || builder.build(&tracked)).await?;
        log::info!("Indexed {} files", snapshot.len());
        self.observer
            .snapshot_built(snapshot.len(), snapshot.total_bytes());
        if self.interrupted() {
            return Ok(Outcome::Interrupted(Stage::BuildSnapshot));
        }

        self.enter(Stage::RankRelated);
        let ranked = tokio::select! {
            ranked = self.ranker.rank(&change, &snapshot, &repository) => ranked,
            _ = shutdown_requested(self.shutdown.clone()) => {
                return Ok(Outcome::Interrupted(Stage::RankRelated));
            }
        };
        let ranking = match ranked {
            Ok(ranking) => ranking,
            Err(err) => {
                log::error!("Ranking via {} backend failed: {err}", self.ranker.name());
                return Ok(Outcome::BackendFailed(err));
            }
        };
        log::info!("Found {} related files", ranking.related.len());
        if ranking.related.is_empty() {
            return Ok(Outcome::NoneRelated {
                change_set: change,
                repository,
            });
        }
        if self.interrupted() {
            return Ok(Outcome::Interrupted(Stage::RankRelated));
        }

        self.enter(Stage::ResolveOwners);
        let mut related = ranking.related;
        let paths: Vec<String> = related.iter().map(|file| file.path.clone()).collect();
        let owners = OwnershipResolver::new(self.inspector.clone())
            .resolve_all(&paths, self.config.owner_concurrency)
            .await;
        for (file, owner) in related.iter_mut().zip(owners) {
            file.owner = Some(owner);
        }
        self.observer.owners_resolved(&related);
        if self.interrupted() {
            return Ok(Outcome::Interrupted(Stage::ResolveOwners));
        }

        self.enter(Stage::GenerateDraft);
        let draft_message = self
            .generate_draft(&change, &related, ranking.server_draft)
            .await;
        if self.interrupted() {
            return Ok(Outcome::Interrupted(Stage::GenerateDraft));
        }

        self.enter(Stage::Done);
        log::info!("Check completed successfully");
        Ok(Outcome::Done(Report {
            change_set: change,
            repository,
            related_files: related,
            draft_message,
        }))
    }

    /// Best-effort: every failure here leaves the report without a draft.
    async fn generate_draft(
        &self,
        change: &ChangeSet,
        related: &[RelatedFile],
        server_draft: Option<String>,
    ) -> Option<String> {
        if !self.confirm.confirm(DRAFT_QUESTION).await {
            log::debug!("Draft declined");
            return None;
        }
        if let Some(draft) = server_draft {
            return Some(draft);
        }
        let Some(generator) = &self.generator else {
            self.observer
                .draft_skipped("no text generator is configured for this backend");
            return None;
        };

        let prompt = draft_notification_prompt(change, related);
        match generator.generate(&prompt).await {
            Ok(draft) => Some(draft),
            Err(err) => {
                log::error!("Draft generation failed: {err}");
                self.observer
                    .draft_skipped(&format!("draft generation failed: {err}"));
                None
            }
        }
    }
}

async fn shutdown_requested(shutdown: Option<watch::Receiver<bool>>) {
    let Some(mut rx) = shutdown else {
        return std::future::pending().await;
    };
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return std::future::pending().await;
        }
    }
}
