use async_trait::async_trait;
use crisk_backend::{
    select_related, BackendError, Ranking, RankingPolicy, RelatednessClient, TextGenerator,
};
use crisk_git::{Authorship, GitError, LineBlame, RepositoryInspector};
use crisk_pipeline::{
    AutoConfirm, Confirm, Orchestrator, OwnershipResolver, Outcome, PipelineObserver, Stage,
};
use crisk_protocol::wire::ScoredFile;
use crisk_protocol::{ChangeSet, CodebaseSnapshot, OwnerIdentity, RepoIdentity};
use crisk_snapshot::SnapshotBuilder;
use pretty_assertions::assert_eq;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

struct FakeRepo {
    root: PathBuf,
    change: ChangeSet,
    tracked: Vec<String>,
    histories: HashMap<String, Vec<Authorship>>,
    failing: HashSet<String>,
    history_calls: AtomicUsize,
}

impl FakeRepo {
    fn new(root: &Path, change: ChangeSet) -> Self {
        Self {
            root: root.to_path_buf(),
            change,
            tracked: Vec::new(),
            histories: HashMap::new(),
            failing: HashSet::new(),
            history_calls: AtomicUsize::new(0),
        }
    }

    fn with_history(mut self, path: &str, authors: &[(&str, usize)]) -> Self {
        let entries = authors
            .iter()
            .flat_map(|(author, n)| {
                (0..*n).map(move |i| Authorship {
                    commit: format!("{i:040}"),
                    author: author.to_string(),
                })
            })
            .collect();
        self.histories.insert(path.to_string(), entries);
        self
    }
}

#[async_trait]
impl RepositoryInspector for FakeRepo {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn change_set(&self) -> crisk_git::Result<ChangeSet> {
        Ok(self.change.clone())
    }

    async fn tracked_files(&self) -> crisk_git::Result<Vec<String>> {
        Ok(self.tracked.clone())
    }

    async fn remote_identity(&self) -> Option<String> {
        Some("https://example.com/acme/widgets.git".to_string())
    }

    async fn revision_id(&self) -> Option<String> {
        Some("0123abcd".to_string())
    }

    async fn authorship_history(&self, path: &str) -> crisk_git::Result<Vec<Authorship>> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(path) {
            return Err(GitError::QueryFailed {
                command: format!("blame --line-porcelain -- {path}"),
                status: "exit status: 128".to_string(),
                stderr: "fatal: no such path".to_string(),
            });
        }
        Ok(self.histories.get(path).cloned().unwrap_or_default())
    }

    async fn line_blame(&self, path: &str, line: usize) -> crisk_git::Result<LineBlame> {
        Err(GitError::NoBlame {
            path: path.to_string(),
            line,
        })
    }
}

#[derive(Default)]
struct FakeRanker {
    results: Vec<(String, f64)>,
    server_draft: Option<String>,
    fail: bool,
    calls: AtomicUsize,
    seen: Mutex<Vec<(CodebaseSnapshot, RepoIdentity)>>,
}

impl FakeRanker {
    fn returning(results: &[(&str, f64)]) -> Self {
        Self {
            results: results.iter().map(|(p, s)| (p.to_string(), *s)).collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl RelatednessClient for FakeRanker {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn rank(
        &self,
        change: &ChangeSet,
        snapshot: &CodebaseSnapshot,
        repo: &RepoIdentity,
    ) -> crisk_backend::Result<Ranking> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((snapshot.clone(), repo.clone()));
        if self.fail {
            return Err(BackendError::Timeout {
                after: Duration::from_secs(120),
            });
        }
        let scored = self
            .results
            .iter()
            .map(|(filename, score)| ScoredFile {
                filename: filename.clone(),
                score: *score,
            })
            .collect();
        Ok(Ranking {
            related: select_related(scored, change, &RankingPolicy::default()),
            server_draft: self.server_draft.clone(),
        })
    }
}

struct FakeGenerator {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    fn new(reply: Option<&str>) -> Self {
        Self {
            reply: reply.map(str::to_string),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, prompt: &str) -> crisk_backend::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone().ok_or(BackendError::EmptyGeneration)
    }
}

struct CountingConfirm {
    answer: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl Confirm for CountingConfirm {
    async fn confirm(&self, _question: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer
    }
}

#[derive(Default)]
struct RecordingObserver {
    stages: Mutex<Vec<Stage>>,
    skipped: Mutex<Vec<String>>,
}

impl PipelineObserver for RecordingObserver {
    fn stage(&self, stage: Stage) {
        self.stages.lock().unwrap().push(stage);
    }

    fn draft_skipped(&self, reason: &str) {
        self.skipped.lock().unwrap().push(reason.to_string());
    }
}

fn workspace() -> TempDir {
    let temp = TempDir::new().expect("tempdir");
    std::fs::write(temp.path().join("a.py"), "x".repeat(10)).unwrap();
    std::fs::write(temp.path().join("c.py"), "import a\n").unwrap();
    std::fs::write(temp.path().join("d.py"), "import a\n").unwrap();
    std::fs::write(temp.path().join("img.png"), [0x89, b'P', b'N', b'G']).unwrap();
    temp
}

fn staged(files: &[&str]) -> ChangeSet {
    ChangeSet::new(
        "diff --git a/a.py b/a.py\n+x\n",
        files.iter().map(|f| f.to_string()).collect(),
    )
}

fn tracked_repo(root: &Path, change: ChangeSet) -> FakeRepo {
    let mut repo = FakeRepo::new(root, change);
    repo.tracked = vec!["a.py", "c.py", "d.py", "img.png"]
        .into_iter()
        .map(str::to_string)
        .collect();
    repo
}

#[tokio::test]
async fn empty_change_set_calls_no_collaborator() {
    let temp = workspace();
    for change in [
        ChangeSet::new("", vec![]),
        ChangeSet::new("", vec!["a.py".to_string()]),
        ChangeSet::new("diff --git a/a.py b/a.py", vec![]),
    ] {
        let ranker = Arc::new(FakeRanker::returning(&[("c.py", 0.9)]));
        let generator = Arc::new(FakeGenerator::new(Some("draft")));
        let confirm = Arc::new(CountingConfirm {
            answer: true,
            calls: AtomicUsize::new(0),
        });
        let orchestrator = Orchestrator::new(
            Arc::new(tracked_repo(temp.path(), change)),
            SnapshotBuilder::new(temp.path()),
            ranker.clone(),
            confirm.clone(),
        )
        .with_generator(generator.clone());

        let outcome = orchestrator.run().await.expect("run");

        assert!(matches!(outcome, Outcome::NoChange));
        assert!(!outcome.is_success());
        assert_eq!(ranker.calls.load(Ordering::SeqCst), 0);
        assert_eq!(generator.calls(), 0);
        assert_eq!(confirm.calls.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn staged_and_weak_matches_mean_isolated_change() {
    let temp = workspace();
    let ranker = Arc::new(FakeRanker::returning(&[("b.py", 0.9), ("c.py", 0.2)]));
    let orchestrator = Orchestrator::new(
        Arc::new(tracked_repo(temp.path(), staged(&["b.py"]))),
        SnapshotBuilder::new(temp.path()),
        ranker.clone(),
        Arc::new(AutoConfirm(true)),
    );

    let outcome = orchestrator.run().await.expect("run");

    match outcome {
        Outcome::NoneRelated {
            change_set,
            repository,
        } => {
            assert_eq!(change_set.staged_files, vec!["b.py"]);
            assert_eq!(repository.revision.as_deref(), Some("0123abcd"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(ranker.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn full_run_attaches_owners_and_draft() {
    let temp = workspace();
    let mut repo = tracked_repo(temp.path(), staged(&["a.py"]))
        .with_history("c.py", &[("bob@example.com", 3), ("alice@example.com", 5)]);
    repo.failing.insert("d.py".to_string());

    let ranker = Arc::new(FakeRanker::returning(&[
        ("a.py", 0.99),
        ("d.py", 0.6),
        ("c.py", 0.8),
    ]));
    let generator = Arc::new(FakeGenerator::new(Some("Heads up: a.py is changing.")));
    let observer = Arc::new(RecordingObserver::default());
    let orchestrator = Orchestrator::new(
        Arc::new(repo),
        SnapshotBuilder::new(temp.path()),
        ranker.clone(),
        Arc::new(AutoConfirm(true)),
    )
    .with_generator(generator.clone())
    .with_observer(observer.clone());

    let outcome = orchestrator.run().await.expect("run");
    let Outcome::Done(report) = outcome else {
        panic!("expected a report");
    };

    let files: Vec<_> = report
        .related_files
        .iter()
        .map(|f| (f.path.as_str(), f.owner_or_unknown()))
        .collect();
    assert_eq!(
        files,
        vec![
            ("c.py", OwnerIdentity::Known("alice@example.com".into())),
            ("d.py", OwnerIdentity::Unknown),
        ]
    );
    assert_eq!(
        report.draft_message.as_deref(),
        Some("Heads up: a.py is changing.")
    );
    assert!(generator.prompts.lock().unwrap()[0].contains("c.py (owner: alice@example.com"));

    let seen = ranker.seen.lock().unwrap();
    let (snapshot, repo_identity) = &seen[0];
    let names: Vec<_> = snapshot.entries().iter().map(|e| e.filename.as_str()).collect();
    assert_eq!(names, vec!["a.py", "c.py", "d.py"]);
    assert_eq!(snapshot.entries()[0].content, "x".repeat(10));
    assert_eq!(
        repo_identity.remote.as_deref(),
        Some("https://example.com/acme/widgets.git")
    );

    assert_eq!(
        *observer.stages.lock().unwrap(),
        vec![
            Stage::Init,
            Stage::ExtractChange,
            Stage::BuildSnapshot,
            Stage::RankRelated,
            Stage::ResolveOwners,
            Stage::GenerateDraft,
            Stage::Done,
        ]
    );
}

#[tokio::test]
async fn declined_draft_skips_generator() {
    let temp = workspace();
    let generator = Arc::new(FakeGenerator::new(Some("unused")));
    let orchestrator = Orchestrator::new(
        Arc::new(tracked_repo(temp.path(), staged(&["a.py"]))),
        SnapshotBuilder::new(temp.path()),
        Arc::new(FakeRanker::returning(&[("c.py", 0.7)])),
        Arc::new(AutoConfirm(false)),
    )
    .with_generator(generator.clone());

    let Outcome::Done(report) = orchestrator.run().await.expect("run") else {
        panic!("expected a report");
    };
    assert_eq!(report.draft_message, None);
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn failed_generation_still_reaches_done() {
    let temp = workspace();
    let observer = Arc::new(RecordingObserver::default());
    let orchestrator = Orchestrator::new(
        Arc::new(tracked_repo(temp.path(), staged(&["a.py"]))),
        SnapshotBuilder::new(temp.path()),
        Arc::new(FakeRanker::returning(&[("c.py", 0.7)])),
        Arc::new(AutoConfirm(true)),
    )
    .with_generator(Arc::new(FakeGenerator::new(None)))
    .with_observer(observer.clone());

    let outcome = orchestrator.run().await.expect("run");
    assert!(outcome.is_success());
    let Outcome::Done(report) = outcome else {
        panic!("expected a report");
    };
    assert_eq!(report.draft_message, None);
    assert!(observer.skipped.lock().unwrap()[0].contains("draft generation failed"));
}

#[tokio::test]
async fn server_draft_is_used_without_generator() {
    let temp = workspace();
    let mut ranker = FakeRanker::returning(&[("c.py", 0.7)]);
    ranker.server_draft = Some("Drafted server-side".to_string());
    let generator = Arc::new(FakeGenerator::new(Some("local draft")));
    let orchestrator = Orchestrator::new(
        Arc::new(tracked_repo(temp.path(), staged(&["a.py"]))),
        SnapshotBuilder::new(temp.path()),
        Arc::new(ranker),
        Arc::new(AutoConfirm(true)),
    )
    .with_generator(generator.clone());

    let Outcome::Done(report) = orchestrator.run().await.expect("run") else {
        panic!("expected a report");
    };
    assert_eq!(report.draft_message.as_deref(), Some("Drafted server-side"));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn ranking_failure_is_a_terminal_outcome() {
    let temp = workspace();
    let ranker = Arc::new(FakeRanker {
        fail: true,
        ..FakeRanker::default()
    });
    let orchestrator = Orchestrator::new(
        Arc::new(tracked_repo(temp.path(), staged(&["a.py"]))),
        SnapshotBuilder::new(temp.path()),
        ranker,
        Arc::new(AutoConfirm(true)),
    );

    let outcome = orchestrator.run().await.expect("run");
    assert!(matches!(
        outcome,
        Outcome::BackendFailed(BackendError::Timeout { .. })
    ));
}

#[tokio::test]
async fn report_respects_cap_and_order() {
    let temp = workspace();
    let names: Vec<String> = (0..14).map(|i| format!("f{i:02}.py")).collect();
    let mut results: Vec<(&str, f64)> = names
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), 0.4 + (i % 5) as f64 * 0.1))
        .collect();
    results.push(("a.py", 0.99));
    results.push(("weak.py", 0.3));

    let orchestrator = Orchestrator::new(
        Arc::new(tracked_repo(temp.path(), staged(&["a.py"]))),
        SnapshotBuilder::new(temp.path()),
        Arc::new(FakeRanker::returning(&results)),
        Arc::new(AutoConfirm(false)),
    );

    let Outcome::Done(report) = orchestrator.run().await.expect("run") else {
        panic!("expected a report");
    };
    assert_eq!(report.related_files.len(), 10);
    assert!(report
        .related_files
        .iter()
        .all(|f| f.score > 0.3 && f.path != "a.py"));
    assert!(report
        .related_files
        .windows(2)
        .all(|pair| pair[0].score >= pair[1].score));
}

#[tokio::test]
async fn shutdown_before_start_is_interrupted() {
    let temp = workspace();
    let ranker = Arc::new(FakeRanker::returning(&[("c.py", 0.9)]));
    let (tx, rx) = tokio::sync::watch::channel(false);
    tx.send(true).unwrap();

    let orchestrator = Orchestrator::new(
        Arc::new(tracked_repo(temp.path(), staged(&["a.py"]))),
        SnapshotBuilder::new(temp.path()),
        ranker.clone(),
        Arc::new(AutoConfirm(true)),
    )
    .with_shutdown(rx);

    let outcome = orchestrator.run().await.expect("run");
    assert!(matches!(outcome, Outcome::Interrupted(Stage::Init)));
    assert_eq!(ranker.calls.load(Ordering::SeqCst), 0);
}

/// Ranker that never answers; signals once a request is in flight.
#[derive(Default)]
struct StalledRanker {
    entered: tokio::sync::Notify,
}

#[async_trait]
impl RelatednessClient for StalledRanker {
    fn name(&self) -> &'static str {
        "stalled"
    }

    async fn rank(
        &self,
        _change: &ChangeSet,
        _snapshot: &CodebaseSnapshot,
        _repo: &RepoIdentity,
    ) -> crisk_backend::Result<Ranking> {
        self.entered.notify_one();
        std::future::pending().await
    }
}

#[tokio::test]
async fn shutdown_during_ranking_is_interrupted() {
    let temp = workspace();
    let ranker = Arc::new(StalledRanker::default());
    let (tx, rx) = tokio::sync::watch::channel(false);

    let orchestrator = Orchestrator::new(
        Arc::new(tracked_repo(temp.path(), staged(&["a.py"]))),
        SnapshotBuilder::new(temp.path()),
        ranker.clone(),
        Arc::new(AutoConfirm(true)),
    )
    .with_shutdown(rx);

    let run = async {
        tokio::join!(orchestrator.run(), async {
            ranker.entered.notified().await;
            tx.send(true).unwrap();
        })
    };
    let (outcome, ()) = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("interrupt ends the run");
    let outcome = outcome.expect("run");
    assert!(matches!(outcome, Outcome::Interrupted(Stage::RankRelated)));
}

#[tokio::test]
async fn ownership_resolution_is_idempotent() {
    let temp = workspace();
    let repo = Arc::new(
        FakeRepo::new(temp.path(), staged(&["a.py"]))
            .with_history("c.py", &[("bob@example.com", 2), ("amy@example.com", 2)]),
    );
    let resolver = OwnershipResolver::new(repo.clone());

    let first = resolver.resolve("c.py").await;
    let second = resolver.resolve("c.py").await;
    assert_eq!(first, second);
    assert_eq!(first, OwnerIdentity::Known("amy@example.com".into()));

    let all = resolver
        .resolve_all(&["c.py".to_string(), "none.py".to_string()], 4)
        .await;
    assert_eq!(all, vec![first, OwnerIdentity::Unknown]);
    assert_eq!(repo.history_calls.load(Ordering::SeqCst), 4);
}
