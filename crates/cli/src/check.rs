use crate::config::{BackendKind, Settings};
use crate::output::{print_stdout, ConsoleObserver, PromptConfirm};
use crate::session::TokenStore;
use anyhow::{Context as AnyhowContext, Result};
use clap::Args;
use console::style;
use crisk_backend::{
    redact_secret, BackendError, DirectRanker, GeminiGenerator, RankingPolicy, RelatednessClient,
    RemoteAnalyzer, TextGenerator,
};
use crisk_git::{GitCli, GitError, RepositoryInspector};
use crisk_pipeline::{
    render_draft, AutoConfirm, Confirm, Orchestrator, Outcome, PipelineConfig, PipelineObserver,
    SilentObserver, Stage,
};
use crisk_protocol::Report;
use crisk_snapshot::SnapshotBuilder;
use serde::Serialize;
use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;

pub const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Draft a notification to the owners without asking
    #[arg(long)]
    pub draft: bool,

    /// Print the result as JSON on stdout (never prompts)
    #[arg(long)]
    pub json: bool,

    /// Relatedness backend (overrides CRISK_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<BackendKind>,
}

#[derive(Debug, Serialize)]
struct CheckSummary<'a> {
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a Report>,
}

/// Prints either the JSON summary or the human line, then maps to an exit code.
fn finish(json: bool, summary: CheckSummary<'_>, code: ExitCode) -> Result<ExitCode> {
    if json {
        print_stdout(&serde_json::to_string_pretty(&summary)?)?;
    } else if let Some(message) = &summary.message {
        print_stdout(message)?;
    }
    Ok(code)
}

fn failure(json: bool, status: &str, message: impl Into<String>) -> Result<ExitCode> {
    let message = message.into();
    let summary = CheckSummary {
        status,
        message: Some(if json {
            message
        } else {
            style(message).red().to_string()
        }),
        report: None,
    };
    finish(json, summary, ExitCode::FAILURE)
}

fn interrupted_summary(stage: Stage) -> CheckSummary<'static> {
    CheckSummary {
        status: "interrupted",
        message: Some(format!("Interrupted after {stage}.")),
        report: None,
    }
}

fn build_ranker(
    settings: &Settings,
    backend: BackendKind,
) -> Result<std::result::Result<Arc<dyn RelatednessClient>, &'static str>> {
    let policy = RankingPolicy::default();
    match backend {
        BackendKind::Remote => {
            let Some(token) = TokenStore::new(settings.token_path()).load() else {
                return Ok(Err("Not authenticated. Run 'crisk login' first."));
            };
            log::debug!("Using session token {}", redact_secret(&token));
            let analyzer = RemoteAnalyzer::new(
                &settings.backend_url,
                token,
                policy,
                settings.rank_timeout,
            )
            .context("failed to build the backend client")?;
            let ranker: Arc<dyn RelatednessClient> = Arc::new(analyzer);
            Ok(Ok(ranker))
        }
        BackendKind::Local => {
            let Some(api_key) = settings.relace_api_key.clone() else {
                return Ok(Err(
                    "Not authenticated: RELACE_API_KEY is not set (required by the local backend).",
                ));
            };
            log::debug!("Using ranker key {}", redact_secret(&api_key));
            let ranker =
                DirectRanker::new(&settings.rank_url, api_key, policy, settings.rank_timeout)
                    .context("failed to build the ranker client")?;
            let ranker: Arc<dyn RelatednessClient> = Arc::new(ranker);
            Ok(Ok(ranker))
        }
    }
}

fn build_generator(settings: &Settings) -> Result<Option<Arc<dyn TextGenerator>>> {
    let Some(api_key) = settings.gemini_api_key.clone() else {
        return Ok(None);
    };
    let generator = GeminiGenerator::new(
        &settings.gemini_url,
        &settings.gemini_model,
        api_key,
        settings.draft_timeout,
    )
    .context("failed to build the generation client")?;
    let generator: Arc<dyn TextGenerator> = Arc::new(generator);
    Ok(Some(generator))
}

fn backend_failure_message(err: &BackendError, backend: BackendKind, settings: &Settings) -> String {
    match err {
        BackendError::Unauthorized { .. } => match backend {
            BackendKind::Remote => "Authentication expired. Run 'crisk login' again.".to_string(),
            BackendKind::Local => "The ranking service rejected RELACE_API_KEY.".to_string(),
        },
        BackendError::Timeout { after } => format!(
            "Request timed out after {}s. The codebase might be too large.",
            after.as_secs()
        ),
        err if err.is_unavailable() => {
            let target = match backend {
                BackendKind::Remote => settings.backend_url.as_str(),
                BackendKind::Local => settings.rank_url.as_str(),
            };
            format!("Cannot connect to {target}: {err}")
        }
        err => format!("Backend error: {err}"),
    }
}

pub async fn run_check(settings: &Settings, args: &CheckArgs) -> Result<ExitCode> {
    let backend = args.backend.unwrap_or(settings.backend);
    log::info!(
        "Check started (backend: {backend:?}, draft: {}, json: {})",
        args.draft,
        args.json
    );

    let ranker = match build_ranker(settings, backend)? {
        Ok(ranker) => ranker,
        Err(message) => {
            log::warn!("Check refused: {message}");
            return failure(args.json, "unauthenticated", message);
        }
    };

    let cwd = std::env::current_dir().context("cannot read the working directory")?;
    let inspector = match GitCli::discover(&cwd).await {
        Ok(inspector) => inspector,
        Err(GitError::NotARepository(path)) => {
            return failure(args.json, "not_a_repository", format!("Not a git repository: {path}"));
        }
        Err(err) => return Err(err).context("cannot inspect the repository"),
    };
    let snapshot = SnapshotBuilder::new(inspector.root());

    if !args.json {
        println!("{}", style("CodeRisk Analysis").bold());
        println!("{}", crate::output::rule('='));
    }

    let confirm: Arc<dyn Confirm> = if args.draft {
        Arc::new(AutoConfirm(true))
    } else if args.json || !std::io::stdin().is_terminal() {
        Arc::new(AutoConfirm(false))
    } else {
        Arc::new(PromptConfirm)
    };

    let console = Arc::new(ConsoleObserver::new());
    let observer: Arc<dyn PipelineObserver> = if args.json {
        Arc::new(SilentObserver)
    } else {
        console.clone()
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, stopping at the next step");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut orchestrator = Orchestrator::new(Arc::new(inspector), snapshot, ranker, confirm)
        .with_observer(observer)
        .with_config(PipelineConfig {
            owner_concurrency: settings.owner_concurrency,
        })
        .with_shutdown(shutdown_rx);
    if let Some(generator) = build_generator(settings)? {
        orchestrator = orchestrator.with_generator(generator);
    }

    let outcome = orchestrator.run().await;
    console.finish();
    interrupt.abort();
    let outcome = outcome.context("check failed")?;
    log::info!("Check finished: success={}", outcome.is_success());

    match outcome {
        Outcome::NoChange => failure(
            args.json,
            "no_change",
            "No staged changes found. Run 'git add' first.",
        ),
        Outcome::NoneRelated { .. } => finish(
            args.json,
            CheckSummary {
                status: "isolated",
                message: Some(
                    "\nNo significantly related files found.\n   Your changes appear to be isolated."
                        .to_string(),
                ),
                report: None,
            },
            ExitCode::SUCCESS,
        ),
        Outcome::BackendFailed(err) => {
            let message = backend_failure_message(&err, backend, settings);
            failure(args.json, "backend_failed", message)
        }
        Outcome::Interrupted(stage) => {
            log::warn!("Check interrupted after {stage}");
            if !args.json {
                eprintln!("\nInterrupted.");
                return Ok(ExitCode::from(EXIT_INTERRUPTED));
            }
            finish(true, interrupted_summary(stage), ExitCode::from(EXIT_INTERRUPTED))
        }
        Outcome::Done(report) => {
            if args.json {
                let summary = CheckSummary {
                    status: "done",
                    message: None,
                    report: Some(&report),
                };
                return finish(true, summary, ExitCode::SUCCESS);
            }
            let draft = render_draft(&report);
            if !draft.is_empty() {
                print_stdout(&format!("\n{draft}"))?;
            }
            print_stdout(&format!("\n{}", style("Analysis complete!").green().bold()))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
