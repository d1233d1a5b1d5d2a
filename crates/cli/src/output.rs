use async_trait::async_trait;
use console::style;
use crisk_pipeline::{render_related, Confirm, PipelineObserver, Stage};
use crisk_protocol::{ChangeSet, RelatedFile, RepoIdentity};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::sync::Mutex;
use std::time::Duration;

pub(crate) const RULE_WIDTH: usize = 50;

pub(crate) fn rule(ch: char) -> String {
    std::iter::repeat(ch).take(RULE_WIDTH).collect()
}

/// Writes a line to stdout, ignoring a closed pipe.
pub(crate) fn print_stdout(text: &str) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err);
    }
    Ok(())
}

/// Human progress output for `crisk check`.
pub struct ConsoleObserver {
    spinner: Mutex<Option<ProgressBar>>,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self {
            spinner: Mutex::new(None),
        }
    }

    fn start_spinner(&self, message: &'static str) {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("   {spinner} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(message);
        spinner.enable_steady_tick(Duration::from_millis(100));
        if let Ok(mut slot) = self.spinner.lock() {
            if let Some(previous) = slot.replace(spinner) {
                previous.finish_and_clear();
            }
        }
    }

    /// Clears a running spinner. Safe to call at any time.
    pub fn finish(&self) {
        if let Some(spinner) = self.spinner.lock().ok().and_then(|mut slot| slot.take()) {
            spinner.finish_and_clear();
        }
    }
}

impl Default for ConsoleObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineObserver for ConsoleObserver {
    fn stage(&self, stage: Stage) {
        match stage {
            Stage::ExtractChange => println!("\nGetting staged changes..."),
            Stage::BuildSnapshot => println!("\nLoading codebase..."),
            Stage::RankRelated => {
                println!("\nFinding related files...");
                self.start_spinner("Analyzing semantic relationships (this may take a minute)");
            }
            Stage::ResolveOwners => {
                self.finish();
                println!("\nIdentifying code owners...");
            }
            Stage::Done => self.finish(),
            Stage::Init | Stage::GenerateDraft => {}
        }
    }

    fn change_extracted(&self, change: &ChangeSet, repo: &RepoIdentity) {
        println!("   Found {} staged file(s):", change.staged_files.len());
        for file in &change.staged_files {
            println!("   • {file}");
        }
        if let Some(remote) = &repo.remote {
            println!("\n   Repository: {remote}");
        }
        if let Some(revision) = &repo.revision {
            println!("   Commit: {}", &revision[..revision.len().min(8)]);
        }
    }

    fn snapshot_built(&self, files: usize, bytes: usize) {
        println!("   Indexed {files} files ({} KB)", bytes / 1024);
    }

    fn owners_resolved(&self, related: &[RelatedFile]) {
        println!("\n{}", rule('='));
        print!("{}", render_related(related));
        println!("{}", rule('='));
    }

    fn draft_skipped(&self, reason: &str) {
        println!("   {}", style(format!("No draft: {reason}")).yellow());
    }
}

/// Asks on the terminal. Any prompt failure counts as "no".
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptConfirm;

#[async_trait]
impl Confirm for PromptConfirm {
    async fn confirm(&self, question: &str) -> bool {
        let question = question.to_string();
        let answer = tokio::task::spawn_blocking(move || {
            dialoguer::Confirm::new()
                .with_prompt(question)
                .default(false)
                .interact()
        })
        .await;
        match answer {
            Ok(Ok(answer)) => answer,
            Ok(Err(err)) => {
                log::debug!("Confirmation prompt failed: {err}");
                false
            }
            Err(err) => {
                log::debug!("Confirmation task failed: {err}");
                false
            }
        }
    }
}
