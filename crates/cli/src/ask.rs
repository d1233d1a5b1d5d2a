use crate::config::Settings;
use crate::output::rule;
use anyhow::{Context as AnyhowContext, Result};
use clap::Args;
use console::style;
use crisk_backend::GeminiGenerator;
use crisk_git::{GitCli, GitError, RepositoryInspector};
use crisk_pipeline::{ask_question, inspect_line, PipelineError};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, Args)]
pub struct AskArgs {
    /// File to investigate, relative to the current directory
    pub file: PathBuf,

    /// 1-based line number
    pub line: usize,
}

/// `file` as a `/`-separated path relative to the repository root.
fn repo_relative(root: &Path, cwd: &Path, file: &Path) -> Result<String> {
    let absolute = if file.is_absolute() {
        file.to_path_buf()
    } else {
        cwd.join(file)
    };
    let absolute = absolute
        .canonicalize()
        .with_context(|| format!("cannot access {}", file.display()))?;
    let root = root
        .canonicalize()
        .with_context(|| format!("cannot access {}", root.display()))?;
    let relative = absolute
        .strip_prefix(&root)
        .with_context(|| format!("{} is outside the repository", file.display()))?;
    Ok(relative
        .components()
        .map(|part| part.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}

pub async fn run_ask(settings: &Settings, args: &AskArgs) -> Result<ExitCode> {
    let Some(api_key) = settings.gemini_api_key.clone() else {
        println!("GEMINI_API_KEY is not set. Add it to your environment or a .env file.");
        return Ok(ExitCode::FAILURE);
    };

    let cwd = std::env::current_dir().context("cannot read the working directory")?;
    let inspector = match GitCli::discover(&cwd).await {
        Ok(inspector) => inspector,
        Err(GitError::NotARepository(path)) => {
            println!("Not a git repository: {path}");
            return Ok(ExitCode::FAILURE);
        }
        Err(err) => return Err(err).context("cannot inspect the repository"),
    };
    let path = repo_relative(inspector.root(), &cwd, &args.file)?;
    log::info!("Investigating {path}:{}", args.line);

    println!("{}", style("Line investigation").bold());
    println!("{}", rule('='));
    println!("\nInvestigating {path}:{}", args.line);

    let inquiry = match inspect_line(&inspector, &path, args.line).await {
        Ok(inquiry) => inquiry,
        Err(PipelineError::LineOutOfRange { lines, .. }) => {
            println!(
                "{}",
                style(format!("Line {} is out of range ({path} has {lines} lines).", args.line)).red()
            );
            return Ok(ExitCode::FAILURE);
        }
        Err(err) => return Err(err).with_context(|| format!("cannot blame {path}:{}", args.line)),
    };

    println!("\n   Author:  {}", inquiry.author);
    println!("   Commit:  {}", inquiry.short_commit());
    println!("   Message: {}", inquiry.commit_message);
    println!("\nCode context:\n{}", rule('-'));
    print!("{}", inquiry.snippet);
    println!("{}", rule('-'));

    let generator = GeminiGenerator::new(
        &settings.gemini_url,
        &settings.gemini_model,
        api_key,
        settings.draft_timeout,
    )
    .context("failed to build the generation client")?;
    println!("\nGenerating question...");
    let question = match ask_question(&inquiry, &generator).await {
        Ok(question) => question,
        Err(err) => {
            log::error!("Question generation failed: {err}");
            println!("{}", style(format!("Could not generate a question: {err}")).red());
            return Ok(ExitCode::FAILURE);
        }
    };

    println!("\n{}", rule('='));
    println!("TO: {}", inquiry.author);
    println!("RE: {path}:{} (commit {})", args.line, inquiry.short_commit());
    println!("{}", rule('-'));
    println!("{question}");
    println!("{}", rule('='));
    Ok(ExitCode::SUCCESS)
}
