use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use crisk_backend::redact_secret;
use std::process::ExitCode;

mod ask;
mod check;
mod config;
mod logging;
mod login;
mod output;
mod session;

pub use ask::AskArgs;
pub use check::{CheckArgs, EXIT_INTERRUPTED};
pub use config::{BackendKind, Settings};
pub use login::{authorize_url, wait_for_callback, LoginResult, CALLBACK_PORT, LOGIN_TIMEOUT};
pub use session::TokenStore;

#[derive(Parser)]
#[command(name = "crisk")]
#[command(about = "Find the files your staged changes may impact and who owns them", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Write logs to stderr instead of the session log file
    #[arg(long, global = true)]
    log_stderr: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze staged changes for impacted files and their owners
    Check(CheckArgs),

    /// Authenticate with the CodeRisk backend in the browser
    Login,

    /// Remove the stored session token
    Logout,

    /// Show authentication and backend settings
    Status,

    /// Ask the author of a line why it is the way it is
    Ask(AskArgs),
}

fn run_logout(settings: &Settings) -> Result<ExitCode> {
    if TokenStore::new(settings.token_path()).clear()? {
        println!("Logged out successfully.");
    } else {
        println!("Already logged out.");
    }
    Ok(ExitCode::SUCCESS)
}

fn run_status(settings: &Settings) -> Result<ExitCode> {
    let store = TokenStore::new(settings.token_path());
    println!("{}", style("CodeRisk status").bold());
    match store.load() {
        Some(token) => {
            println!("   {}", style("Authenticated").green());
            println!("   Token: {}", redact_secret(&token));
        }
        None => {
            println!("   {}", style("Not authenticated").red());
            println!("   Run 'crisk login' to authenticate.");
        }
    }
    let backend = match settings.backend {
        BackendKind::Remote => "remote",
        BackendKind::Local => "local",
    };
    println!("   Backend: {backend} ({})", settings.backend_url);
    println!("   Home: {}", settings.home.display());
    Ok(ExitCode::SUCCESS)
}

pub async fn main_entry() -> Result<ExitCode> {
    // A missing .env is the normal case.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let settings = Settings::from_env();
    logging::init(&settings.log_path(), cli.verbose, cli.quiet, cli.log_stderr);
    for warning in &settings.warnings {
        log::warn!("{warning}");
    }

    match cli.command {
        Commands::Check(args) => check::run_check(&settings, &args).await,
        Commands::Login => login::run_login(&settings).await,
        Commands::Logout => run_logout(&settings),
        Commands::Status => run_status(&settings),
        Commands::Ask(args) => ask::run_ask(&settings, &args).await,
    }
}
