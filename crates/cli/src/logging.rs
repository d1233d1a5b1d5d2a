use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

const SESSION_RULE_WIDTH: usize = 60;

/// Log lines look like `2025-01-01T12:00:00Z | INFO     | message`.
pub fn init(log_path: &Path, verbose: bool, quiet: bool, to_stderr: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // HTTP stack internals only matter when debugging
    if !verbose {
        for noisy in ["hyper", "hyper_util", "reqwest", "rustls", "h2"] {
            builder.filter_module(noisy, log::LevelFilter::Warn);
        }
    }
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} | {:<8} | {}",
            buf.timestamp_seconds(),
            record.level(),
            record.args()
        )
    });

    if to_stderr {
        builder.target(env_logger::Target::Stderr);
    } else {
        match open_log_file(log_path) {
            Ok(file) => {
                builder
                    .write_style(env_logger::WriteStyle::Never)
                    .target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(err) => {
                eprintln!(
                    "warning: cannot write log file {}: {err}",
                    log_path.display()
                );
                builder
                    .filter_level(log::LevelFilter::Warn)
                    .target(env_logger::Target::Stderr);
            }
        }
    }

    if builder.try_init().is_err() {
        return;
    }
    log::info!("{}", "=".repeat(SESSION_RULE_WIDTH));
    log::info!("CRISK session started (v{})", env!("CARGO_PKG_VERSION"));
}

fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
