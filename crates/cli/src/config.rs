use clap::ValueEnum;
use crisk_backend::{
    DEFAULT_BACKEND_URL, DEFAULT_GENERATION_MODEL, DEFAULT_GENERATION_URL, DEFAULT_RANK_URL,
};
use crisk_pipeline::{DEFAULT_OWNER_CONCURRENCY, MAX_OWNER_CONCURRENCY};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_RANK_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_DRAFT_TIMEOUT: Duration = Duration::from_secs(60);

/// Which relatedness backend a check runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// Hosted analyzer, authenticated with the session token from `crisk login`
    Remote,
    /// Scoring service called directly with `RELACE_API_KEY`
    Local,
}

impl BackendKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "remote" => Some(Self::Remote),
            "local" => Some(Self::Local),
            _ => None,
        }
    }
}

/// Process configuration resolved from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub home: PathBuf,
    pub backend: BackendKind,
    pub backend_url: String,
    pub relace_api_key: Option<String>,
    pub rank_url: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_url: String,
    pub rank_timeout: Duration,
    pub draft_timeout: Duration,
    pub owner_concurrency: usize,
    /// Problems found while reading the environment, logged once logging is up.
    pub warnings: Vec<String>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let secs = |name: &str| {
            var(name)
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
        };

        let mut warnings = Vec::new();
        let backend = match var("CRISK_BACKEND") {
            Some(raw) => BackendKind::parse(&raw).unwrap_or_else(|| {
                warnings.push(format!("Ignoring unknown CRISK_BACKEND value {raw:?}"));
                BackendKind::Remote
            }),
            None => BackendKind::Remote,
        };

        let owner_concurrency = var("CRISK_OWNER_CONCURRENCY")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_OWNER_CONCURRENCY)
            .clamp(1, MAX_OWNER_CONCURRENCY);

        Self {
            home: var("CRISK_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(default_home),
            backend,
            backend_url: var("CRISK_BACKEND_URL")
                .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            relace_api_key: var("RELACE_API_KEY"),
            rank_url: var("CRISK_RANK_URL").unwrap_or_else(|| DEFAULT_RANK_URL.to_string()),
            gemini_api_key: var("GEMINI_API_KEY"),
            gemini_model: var("CRISK_GEMINI_MODEL")
                .unwrap_or_else(|| DEFAULT_GENERATION_MODEL.to_string()),
            gemini_url: var("CRISK_GEMINI_URL")
                .unwrap_or_else(|| DEFAULT_GENERATION_URL.to_string()),
            rank_timeout: secs("CRISK_RANK_TIMEOUT_SECS").unwrap_or(DEFAULT_RANK_TIMEOUT),
            draft_timeout: secs("CRISK_DRAFT_TIMEOUT_SECS").unwrap_or(DEFAULT_DRAFT_TIMEOUT),
            owner_concurrency,
            warnings,
        }
    }

    pub fn token_path(&self) -> PathBuf {
        self.home.join("token")
    }

    pub fn log_path(&self) -> PathBuf {
        self.home.join("crisk.log")
    }
}

fn default_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".crisk")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let s = settings(&[]);
        assert_eq!(s.backend, BackendKind::Remote);
        assert_eq!(s.backend_url, DEFAULT_BACKEND_URL);
        assert_eq!(s.rank_url, DEFAULT_RANK_URL);
        assert_eq!(s.gemini_model, DEFAULT_GENERATION_MODEL);
        assert_eq!(s.rank_timeout, DEFAULT_RANK_TIMEOUT);
        assert_eq!(s.draft_timeout, DEFAULT_DRAFT_TIMEOUT);
        assert_eq!(s.owner_concurrency, DEFAULT_OWNER_CONCURRENCY);
        assert!(s.relace_api_key.is_none());
        assert!(s.home.ends_with(".crisk"));
        assert!(s.warnings.is_empty());
    }

    #[test]
    fn environment_overrides() {
        let s = settings(&[
            ("CRISK_HOME", "/tmp/crisk-home"),
            ("CRISK_BACKEND", "LOCAL"),
            ("CRISK_BACKEND_URL", "http://127.0.0.1:3000/"),
            ("RELACE_API_KEY", " rlc-key "),
            ("CRISK_RANK_TIMEOUT_SECS", "5"),
            ("CRISK_OWNER_CONCURRENCY", "64"),
        ]);
        assert_eq!(s.backend, BackendKind::Local);
        assert_eq!(s.backend_url, "http://127.0.0.1:3000");
        assert_eq!(s.relace_api_key.as_deref(), Some("rlc-key"));
        assert_eq!(s.rank_timeout, Duration::from_secs(5));
        assert_eq!(s.owner_concurrency, MAX_OWNER_CONCURRENCY);
        assert_eq!(s.token_path(), PathBuf::from("/tmp/crisk-home/token"));
        assert_eq!(s.log_path(), PathBuf::from("/tmp/crisk-home/crisk.log"));
    }

    #[test]
    fn invalid_values_fall_back() {
        let s = settings(&[
            ("CRISK_BACKEND", "cloud"),
            ("CRISK_DRAFT_TIMEOUT_SECS", "0"),
            ("CRISK_OWNER_CONCURRENCY", "0"),
            ("GEMINI_API_KEY", "   "),
        ]);
        assert_eq!(s.backend, BackendKind::Remote);
        assert_eq!(s.draft_timeout, DEFAULT_DRAFT_TIMEOUT);
        assert_eq!(s.owner_concurrency, 1);
        assert!(s.gemini_api_key.is_none());
        assert_eq!(
            s.warnings,
            vec![r#"Ignoring unknown CRISK_BACKEND value "cloud""#.to_string()]
        );
    }
}
