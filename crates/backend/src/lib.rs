//! # CRISK backend
//!
//! Clients for the external collaborators of the pipeline.
//!
//! ```text
//! RelatednessClient ─┬─> DirectRanker   (scoring service, API key)
//!                    └─> RemoteAnalyzer (hosted backend, session token)
//!
//! TextGenerator ───────> GeminiGenerator
//! ```
//!
//! Both relatedness backends share [`select_related`], so the staged-path,
//! threshold and cap rules hold whichever one is configured.

mod direct;
mod error;
mod generation;
mod http;
mod prompts;
mod ranking;
mod remote;

pub use direct::{DirectRanker, DEFAULT_RANK_URL};
pub use error::{BackendError, Result};
pub use generation::{
    GeminiGenerator, TextGenerator, DEFAULT_GENERATION_MODEL, DEFAULT_GENERATION_URL,
};
pub use http::{redact_secret, truncate_chars};
pub use prompts::{draft_notification_prompt, investigation_prompt, DRAFT_DIFF_EXCERPT_CHARS};
pub use ranking::{
    impact_query, select_related, Ranking, RankingPolicy, RelatednessClient,
    DEFAULT_MAX_RELATED, DEFAULT_RELEVANCE_THRESHOLD, DEFAULT_TOKEN_LIMIT,
};
pub use remote::{RemoteAnalyzer, DEFAULT_BACKEND_URL};
