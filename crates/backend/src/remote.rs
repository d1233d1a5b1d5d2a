use crate::http::{build_client, post_json};
use crate::ranking::{select_related, Ranking, RankingPolicy, RelatednessClient};
use crate::{BackendError, Result};
use async_trait::async_trait;
use crisk_protocol::wire::{AnalyzeRequest, AnalyzeResponse, ErrorBody};
use crisk_protocol::{ChangeSet, CodebaseSnapshot, RepoIdentity};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use std::time::Duration;

pub const DEFAULT_BACKEND_URL: &str = "https://coderisk.dev";

/// Delegates ranking (and drafting) to the hosted backend using the session token.
pub struct RemoteAnalyzer {
    client: Client,
    base_url: String,
    token: String,
    policy: RankingPolicy,
    timeout: Duration,
}

impl RemoteAnalyzer {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        policy: RankingPolicy,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            policy,
            timeout,
        })
    }

    fn analyze_url(&self) -> String {
        format!("{}/api/analyze", self.base_url)
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|parsed| parsed.error)
        .unwrap_or_else(|_| body.to_string())
}

#[async_trait]
impl RelatednessClient for RemoteAnalyzer {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn rank(
        &self,
        change: &ChangeSet,
        snapshot: &CodebaseSnapshot,
        repo: &RepoIdentity,
    ) -> Result<Ranking> {
        let url = self.analyze_url();
        let body = AnalyzeRequest {
            diff: &change.diff_text,
            codebase: snapshot,
            staged_files: &change.staged_files,
            git_remote: repo.remote.as_deref(),
            git_hash: repo.revision.as_deref(),
        };
        let request = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header("x-auth-token", &self.token);
        let reply = post_json(request, &url, &body, self.timeout).await?;

        if reply.status == StatusCode::UNAUTHORIZED {
            log::error!("Authentication failed: {}", reply.body);
            return Err(BackendError::Unauthorized {
                body: error_message(&reply.body),
            });
        }
        if !reply.status.is_success() {
            log::error!(
                "Backend error {}: {}",
                reply.status,
                error_message(&reply.body)
            );
            return Ok(Ranking::empty());
        }

        let parsed: AnalyzeResponse = match serde_json::from_str(&reply.body) {
            Ok(parsed) => parsed,
            Err(err) => {
                log::error!("Malformed analyze response: {err}");
                return Ok(Ranking::empty());
            }
        };
        Ok(Ranking {
            related: select_related(parsed.related_files, change, &self.policy),
            server_draft: parsed
                .draft_message
                .filter(|draft| !draft.trim().is_empty()),
        })
    }
}
