use crate::http::{build_client, post_json};
use crate::ranking::{impact_query, select_related, Ranking, RankingPolicy, RelatednessClient};
use crate::{BackendError, Result};
use async_trait::async_trait;
use crisk_protocol::wire::{RankRequest, RankResponse};
use crisk_protocol::{ChangeSet, CodebaseSnapshot, RepoIdentity};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use std::time::Duration;

pub const DEFAULT_RANK_URL: &str = "https://ranker.endpoint.relace.run/v2/code/rank";

/// Calls the scoring service directly with an API key.
pub struct DirectRanker {
    client: Client,
    url: String,
    api_key: String,
    policy: RankingPolicy,
    timeout: Duration,
}

impl DirectRanker {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        policy: RankingPolicy,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            url: url.into(),
            api_key: api_key.into(),
            policy,
            timeout,
        })
    }
}

#[async_trait]
impl RelatednessClient for DirectRanker {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn rank(
        &self,
        change: &ChangeSet,
        snapshot: &CodebaseSnapshot,
        _repo: &RepoIdentity,
    ) -> Result<Ranking> {
        let query = impact_query(&change.diff_text);
        let body = RankRequest {
            query: &query,
            codebase: snapshot,
            token_limit: self.policy.token_limit,
        };
        let request = self
            .client
            .post(&self.url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key));
        let reply = post_json(request, &self.url, &body, self.timeout).await?;

        if reply.status == StatusCode::UNAUTHORIZED {
            return Err(BackendError::Unauthorized { body: reply.body });
        }
        if !reply.status.is_success() {
            log::error!("Ranking service error {}: {}", reply.status, reply.body);
            return Ok(Ranking::empty());
        }

        let parsed: RankResponse = match serde_json::from_str(&reply.body) {
            Ok(parsed) => parsed,
            Err(err) => {
                log::error!("Malformed ranking response: {err}");
                return Ok(Ranking::empty());
            }
        };
        Ok(Ranking {
            related: select_related(parsed.results, change, &self.policy),
            server_draft: None,
        })
    }
}
