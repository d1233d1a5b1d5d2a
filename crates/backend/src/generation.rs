use crate::http::{build_client, post_json};
use crate::{BackendError, Result};
use async_trait::async_trait;
use crisk_protocol::wire::{Content, GenerateContentRequest, GenerateContentResponse};
use reqwest::{Client, StatusCode};
use std::time::Duration;

pub const DEFAULT_GENERATION_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GENERATION_MODEL: &str = "gemini-2.5-pro";

/// Single-turn text generation: one user-role prompt in, free text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// `generateContent` client for Gemini-compatible endpoints.
pub struct GeminiGenerator {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl GeminiGenerator {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
            timeout,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = self.endpoint();
        let body = GenerateContentRequest {
            contents: vec![Content::user_text(prompt)],
        };
        let request = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key);
        let reply = post_json(request, &url, &body, self.timeout).await?;

        match reply.status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(BackendError::Unauthorized { body: reply.body })
            }
            status if !status.is_success() => {
                return Err(BackendError::Status {
                    status: status.as_u16(),
                    body: reply.body,
                })
            }
            _ => {}
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&reply.body)?;
        parsed
            .first_text()
            .map(|text| text.trim().to_string())
            .ok_or(BackendError::EmptyGeneration)
    }
}
