use crate::{BackendError, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use std::time::Duration;

const LOG_BODY_CHARS: usize = 500;
const REDACTED_PREFIX_CHARS: usize = 20;

pub(crate) struct HttpReply {
    pub status: StatusCode,
    pub body: String,
}

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("crisk/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(BackendError::Transport)
}

fn classify(err: reqwest::Error, timeout: Duration) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout { after: timeout }
    } else {
        BackendError::Transport(err)
    }
}

/// Serializes `body`, sends it and collects the whole reply as text.
pub(crate) async fn post_json<B: Serialize + ?Sized>(
    request: RequestBuilder,
    url: &str,
    body: &B,
    timeout: Duration,
) -> Result<HttpReply> {
    let payload = serde_json::to_vec(body)?;
    log::info!("REQUEST: POST {url}");
    log::debug!("  Payload size: {} bytes", payload.len());

    let response = request
        .header(CONTENT_TYPE, "application/json")
        .body(payload)
        .send()
        .await
        .map_err(|err| classify(err, timeout))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| classify(err, timeout))?;

    log::info!("RESPONSE: {status}");
    if !body.is_empty() {
        log::debug!("  Body: {}", truncate_chars(&body, LOG_BODY_CHARS));
    }
    Ok(HttpReply { status, body })
}

/// Longest prefix of `text` with at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Redacts a secret for logs and status output.
pub fn redact_secret(secret: &str) -> String {
    format!("{}...", truncate_chars(secret, REDACTED_PREFIX_CHARS))
}
