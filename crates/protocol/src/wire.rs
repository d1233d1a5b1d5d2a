//! JSON bodies exchanged with the scoring, analysis and text-generation services.

use crate::CodebaseSnapshot;
use serde::{Deserialize, Serialize};

/// Body of the local-direct ranking call.
#[derive(Debug, Serialize)]
pub struct RankRequest<'a> {
    pub query: &'a str,
    pub codebase: &'a CodebaseSnapshot,
    pub token_limit: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScoredFile {
    pub filename: String,
    #[serde(default, alias = "relevance")]
    pub score: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct RankResponse {
    #[serde(default)]
    pub results: Vec<ScoredFile>,
}

/// Body of the remote-delegated analysis call.
#[derive(Debug, Serialize)]
pub struct AnalyzeRequest<'a> {
    pub diff: &'a str,
    pub codebase: &'a CodebaseSnapshot,
    pub staged_files: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_remote: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_hash: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeResponse {
    #[serde(default)]
    pub related_files: Vec<ScoredFile>,
    #[serde(default)]
    pub draft_message: Option<String>,
}

/// Error payload some backends attach to non-success responses.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<ContentPart>,
}

impl Content {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![ContentPart {
                text: Some(text.into()),
            }],
        }
    }

    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, if it has any.
    pub fn first_text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text = content.joined_text();
        (!text.trim().is_empty()).then_some(text)
    }
}
