use crate::{PipelineError, Result};
use crisk_backend::{investigation_prompt, TextGenerator};
use crisk_git::RepositoryInspector;
use crisk_protocol::OwnerIdentity;
use std::fmt::Write;

/// Lines of context shown on each side of the investigated line.
pub const SNIPPET_RADIUS: usize = 10;

/// Everything known about one line before asking its author about it.
#[derive(Debug, Clone, PartialEq)]
pub struct LineInquiry {
    pub file_path: String,
    pub line: usize,
    pub author: OwnerIdentity,
    pub commit: String,
    pub commit_message: String,
    pub snippet: String,
}

impl LineInquiry {
    pub fn short_commit(&self) -> &str {
        &self.commit[..self.commit.len().min(8)]
    }

    pub fn prompt(&self) -> String {
        investigation_prompt(
            &self.file_path,
            self.line,
            &self.commit_message,
            &self.snippet,
        )
    }
}

/// Numbered excerpt around `line` (1-based), the target marked with `>>>`.
pub fn code_snippet(content: &str, line: usize, radius: usize) -> String {
    let start = line.saturating_sub(radius).max(1);
    let end = line + radius;
    let mut out = String::new();
    for (idx, text) in content.lines().enumerate() {
        let number = idx + 1;
        if number < start {
            continue;
        }
        if number > end {
            break;
        }
        let marker = if number == line { ">>>" } else { "   " };
        let _ = writeln!(out, "{marker} {number}: {text}");
    }
    out
}

/// Gathers blame and surrounding code for `path:line`.
pub async fn inspect_line(
    inspector: &dyn RepositoryInspector,
    path: &str,
    line: usize,
) -> Result<LineInquiry> {
    let bytes = tokio::fs::read(inspector.root().join(path)).await?;
    let content = String::from_utf8_lossy(&bytes);
    let lines = content.lines().count();
    if line == 0 || line > lines {
        return Err(PipelineError::LineOutOfRange {
            path: path.to_string(),
            line,
            lines,
        });
    }

    let blame = inspector.line_blame(path, line).await?;
    let author = blame
        .author_mail
        .or(blame.author_name)
        .map(OwnerIdentity::from)
        .unwrap_or(OwnerIdentity::Unknown);

    Ok(LineInquiry {
        file_path: path.to_string(),
        line,
        author,
        commit: blame.commit,
        commit_message: blame.summary.unwrap_or_default(),
        snippet: code_snippet(&content, line, SNIPPET_RADIUS),
    })
}

/// Asks the text generator for a hypothesis question about the line.
pub async fn ask_question(inquiry: &LineInquiry, generator: &dyn TextGenerator) -> Result<String> {
    Ok(generator.generate(&inquiry.prompt()).await?)
}
