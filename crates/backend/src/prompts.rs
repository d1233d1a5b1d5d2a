use crate::http::truncate_chars;
use crisk_protocol::{ChangeSet, RelatedFile};

/// Characters of the staged diff quoted in a draft prompt.
pub const DRAFT_DIFF_EXCERPT_CHARS: usize = 2_000;

/// Prompt for the message a developer sends to owners of impacted files.
pub fn draft_notification_prompt(change: &ChangeSet, related: &[RelatedFile]) -> String {
    let related_summary = related
        .iter()
        .map(|file| {
            format!(
                "- {} (owner: {}, relevance: {:.2})",
                file.path,
                file.owner_or_unknown(),
                file.score
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are helping a developer notify code owners about potentially impacted files.

The developer is making changes to: {staged}

These files may be impacted:
{related_summary}

The actual diff:
```
{diff}
```

Write a brief, friendly Slack message (3-4 sentences) that:
1. Mentions what files are being changed
2. Notes which files might be impacted
3. Asks if there are any concerns or dependencies to be aware of

Be concise and specific. Don't be overly formal.",
        staged = change.staged_files.join(", "),
        diff = truncate_chars(&change.diff_text, DRAFT_DIFF_EXCERPT_CHARS),
    )
}

/// Prompt asking for a specific hypothesis about one confusing line.
pub fn investigation_prompt(
    file_path: &str,
    line: usize,
    commit_message: &str,
    snippet: &str,
) -> String {
    format!(
        "You are a Senior Engineer. A junior dev is confused by this code.

FILE: {file_path}
LINE: {line}
COMMIT MESSAGE: {commit_message}

CODE CONTEXT:
{snippet}

Don't just ask 'What does this do?' Formulate a specific hypothesis based on the variable names and commit message. Ask a question that can be answered with a simple explanation. Be brief.

Write a short Slack message (2-3 sentences max) that:
1. References the specific file and line
2. States what you SEE (the confusing thing)
3. Proposes a hypothesis and asks if it's correct

Example: \"Hey, I'm reviewing `billing.py`. I see a 5% tax rate hardcoded on line 42. Is this derived from the 2023 CA Regulatory update, or is it a placeholder?\""
    )
}
