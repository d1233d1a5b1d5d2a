use crisk_protocol::{RelatedFile, Report};
use std::fmt::Write;

const RULE_WIDTH: usize = 50;

fn rule(ch: char) -> String {
    std::iter::repeat(ch).take(RULE_WIDTH).collect()
}

/// Numbered list of impacted files and their owners.
pub fn render_related(related: &[RelatedFile]) -> String {
    let mut out = String::new();
    out.push_str("Your changes may impact:\n\n");
    for (idx, file) in related.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {} (relevance: {:.2})",
            idx + 1,
            file.path,
            file.score
        );
        let _ = writeln!(out, "   → Owner: {}", file.owner_or_unknown());
        out.push('\n');
    }
    out
}

/// Draft block followed by recipients grouped by owner. Empty without a draft.
pub fn render_draft(report: &Report) -> String {
    let Some(draft) = report.draft_message.as_deref() else {
        return String::new();
    };

    let mut out = String::new();
    let dashes = rule('-');
    let _ = writeln!(out, "{dashes}\nDRAFT MESSAGE:\n{dashes}\n{draft}\n{dashes}\n");
    out.push_str("Recipients:\n");
    for recipient in report.recipients() {
        let _ = writeln!(out, "   • {}", recipient.owner);
        for file in recipient.files {
            let _ = writeln!(out, "     - {file}");
        }
    }
    out
}
