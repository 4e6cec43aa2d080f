//! Final diff extraction
//!
//! Grading payloads embed the agent's diff and the golden-solution diff as
//! quoted literals (`agent_diff` / `golden_diff`) with escaped newlines and
//! quotes. Extraction is fail-closed: anything that cannot be decoded yields
//! a fully-absent result, never a partial one.

use crate::types::{DiffStats, FinalDiffs};

const AGENT_DIFF_FIELD: &str = "agent_diff";
const GOLDEN_DIFF_FIELD: &str = "golden_diff";

/// Extract the final diffs from a transcript. `None` when neither field is
/// present or a literal cannot be decoded.
pub fn extract_final_diffs(text: &str) -> Option<FinalDiffs> {
    let agent_diff = quoted_field(text, AGENT_DIFF_FIELD);
    let golden_diff = quoted_field(text, GOLDEN_DIFF_FIELD);

    if agent_diff.is_none() && golden_diff.is_none() {
        return None;
    }

    let agent_files = agent_diff.as_deref().map(changed_files).unwrap_or_default();
    let golden_files = golden_diff.as_deref().map(changed_files).unwrap_or_default();

    let mut files_changed: Vec<String> = Vec::new();
    for path in agent_files.iter().chain(golden_files.iter()) {
        if !files_changed.contains(path) {
            files_changed.push(path.clone());
        }
    }

    let diff_stats = DiffStats {
        agent_files_changed: agent_files.len() as u32,
        golden_files_changed: golden_files.len() as u32,
        agent_lines: agent_diff.as_deref().map(line_count).unwrap_or(0),
        golden_lines: golden_diff.as_deref().map(line_count).unwrap_or(0),
    };

    Some(FinalDiffs {
        agent_diff,
        golden_diff,
        files_changed,
        diff_stats,
    })
}

/// Locate `field` in the text and decode the quoted literal that follows it,
/// unescaping `\n` `\t` `\r` `\\` `\'` `\"`. Returns `None` for a missing
/// field, a malformed key/value shape, or an unterminated literal.
fn quoted_field(text: &str, field: &str) -> Option<String> {
    let pos = text.find(field)?;
    let mut chars = text[pos + field.len()..].chars().peekable();

    // Closing quote of the key, if the key itself was quoted
    if matches!(chars.peek(), Some('\'') | Some('"')) {
        chars.next();
    }
    while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
        chars.next();
    }
    if chars.peek() == Some(&':') {
        chars.next();
    } else {
        return None;
    }
    while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
        chars.next();
    }

    let quote = match chars.next() {
        Some(q @ ('\'' | '"')) => q,
        _ => return None,
    };

    let mut out = String::new();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('\\') => out.push('\\'),
                Some('\'') => out.push('\''),
                Some('"') => out.push('"'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => return None,
            }
        } else if c == quote {
            return Some(out);
        } else {
            out.push(c);
        }
    }

    // Unterminated literal
    None
}

/// Changed file paths: `--- a/<path>` headers immediately followed by a
/// `+++ b/` line, deduplicated in first-seen order.
fn changed_files(diff: &str) -> Vec<String> {
    let lines: Vec<&str> = diff.lines().collect();
    let mut files = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if let Some(path) = line.strip_prefix("--- a/") {
            let followed = lines
                .get(i + 1)
                .map(|next| next.starts_with("+++ b/"))
                .unwrap_or(false);
            if followed {
                let path = path.trim().to_string();
                if !files.contains(&path) {
                    files.push(path);
                }
            }
        }
    }

    files
}

fn line_count(diff: &str) -> u32 {
    diff.lines().count() as u32
}
