//! Transcript state machine
//!
//! Turns raw agent-run narration into an ordered step sequence plus running
//! counters. The harness narration is append-only and any section may be
//! missing entirely, so the machine never fails: a line that matches no
//! transition is silently dropped.
//!
//! States: *scanning* (default), *iteration-active*, *collecting-tool-result*.
//! Per trimmed line, transitions are tested in priority order; the first
//! match wins and consumes the line.

use crate::types::{DetailPayload, Step, StepType, ToolDetail};
use regex::Regex;
use std::sync::LazyLock;

/// Token distinguishing harness narration from raw subprocess output.
pub const HARNESS_MARKER: &str = "HARNESS:";

const RUN_START_MARKER: &str = "HARNESS: Starting evaluation run";

static ITERATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"HARNESS: Iteration (\d+)").expect("ITERATION_RE regex should compile")
});

static TOOL_CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"HARNESS: Tool Call (\d+): (.+)$").expect("TOOL_CALL_RE regex should compile")
});

static RESULT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"HARNESS: tool result success: (true|false)")
        .expect("RESULT_RE regex should compile")
});

static EDIT_TARGET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"HARNESS: Editing file: (.+)$").expect("EDIT_TARGET_RE regex should compile")
});

static EDIT_INSTRUCTIONS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"HARNESS: Edit instructions: (.+)$")
        .expect("EDIT_INSTRUCTIONS_RE regex should compile")
});

static LINE_EDIT_COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"HARNESS: Applying (\d+) line edits")
        .expect("LINE_EDIT_COUNT_RE regex should compile")
});

static LINE_EDIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"HARNESS: Edit (\d+): (.+)$").expect("LINE_EDIT_RE regex should compile")
});

static SYNTAX_FAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"HARNESS: Syntax validation failed(?::\s*(.+))?$")
        .expect("SYNTAX_FAIL_RE regex should compile")
});

static ATTEMPTED_CHANGES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"HARNESS: Attempted changes: (.+)$")
        .expect("ATTEMPTED_CHANGES_RE regex should compile")
});

static FILE_WRITE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"HARNESS: Wrote (\d+) bytes to (.+)$")
        .expect("FILE_WRITE_RE regex should compile")
});

/// Everything the state machine recovers from one agent-run transcript.
#[derive(Debug, Default)]
pub struct TranscriptOutcome {
    pub steps: Vec<Step>,
    /// Running maximum of observed iteration numbers
    pub total_iterations: u32,
    pub tool_calls: u32,
    pub errors: u32,
    /// Overrides from the embedded header line; take precedence over the
    /// filename-derived values
    pub model_override: Option<String>,
    pub dataset_override: Option<String>,
    pub task_override: Option<String>,
}

/// Run the state machine over a full transcript.
pub fn run(text: &str) -> TranscriptOutcome {
    let mut out = TranscriptOutcome::default();
    let mut current_iteration: u32 = 0;
    let mut iteration_active = false;
    let mut open_step: Option<usize> = None;
    let mut collecting = false;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        // 1. Run-start marker
        if line.contains(RUN_START_MARKER) {
            let mut step = Step::new(StepType::Start, 0, line);
            step.timestamp = super::extract::find_timestamp(line);
            out.steps.push(step);
            collecting = false;
            continue;
        }

        // 2. Embedded header line with Dataset/Agent/Model/Task fields
        if is_header_line(line) {
            apply_header(line, &mut out);
            continue;
        }

        // 3. Iteration begin: only the running maximum is retained, since
        // iteration numbers need not be monotonic in raw text
        if let Some(caps) = ITERATION_RE.captures(line) {
            if let Ok(n) = caps[1].parse::<u32>() {
                current_iteration = n;
                out.total_iterations = out.total_iterations.max(n);
                iteration_active = true;
                collecting = false;
                continue;
            }
        }

        // 4. Tool call, valid only once an iteration is active; supersedes
        // any still-open result collection from a prior step
        if iteration_active {
            if let Some(caps) = TOOL_CALL_RE.captures(line) {
                out.tool_calls += 1;
                let mut step = Step::new(StepType::Iteration, current_iteration, line);
                step.tool_call = Some(caps[2].trim().to_string());
                out.steps.push(step);
                open_step = Some(out.steps.len() - 1);
                collecting = false;
                continue;
            }
        }

        // 5. Detail markers mutate the open step's detail map
        if let Some(idx) = open_step {
            if apply_detail(line, &mut out.steps[idx]) {
                continue;
            }
        }

        // 6. Result collection persists until a higher-priority transition
        if collecting {
            if let Some(idx) = open_step {
                out.steps[idx].tool_result.push(line.to_string());
                continue;
            }
        }

        // 7. Tool result marker resolves the open step and opens a fresh buffer
        if let Some(caps) = RESULT_RE.captures(line) {
            if let Some(idx) = open_step {
                let ok = &caps[1] == "true";
                out.steps[idx].success = Some(ok);
                if !ok {
                    out.errors += 1;
                }
                out.steps[idx].tool_result.clear();
                collecting = true;
            }
            continue;
        }

        // 8. First error line per step wins
        if line.to_ascii_lowercase().contains("error") {
            if let Some(idx) = open_step {
                if out.steps[idx].error.is_none() {
                    out.steps[idx].error = Some(line.to_string());
                    out.errors += 1;
                }
            }
            continue;
        }

        // Unmatched lines are silently dropped
    }

    out
}

const HEADER_KEYS: [&str; 4] = ["Dataset:", "Agent:", "Model:", "Task:"];

fn is_header_line(line: &str) -> bool {
    line.contains(',') && HEADER_KEYS.iter().filter(|key| line.contains(*key)).count() >= 2
}

fn apply_header(line: &str, out: &mut TranscriptOutcome) {
    for part in line.split(',') {
        if let Some((key, value)) = part.split_once(':') {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.trim() {
                "Dataset" => out.dataset_override = Some(value.to_string()),
                "Model" => out.model_override = Some(value.to_string()),
                "Task" => out.task_override = Some(value.to_string()),
                _ => {}
            }
        }
    }
}

fn apply_detail(line: &str, step: &mut Step) -> bool {
    if let Some(caps) = EDIT_TARGET_RE.captures(line) {
        step.tool_details.insert(
            "edit_target".to_string(),
            ToolDetail::EditTarget {
                path: caps[1].trim().to_string(),
            },
        );
        return true;
    }
    if let Some(caps) = EDIT_INSTRUCTIONS_RE.captures(line) {
        step.tool_details.insert(
            "edit_instructions".to_string(),
            ToolDetail::EditInstructions {
                payload: DetailPayload::decode(caps[1].trim()),
            },
        );
        return true;
    }
    if let Some(caps) = LINE_EDIT_COUNT_RE.captures(line) {
        if let Ok(count) = caps[1].parse() {
            step.tool_details.insert(
                "line_edit_count".to_string(),
                ToolDetail::LineEditCount { count },
            );
            return true;
        }
    }
    if let Some(caps) = LINE_EDIT_RE.captures(line) {
        if let Ok(index) = caps[1].parse::<u32>() {
            step.tool_details.insert(
                format!("edit_{}", index),
                ToolDetail::LineEdit {
                    index,
                    payload: DetailPayload::decode(caps[2].trim()),
                },
            );
            return true;
        }
    }
    if line.contains("HARNESS: Syntax validation passed") {
        step.tool_details.insert(
            "syntax_check".to_string(),
            ToolDetail::SyntaxCheck {
                passed: true,
                detail: None,
            },
        );
        return true;
    }
    if let Some(caps) = SYNTAX_FAIL_RE.captures(line) {
        step.tool_details.insert(
            "syntax_check".to_string(),
            ToolDetail::SyntaxCheck {
                passed: false,
                detail: caps.get(1).map(|m| m.as_str().trim().to_string()),
            },
        );
        return true;
    }
    if line.contains("HARNESS: Changes not applied") {
        step.tool_details.insert(
            "changes_applied".to_string(),
            ToolDetail::ChangesApplied { applied: false },
        );
        return true;
    }
    if line.contains("HARNESS: Changes applied") {
        step.tool_details.insert(
            "changes_applied".to_string(),
            ToolDetail::ChangesApplied { applied: true },
        );
        return true;
    }
    if let Some(caps) = ATTEMPTED_CHANGES_RE.captures(line) {
        step.tool_details.insert(
            "attempted_changes".to_string(),
            ToolDetail::AttemptedChanges {
                payload: DetailPayload::decode(caps[1].trim()),
            },
        );
        return true;
    }
    if let Some(caps) = FILE_WRITE_RE.captures(line) {
        if let Ok(bytes) = caps[1].parse() {
            step.tool_details.insert(
                "file_write".to_string(),
                ToolDetail::FileWrite {
                    bytes,
                    path: caps[2].trim().to_string(),
                },
            );
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC_RUN: &str = "\
2025-01-15 10:30:00 HARNESS: Starting evaluation run
Dataset: counsellor-chat, Agent: gladiator, Model: gpt-4o, Task: task-1
HARNESS: Iteration 1
HARNESS: Tool Call 1: read_file
HARNESS: tool result success: true
contents of app/main.py
more contents
HARNESS: Iteration 2
HARNESS: Tool Call 2: edit_file
HARNESS: Editing file: app/api/stats.py
HARNESS: Applying 2 line edits
HARNESS: Edit 1: {\"start_line\": 10, \"end_line\": 12}
HARNESS: Edit 2: {\"start_line\": 30, \"end_line\": 30}
HARNESS: Syntax validation passed
HARNESS: Changes applied
HARNESS: tool result success: true
edit applied cleanly
";

    #[test]
    fn test_basic_run_counters() {
        let out = run(BASIC_RUN);
        assert_eq!(out.total_iterations, 2);
        assert_eq!(out.tool_calls, 2);
        assert_eq!(out.errors, 0);
        // start + two tool calls
        assert_eq!(out.steps.len(), 3);
        assert_eq!(out.steps[0].step_type, StepType::Start);
        assert_eq!(out.steps[0].timestamp.as_deref(), Some("2025-01-15 10:30:00"));
    }

    #[test]
    fn test_header_overrides() {
        let out = run(BASIC_RUN);
        assert_eq!(out.model_override.as_deref(), Some("gpt-4o"));
        assert_eq!(out.task_override.as_deref(), Some("task-1"));
        assert_eq!(out.dataset_override.as_deref(), Some("counsellor-chat"));
    }

    #[test]
    fn test_result_collection() {
        let out = run(BASIC_RUN);
        assert_eq!(
            out.steps[1].tool_result,
            vec!["contents of app/main.py", "more contents"]
        );
        assert_eq!(out.steps[1].success, Some(true));
    }

    #[test]
    fn test_tool_details() {
        let out = run(BASIC_RUN);
        let details = &out.steps[2].tool_details;
        assert!(matches!(
            details.get("edit_target"),
            Some(ToolDetail::EditTarget { path }) if path == "app/api/stats.py"
        ));
        assert!(matches!(
            details.get("line_edit_count"),
            Some(ToolDetail::LineEditCount { count: 2 })
        ));
        assert!(matches!(
            details.get("edit_1"),
            Some(ToolDetail::LineEdit {
                index: 1,
                payload: DetailPayload::Json(_)
            })
        ));
        assert!(matches!(
            details.get("syntax_check"),
            Some(ToolDetail::SyntaxCheck { passed: true, .. })
        ));
        assert!(matches!(
            details.get("changes_applied"),
            Some(ToolDetail::ChangesApplied { applied: true })
        ));
    }

    #[test]
    fn test_iteration_max_not_monotonic() {
        let text = "\
HARNESS: Starting evaluation run
HARNESS: Iteration 5
HARNESS: Iteration 2
HARNESS: Iteration 3
";
        let out = run(text);
        assert_eq!(out.total_iterations, 5);
    }

    #[test]
    fn test_tool_call_requires_active_iteration() {
        let text = "\
HARNESS: Starting evaluation run
HARNESS: Tool Call 1: read_file
";
        let out = run(text);
        assert_eq!(out.tool_calls, 0);
        assert_eq!(out.steps.len(), 1);
    }

    #[test]
    fn test_failed_result_increments_errors() {
        let text = "\
HARNESS: Iteration 1
HARNESS: Tool Call 1: edit_file
HARNESS: tool result success: false
Traceback (most recent call last)
";
        let out = run(text);
        assert_eq!(out.errors, 1);
        assert_eq!(out.steps[0].success, Some(false));
        assert_eq!(out.steps[0].tool_result, vec!["Traceback (most recent call last)"]);
    }

    #[test]
    fn test_first_error_per_step_wins() {
        let text = "\
HARNESS: Iteration 1
HARNESS: Tool Call 1: run_tests
ERROR: assertion failed in test_upload
error: second failure line
";
        let out = run(text);
        assert_eq!(out.errors, 1);
        assert_eq!(
            out.steps[0].error.as_deref(),
            Some("ERROR: assertion failed in test_upload")
        );
    }

    #[test]
    fn test_new_tool_call_supersedes_collection() {
        let text = "\
HARNESS: Iteration 1
HARNESS: Tool Call 1: read_file
HARNESS: tool result success: true
line one
HARNESS: Tool Call 2: list_dir
HARNESS: tool result success: true
entry a
";
        let out = run(text);
        assert_eq!(out.steps[0].tool_result, vec!["line one"]);
        assert_eq!(out.steps[1].tool_result, vec!["entry a"]);
    }

    #[test]
    fn test_syntax_failure_detail() {
        let text = "\
HARNESS: Iteration 1
HARNESS: Tool Call 1: edit_file
HARNESS: Syntax validation failed: unexpected indent
HARNESS: Changes not applied
";
        let out = run(text);
        let details = &out.steps[0].tool_details;
        assert!(matches!(
            details.get("syntax_check"),
            Some(ToolDetail::SyntaxCheck { passed: false, detail: Some(d) }) if d == "unexpected indent"
        ));
        assert!(matches!(
            details.get("changes_applied"),
            Some(ToolDetail::ChangesApplied { applied: false })
        ));
    }

    #[test]
    fn test_unmatched_lines_dropped() {
        let text = "\
random subprocess noise
HARNESS: Unknown marker: payload
";
        let out = run(text);
        assert!(out.steps.is_empty());
        assert_eq!(out.errors, 0);
    }

    #[test]
    fn test_result_marker_while_collecting_is_buffered() {
        // A second result marker arrives while a collection is open; it is
        // captured into the buffer rather than re-resolving the step.
        let text = "\
HARNESS: Iteration 1
HARNESS: Tool Call 1: run_tests
HARNESS: tool result success: true
HARNESS: tool result success: false
";
        let out = run(text);
        assert_eq!(out.steps[0].success, Some(true));
        assert_eq!(out.errors, 0);
        assert_eq!(
            out.steps[0].tool_result,
            vec!["HARNESS: tool result success: false"]
        );
    }
}
