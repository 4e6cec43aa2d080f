//! Shared post-processors
//!
//! Sub-extractors invoked on the full transcript text by both the agent-run
//! parser and the baseline path: test results, lab training metrics, final
//! pass/fail tally, duration, and timestamps. Each is a pure scan over the
//! text; a pattern that never occurs simply yields absence.

use crate::types::{LabTrainingMetrics, TestResult, TestStatus};
use regex::Regex;
use std::sync::LazyLock;

// ============================================
// Test results
// ============================================

static SINGLE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:pass|fail)\s+(.+::.+?):\s*(PASSED|FAILED)\s*$")
        .expect("SINGLE_LINE_RE regex should compile")
});

static PATH_ONLY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:pass|fail)\s+(\S+::\S+)\s*$").expect("PATH_ONLY_RE regex should compile")
});

/// How many lines ahead a bare `pass`/`fail` token may look for its
/// terminator before the candidate is discarded.
const LOOKAHEAD_WINDOW: usize = 3;

/// Extract pass/fail test lines. Three sub-grammars are recognized:
///
/// 1. single line: `pass tests/x.py::test_a: PASSED`
/// 2. path line followed immediately by a bare `PASSED`/`FAILED` trailer
/// 3. bare `pass`/`fail` token with the path wrapped across following lines,
///    terminated by a trailer within a 3-line window
///
/// A wrapped candidate with no terminator inside the window is discarded
/// outright, never retried with a larger window. Results are
/// order-preserving and not deduplicated.
pub fn extract_test_results(text: &str) -> Vec<TestResult> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let mut results = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        if let Some(caps) = SINGLE_LINE_RE.captures(line) {
            results.push(make_result(&caps[1], trailer_status(&caps[2])));
            i += 1;
            continue;
        }

        if let Some(caps) = PATH_ONLY_RE.captures(line) {
            if let Some(&next) = lines.get(i + 1) {
                if next == "PASSED" || next == "FAILED" {
                    results.push(make_result(&caps[1], trailer_status(next)));
                    i += 2;
                    continue;
                }
            }
        }

        if line == "pass" || line == "fail" {
            if let Some((result, consumed)) = reassemble_wrapped(&lines, i) {
                results.push(result);
                i += consumed;
                continue;
            }
            // No terminator inside the window: drop the candidate.
        }

        i += 1;
    }

    results
}

/// Reconstruct a test path wrapped across lines after a bare token at
/// `start`. Returns the result plus the number of lines consumed
/// (token line included), or `None` when the window closes unterminated.
fn reassemble_wrapped(lines: &[&str], start: usize) -> Option<(TestResult, usize)> {
    let mut pieces = String::new();

    for offset in 1..=LOOKAHEAD_WINDOW {
        let line = *lines.get(start + offset)?;

        if let Some(pos) = line.find("PASSED").or_else(|| line.find("FAILED")) {
            let status = trailer_status(&line[pos..pos + 6]);
            let before = line[..pos].trim_end().trim_end_matches(':').trim_end();
            pieces.push_str(before);
            if pieces.is_empty() {
                return None;
            }
            return Some((make_result(&pieces, status), offset + 1));
        }

        pieces.push_str(line);
    }

    None
}

fn trailer_status(trailer: &str) -> TestStatus {
    if trailer.starts_with("PASSED") {
        TestStatus::Pass
    } else {
        TestStatus::Fail
    }
}

fn make_result(full_name: &str, status: TestStatus) -> TestResult {
    let full_name = full_name.trim().to_string();
    let name = full_name
        .rsplit("::")
        .next()
        .unwrap_or(&full_name)
        .to_string();
    TestResult {
        name,
        status,
        full_name,
    }
}

// ============================================
// Final pass/fail tally
// ============================================

static TOTAL_TESTS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Total tests:\s*(\d+)/(\d+) passed").expect("TOTAL_TESTS_RE regex should compile")
});

static PASSED_TESTS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Passed\s+(\d+)/(\d+) tests").expect("PASSED_TESTS_RE regex should compile")
});

/// Final tally resolved from the transcript's summary lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalTally {
    pub tests_passed: u32,
    pub total_tests: u32,
    pub success: bool,
}

/// Resolve the run verdict from `Total tests: P/T passed` lines, keeping the
/// **last** occurrence since logs may print the tally multiple times. Falls
/// back identically to `Passed P/T tests`. `None` when neither ever occurs;
/// the caller then derives `success = false`.
pub fn resolve_final_tally(text: &str) -> Option<FinalTally> {
    let caps = TOTAL_TESTS_RE
        .captures_iter(text)
        .last()
        .or_else(|| PASSED_TESTS_RE.captures_iter(text).last())?;

    let passed: u32 = caps[1].parse().ok()?;
    let total: u32 = caps[2].parse().ok()?;
    let passed = passed.min(total);
    Some(FinalTally {
        tests_passed: passed,
        total_tests: total,
        success: passed == total && total > 0,
    })
}

// ============================================
// Lab training metrics
// ============================================

const METRICS_HEADER: &str = "-- Lab Training Metrics --";
const DETAILS_HEADER: &str = "-- Details --";

/// How many lines after the metrics header are scanned for fields.
const METRICS_SCAN_LINES: usize = 20;

static TRAILING_INT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*$").expect("TRAILING_INT_RE regex should compile"));

/// Extract lab training metrics printed under the literal header
/// `-- Lab Training Metrics --`. Booleans are detected via the substring
/// `True`; integers via a trailing-digit match. Scanning stops at the
/// sibling `-- Details --` header. Absent when the header never occurs.
pub fn extract_metrics(text: &str) -> Option<LabTrainingMetrics> {
    let lines: Vec<&str> = text.lines().collect();
    let header_idx = lines.iter().position(|line| line.contains(METRICS_HEADER))?;

    let mut metrics = LabTrainingMetrics::default();
    for line in lines.iter().skip(header_idx + 1).take(METRICS_SCAN_LINES) {
        if line.contains(DETAILS_HEADER) {
            break;
        }
        if line.contains("Agent Success") {
            metrics.agent_success = Some(line.contains("True"));
        } else if line.contains("Made Code Changes") {
            metrics.made_code_changes = Some(line.contains("True"));
        } else if line.contains("Has Syntax Errors") {
            metrics.has_syntax_errors = Some(line.contains("True"));
        } else if line.contains("Tests Passed") {
            metrics.tests_passed = Some(line.contains("True"));
        } else if line.contains("Total Iterations") {
            metrics.total_iterations = trailing_int(line);
        } else if line.contains("Successful Edits") {
            metrics.successful_edits = trailing_int(line);
        } else if line.contains("Tool Calls") {
            metrics.tool_calls = trailing_int(line);
        }
    }

    Some(metrics)
}

fn trailing_int(line: &str) -> Option<u32> {
    TRAILING_INT_RE
        .captures(line)
        .and_then(|caps| caps[1].parse().ok())
}

// ============================================
// Duration and timestamps
// ============================================

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Total duration:\s*(.+)").expect("DURATION_RE regex should compile")
});

static TIMESTAMP_FULL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}")
        .expect("TIMESTAMP_FULL_RE regex should compile")
});

static TIMESTAMP_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{2}:\d{2}:\d{2}").expect("TIMESTAMP_TIME_RE regex should compile")
});

/// First `Total duration: ...` line, trimmed. Absent if never printed.
pub fn extract_duration(text: &str) -> Option<String> {
    DURATION_RE
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
}

/// First `YYYY-MM-DD HH:MM:SS` match, else bare `HH:MM:SS`, else `None`.
pub fn find_timestamp(text: &str) -> Option<String> {
    TIMESTAMP_FULL_RE
        .find(text)
        .or_else(|| TIMESTAMP_TIME_RE.find(text))
        .map(|m| m.as_str().to_string())
}

/// Like [`find_timestamp`] but with the literal `N/A` fallback.
pub fn extract_timestamp(text: &str) -> String {
    find_timestamp(text).unwrap_or_else(|| "N/A".to_string())
}
