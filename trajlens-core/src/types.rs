//! Core domain types for trajlens
//!
//! These types are the structured record produced from one evaluation
//! transcript, plus the accumulator used for pass-rate aggregation.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Trajectory** | Structured record of one evaluation run's execution and outcome |
//! | **Step** | One observable event inside a run: run start, a tool call within an iteration, or a synthetic baseline marker |
//! | **Baseline run** | Reference execution: oracle (golden diff applied) or null-agent (no changes attempted) |
//! | **Canonical model key** | Normalized identifier, distinct from the display string, used to group aggregates |
//!
//! A `Trajectory` is reconstructed from text on every request and is never
//! mutated after it is returned. Baseline trajectories are nested at most one
//! level deep: a baseline never carries baselines of its own.

use serde::Serialize;
use std::collections::BTreeMap;

// ============================================
// Log store descriptor
// ============================================

/// Descriptor for one log file as reported by the external log store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFile {
    /// File name, e.g. `gpt-4o_counsellor-chat_task-1.log`
    pub filename: String,
    /// Size in bytes
    pub size_bytes: u64,
}

// ============================================
// Steps
// ============================================

/// Kind of step inside a trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    /// Run-start banner
    Start,
    /// Tool call inside an iteration
    Iteration,
    /// Synthetic step for oracle / null-agent baseline logs
    OracleNullRun,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::Start => "start",
            StepType::Iteration => "iteration",
            StepType::OracleNullRun => "oracle_null_run",
        }
    }
}

/// Structured payload attached to a tool-call step by a detail marker line.
///
/// Each detail kind is its own variant rather than untyped JSON, so callers
/// can match on what was found without losing the "attach whatever the
/// harness printed" flexibility.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolDetail {
    /// `Editing file: <path>`
    EditTarget { path: String },
    /// `Edit instructions: <payload>`
    EditInstructions { payload: DetailPayload },
    /// `Applying <n> line edits`
    LineEditCount { count: u32 },
    /// `Edit <k>: <payload>` (numbered edit entry)
    LineEdit { index: u32, payload: DetailPayload },
    /// `Syntax validation passed` / `Syntax validation failed[: <detail>]`
    SyntaxCheck {
        passed: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    /// `Changes applied` / `Changes not applied`
    ChangesApplied { applied: bool },
    /// `Attempted changes: <payload>`
    AttemptedChanges { payload: DetailPayload },
    /// `Wrote <n> bytes to <path>`
    FileWrite { bytes: u64, path: String },
}

/// Detail payloads attempt a structured decode and fall back to the raw
/// string when the payload is not valid JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DetailPayload {
    Json(serde_json::Value),
    Raw(String),
}

impl DetailPayload {
    /// Decode a marker payload: JSON if it parses, raw text otherwise.
    pub fn decode(raw: &str) -> Self {
        match serde_json::from_str(raw) {
            Ok(value) => DetailPayload::Json(value),
            Err(_) => DetailPayload::Raw(raw.to_string()),
        }
    }
}

/// One event in a trajectory, in order of appearance in the source text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    #[serde(rename = "type")]
    pub step_type: StepType,
    /// Iteration number this step belongs to (0 for the start step)
    pub iteration: u32,
    /// The source line (or synthetic description) that produced this step
    pub content: String,
    /// Tri-state: `None` until a tool-result marker resolves it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Tool name for iteration steps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<String>,
    /// First error line observed for this step, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Detail markers keyed by detail kind (numbered edits use `edit_<k>`)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tool_details: BTreeMap<String, ToolDetail>,
    /// Tool result lines collected verbatim, in order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_result: Vec<String>,
}

impl Step {
    /// A fresh step of the given type with nothing attached yet.
    pub fn new(step_type: StepType, iteration: u32, content: impl Into<String>) -> Self {
        Self {
            step_type,
            iteration,
            content: content.into(),
            success: None,
            timestamp: None,
            tool_call: None,
            error: None,
            tool_details: BTreeMap::new(),
            tool_result: Vec::new(),
        }
    }
}

// ============================================
// Test results
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pass,
    Fail,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Pass => "pass",
            TestStatus::Fail => "fail",
        }
    }
}

/// One pass/fail line recognized in the transcript.
///
/// Results are order-preserving and deliberately not deduplicated: a test
/// that runs twice appears twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// Short name, the segment after the last `::`
    pub name: String,
    pub status: TestStatus,
    /// Full path, e.g. `tests/test_api.py::test_upload`
    pub full_name: String,
}

// ============================================
// Lab training metrics
// ============================================

/// Metrics printed under the `-- Lab Training Metrics --` header.
///
/// Every field is optional: a field is present only if the source text
/// actually printed it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabTrainingMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub made_code_changes: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_syntax_errors: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests_passed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_iterations: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub successful_edits: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<u32>,
}

// ============================================
// Final diffs
// ============================================

/// Per-diff line and file counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffStats {
    pub agent_files_changed: u32,
    pub golden_files_changed: u32,
    pub agent_lines: u32,
    pub golden_lines: u32,
}

/// Agent and golden diffs recovered from the transcript's result payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalDiffs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_diff: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub golden_diff: Option<String>,
    /// Changed file paths across both diffs, unique, first-seen order
    pub files_changed: Vec<String>,
    pub diff_stats: DiffStats,
}

// ============================================
// Trajectory
// ============================================

/// Structured record of one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trajectory {
    pub filename: String,
    /// Display task name, e.g. "Counsellor Chat Task 1"
    pub task_name: String,
    /// Raw model token as decoded from the filename or header line
    pub model_name: String,
    pub total_iterations: u32,
    pub tool_calls: u32,
    pub errors: u32,
    pub tests_passed: u32,
    pub total_tests: u32,
    /// Derived verdict, never set directly
    pub final_success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    pub steps: Vec<Step>,
    pub test_results: Vec<TestResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lab_training_metrics: Option<LabTrainingMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_diffs: Option<FinalDiffs>,
    /// Sibling oracle run for the same task, when one exists in the store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oracle_baseline: Option<Box<Trajectory>>,
    /// Sibling null-agent run for the same task, when one exists in the store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullagent_baseline: Option<Box<Trajectory>>,
}

impl Trajectory {
    /// An empty trajectory for the given names: zero counts, no steps,
    /// `final_success = false`. The worst-case parse outcome.
    pub fn empty(filename: &str, task_name: &str, model_name: &str) -> Self {
        Self {
            filename: filename.to_string(),
            task_name: task_name.to_string(),
            model_name: model_name.to_string(),
            total_iterations: 0,
            tool_calls: 0,
            errors: 0,
            tests_passed: 0,
            total_tests: 0,
            final_success: false,
            duration: None,
            steps: Vec::new(),
            test_results: Vec::new(),
            lab_training_metrics: None,
            final_diffs: None,
            oracle_baseline: None,
            nullagent_baseline: None,
        }
    }
}

// ============================================
// Aggregation counts
// ============================================

/// Pass/fail accumulator keyed by canonical model key in the aggregate maps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCounts {
    pub pass: u32,
    pub fail: u32,
    pub total: u32,
}

impl ModelCounts {
    /// Record one attempt outcome.
    pub fn record(&mut self, success: bool) {
        if success {
            self.pass += 1;
        } else {
            self.fail += 1;
        }
        self.total += 1;
    }

    /// Record a pre-adjusted passed/total pair (per-test-case granularity).
    pub fn record_counts(&mut self, passed: u32, total: u32) {
        let passed = passed.min(total);
        self.pass += passed;
        self.fail += total - passed;
        self.total += total;
    }
}
