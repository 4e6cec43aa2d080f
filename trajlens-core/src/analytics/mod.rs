//! Pass-rate aggregation
//!
//! Scans every agent-run log in the store and accumulates per-model pass
//! counts at two granularities: per task (one attempt per log) and per test
//! case (individual tests, with a one-test discount so a trivially-passing
//! smoke test does not inflate rates). Unreadable logs are skipped and
//! counted, never fatal.

use crate::model::ModelNormalizer;
use crate::parse::{self, NULLAGENT_PREFIX, ORACLE_PREFIX};
use crate::store::{self, LogStore};
use crate::types::ModelCounts;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Aggregated pass counts keyed by canonical model key. `BTreeMap` keeps the
/// report order deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSummary {
    /// One entry per log: did the whole task pass
    pub per_task: BTreeMap<String, ModelCounts>,
    /// Individual test cases, discounted by one per log
    pub per_test_case: BTreeMap<String, ModelCounts>,
    /// Logs that could not be fetched
    pub skipped: u32,
}

enum Outcome {
    Parsed(crate::types::Trajectory),
    /// Classified as a baseline after fetch (marker-free text without a
    /// baseline prefix)
    Baseline,
    Unreadable,
}

/// Streams all agent-run logs through the parser with bounded concurrency.
pub struct Aggregator {
    store: Arc<dyn LogStore>,
    normalizer: ModelNormalizer,
    concurrency: usize,
    fetch_timeout: Duration,
}

impl Aggregator {
    pub fn new(
        store: Arc<dyn LogStore>,
        normalizer: ModelNormalizer,
        concurrency: usize,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            store,
            normalizer,
            concurrency: concurrency.max(1),
            fetch_timeout,
        }
    }

    /// Aggregate every agent-run log in the store. Baseline logs are
    /// excluded and never correlated here; prefixed ones are dropped before
    /// fetching, marker-free unprefixed ones after classification.
    pub async fn run(&self) -> crate::error::Result<AggregateSummary> {
        let files = self.store.list().await?;
        let candidates: Vec<String> = files
            .into_iter()
            .map(|f| f.filename)
            .filter(|name| {
                !name.starts_with(ORACLE_PREFIX) && !name.starts_with(NULLAGENT_PREFIX)
            })
            .collect();

        let outcomes: Vec<Outcome> = stream::iter(candidates)
            .map(|name| {
                let store = Arc::clone(&self.store);
                let normalizer = self.normalizer.clone();
                let timeout = self.fetch_timeout;
                async move {
                    match store::fetch_timed(store.as_ref(), &name, timeout).await {
                        Ok(text) => {
                            if parse::classify(&name, &text) == parse::LogKind::AgentRun {
                                Outcome::Parsed(parse::parse_log_text(&name, &text, &normalizer))
                            } else {
                                tracing::debug!(filename = %name, "excluding baseline log");
                                Outcome::Baseline
                            }
                        }
                        Err(e) => {
                            tracing::warn!(filename = %name, error = %e, "skipping unreadable log");
                            Outcome::Unreadable
                        }
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut summary = AggregateSummary::default();
        for outcome in outcomes {
            let t = match outcome {
                Outcome::Parsed(t) => t,
                Outcome::Baseline => continue,
                Outcome::Unreadable => {
                    summary.skipped += 1;
                    continue;
                }
            };
            let key = self.normalizer.key_of(&t.model_name);

            // Per task: the tally verdict when tests were seen, the parsed
            // final verdict otherwise.
            let task_success = if t.test_results.is_empty() {
                t.final_success
            } else {
                t.tests_passed == t.total_tests && t.total_tests > 0
            };
            summary
                .per_task
                .entry(key.clone())
                .or_default()
                .record(task_success);

            // Per test case: discount one test per log; a log with no test
            // output contributes a single failure.
            let entry = summary.per_test_case.entry(key).or_default();
            if t.test_results.is_empty() {
                entry.record_counts(0, 1);
            } else {
                let adjusted_total = t.total_tests.saturating_sub(1).max(1);
                let adjusted_passed = t.tests_passed.saturating_sub(1);
                entry.record_counts(adjusted_passed, adjusted_total);
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::types::LogFile;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct MemStore {
        logs: HashMap<String, String>,
    }

    #[async_trait]
    impl LogStore for MemStore {
        async fn list(&self) -> Result<Vec<LogFile>> {
            let mut files: Vec<LogFile> = self
                .logs
                .iter()
                .map(|(name, text)| LogFile {
                    filename: name.clone(),
                    size_bytes: text.len() as u64,
                })
                .collect();
            files.sort_by(|a, b| a.filename.cmp(&b.filename));
            Ok(files)
        }

        async fn fetch(&self, filename: &str) -> Result<String> {
            self.logs
                .get(filename)
                .cloned()
                .ok_or_else(|| Error::NotFound(filename.to_string()))
        }
    }

    fn aggregator(logs: &[(&str, &str)]) -> Aggregator {
        let store = MemStore {
            logs: logs
                .iter()
                .map(|(n, t)| (n.to_string(), t.to_string()))
                .collect(),
        };
        Aggregator::new(
            Arc::new(store),
            ModelNormalizer::with_defaults(),
            4,
            Duration::from_secs(5),
        )
    }

    const PASSING: &str = "\
HARNESS: Starting evaluation run
pass a.py::t1: PASSED
pass a.py::t2: PASSED
pass a.py::t3: PASSED
pass a.py::t4: PASSED
Total tests: 4/4 passed
";

    const PARTIAL: &str = "\
HARNESS: Starting evaluation run
pass a.py::t1: PASSED
pass a.py::t2: PASSED
pass a.py::t3: PASSED
fail a.py::t4: FAILED
Total tests: 3/4 passed
";

    #[tokio::test]
    async fn test_per_task_grouping_by_canonical_key() {
        let agg = aggregator(&[
            ("gpt-4o_d_task-1.log", PASSING),
            ("gpt-4o-2024-08-06_d_task-2.log", PARTIAL),
            ("claude-3.5-sonnet_d_task-1.log", PASSING),
        ]);
        let summary = agg.run().await.unwrap();

        // Both gpt-4o spellings collapse to one key
        let gpt = &summary.per_task["gpt-4o"];
        assert_eq!(gpt.pass, 1);
        assert_eq!(gpt.fail, 1);
        assert_eq!(gpt.total, 2);
        assert_eq!(summary.per_task["claude-3-5-sonnet"].pass, 1);
        assert_eq!(summary.skipped, 0);
    }

    #[tokio::test]
    async fn test_per_test_case_discount() {
        let agg = aggregator(&[("gpt-4o_d_task-1.log", PARTIAL)]);
        let summary = agg.run().await.unwrap();

        // 3/4 passed becomes 2/3 after the one-test discount
        let counts = &summary.per_test_case["gpt-4o"];
        assert_eq!(counts.pass, 2);
        assert_eq!(counts.fail, 1);
        assert_eq!(counts.total, 3);
    }

    #[tokio::test]
    async fn test_no_test_output_contributes_single_failure() {
        let text = "HARNESS: Starting evaluation run\nno tests ran\n";
        let agg = aggregator(&[("gpt-4o_d_task-1.log", text)]);
        let summary = agg.run().await.unwrap();

        assert_eq!(summary.per_task["gpt-4o"].fail, 1);
        let counts = &summary.per_test_case["gpt-4o"];
        assert_eq!(counts.pass, 0);
        assert_eq!(counts.fail, 1);
        assert_eq!(counts.total, 1);
    }

    #[tokio::test]
    async fn test_marker_free_unprefixed_log_excluded() {
        // No baseline prefix, but no harness narration either: classified
        // as a baseline after fetch and left out of the counts.
        let agg = aggregator(&[
            ("gpt-4o_d_task-1.log", PASSING),
            ("run_d_task-9.log", "golden diff applied, nothing else here\n"),
        ]);
        let summary = agg.run().await.unwrap();
        assert_eq!(summary.per_task.len(), 1);
        assert!(summary.per_task.contains_key("gpt-4o"));
        assert_eq!(summary.skipped, 0);
    }

    #[tokio::test]
    async fn test_baseline_logs_excluded() {
        let agg = aggregator(&[
            ("gpt-4o_d_task-1.log", PASSING),
            ("oracle_d_task-1.log", PASSING),
            ("nullagent_d_task-1.log", PASSING),
        ]);
        let summary = agg.run().await.unwrap();
        assert_eq!(summary.per_task.len(), 1);
        assert_eq!(summary.per_task["gpt-4o"].total, 1);
    }

    #[tokio::test]
    async fn test_single_test_log_keeps_denominator_of_one() {
        let text = "\
HARNESS: Starting evaluation run
pass a.py::t1: PASSED
Total tests: 1/1 passed
";
        let agg = aggregator(&[("gpt-4o_d_task-1.log", text)]);
        let summary = agg.run().await.unwrap();

        // 1/1 discounts to 0/1, not 0/0
        let counts = &summary.per_test_case["gpt-4o"];
        assert_eq!(counts.pass, 0);
        assert_eq!(counts.total, 1);
    }
}
