//! # trajlens-core
//!
//! Core library for trajlens: turns free-text AI coding-agent evaluation
//! transcripts into structured [`Trajectory`] records and aggregates
//! per-model pass rates across a log store.
//!
//! ## Architecture
//!
//! - [`store`] - the [`LogStore`] trait plus the directory-backed store
//! - [`parse`] - filename decoding, the transcript state machine, shared
//!   post-processors, diff extraction, and the [`LogReader`] entry point
//! - [`model`] - raw model token normalization to display names and
//!   canonical keys
//! - [`analytics`] - bounded-concurrency pass-rate aggregation
//! - [`config`] - XDG-based configuration loading
//! - [`logging`] - tracing setup with file rotation
//!
//! Parsing is resilient: malformed or partial transcripts degrade to empty
//! sections, and only store-level failures surface as errors.

pub mod analytics;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod parse;
pub mod store;
pub mod types;

pub use analytics::{AggregateSummary, Aggregator};
pub use config::Config;
pub use error::{Error, Result};
pub use model::{ModelNormalizer, ResolvedModel};
pub use parse::{parse_log_text, LogReader};
pub use store::{FsLogStore, LogStore};
pub use types::{LogFile, ModelCounts, Step, StepType, TestResult, TestStatus, Trajectory};
