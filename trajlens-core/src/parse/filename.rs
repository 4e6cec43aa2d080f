//! Filename decoding
//!
//! Log files follow the convention `<model>_<dataset>_<task...>.log`, with
//! baseline runs using `oracle_` / `nullagent_` in the model position. Names
//! that do not follow the convention are decoded with a fallback scan over
//! the normalizer's known-model table. Decoding never fails; unmatched model
//! text is returned verbatim.

use crate::model::ModelNormalizer;

/// Fields recovered from a log filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedName {
    /// Raw model token (verbatim, not normalized)
    pub raw_model: String,
    /// Dataset segment when the name has one
    pub dataset: Option<String>,
    /// Task id segments joined back together, e.g. `task-1`
    pub task_id: Option<String>,
    /// Title-cased display name, e.g. "Counsellor Chat Task 1"
    pub task_name: String,
}

/// Decode a filename into model / dataset / task fields.
pub fn decode(filename: &str, normalizer: &ModelNormalizer) -> DecodedName {
    let stem = strip_extension(filename);
    let segments: Vec<&str> = stem.split('_').collect();

    if segments.len() >= 3 {
        let dataset = segments[1];
        let task_id = segments[2..].join("_");
        let display = title_case(&format!("{} {}", dataset, task_id));
        return DecodedName {
            raw_model: segments[0].to_string(),
            dataset: Some(dataset.to_string()),
            task_id: Some(task_id),
            task_name: display,
        };
    }

    if segments.len() == 2 {
        return DecodedName {
            raw_model: segments[0].to_string(),
            dataset: None,
            task_id: Some(segments[1].to_string()),
            task_name: title_case(segments[1]),
        };
    }

    // Non-conforming name: scan the ordered model table; the remainder after
    // the first match (minus leading separators) becomes the task title.
    if let Some((start, end)) = normalizer.find_in(stem) {
        let matched = &stem[start..end];
        let remainder = stem[end..].trim_start_matches(['_', '-', ' ', '.']);
        let task_name = if remainder.is_empty() {
            stem.to_string()
        } else {
            title_case(remainder)
        };
        return DecodedName {
            raw_model: matched.to_string(),
            dataset: None,
            task_id: None,
            task_name,
        };
    }

    DecodedName {
        raw_model: stem.to_string(),
        dataset: None,
        task_id: None,
        task_name: title_case(stem),
    }
}

/// Task id used to locate sibling baseline logs: the primary filename minus
/// its model segment and extension. `gpt-4o_counsellor-chat_task-1.log`
/// yields `counsellor-chat_task-1`.
pub fn sibling_task_id(filename: &str) -> Option<String> {
    let stem = strip_extension(filename);
    stem.split_once('_').map(|(_, rest)| rest.to_string())
}

fn strip_extension(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => filename,
    }
}

/// Title-case with separator normalization: split on `_`, `-`, and spaces,
/// uppercase the first letter of each word, join with single spaces.
pub(crate) fn title_case(text: &str) -> String {
    text.split(['_', '-', ' '])
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
