//! Model display normalization
//!
//! Raw model tokens in log filenames and header lines come in many spellings
//! (`gpt-4o`, `GPT-4o-2024-08-06`, `claude-3.5-sonnet`, ...). The normalizer
//! maps a raw token to a display name and a canonical key via an ordered
//! substring-pattern table: the first case-insensitive match wins, and an
//! unmatched token is returned unchanged.
//!
//! The table is explicit configuration passed in at construction, never
//! ambient mutable state, so a normalizer can be shared freely across
//! concurrent parses.

/// One row of the pattern table.
///
/// Several patterns may share a display name (alternate spellings); the
/// canonical `key` is what aggregation groups by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPattern {
    /// Case-insensitive substring to look for (stored lowercase)
    pub pattern: String,
    /// Human-friendly display name
    pub display: String,
    /// Canonical model key used to group aggregates
    pub key: String,
}

impl ModelPattern {
    pub fn new(pattern: &str, display: &str, key: &str) -> Self {
        Self {
            pattern: pattern.to_ascii_lowercase(),
            display: display.to_string(),
            key: key.to_string(),
        }
    }
}

/// Resolved display name and canonical key for a raw model token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModel {
    pub display: String,
    pub key: String,
}

/// Ordered-table model normalizer.
#[derive(Debug, Clone)]
pub struct ModelNormalizer {
    patterns: Vec<ModelPattern>,
}

impl ModelNormalizer {
    /// Build a normalizer from an explicit ordered table.
    pub fn new(patterns: Vec<ModelPattern>) -> Self {
        Self { patterns }
    }

    /// Build a normalizer with the built-in table.
    pub fn with_defaults() -> Self {
        Self::new(default_patterns())
    }

    /// Resolve a raw token. The first pattern that occurs as a
    /// case-insensitive substring wins; an unmatched token resolves to
    /// itself for both display and key.
    pub fn resolve(&self, raw: &str) -> ResolvedModel {
        let lowered = raw.to_ascii_lowercase();
        for pattern in &self.patterns {
            if lowered.contains(&pattern.pattern) {
                return ResolvedModel {
                    display: pattern.display.clone(),
                    key: pattern.key.clone(),
                };
            }
        }
        ResolvedModel {
            display: raw.to_string(),
            key: raw.to_string(),
        }
    }

    /// Canonical key for a raw token (grouping shorthand).
    pub fn key_of(&self, raw: &str) -> String {
        self.resolve(raw).key
    }

    /// Find the first table pattern occurring anywhere in `text`
    /// (case-insensitive) and return the matched byte range. Used by the
    /// filename decoder's fallback for non-conforming names.
    pub fn find_in(&self, text: &str) -> Option<(usize, usize)> {
        let lowered = text.to_ascii_lowercase();
        for pattern in &self.patterns {
            if let Some(start) = lowered.find(&pattern.pattern) {
                return Some((start, start + pattern.pattern.len()));
            }
        }
        None
    }

    /// Deduplicate raw tokens by canonical key, preserving first-seen order.
    /// Deduplication is by key, not display name, since multiple patterns
    /// may share a display name.
    pub fn unique_models<'a, I>(&self, raws: I) -> Vec<ResolvedModel>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen: Vec<ResolvedModel> = Vec::new();
        for raw in raws {
            let resolved = self.resolve(raw);
            if !seen.iter().any(|m| m.key == resolved.key) {
                seen.push(resolved);
            }
        }
        seen
    }
}

impl Default for ModelNormalizer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Built-in pattern table. Ordered most-specific first so that e.g.
/// `gpt-4o-mini` is not swallowed by the `gpt-4o` row.
pub fn default_patterns() -> Vec<ModelPattern> {
    vec![
        ModelPattern::new("claude-3-5-sonnet", "Claude 3.5 Sonnet", "claude-3-5-sonnet"),
        ModelPattern::new("claude-3.5-sonnet", "Claude 3.5 Sonnet", "claude-3-5-sonnet"),
        ModelPattern::new("claude-sonnet-4", "Claude Sonnet 4", "claude-sonnet-4"),
        ModelPattern::new("claude-3-opus", "Claude 3 Opus", "claude-3-opus"),
        ModelPattern::new("claude-3-haiku", "Claude 3 Haiku", "claude-3-haiku"),
        ModelPattern::new("claude", "Claude", "claude"),
        ModelPattern::new("gpt-4o-mini", "GPT-4o mini", "gpt-4o-mini"),
        ModelPattern::new("gpt-4o", "GPT-4o", "gpt-4o"),
        ModelPattern::new("gpt-4.1", "GPT-4.1", "gpt-4-1"),
        ModelPattern::new("gpt-4", "GPT-4", "gpt-4"),
        ModelPattern::new("o4-mini", "o4-mini", "o4-mini"),
        ModelPattern::new("o3-mini", "o3-mini", "o3-mini"),
        ModelPattern::new("o1", "o1", "o1"),
        ModelPattern::new("gemini-2.5-pro", "Gemini 2.5 Pro", "gemini-2-5-pro"),
        ModelPattern::new("gemini-1.5-pro", "Gemini 1.5 Pro", "gemini-1-5-pro"),
        ModelPattern::new("gemini", "Gemini", "gemini"),
        ModelPattern::new("deepseek", "DeepSeek", "deepseek"),
        ModelPattern::new("qwen", "Qwen", "qwen"),
        ModelPattern::new("llama", "Llama", "llama"),
        ModelPattern::new("mistral", "Mistral", "mistral"),
    ]
}
