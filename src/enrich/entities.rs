// src/enrich/entities.rs
//! Pattern-table entity recognition and the pure entity filter.
//!
//! The engine compiles an embedded JSON table of `{ label, regex }` patterns
//! once at startup and reports matches in text order. It is a contract-level
//! stand-in for a statistical NER model: the labels follow the usual NER
//! inventory (PERSON, ORG, GPE, DATE, ...) so the filter's default exclusions
//! line up.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Non-semantic entity types excluded by default.
pub const EXCLUDED_ENTITY_TYPES: &[&str] = &[
    "TIME", "DATE", "LANGUAGE", "PERCENT", "MONEY", "QUANTITY", "ORDINAL", "CARDINAL",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityFilterOptions {
    pub exclude_types: Vec<String>,
    pub min_length: usize,
}

impl Default for EntityFilterOptions {
    fn default() -> Self {
        Self {
            exclude_types: EXCLUDED_ENTITY_TYPES.iter().map(|s| s.to_string()).collect(),
            min_length: 1,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PatternSpec {
    label: String,
    regex: String,
}

static PATTERN_SPECS: Lazy<Vec<PatternSpec>> = Lazy::new(|| {
    let raw = include_str!("../../lexicons/entity_patterns.json");
    serde_json::from_str(raw).expect("valid entity pattern table")
});

pub struct EntityEngine {
    patterns: Vec<(String, Regex)>,
}

impl EntityEngine {
    /// Compile the embedded pattern table. Invalid patterns would be a build
    /// defect, so compilation failures panic at startup rather than at request
    /// time.
    pub fn new() -> Self {
        let patterns = PATTERN_SPECS
            .iter()
            .map(|p| {
                let re = Regex::new(&p.regex).expect("valid entity regex");
                (p.label.clone(), re)
            })
            .collect();
        Self { patterns }
    }

    /// All raw matches, ordered by position in the text. Overlapping matches
    /// from different patterns are all reported; filtering decides later.
    pub fn recognize(&self, text: &str) -> Vec<Entity> {
        let mut found: Vec<(usize, Entity)> = Vec::new();
        for (label, re) in &self.patterns {
            for m in re.find_iter(text) {
                found.push((
                    m.start(),
                    Entity {
                        entity_type: label.clone(),
                        text: m.as_str().to_string(),
                    },
                ));
            }
        }
        found.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.entity_type.cmp(&b.1.entity_type)));
        found.into_iter().map(|(_, e)| e).collect()
    }
}

impl Default for EntityEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop excluded types and too-short texts, then deduplicate by
/// `(type, lowercased text)` keeping the first occurrence. Pure; order
/// preserving; no failure mode.
pub fn filter_entities(raw: Vec<Entity>, options: &EntityFilterOptions) -> Vec<Entity> {
    let excluded: HashSet<&str> = options.exclude_types.iter().map(|s| s.as_str()).collect();

    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut out = Vec::new();
    for entity in raw {
        if excluded.contains(entity.entity_type.as_str()) {
            continue;
        }
        if entity.text.chars().count() < options.min_length {
            continue;
        }
        let key = (entity.entity_type.clone(), entity.text.to_lowercase());
        if seen.insert(key) {
            out.push(entity);
        }
    }
    out
}
