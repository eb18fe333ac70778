// src/enrich/keywords.rs
//! Statistical keyword extraction and a small extractive summarizer.
//!
//! Keywords are scored from term frequency and first-occurrence position over
//! stopword-filtered tokens. Lower score = stronger keyword (YAKE convention),
//! so callers sort ascending. Trivial input (< 10 chars) short-circuits to an
//! empty result without touching the statistics.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Inputs shorter than this yield no keywords at all.
pub const MIN_TEXT_CHARS: usize = 10;

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    include_str!("../../lexicons/stopwords_en.txt")
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub keyword: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct KeywordEngine;

impl KeywordEngine {
    pub fn new() -> Self {
        Self
    }

    /// Top `top_n` keywords, strongest (lowest score) first.
    pub fn extract(&self, text: &str, top_n: usize) -> Vec<Keyword> {
        if text.trim().chars().count() < MIN_TEXT_CHARS || top_n == 0 {
            return Vec::new();
        }

        let tokens = content_tokens(text);
        if tokens.is_empty() {
            return Vec::new();
        }
        let total = tokens.len() as f64;

        let mut freq: HashMap<&str, usize> = HashMap::new();
        let mut first_pos: HashMap<&str, usize> = HashMap::new();
        for (i, tok) in tokens.iter().enumerate() {
            *freq.entry(tok.as_str()).or_insert(0) += 1;
            first_pos.entry(tok.as_str()).or_insert(i);
        }

        let mut scored: Vec<Keyword> = freq
            .into_iter()
            .map(|(word, tf)| {
                // Early, frequent terms score lowest.
                let position_factor = 1.0 + first_pos[word] as f64 / total;
                Keyword {
                    keyword: word.to_string(),
                    score: position_factor / (1.0 + tf as f64),
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.keyword.cmp(&b.keyword))
        });
        scored.truncate(top_n);
        scored
    }

    /// Extractive summary: the highest-scoring sentences (by content-token
    /// frequency mass), emitted in original order. `max_length` truncates at a
    /// word boundary with an ellipsis.
    pub fn summarize(&self, text: &str, max_sentences: usize, max_length: Option<usize>) -> String {
        let text = text.trim();
        if text.chars().count() < MIN_TEXT_CHARS || max_sentences == 0 {
            return String::new();
        }

        let sentences = split_sentences(text);
        if sentences.is_empty() {
            return String::new();
        }

        let mut freq: HashMap<String, usize> = HashMap::new();
        for tok in content_tokens(text) {
            *freq.entry(tok).or_insert(0) += 1;
        }

        let mut ranked: Vec<(usize, f64)> = sentences
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let toks = content_tokens(s);
                let mass: usize = toks.iter().filter_map(|t| freq.get(t)).sum();
                // Dampen very long sentences.
                let score = mass as f64 / (1.0 + (toks.len() as f64).sqrt());
                (i, score)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut picked: Vec<usize> = ranked.into_iter().take(max_sentences).map(|(i, _)| i).collect();
        picked.sort_unstable();

        let mut summary = picked
            .into_iter()
            .map(|i| sentences[i].as_str())
            .collect::<Vec<_>>()
            .join(" ");

        if let Some(max) = max_length {
            if summary.chars().count() > max {
                let cut: String = summary.chars().take(max).collect();
                summary = match cut.rsplit_once(' ') {
                    Some((head, _)) => format!("{head}..."),
                    None => format!("{cut}..."),
                };
            }
        }
        summary
    }
}

/// Lower-cased alphabetic tokens with stopwords and short words removed.
fn content_tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 3)
        .map(|t| t.to_lowercase())
        .filter(|t| t.chars().any(|c| c.is_alphabetic()))
        .filter(|t| !STOPWORDS.contains(t.as_str()))
        .collect()
}

fn split_sentences(text: &str) -> Vec<String> {
    text.split_inclusive(['.', '!', '?'])
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
