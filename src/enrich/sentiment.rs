// src/enrich/sentiment.rs
//! Valence-lexicon sentiment scorer.
//!
//! Tokens are looked up in an embedded lexicon (roughly -4..4 per word). A
//! negator within the previous three tokens flips the sign; an intensifier
//! directly before a hit boosts it. The hit mass is folded into VADER-shaped
//! scores: `compound` normalized to [-1, 1] plus positive/negative/neutral
//! proportions.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

static LEXICON: Lazy<HashMap<String, f64>> = Lazy::new(|| {
    let raw = include_str!("../../lexicons/sentiment.json");
    serde_json::from_str::<HashMap<String, f64>>(raw).expect("valid sentiment lexicon")
});

/// Normalization constant: the hit mass at which `compound` reaches ~0.25.
const ALPHA: f64 = 15.0;
const INTENSIFIER_BOOST: f64 = 1.3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentScores {
    pub compound: f64,
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SentimentAnalyzer;

impl SentimentAnalyzer {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn word_valence(&self, w: &str) -> f64 {
        *LEXICON.get(w).unwrap_or(&0.0)
    }

    pub fn score(&self, text: &str) -> SentimentScores {
        let tokens: Vec<String> = tokenize(text).collect();
        if tokens.is_empty() {
            return SentimentScores::default();
        }

        let mut pos_mass = 0.0f64;
        let mut neg_mass = 0.0f64;
        let mut neutral_count = 0usize;
        let mut total = 0.0f64;

        for i in 0..tokens.len() {
            let mut valence = self.word_valence(tokens[i].as_str());
            if valence == 0.0 {
                neutral_count += 1;
                continue;
            }

            // Negation window: any negator in the previous 1..=3 tokens flips
            // the sign of this hit.
            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            if negated {
                valence = -valence;
            }
            if i >= 1 && is_intensifier(tokens[i - 1].as_str()) {
                valence *= INTENSIFIER_BOOST;
            }

            total += valence;
            if valence > 0.0 {
                pos_mass += valence;
            } else {
                neg_mass += -valence;
            }
        }

        let compound = (total / (total * total + ALPHA).sqrt()).clamp(-1.0, 1.0);

        let mass = pos_mass + neg_mass + neutral_count as f64;
        let (positive, negative, neutral) = if mass > 0.0 {
            (pos_mass / mass, neg_mass / mass, neutral_count as f64 / mass)
        } else {
            (0.0, 0.0, 0.0)
        };

        SentimentScores {
            compound,
            positive,
            negative,
            neutral,
        }
    }
}

/// Alphanumeric tokens, lower-cased.
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        // Contractions like "isn't" tokenize to ("isn", "t"); "won"/"can" are
        // left out because they collide with ordinary words.
        "not" | "no" | "never" | "isn" | "wasn" | "aren" | "don" | "doesn" | "cannot"
            | "without" | "neither" | "nor"
    )
}

fn is_intensifier(tok: &str) -> bool {
    matches!(
        tok,
        "very" | "extremely" | "really" | "hugely" | "incredibly" | "absolutely" | "deeply"
    )
}
