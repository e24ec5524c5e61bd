//! Fuzzy matching of utterances against the scripted questions.
//!
//! Scoring follows the token-set ratio: both sides are reduced to sorted
//! sets of words, the shared words are compared against each side's full
//! set, and the best of those character-level alignments is the score.
//! Word order and repeated words therefore never affect the result.

use crate::index::KnowledgeBase;
use avatar_types::QaEntry;
use std::collections::BTreeSet;

/// Match threshold used when none is configured, as a percentage.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 70.0;

/// Lowercases, strips punctuation and collapses whitespace.
pub fn normalize(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A normalized phrase and its word set, computed once per index build.
#[derive(Debug, Clone)]
pub(crate) struct Phrase {
    normalized: String,
    tokens: BTreeSet<String>,
}

impl Phrase {
    pub(crate) fn new(text: &str) -> Self {
        let normalized = normalize(text);
        let tokens = normalized
            .split(' ')
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        Self { normalized, tokens }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Similarity of two phrases in `[0, 100]`.
///
/// Phrases sharing no word score 0, so an utterance with no lexical overlap
/// can never clear a positive threshold.
fn score_phrases(a: &Phrase, b: &Phrase) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a.normalized == b.normalized {
        return 100.0;
    }

    let common: Vec<&str> = a.tokens.intersection(&b.tokens).map(String::as_str).collect();
    if common.is_empty() {
        return 0.0;
    }
    let only_a: Vec<&str> = a.tokens.difference(&b.tokens).map(String::as_str).collect();
    let only_b: Vec<&str> = b.tokens.difference(&a.tokens).map(String::as_str).collect();
    if only_a.is_empty() || only_b.is_empty() {
        return 100.0;
    }

    let common = common.join(" ");
    let with_a = format!("{} {}", common, only_a.join(" "));
    let with_b = format!("{} {}", common, only_b.join(" "));

    ratio(&common, &with_a)
        .max(ratio(&common, &with_b))
        .max(ratio(&with_a, &with_b))
}

/// Token-set similarity of two raw strings in `[0, 100]`.
pub fn token_set_ratio(a: &str, b: &str) -> f32 {
    score_phrases(&Phrase::new(a), &Phrase::new(b))
}

/// Normalized indel similarity: `2 * LCS / (|a| + |b|)`, scaled to 100.
fn ratio(a: &str, b: &str) -> f32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    200.0 * lcs_len(&a, &b) as f32 / total as f32
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Outcome of matching one utterance.
///
/// `entry` is the best-scoring candidate even when it falls below the
/// threshold; `matched` is the only field callers should branch on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult<'kb> {
    pub entry: Option<&'kb QaEntry>,
    pub score: f32,
    pub matched: bool,
}

impl<'kb> MatchResult<'kb> {
    /// The scripted answer, only when the match cleared the threshold.
    pub fn answer(&self) -> Option<&'kb str> {
        if self.matched {
            self.entry.map(|e| e.answer.as_str())
        } else {
            None
        }
    }
}

/// Threshold-gated best-match selection over a [`KnowledgeBase`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matcher {
    threshold: f32,
}

impl Default for Matcher {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }
}

impl Matcher {
    /// Creates a matcher accepting scores at or above `threshold`
    /// (clamped to `[0, 100]`).
    pub fn new(threshold: f32) -> Self {
        if threshold.is_nan() {
            return Self::default();
        }
        Self {
            threshold: threshold.clamp(0.0, 100.0),
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Scores `utterance` against every entry and returns the best one.
    ///
    /// An entry whose question or keyword normalizes to exactly the
    /// utterance wins outright, ahead of fuzzy scores of 100 from word
    /// subsets. Otherwise equal scores resolve to the entry with the lowest
    /// id. Pure: no I/O and no shared state.
    pub fn match_utterance<'kb>(
        &self,
        utterance: &str,
        kb: &'kb KnowledgeBase,
    ) -> MatchResult<'kb> {
        let input = Phrase::new(utterance);
        if let Some(entry) = exact_match(&input, kb) {
            return MatchResult {
                entry: Some(entry),
                score: 100.0,
                matched: true,
            };
        }

        let mut best: Option<(&QaEntry, f32)> = None;
        if !input.is_empty() {
            for indexed in kb.indexed() {
                let score = indexed
                    .phrases
                    .iter()
                    .map(|p| score_phrases(&input, p))
                    .fold(0.0f32, f32::max);
                if score <= 0.0 {
                    continue;
                }
                let better = match best {
                    None => true,
                    Some((current, best_score)) => {
                        score > best_score
                            || (score == best_score && indexed.entry.id < current.id)
                    }
                };
                if better {
                    best = Some((&indexed.entry, score));
                }
            }
        }

        match best {
            Some((entry, score)) => MatchResult {
                entry: Some(entry),
                score,
                matched: score >= self.threshold,
            },
            None => MatchResult {
                entry: None,
                score: 0.0,
                matched: false,
            },
        }
    }
}

/// Lowest-id entry with a phrase identical to `input` after normalization.
fn exact_match<'kb>(input: &Phrase, kb: &'kb KnowledgeBase) -> Option<&'kb QaEntry> {
    if input.is_empty() {
        return None;
    }
    kb.indexed()
        .iter()
        .filter(|indexed| {
            indexed
                .phrases
                .iter()
                .any(|p| p.normalized == input.normalized)
        })
        .map(|indexed| &indexed.entry)
        .min_by_key(|entry| entry.id)
}
