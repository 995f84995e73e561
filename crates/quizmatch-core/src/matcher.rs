//! Fuzzy resolution of free-text question references to answer-key rows.
//!
//! Candidates are ranked by `(score desc, question_id asc)` and the head is
//! accepted only if it reaches the configured threshold. Ties therefore always
//! resolve to the lower question id, independent of candidate order.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::model::{MatchResult, WideQuestion};
use crate::text::{normalize, similarity};

/// Default minimum similarity for accepting a match.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.75;

/// Matching configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Minimum score for a question reference to be accepted.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Minimum score for a free-text answer to be resolved to an option.
    #[serde(default = "default_threshold")]
    pub option_threshold: f64,
}

fn default_threshold() -> f64 {
    DEFAULT_MATCH_THRESHOLD
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MATCH_THRESHOLD,
            option_threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }
}

/// Anything that can be matched against: an id plus comparable text.
pub trait MatchCandidate {
    fn candidate_id(&self) -> &str;
    fn candidate_text(&self) -> &str;
}

impl MatchCandidate for WideQuestion {
    fn candidate_id(&self) -> &str {
        &self.question_id
    }

    fn candidate_text(&self) -> &str {
        &self.question_text
    }
}

/// Order question ids: numeric ids first, by value, then every other id
/// lexicographically. This is a total order, so ties never depend on
/// candidate order.
pub fn compare_question_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// A candidate set normalized once for repeated lookups.
#[derive(Debug, Clone)]
pub struct Matcher {
    config: MatchConfig,
    index: Vec<IndexedCandidate>,
}

#[derive(Debug, Clone)]
struct IndexedCandidate {
    id: String,
    normalized: String,
}

#[derive(Debug, Clone)]
struct Scored<'a> {
    id: &'a str,
    score: f64,
}

impl Matcher {
    pub fn new<C: MatchCandidate>(candidates: &[C], config: MatchConfig) -> Self {
        let index = candidates
            .iter()
            .map(|c| IndexedCandidate {
                id: c.candidate_id().to_string(),
                normalized: normalize(c.candidate_text()),
            })
            .collect();
        Self { config, index }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Resolve `query` to the best candidate.
    pub fn best_match(&self, query: &str) -> MatchResult {
        let normalized_query = normalize(query);
        let mut scored: Vec<Scored<'_>> = self
            .index
            .iter()
            .map(|c| Scored {
                id: &c.id,
                score: similarity(&normalized_query, &c.normalized),
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| compare_question_ids(a.id, b.id))
        });

        let Some(head) = scored.first() else {
            return MatchResult::unmatched(query);
        };

        let matched = head.score >= self.config.threshold;
        tracing::debug!(
            query = %query,
            candidate = %head.id,
            score = head.score,
            matched,
            "scored question reference"
        );

        MatchResult {
            query_text: query.to_string(),
            matched_question_id: matched.then(|| head.id.to_string()),
            best_candidate: Some(head.id.to_string()),
            score: head.score,
            matched,
        }
    }
}

/// One-shot match of `query` against `candidates`.
pub fn best_match<C: MatchCandidate>(
    query: &str,
    candidates: &[C],
    config: &MatchConfig,
) -> MatchResult {
    Matcher::new(candidates, *config).best_match(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OptionLabel;

    fn question(id: &str, text: &str) -> WideQuestion {
        WideQuestion {
            question_id: id.into(),
            question_text: text.into(),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_label: OptionLabel::from_index(0).unwrap(),
        }
    }

    #[test]
    fn exact_text_is_reflexive() {
        let candidates = vec![
            question("1", "What is the boiling point of water?"),
            question("2", "Who wrote Hamlet?"),
        ];
        let result = best_match("Who wrote Hamlet?", &candidates, &MatchConfig::default());
        assert!(result.matched);
        assert_eq!(result.score, 1.0);
        assert_eq!(result.matched_question_id.as_deref(), Some("2"));
    }

    #[test]
    fn normalization_differences_still_match_exactly() {
        let candidates = vec![question("q1", "<p>Who wrote <em>Hamlet</em>?</p>")];
        let result = best_match("who   wrote hamlet", &candidates, &MatchConfig::default());
        assert_eq!(result.score, 1.0);
        assert!(result.matched);
    }

    #[test]
    fn ties_prefer_lower_question_id() {
        // Same text under several ids, presented out of order.
        let candidates = vec![
            question("30", "Name the largest planet"),
            question("4", "Name the largest planet"),
            question("12", "Name the largest planet"),
        ];
        for _ in 0..5 {
            let result = best_match("name the largest planet", &candidates, &MatchConfig::default());
            assert_eq!(result.matched_question_id.as_deref(), Some("4"));
        }

        let mut reversed = candidates.clone();
        reversed.reverse();
        let result = best_match("name the largest planet", &reversed, &MatchConfig::default());
        assert_eq!(result.matched_question_id.as_deref(), Some("4"));
    }

    #[test]
    fn ties_with_non_numeric_ids_are_lexicographic() {
        let candidates = vec![question("item_b", "same"), question("item_a", "same")];
        let result = best_match("same", &candidates, &MatchConfig::default());
        assert_eq!(result.matched_question_id.as_deref(), Some("item_a"));
    }

    #[test]
    fn below_threshold_is_rejected() {
        let candidates = vec![
            question("1", "What is the boiling point of water?"),
            question("2", "Who wrote Hamlet?"),
        ];
        let result = best_match("Describe photosynthesis", &candidates, &MatchConfig::default());
        assert!(!result.matched);
        assert!(result.matched_question_id.is_none());
        assert!(result.best_candidate.is_some());
        assert!(result.score < DEFAULT_MATCH_THRESHOLD);
    }

    #[test]
    fn threshold_is_configurable() {
        let candidates = vec![question("1", "abcd")];
        let strict = MatchConfig {
            threshold: 1.0,
            ..MatchConfig::default()
        };
        let lenient = MatchConfig {
            threshold: 0.5,
            ..MatchConfig::default()
        };
        // similarity("abce", "abcd") = 6/8
        assert!(!best_match("abce", &candidates, &strict).matched);
        assert!(best_match("abce", &candidates, &lenient).matched);
    }

    #[test]
    fn empty_candidates_do_not_match() {
        let candidates: Vec<WideQuestion> = vec![];
        let result = best_match("anything", &candidates, &MatchConfig::default());
        assert!(!result.matched);
        assert!(result.best_candidate.is_none());
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn matcher_does_not_mutate_candidates() {
        let candidates = vec![question("2", "b text"), question("1", "a text")];
        let before = candidates.clone();
        let matcher = Matcher::new(&candidates, MatchConfig::default());
        let _ = matcher.best_match("a text");
        assert_eq!(candidates, before);
        assert_eq!(matcher.len(), 2);
    }

    #[test]
    fn question_id_ordering() {
        assert_eq!(compare_question_ids("9", "10"), Ordering::Less);
        assert_eq!(compare_question_ids("b", "a"), Ordering::Greater);
        assert_eq!(compare_question_ids("10", "a"), Ordering::Less);
        assert_eq!(compare_question_ids("1x", "9"), Ordering::Greater);
        assert_eq!(compare_question_ids("007", "7"), Ordering::Less);
    }

    #[test]
    fn mixed_id_ties_resolve_the_same_in_every_order() {
        let ids = ["10", "1x", "9"];
        let orders = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        for order in orders {
            let candidates: Vec<WideQuestion> = order
                .iter()
                .map(|&i| question(ids[i], "same text"))
                .collect();
            let result = best_match("same text", &candidates, &MatchConfig::default());
            assert_eq!(
                result.matched_question_id.as_deref(),
                Some("9"),
                "order {order:?}"
            );
        }
    }
}
