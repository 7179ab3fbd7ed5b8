//! Keyword-overlap scoring of a message against knowledge base patterns.

use crate::knowledge::KnowledgeBase;
use crate::shared::UNKNOWN_INTENT;

/// Non-zero intent scores in knowledge base order.
pub type IntentScores = Vec<(String, u32)>;

/// Scores every intent by token overlap with its patterns.
///
/// For each pattern, every message token that occurs in the pattern's tokens adds one point.
/// Repeated message tokens count each time; points sum over all patterns of the intent.
/// Intents with a zero score are omitted.
pub fn score(message_tokens: &[String], kb: &KnowledgeBase) -> IntentScores {
    kb.entries()
        .filter_map(|entry| {
            let total: u32 = entry
                .pattern_tokens()
                .iter()
                .map(|pattern| {
                    message_tokens
                        .iter()
                        .filter(|t| pattern.contains(*t))
                        .count() as u32
                })
                .sum();
            (total > 0).then(|| (entry.intent_id.clone(), total))
        })
        .collect()
}

/// Highest-scoring intent; ties go to the intent seen first. `"unknown"` when nothing scored.
pub fn best_intent(scores: &IntentScores) -> String {
    let mut best: Option<&(String, u32)> = None;
    for candidate in scores {
        if best.map_or(true, |b| candidate.1 > b.1) {
            best = Some(candidate);
        }
    }
    best.map(|(intent, _)| intent.clone())
        .unwrap_or_else(|| UNKNOWN_INTENT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::KnowledgeBaseEntry;
    use crate::nlp::normalize;

    fn entry(id: &str, patterns: &[&str]) -> KnowledgeBaseEntry {
        KnowledgeBaseEntry::new(
            id,
            patterns.iter().map(|p| p.to_string()).collect(),
            vec![format!("{id} response")],
        )
    }

    fn kb() -> KnowledgeBase {
        KnowledgeBase::from_entries([
            entry("greeting", &["hello", "hi", "good morning"]),
            entry("order_status", &["where is my order", "track order", "order status"]),
            entry("refund", &["i want a refund", "refund my order"]),
        ])
    }

    #[test]
    fn counts_matches_per_pattern() {
        let scores = score(&normalize("track my order"), &kb());
        // order_status: "track order" -> 2, "where is my order" -> 1, "order status" -> 1
        // refund: "refund my order" -> 1
        assert_eq!(
            scores,
            vec![("order_status".to_string(), 4), ("refund".to_string(), 1)]
        );
        assert_eq!(best_intent(&scores), "order_status");
    }

    #[test]
    fn repeated_message_tokens_count_each_time() {
        let scores = score(&normalize("hello hello"), &kb());
        assert_eq!(scores, vec![("greeting".to_string(), 2)]);
    }

    #[test]
    fn case_insensitive_greeting() {
        let scores = score(&normalize("Hello"), &kb());
        assert_eq!(best_intent(&scores), "greeting");
    }

    #[test]
    fn ties_go_to_first_seen_intent() {
        let kb = KnowledgeBase::from_entries([
            entry("zeta", &["shipping"]),
            entry("alpha", &["shipping"]),
        ]);
        let scores = score(&normalize("shipping"), &kb);
        assert_eq!(scores.len(), 2);
        assert_eq!(best_intent(&scores), "zeta");
    }

    #[test]
    fn no_overlap_is_unknown() {
        let scores = score(&normalize("xyz999 qqq"), &kb());
        assert!(scores.is_empty());
        assert_eq!(best_intent(&scores), UNKNOWN_INTENT);
    }

    #[test]
    fn entries_without_patterns_never_score() {
        let kb = KnowledgeBase::from_entries([entry("silent", &[]), entry("greeting", &["hi"])]);
        assert_eq!(best_intent(&score(&normalize("hi"), &kb)), "greeting");
    }
}
