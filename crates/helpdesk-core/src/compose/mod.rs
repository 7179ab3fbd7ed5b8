//! Response composition: picks a knowledge base response for the resolved intent, rephrases it
//! when the intent keeps repeating, and suggests a follow-up early in a conversation.
//!
//! All random choices draw from one seedable source so a fixed seed gives fixed output.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::knowledge::KnowledgeBase;
use crate::shared::ConversationTurn;

/// Reply when the intent has no knowledge base entry.
pub const CLARIFICATION_MESSAGE: &str =
    "I'm sorry, I didn't understand that. Could you please rephrase your question?";

/// How many trailing turns are checked for a repeated intent.
pub const REPETITION_WINDOW: usize = 3;

/// Follow-ups are only offered while the session has fewer turns than this.
pub const FOLLOW_UP_HISTORY_LIMIT: usize = 5;

const REPHRASE_PREFIXES: [&str; 4] = [
    "As I mentioned, ",
    "Just to repeat, ",
    "Like I said, ",
    "To recap, ",
];

const DEFAULT_FOLLOW_UPS: &[(&str, &[&str])] = &[
    (
        "greeting",
        &[
            "Are you looking for help with an order, a product, or something else?",
            "Is there something specific I can help you with today?",
        ],
    ),
    (
        "order_status",
        &[
            "Would you like to know about our shipping options?",
            "Can I help you with anything else about your order?",
        ],
    ),
    (
        "shipping",
        &[
            "Would you like to check the status of an existing order?",
            "Do you want to know about international delivery?",
        ],
    ),
    (
        "pricing",
        &[
            "Would you like to hear about current discounts?",
            "Can I tell you more about any specific product?",
        ],
    ),
    (
        "products",
        &[
            "Would you like pricing details for any of these?",
            "Is there a particular product you're interested in?",
        ],
    ),
    (
        "returns",
        &[
            "Would you like me to explain how refunds are processed?",
            "Do you need the return shipping address?",
        ],
    ),
    (
        "refund",
        &[
            "Would you like to know how long refunds usually take?",
            "Can I help you start a return?",
        ],
    ),
    (
        "payment",
        &[
            "Do you have questions about a specific charge?",
            "Would you like to know which payment methods we accept?",
        ],
    ),
    (
        "account",
        &[
            "Do you need help resetting your password?",
            "Would you like to update your account details?",
        ],
    ),
];

pub struct ResponseComposer {
    rng: Mutex<StdRng>,
    follow_ups: HashMap<String, Vec<String>>,
}

impl ResponseComposer {
    /// Composer with the built-in follow-up table and an OS-seeded random source.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Composer whose random choices are reproducible for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        let follow_ups = DEFAULT_FOLLOW_UPS
            .iter()
            .map(|(intent, questions)| {
                (
                    intent.to_string(),
                    questions.iter().map(|q| q.to_string()).collect(),
                )
            })
            .collect();
        Self {
            rng: Mutex::new(rng),
            follow_ups,
        }
    }

    /// Replaces the follow-up table.
    pub fn with_follow_ups(mut self, follow_ups: HashMap<String, Vec<String>>) -> Self {
        self.follow_ups = follow_ups;
        self
    }

    pub fn follow_ups_for(&self, intent_id: &str) -> &[String] {
        self.follow_ups
            .get(intent_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Composes the reply for `intent_id`. `history` is the session's turns before this one,
    /// oldest first. Has no side effects beyond advancing the random source.
    pub fn compose(&self, intent_id: &str, kb: &KnowledgeBase, history: &[ConversationTurn]) -> String {
        let Some(entry) = kb.get(intent_id) else {
            return CLARIFICATION_MESSAGE.to_string();
        };

        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let Some(base) = entry.responses.choose(&mut *rng) else {
            tracing::warn!(target: "helpdesk::compose", intent = intent_id, "Intent has no responses");
            return CLARIFICATION_MESSAGE.to_string();
        };

        let mut response = if is_repeating(intent_id, history) {
            let prefix = REPHRASE_PREFIXES.choose(&mut *rng).copied().unwrap_or_default();
            format!("{}{}", prefix, decapitalize(base))
        } else {
            base.clone()
        };

        if history.len() < FOLLOW_UP_HISTORY_LIMIT {
            if let Some(follow_up) = self.follow_ups_for(intent_id).choose(&mut *rng) {
                response.push_str("\n\n");
                response.push_str(follow_up);
            }
        }

        response
    }
}

impl Default for ResponseComposer {
    fn default() -> Self {
        Self::new()
    }
}

/// True when `intent_id` occurs more than once among the last few turns.
fn is_repeating(intent_id: &str, history: &[ConversationTurn]) -> bool {
    let start = history.len().saturating_sub(REPETITION_WINDOW);
    history[start..]
        .iter()
        .filter(|t| t.detected_intent == intent_id)
        .count()
        > 1
}

/// Lowercases only the leading character so the text can follow a prefix. The pronoun "I" and
/// words written in capitals (acronyms) keep their case.
fn decapitalize(text: &str) -> String {
    let first_word = text.split_whitespace().next().unwrap_or("");
    let keeps_case = first_word == "I"
        || first_word.starts_with("I'")
        || (first_word.chars().filter(|c| c.is_alphabetic()).count() > 1
            && first_word
                .chars()
                .filter(|c| c.is_alphabetic())
                .all(char::is_uppercase));
    if keeps_case {
        return text.to_string();
    }
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::KnowledgeBaseEntry;

    fn kb() -> KnowledgeBase {
        KnowledgeBase::from_entries([
            KnowledgeBaseEntry::new(
                "order_status",
                vec!["where is my order".into()],
                vec!["You can track your order on the Orders page.".into()],
            ),
            KnowledgeBaseEntry::new(
                "goodbye",
                vec!["bye".into()],
                vec!["Goodbye! Have a great day.".into(), "See you soon!".into()],
            ),
        ])
    }

    fn turn(intent: &str) -> ConversationTurn {
        ConversationTurn::now("s", "msg", intent, "reply", None)
    }

    #[test]
    fn unknown_intent_gets_clarification() {
        let composer = ResponseComposer::seeded(7);
        assert_eq!(composer.compose("unknown", &kb(), &[]), CLARIFICATION_MESSAGE);
    }

    #[test]
    fn same_seed_same_output() {
        let a = ResponseComposer::seeded(42);
        let b = ResponseComposer::seeded(42);
        for _ in 0..5 {
            assert_eq!(a.compose("goodbye", &kb(), &[]), b.compose("goodbye", &kb(), &[]));
        }
    }

    #[test]
    fn fresh_session_gets_a_follow_up() {
        let composer = ResponseComposer::seeded(1);
        let reply = composer.compose("order_status", &kb(), &[]);
        let (body, follow_up) = reply.split_once("\n\n").unwrap();
        assert_eq!(body, "You can track your order on the Orders page.");
        assert!(composer.follow_ups_for("order_status").iter().any(|f| f == follow_up));
    }

    #[test]
    fn no_follow_up_once_history_reaches_limit() {
        let composer = ResponseComposer::seeded(1);
        let history: Vec<_> = ["goodbye", "goodbye", "goodbye", "goodbye", "goodbye"]
            .iter()
            .map(|i| turn(i))
            .collect();
        let reply = composer.compose("order_status", &kb(), &history);
        assert_eq!(reply, "You can track your order on the Orders page.");
    }

    #[test]
    fn no_follow_up_for_intent_without_list() {
        let composer = ResponseComposer::seeded(3);
        let reply = composer.compose("goodbye", &kb(), &[]);
        assert!(!reply.contains("\n\n"));
    }

    #[test]
    fn repeated_intent_is_rephrased_with_only_first_letter_lowered() {
        let composer = ResponseComposer::seeded(9);
        let history = vec![turn("order_status"), turn("goodbye"), turn("order_status")];
        let reply = composer.compose("order_status", &kb(), &history);
        let body = reply.split("\n\n").next().unwrap();
        let prefix = REPHRASE_PREFIXES
            .iter()
            .find(|p| body.starts_with(*p))
            .expect("rephrase prefix");
        assert_eq!(&body[prefix.len()..], "you can track your order on the Orders page.");
    }

    #[test]
    fn single_occurrence_in_window_is_not_rephrased() {
        let composer = ResponseComposer::seeded(9);
        let history = vec![turn("order_status"), turn("goodbye"), turn("goodbye"), turn("order_status")];
        // Only the last three turns count: one order_status.
        let reply = composer.compose("order_status", &kb(), &history);
        assert!(reply.starts_with("You can track"));
    }

    #[test]
    fn decapitalize_keeps_pronoun_and_acronyms() {
        assert_eq!(decapitalize("Hello there"), "hello there");
        assert_eq!(decapitalize("I can help"), "I can help");
        assert_eq!(decapitalize("I'm on it"), "I'm on it");
        assert_eq!(decapitalize("FAQ is online"), "FAQ is online");
        assert_eq!(decapitalize(""), "");
    }

    #[test]
    fn custom_follow_ups_replace_defaults() {
        let composer = ResponseComposer::seeded(5).with_follow_ups(HashMap::from([(
            "goodbye".to_string(),
            vec!["Anything else?".to_string()],
        )]));
        assert_eq!(
            composer.compose("goodbye", &kb(), &[]).split_once("\n\n").map(|(_, f)| f),
            Some("Anything else?")
        );
        assert!(composer.follow_ups_for("order_status").is_empty());
    }
}
