//! helpdesk-core: intent resolution and contextual replies for a customer-service chatbot.
//!
//! A message is normalized, classified by the external model when it is confident enough
//! (keyword overlap against the knowledge base otherwise), answered from the knowledge base
//! with per-session repetition handling and follow-up suggestions, and appended to an audit log.

mod audit;
mod compose;
mod engine;
mod error;
mod knowledge;
mod nlp;
mod resolver;
mod session;
mod shared;
pub mod training;

pub use shared::{ConversationTurn, CoreConfig, UNKNOWN_INTENT};

pub use error::{CoreError, Result};

pub use knowledge::{KnowledgeBase, KnowledgeBaseEntry};

pub use nlp::{best_intent, is_stopword, normalize, score, IntentScores};

pub use resolver::{
    decide, resolve_lexical, HttpClassifier, IntentClassifier, IntentResolver, Prediction,
    Resolution, ResolutionSource, ResolverPolicy, DEFAULT_CONFIDENCE_THRESHOLD,
};

pub use session::{SessionHistory, SessionPolicy, SessionStore};

pub use compose::{ResponseComposer, CLARIFICATION_MESSAGE, FOLLOW_UP_HISTORY_LIMIT, REPETITION_WINDOW};

pub use audit::{
    AuditRecord, AuditWriter, ConversationLogger, JsonFileAuditLog, DEFAULT_AUDIT_QUEUE_CAPACITY,
};

pub use engine::{ChatEngine, ChatReply, EngineStatus, ANONYMOUS_SESSION_ID};
