//! Chat engine: runs one message through resolve -> compose -> session append -> audit.
//!
//! Each stage degrades on its own, so `handle` always produces a reply for a well-formed message.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::audit::{AuditWriter, ConversationLogger, JsonFileAuditLog, DEFAULT_AUDIT_QUEUE_CAPACITY};
use crate::compose::ResponseComposer;
use crate::knowledge::KnowledgeBase;
use crate::resolver::{HttpClassifier, IntentClassifier, IntentResolver, ResolutionSource};
use crate::session::SessionStore;
use crate::shared::{ConversationTurn, CoreConfig};

/// Session id stamped on turns answered without a session.
pub const ANONYMOUS_SESSION_ID: &str = "anonymous";

/// Result of one chat turn.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub response: String,
    pub intent: String,
    pub confidence: Option<f32>,
    pub source: ResolutionSource,
    pub turn: ConversationTurn,
}

impl ChatReply {
    /// Confidence as a percentage string with two decimals, e.g. `"87.50%"`.
    pub fn confidence_label(&self) -> Option<String> {
        self.confidence.map(|c| format!("{:.2}%", c * 100.0))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub intents: usize,
    pub classifier_loaded: bool,
    pub active_sessions: usize,
}

pub struct ChatEngine {
    kb: Arc<KnowledgeBase>,
    resolver: IntentResolver,
    composer: ResponseComposer,
    sessions: SessionStore,
    audit: Option<AuditWriter>,
}

impl ChatEngine {
    pub fn new(
        kb: Arc<KnowledgeBase>,
        resolver: IntentResolver,
        composer: ResponseComposer,
        sessions: SessionStore,
    ) -> Self {
        Self {
            kb,
            resolver,
            composer,
            sessions,
            audit: None,
        }
    }

    /// Audits through a new writer task; must be called inside a Tokio runtime.
    pub fn with_logger(self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.with_audit_writer(AuditWriter::spawn(logger, DEFAULT_AUDIT_QUEUE_CAPACITY))
    }

    pub fn with_audit_writer(mut self, writer: AuditWriter) -> Self {
        self.audit = Some(writer);
        self
    }

    /// Builds the engine from configuration: loads the knowledge base (empty on failure),
    /// connects the classifier when configured, and opens the audit log.
    pub async fn bootstrap(config: &CoreConfig) -> Self {
        let kb = Arc::new(KnowledgeBase::load_or_empty(&config.knowledge_base_path));
        let policy = config.resolver_policy();
        let mut resolver = IntentResolver::new(Arc::clone(&kb), policy);

        if let Some(url) = config.classifier_url.as_deref().filter(|u| !u.trim().is_empty()) {
            match HttpClassifier::new(url, policy.classifier_timeout) {
                Ok(classifier) => {
                    if classifier.probe().await {
                        tracing::info!(target: "helpdesk::resolver", "Intent classifier loaded at {}", url);
                    } else {
                        tracing::warn!(target: "helpdesk::resolver", "Intent classifier at {} not ready; using keyword matching", url);
                    }
                    let classifier: Arc<dyn IntentClassifier> = Arc::new(classifier);
                    resolver = resolver.with_classifier(classifier);
                }
                Err(e) => tracing::warn!(target: "helpdesk::resolver", "Intent classifier disabled: {}", e),
            }
        } else {
            tracing::info!(target: "helpdesk::resolver", "No intent classifier configured; using keyword matching");
        }

        let composer = match config.response_seed {
            Some(seed) => ResponseComposer::seeded(seed),
            None => ResponseComposer::new(),
        };
        let engine = Self::new(kb, resolver, composer, SessionStore::new(config.session_policy()));
        if config.audit_enabled() {
            let log: Arc<dyn ConversationLogger> = Arc::new(JsonFileAuditLog::new(&config.audit_log_path));
            engine.with_audit_writer(AuditWriter::spawn(log, config.audit_queue_capacity))
        } else {
            engine
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            intents: self.kb.len(),
            classifier_loaded: self.resolver.classifier_loaded(),
            active_sessions: self.sessions.session_count(),
        }
    }

    /// Resolves, composes and records the turn in the session history. Does not audit.
    pub async fn respond(&self, session_id: &str, message: &str) -> ChatReply {
        let resolution = self.resolver.resolve(message).await;

        // Compose and append under one session lock so concurrent messages on the same
        // session see each other's turns in order.
        let (response, turn) = self.sessions.with_history(session_id, |history| {
            let prior: Vec<ConversationTurn> = history.turns().cloned().collect();
            let response = self.composer.compose(&resolution.intent, &self.kb, &prior);
            let turn = ConversationTurn::now(
                session_id,
                message,
                resolution.intent.clone(),
                response.clone(),
                resolution.confidence,
            );
            history.push(turn.clone());
            (response, turn)
        });

        tracing::debug!(
            target: "helpdesk::engine",
            session_id,
            intent = %resolution.intent,
            source = ?resolution.source,
            "Resolved chat turn"
        );

        ChatReply {
            response,
            intent: resolution.intent,
            confidence: resolution.confidence,
            source: resolution.source,
            turn,
        }
    }

    /// Resolves and composes as a first message, without reading or recording any session
    /// history. Repetition and follow-up state cannot leak between unrelated callers.
    pub async fn respond_anonymous(&self, message: &str) -> ChatReply {
        let resolution = self.resolver.resolve(message).await;
        let response = self.composer.compose(&resolution.intent, &self.kb, &[]);
        let turn = ConversationTurn::now(
            ANONYMOUS_SESSION_ID,
            message,
            resolution.intent.clone(),
            response.clone(),
            resolution.confidence,
        );
        ChatReply {
            response,
            intent: resolution.intent,
            confidence: resolution.confidence,
            source: resolution.source,
            turn,
        }
    }

    /// Queues the turn for the audit writer. `false` when auditing is off or the turn was dropped.
    pub fn audit(&self, turn: ConversationTurn) -> bool {
        self.audit.as_ref().is_some_and(|writer| writer.submit(turn))
    }

    /// Waits for queued audit records to be written.
    pub async fn flush_audit(&self) {
        if let Some(writer) = &self.audit {
            writer.flush().await;
        }
    }

    /// Full turn: `respond`, then queue the audit record without waiting for the write.
    pub async fn handle(&self, session_id: &str, message: &str) -> ChatReply {
        let reply = self.respond(session_id, message).await;
        self.audit(reply.turn.clone());
        reply
    }

    /// `respond_anonymous`, then queue the audit record.
    pub async fn handle_anonymous(&self, message: &str) -> ChatReply {
        let reply = self.respond_anonymous(message).await;
        self.audit(reply.turn.clone());
        reply
    }

    /// Spawns a background task that periodically removes idle sessions.
    pub fn spawn_session_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.sessions.sweep_idle(chrono::Utc::now());
            }
        })
    }
}
