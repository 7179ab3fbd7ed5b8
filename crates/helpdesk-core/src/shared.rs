//! Shared types used across the helpdesk crates.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::resolver::{ResolverPolicy, DEFAULT_CONFIDENCE_THRESHOLD};
use crate::session::SessionPolicy;

/// Intent reported when nothing in the knowledge base matches.
pub const UNKNOWN_INTENT: &str = "unknown";

/// One resolved exchange within a session. Immutable once appended to a session history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub session_id: String,
    /// ISO-8601, UTC.
    pub timestamp: String,
    pub user_message: String,
    pub detected_intent: String,
    pub bot_response: String,
    /// Classifier confidence in [0, 1]; `None` when the lexical fallback produced the intent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl ConversationTurn {
    /// Creates a turn stamped with the current UTC time.
    pub fn now(
        session_id: impl Into<String>,
        user_message: impl Into<String>,
        detected_intent: impl Into<String>,
        bot_response: impl Into<String>,
        confidence: Option<f32>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            user_message: user_message.into(),
            detected_intent: detected_intent.into(),
            bot_response: bot_response.into(),
            confidence,
        }
    }
}

/// Global application configuration (gateway + core policies). Load from TOML or env.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Application identity reported by the status endpoint.
    pub app_name: String,
    pub host: String,
    pub port: u16,
    /// JSON knowledge base (intent -> patterns/responses).
    pub knowledge_base_path: String,
    /// JSON array audit log. Empty string disables audit logging.
    pub audit_log_path: String,
    /// Turns waiting for the audit writer; further turns are dropped with a warning.
    pub audit_queue_capacity: usize,
    /// HTTP endpoint of the external intent classifier. Unset means lexical-only resolution.
    #[serde(default)]
    pub classifier_url: Option<String>,
    pub classifier_timeout_ms: u64,
    pub confidence_threshold: f32,
    /// Turns kept per session.
    pub session_capacity: usize,
    pub max_sessions: usize,
    pub session_idle_secs: u64,
    pub sweep_interval_secs: u64,
    pub max_message_chars: usize,
    /// Fixed seed for response selection (reproducible demos and tests).
    #[serde(default)]
    pub response_seed: Option<u64>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            app_name: "Helpdesk Gateway".to_string(),
            host: "127.0.0.1".to_string(),
            port: 5000,
            knowledge_base_path: "data/knowledge_base.json".to_string(),
            audit_log_path: "conversation_logs.json".to_string(),
            audit_queue_capacity: 1024,
            classifier_url: None,
            classifier_timeout_ms: 2000,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            session_capacity: 10,
            max_sessions: 10_000,
            session_idle_secs: 3600,
            sweep_interval_secs: 60,
            max_message_chars: 500,
            response_seed: None,
        }
    }
}

impl CoreConfig {
    /// Load config from file and environment.
    /// Precedence: env `HELPDESK_CONFIG` path > `config/gateway.toml` > defaults; `HELPDESK__*` env vars override.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("HELPDESK_CONFIG").unwrap_or_else(|_| "config/gateway.toml".to_string());
        let d = Self::default();
        let builder = config::Config::builder()
            .set_default("app_name", d.app_name)?
            .set_default("host", d.host)?
            .set_default("port", i64::from(d.port))?
            .set_default("knowledge_base_path", d.knowledge_base_path)?
            .set_default("audit_log_path", d.audit_log_path)?
            .set_default("audit_queue_capacity", d.audit_queue_capacity as i64)?
            .set_default("classifier_timeout_ms", d.classifier_timeout_ms as i64)?
            .set_default("confidence_threshold", f64::from(d.confidence_threshold))?
            .set_default("session_capacity", d.session_capacity as i64)?
            .set_default("max_sessions", d.max_sessions as i64)?
            .set_default("session_idle_secs", d.session_idle_secs as i64)?
            .set_default("sweep_interval_secs", d.sweep_interval_secs as i64)?
            .set_default("max_message_chars", d.max_message_chars as i64)?;

        let path = Path::new(&config_path);
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(config::Environment::with_prefix("HELPDESK").separator("__"))
            .build()?;

        built.try_deserialize()
    }

    pub fn resolver_policy(&self) -> ResolverPolicy {
        ResolverPolicy {
            confidence_threshold: self.confidence_threshold.clamp(0.0, 1.0),
            classifier_timeout: Duration::from_millis(self.classifier_timeout_ms),
        }
    }

    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy {
            capacity: self.session_capacity.max(1),
            max_sessions: self.max_sessions.max(1),
            idle_ttl: Duration::from_secs(self.session_idle_secs),
        }
    }

    pub fn audit_enabled(&self) -> bool {
        !self.audit_log_path.trim().is_empty()
    }
}
