//! Intent resolution: the external classifier first, gated by confidence, with the
//! keyword matcher as the deterministic fallback.
//!
//! Classifier failures, timeouts and absence all collapse into "no model result"; the
//! caller always gets an intent.

mod http;

pub use http::HttpClassifier;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{CoreError, Result};
use crate::knowledge::KnowledgeBase;
use crate::nlp::{best_intent, normalize, score};

/// Minimum classifier confidence accepted without falling back to keyword matching.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.30;

/// A single classifier prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub intent: String,
    /// Probability in [0, 1].
    pub confidence: f32,
}

impl Prediction {
    pub fn new(intent: impl Into<String>, confidence: f32) -> Self {
        Self {
            intent: intent.into(),
            confidence,
        }
    }
}

/// Frozen, externally trained intent classifier.
#[async_trait::async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Most likely intent for `text`.
    async fn predict(&self, text: &str) -> Result<Prediction>;

    /// Whether the model is ready to serve predictions.
    fn is_loaded(&self) -> bool;

    /// Up to `k` predictions, most likely first.
    async fn predict_top_k(&self, text: &str, k: usize) -> Result<Vec<Prediction>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![self.predict(text).await?])
    }
}

/// Which stage produced the intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    Model,
    Lexical,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub intent: String,
    /// Present only when the classifier's prediction was accepted.
    pub confidence: Option<f32>,
    pub source: ResolutionSource,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolverPolicy {
    pub confidence_threshold: f32,
    pub classifier_timeout: Duration,
}

impl Default for ResolverPolicy {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            classifier_timeout: Duration::from_secs(2),
        }
    }
}

/// Two-stage policy: accept the model's prediction when it clears `threshold`, otherwise take
/// the lexical intent. A missing model result is the same as a rejected one.
pub fn decide(ml: Option<Prediction>, lexical: impl FnOnce() -> String, threshold: f32) -> Resolution {
    match ml {
        Some(p) if p.confidence >= threshold => Resolution {
            intent: p.intent,
            confidence: Some(p.confidence),
            source: ResolutionSource::Model,
        },
        _ => Resolution {
            intent: lexical(),
            confidence: None,
            source: ResolutionSource::Lexical,
        },
    }
}

/// Keyword-only resolution of `text` against `kb`.
pub fn resolve_lexical(text: &str, kb: &KnowledgeBase) -> String {
    best_intent(&score(&normalize(text), kb))
}

pub struct IntentResolver {
    kb: Arc<KnowledgeBase>,
    classifier: Option<Arc<dyn IntentClassifier>>,
    policy: ResolverPolicy,
}

impl IntentResolver {
    pub fn new(kb: Arc<KnowledgeBase>, policy: ResolverPolicy) -> Self {
        Self {
            kb,
            classifier: None,
            policy,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn IntentClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn classifier_loaded(&self) -> bool {
        self.classifier.as_ref().is_some_and(|c| c.is_loaded())
    }

    pub async fn resolve(&self, text: &str) -> Resolution {
        let ml = match self.predict(text).await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(target: "helpdesk::resolver", "Classifier unavailable, using keyword fallback: {}", e);
                None
            }
        };
        if let Some(p) = &ml {
            if p.confidence < self.policy.confidence_threshold {
                tracing::debug!(
                    target: "helpdesk::resolver",
                    intent = %p.intent,
                    confidence = p.confidence,
                    "Low classifier confidence, using keyword fallback"
                );
            }
        }
        decide(ml, || resolve_lexical(text, &self.kb), self.policy.confidence_threshold)
    }

    /// `Ok(None)` when no classifier is configured or it reports not loaded.
    async fn predict(&self, text: &str) -> Result<Option<Prediction>> {
        let Some(classifier) = self.classifier.as_ref().filter(|c| c.is_loaded()) else {
            return Ok(None);
        };
        let timeout = self.policy.classifier_timeout;
        match tokio::time::timeout(timeout, classifier.predict(text)).await {
            Ok(prediction) => prediction.map(Some),
            Err(_) => Err(CoreError::ClassifierTimeout(timeout.as_millis() as u64)),
        }
    }
}
