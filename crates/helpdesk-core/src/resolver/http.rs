//! Intent classifier served over HTTP by an external inference process.
//!
//! Endpoints, relative to the configured base URL:
//! - `GET  /health`                                   -> 2xx when the model is loaded
//! - `POST /predict`       `{"text"}`                 -> `{"intent", "confidence"}`
//! - `POST /predict_top_k` `{"text", "k"}`            -> `{"predictions": [{"intent", "confidence"}, ...]}`

use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::{IntentClassifier, Prediction};
use crate::error::{CoreError, Result};

#[derive(Deserialize)]
struct TopKResponse {
    predictions: Vec<Prediction>,
}

pub struct HttpClassifier {
    client: reqwest::Client,
    base_url: String,
    loaded: AtomicBool,
}

impl HttpClassifier {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            loaded: AtomicBool::new(false),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Checks the health endpoint and records the result for `is_loaded`.
    pub async fn probe(&self) -> bool {
        let ok = match self.client.get(self.endpoint("health")).send().await {
            Ok(res) => res.status().is_success(),
            Err(e) => {
                tracing::warn!(target: "helpdesk::resolver", "Classifier health probe failed: {}", e);
                false
            }
        };
        self.loaded.store(ok, Ordering::Release);
        ok
    }

    fn check_confidence(p: Prediction) -> Result<Prediction> {
        if (0.0..=1.0).contains(&p.confidence) {
            Ok(p)
        } else {
            Err(CoreError::Classifier(format!(
                "confidence {} for intent {} outside [0, 1]",
                p.confidence, p.intent
            )))
        }
    }
}

#[async_trait::async_trait]
impl IntentClassifier for HttpClassifier {
    async fn predict(&self, text: &str) -> Result<Prediction> {
        let prediction: Prediction = self
            .client
            .post(self.endpoint("predict"))
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Self::check_confidence(prediction)
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    async fn predict_top_k(&self, text: &str, k: usize) -> Result<Vec<Prediction>> {
        let res: TopKResponse = self
            .client
            .post(self.endpoint("predict_top_k"))
            .json(&serde_json::json!({ "text": text, "k": k }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        res.predictions
            .into_iter()
            .take(k)
            .map(Self::check_confidence)
            .collect()
    }
}
