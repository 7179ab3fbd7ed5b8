//! Knowledge base: the immutable intent -> patterns/responses mapping, loaded once at startup.
//!
//! The file format is a JSON object keyed by intent id:
//!
//! ```json
//! { "greeting": { "patterns": ["hello", "hi"], "responses": ["Hello! How can I help?"] } }
//! ```
//!
//! Entry order follows the file. Lexical tie-breaking depends on it, so it is preserved.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{CoreError, Result};
use crate::nlp::normalize;

/// One intent with its recognizable patterns and candidate responses.
#[derive(Debug, Clone)]
pub struct KnowledgeBaseEntry {
    pub intent_id: String,
    pub patterns: Vec<String>,
    pub responses: Vec<String>,
    /// `normalize(pattern)` for each pattern, computed once at load.
    pattern_tokens: Vec<Vec<String>>,
}

impl KnowledgeBaseEntry {
    pub fn new(intent_id: impl Into<String>, patterns: Vec<String>, responses: Vec<String>) -> Self {
        let pattern_tokens = patterns.iter().map(|p| normalize(p)).collect();
        Self {
            intent_id: intent_id.into(),
            patterns,
            responses,
            pattern_tokens,
        }
    }

    pub fn pattern_tokens(&self) -> &[Vec<String>] {
        &self.pattern_tokens
    }
}

#[derive(Deserialize)]
struct RawEntry {
    #[serde(default)]
    patterns: Vec<String>,
    #[serde(default)]
    responses: Vec<String>,
}

/// Read-only knowledge base shared by the resolver and the composer.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    entries: Vec<KnowledgeBaseEntry>,
    index: HashMap<String, usize>,
}

impl KnowledgeBase {
    /// Builds a knowledge base from entries in iteration order. A repeated intent id replaces
    /// the earlier entry's content but keeps its position.
    pub fn from_entries(entries: impl IntoIterator<Item = KnowledgeBaseEntry>) -> Self {
        let mut kb = Self::default();
        for entry in entries {
            match kb.index.get(&entry.intent_id) {
                Some(&i) => kb.entries[i] = entry,
                None => {
                    kb.index.insert(entry.intent_id.clone(), kb.entries.len());
                    kb.entries.push(entry);
                }
            }
        }
        kb
    }

    /// Parses the JSON knowledge base format.
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        let raw: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;
        let mut entries = Vec::with_capacity(raw.len());
        for (intent_id, value) in raw {
            let RawEntry { patterns, responses } = serde_json::from_value(value)?;
            entries.push(KnowledgeBaseEntry::new(intent_id, patterns, responses));
        }
        Ok(Self::from_entries(entries))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| CoreError::KnowledgeBaseIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text).map_err(|source| CoreError::KnowledgeBaseFormat {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads the knowledge base, starting empty when the file is missing or malformed.
    /// Every resolution against an empty base yields the unknown intent.
    pub fn load_or_empty<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(kb) => {
                tracing::info!(target: "helpdesk::kb", intents = kb.len(), "Knowledge base loaded");
                kb
            }
            Err(e) => {
                tracing::warn!(target: "helpdesk::kb", "{}; starting with an empty knowledge base", e);
                Self::default()
            }
        }
    }

    pub fn get(&self, intent_id: &str) -> Option<&KnowledgeBaseEntry> {
        self.index.get(intent_id).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, intent_id: &str) -> bool {
        self.index.contains_key(intent_id)
    }

    /// Entries in knowledge base order.
    pub fn entries(&self) -> impl Iterator<Item = &KnowledgeBaseEntry> {
        self.entries.iter()
    }

    pub fn intent_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.intent_id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
