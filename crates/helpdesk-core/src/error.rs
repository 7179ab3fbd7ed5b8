//! Error taxonomy for the helpdesk core.
//!
//! None of these ever reach a chat caller: the knowledge base, resolver and audit log
//! each catch their own failures and degrade to a defined fallback.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("knowledge base {} unreadable: {source}", .path.display())]
    KnowledgeBaseIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("knowledge base {} malformed: {source}", .path.display())]
    KnowledgeBaseFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("audit log {}: {source}", .path.display())]
    AuditIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("audit log {} corrupt: {source}", .path.display())]
    AuditFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("training dataset {}: {source}", .path.display())]
    DatasetIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("classifier error: {0}")]
    Classifier(String),

    #[error("classifier timed out after {0} ms")]
    ClassifierTimeout(u64),

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        CoreError::Classifier(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
