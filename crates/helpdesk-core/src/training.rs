//! Labelled example generation for training the external intent classifier.
//!
//! Each knowledge base pattern becomes a `{text, label}` row plus a set of surface
//! variations. Training itself happens outside this crate.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CoreError, Result};
use crate::knowledge::KnowledgeBase;

pub const DEFAULT_TRAIN_RATIO: f64 = 0.8;

const AUGMENT_PREFIXES: [&str; 6] = [
    "can you",
    "could you",
    "i need",
    "i want",
    "tell me about",
    "what about",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub text: String,
    pub label: String,
}

/// Variations of `pattern`: itself, trailing `?` and `.`, sentence case, upper case, and
/// common request prefixes.
pub fn augment_pattern(pattern: &str) -> Vec<String> {
    let mut variations = vec![
        pattern.to_string(),
        format!("{pattern}?"),
        format!("{pattern}."),
        sentence_case(pattern),
        pattern.to_uppercase(),
    ];
    variations.extend(AUGMENT_PREFIXES.iter().map(|p| format!("{p} {pattern}")));
    variations
}

fn sentence_case(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
        None => String::new(),
    }
}

/// Every pattern once as-is plus its augmentations, shuffled.
pub fn generate_examples<R: Rng + ?Sized>(kb: &KnowledgeBase, rng: &mut R) -> Vec<TrainingExample> {
    let mut examples = Vec::new();
    for entry in kb.entries() {
        for pattern in &entry.patterns {
            examples.push(TrainingExample {
                text: pattern.clone(),
                label: entry.intent_id.clone(),
            });
            examples.extend(augment_pattern(pattern).into_iter().map(|text| TrainingExample {
                text,
                label: entry.intent_id.clone(),
            }));
        }
    }
    examples.shuffle(rng);
    examples
}

/// Shuffles and splits into (train, validation); `train_ratio` is clamped to [0, 1].
pub fn split_examples<R: Rng + ?Sized>(
    mut examples: Vec<TrainingExample>,
    train_ratio: f64,
    rng: &mut R,
) -> (Vec<TrainingExample>, Vec<TrainingExample>) {
    examples.shuffle(rng);
    let split = (examples.len() as f64 * train_ratio.clamp(0.0, 1.0)) as usize;
    let validation = examples.split_off(split);
    (examples, validation)
}

/// Writes `train_data.json` and `val_data.json` into `dir`.
pub fn save_dataset(dir: &Path, train: &[TrainingExample], validation: &[TrainingExample]) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|source| CoreError::DatasetIo {
        path: dir.to_path_buf(),
        source,
    })?;
    for (name, rows) in [("train_data.json", train), ("val_data.json", validation)] {
        let path = dir.join(name);
        let json = serde_json::to_vec_pretty(rows).map_err(std::io::Error::from);
        json.and_then(|bytes| std::fs::write(&path, bytes))
            .map_err(|source| CoreError::DatasetIo { path, source })?;
    }
    tracing::info!(
        target: "helpdesk::training",
        train = train.len(),
        validation = validation.len(),
        "Saved training dataset to {}",
        dir.display()
    );
    Ok(())
}
