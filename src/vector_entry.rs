use crate::config::Number;
use serde::{Deserialize, Serialize};

/// One line of a precomputed embeddings file.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct EmbeddingRecord {
    pub kind: EmbeddingKind,
    pub key: String,
    pub vector: Vec<Number>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingKind {
    Image,
    Text,
}

impl EmbeddingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EmbeddingKind::Image => "image",
            EmbeddingKind::Text => "text",
        }
    }
}

/// A raw query vector read from stdin by `search --stdin`.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct QueryEntry {
    pub label: String,
    pub vector: Vec<Number>,
}
