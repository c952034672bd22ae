//! The encoder boundary.
//!
//! Running CLIP (or any other dual encoder) is not this crate's job. An
//! [`Embedder`] is handed in by the caller, built once, and borrowed by the
//! index builder and the search path.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ClipdexError, Result};
use crate::vector_entry::{EmbeddingKind, EmbeddingRecord};
use crate::vector_ops::Vector;

pub trait Embedder: Send + Sync {
    fn encode_image(&self, path: &Path) -> Result<Vector>;

    fn encode_text(&self, text: &str) -> Result<Vector>;

    /// Dimensionality of produced vectors, if known up front.
    fn dimensions(&self) -> Option<usize>;
}

/// Serves embeddings computed offline by an external encoder.
///
/// Image embeddings are looked up by file name first, then by the full path
/// as written. Text embeddings are looked up by the trimmed query string.
#[derive(Debug, Default)]
pub struct LookupEmbedder {
    images: HashMap<String, Vector>,
    texts: HashMap<String, Vector>,
    dimensions: Option<usize>,
}

impl LookupEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON-lines file of `{"kind", "key", "vector"}` records.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ClipdexError::InputNotFound(path.to_path_buf()));
        }

        let reader = BufReader::new(File::open(path)?);
        let mut embedder = Self::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: EmbeddingRecord =
                serde_json::from_str(&line).map_err(|e| invalid(path, line_no + 1, e.to_string()))?;
            embedder
                .insert(record)
                .map_err(|e| invalid(path, line_no + 1, e.to_string()))?;
        }

        info!(
            images = embedder.images.len(),
            texts = embedder.texts.len(),
            path = %path.display(),
            "Loaded precomputed embeddings"
        );
        Ok(embedder)
    }

    pub fn insert(&mut self, record: EmbeddingRecord) -> Result<()> {
        let actual = record.vector.len();
        if actual == 0 {
            return Err(ClipdexError::EmptyEmbedding {
                kind: record.kind.as_str(),
                key: record.key,
            });
        }
        match self.dimensions {
            Some(expected) if expected != actual => {
                return Err(ClipdexError::DimensionMismatch { expected, actual });
            }
            _ => self.dimensions = Some(actual),
        }

        let vector = Vector::new(record.vector);
        match record.kind {
            EmbeddingKind::Image => self.images.insert(record.key, vector),
            EmbeddingKind::Text => self.texts.insert(record.key.trim().to_string(), vector),
        };
        Ok(())
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn text_count(&self) -> usize {
        self.texts.len()
    }
}

fn invalid(path: &Path, line: usize, reason: String) -> ClipdexError {
    ClipdexError::InvalidEmbeddings {
        path: PathBuf::from(path),
        line,
        reason,
    }
}

impl Embedder for LookupEmbedder {
    fn encode_image(&self, path: &Path) -> Result<Vector> {
        if !path.exists() {
            return Err(ClipdexError::InputNotFound(path.to_path_buf()));
        }

        let by_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| self.images.get(name));
        let found = by_name.or_else(|| self.images.get(path.to_string_lossy().as_ref()));

        match found {
            Some(vector) => {
                debug!(path = %path.display(), "Encoded image");
                Ok(vector.clone())
            }
            None => Err(ClipdexError::EmbeddingNotFound {
                kind: EmbeddingKind::Image.as_str(),
                key: path.display().to_string(),
            }),
        }
    }

    fn encode_text(&self, text: &str) -> Result<Vector> {
        self.texts
            .get(text.trim())
            .cloned()
            .ok_or_else(|| ClipdexError::EmbeddingNotFound {
                kind: EmbeddingKind::Text.as_str(),
                key: text.to_string(),
            })
    }

    fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn loads_records_and_normalizes() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("embeddings.jsonl");
        let mut f = File::create(&file).unwrap();
        writeln!(f, r#"{{"kind":"image","key":"dog.jpg","vector":[3.0,4.0]}}"#).unwrap();
        writeln!(f).unwrap();
        writeln!(f, r#"{{"kind":"text","key":"a dog","vector":[0.0,2.0]}}"#).unwrap();
        drop(f);

        let embedder = LookupEmbedder::open(&file).unwrap();
        assert_eq!(embedder.image_count(), 1);
        assert_eq!(embedder.text_count(), 1);
        assert_eq!(embedder.dimensions(), Some(2));

        let text = embedder.encode_text("  a dog ").unwrap();
        assert_eq!(text.as_slice(), &[0.0, 1.0]);

        let image_path = dir.path().join("dog.jpg");
        File::create(&image_path).unwrap();
        let image = embedder.encode_image(&image_path).unwrap();
        assert!((image.as_slice()[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn reports_bad_line_number() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("embeddings.jsonl");
        let mut f = File::create(&file).unwrap();
        writeln!(f, r#"{{"kind":"text","key":"ok","vector":[1.0]}}"#).unwrap();
        writeln!(f, "not json").unwrap();
        drop(f);

        match LookupEmbedder::open(&file) {
            Err(ClipdexError::InvalidEmbeddings { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn rejects_mixed_dimensions() {
        let mut embedder = LookupEmbedder::new();
        embedder
            .insert(EmbeddingRecord {
                kind: EmbeddingKind::Text,
                key: "a".into(),
                vector: vec![1.0, 0.0],
            })
            .unwrap();
        let err = embedder
            .insert(EmbeddingRecord {
                kind: EmbeddingKind::Text,
                key: "b".into(),
                vector: vec![1.0, 0.0, 0.0],
            })
            .unwrap_err();
        assert!(matches!(err, ClipdexError::DimensionMismatch { .. }));
    }

    #[test]
    fn empty_vector_is_rejected_without_fixing_dimensions() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("embeddings.jsonl");
        let mut f = File::create(&file).unwrap();
        writeln!(f, r#"{{"kind":"image","key":"blank.jpg","vector":[]}}"#).unwrap();
        writeln!(f, r#"{{"kind":"image","key":"dog.jpg","vector":[1.0,0.0]}}"#).unwrap();
        drop(f);

        match LookupEmbedder::open(&file) {
            Err(ClipdexError::InvalidEmbeddings { line, reason, .. }) => {
                assert_eq!(line, 1);
                assert!(reason.contains("no components"));
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }

        let mut embedder = LookupEmbedder::new();
        let err = embedder
            .insert(EmbeddingRecord {
                kind: EmbeddingKind::Text,
                key: "empty".into(),
                vector: vec![],
            })
            .unwrap_err();
        assert!(matches!(err, ClipdexError::EmptyEmbedding { kind: "text", .. }));
        assert_eq!(embedder.dimensions(), None);
        embedder
            .insert(EmbeddingRecord {
                kind: EmbeddingKind::Text,
                key: "real".into(),
                vector: vec![0.0, 1.0, 0.0],
            })
            .unwrap();
        assert_eq!(embedder.dimensions(), Some(3));
    }

    #[test]
    fn missing_image_file_is_input_not_found() {
        let embedder = LookupEmbedder::new();
        let err = embedder
            .encode_image(Path::new("/definitely/not/here.jpg"))
            .unwrap_err();
        assert!(matches!(err, ClipdexError::InputNotFound(_)));
    }

    #[test]
    fn unknown_text_is_embedding_not_found() {
        let embedder = LookupEmbedder::new();
        let err = embedder.encode_text("a cat").unwrap_err();
        assert!(matches!(err, ClipdexError::EmbeddingNotFound { kind: "text", .. }));
    }
}
