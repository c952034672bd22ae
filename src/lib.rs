//! Embedding-based ranked retrieval with a confidence-gated fallback.
//!
//! Images are embedded once by an external encoder, collected into an
//! [`Index`], and ranked against a query embedding by dot product. A
//! [`ConfidenceGate`] decides whether the best match is shown directly or
//! replaced by a short list of alternatives.

pub mod config;
pub mod embedder;
pub mod error;
pub mod gate;
pub mod heuristics;
pub mod index;
pub mod ranker;
pub mod report;
pub mod vector_entry;
pub mod vector_ops;

pub use embedder::{Embedder, LookupEmbedder};
pub use error::{ClipdexError, Result};
pub use gate::{ConfidenceGate, GateDecision};
pub use index::{Index, IndexEntry};
pub use ranker::{rank, RankedResult};
pub use vector_ops::Vector;
