use rayon::prelude::*;
use serde::Serialize;
use std::time::Instant;
use tracing::debug;

use crate::config::Number;
use crate::error::{ClipdexError, Result};
use crate::index::Index;
use crate::vector_ops::Vector;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    pub id: String,
    pub score: Number,
    /// 1-based position in the ranking.
    pub rank: usize,
}

/// Score every entry of `index` against `query` and return the best `top_k`.
///
/// Scores are dot products of unit vectors. Output is sorted by descending
/// score; equal scores keep index insertion order.
pub fn rank(query: &Vector, index: &Index, top_k: usize) -> Result<Vec<RankedResult>> {
    if index.is_empty() {
        return Err(ClipdexError::IndexNotBuilt);
    }
    if top_k == 0 {
        return Err(ClipdexError::InvalidTopK);
    }
    if let Some(expected) = index.dimensions() {
        if expected != query.len() {
            return Err(ClipdexError::DimensionMismatch {
                expected,
                actual: query.len(),
            });
        }
    }

    let start = Instant::now();
    let scores = index
        .entries()
        .par_iter()
        .enumerate()
        .map(|(position, entry)| -> Result<_> {
            let score = query.dot(&entry.vector)?;
            Ok((position, score))
        })
        .collect::<Result<Vec<_>>>()?;

    let results = sort_and_limit_results(scores, top_k)
        .into_iter()
        .enumerate()
        .map(|(i, (position, score))| RankedResult {
            id: index.entries()[position].id.clone(),
            score,
            rank: i + 1,
        })
        .collect::<Vec<_>>();

    debug!(
        scored = index.len(),
        returned = results.len(),
        elapsed = ?start.elapsed(),
        "Ranking complete"
    );
    Ok(results)
}

fn sort_and_limit_results(
    mut results: Vec<(usize, Number)>,
    limit: usize,
) -> Vec<(usize, Number)> {
    results.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    results.truncate(limit);
    results
}
