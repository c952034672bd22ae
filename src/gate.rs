use serde::Serialize;
use tracing::debug;

use crate::config::Number;
use crate::error::{ClipdexError, Result};
use crate::ranker::RankedResult;

/// Minimum top-1 score for a ranking to be shown as-is. Tunable, not calibrated.
pub const DEFAULT_THRESHOLD: Number = 0.6;

/// How many alternatives a low-confidence fallback offers.
pub const FALLBACK_ALTERNATIVES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceGate {
    threshold: Number,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateDecision {
    pub accepted: bool,
    pub top_score: Number,
    pub threshold: Number,
    pub shown: Vec<RankedResult>,
}

impl GateDecision {
    pub fn needs_fallback(&self) -> bool {
        !self.accepted
    }
}

impl Default for ConfidenceGate {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl ConfidenceGate {
    pub fn new(threshold: Number) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ClipdexError::InvalidThreshold(threshold));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> Number {
        self.threshold
    }

    pub fn evaluate(&self, ranked: &[RankedResult]) -> Result<GateDecision> {
        let top = ranked.first().ok_or(ClipdexError::EmptyRanking)?;
        let accepted = top.score >= self.threshold;
        let shown = if accepted {
            ranked.to_vec()
        } else {
            ranked[..ranked.len().min(FALLBACK_ALTERNATIVES)].to_vec()
        };

        debug!(
            top_score = top.score,
            threshold = self.threshold,
            accepted,
            "Confidence gate evaluated"
        );

        Ok(GateDecision {
            accepted,
            top_score: top.score,
            threshold: self.threshold,
            shown,
        })
    }
}
