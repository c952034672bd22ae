//! Human-readable and JSON renderings. Not a stable machine contract.

use std::fmt::Write;
use std::path::Path;

use crate::gate::GateDecision;
use crate::heuristics::{AudioQuality, AudioReport, BrightnessConfidence};
use crate::ranker::RankedResult;

pub const SETUP_INFO: &str = "\
============================================================
How to Prepare clipdex Inputs
============================================================

1. Images
   Put .jpg/.jpeg/.png files in one directory, e.g. data/images/.

2. Embeddings
   clipdex does not run an encoder. Export embeddings from a dual
   encoder such as CLIP into a JSON-lines file (default:
   embeddings.jsonl), one record per line:
     {\"kind\": \"image\", \"key\": \"dog_clear.jpg\", \"vector\": [...]}
     {\"kind\": \"text\",  \"key\": \"a dog playing in a park\", \"vector\": [...]}
   Image keys are file names. Text keys are the exact query strings.
   All vectors must share one dimensionality.

3. Build and query
     clipdex index data/images
     clipdex search \"a dog playing in a park\"

4. Audio (optional)
   Place .wav clips in data/audio/ and run:
     clipdex audio data/audio/*.wav
   Useful stress cases: clean speech, background noise, accents,
   clips shorter than 2 seconds.

Settings come from clipdex_config.{toml,json,yaml} or CLIPDEX_*
environment variables; run `clipdex config` to see what is in effect.
============================================================
";

/// The file-name component of an identifier, or the whole identifier if it has none.
pub fn display_name(id: &str) -> &str {
    Path::new(id)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(id)
}

pub fn format_ranked(query: &str, results: &[RankedResult]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Query: \"{}\"", query);
    let _ = writeln!(out, "Top {} Results:", results.len());
    for result in results {
        let _ = writeln!(
            out,
            "{}. {:<30} - Score: {:.3}",
            result.rank,
            display_name(&result.id),
            result.score
        );
    }
    out
}

pub fn format_fallback(decision: &GateDecision) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "[WARNING] Low Confidence Match");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "We're not confident in this result (top score: {:.2} < {}).",
        decision.top_score, decision.threshold
    );
    let _ = writeln!(
        out,
        "Here are the top {} possibilities:",
        decision.shown.len()
    );
    let _ = writeln!(out);
    for result in &decision.shown {
        let _ = writeln!(
            out,
            "{}. {} - {}% match",
            result.rank,
            display_name(&result.id),
            percentage(result.score)
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Try a more specific query or upload a clearer image.");
    out
}

/// Score scaled to a whole percentage, truncated toward zero.
///
/// Computed from the score as printed to three decimals, so `0.300` reads
/// as 30% rather than whatever the f32 representation rounds down to.
pub fn percentage(score: f32) -> i64 {
    let millis = (f64::from(score) * 1000.0).round();
    (millis / 10.0).trunc() as i64
}

pub fn format_audio(name: &str, report: &AudioReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Processing: {}", name);
    let _ = writeln!(out, "Duration: {:.2}s", report.duration_secs);
    let _ = writeln!(out, "RMS energy: {:.4}", report.rms_energy);
    let _ = writeln!(out, "Quality: {}", report.quality);
    if report.quality == AudioQuality::Low {
        let _ = writeln!(out, "[WARNING] Low audio quality detected");
        let _ = writeln!(out, "          Transcription may be unreliable");
    } else if report.short_clip {
        let _ = writeln!(out, "[WARNING] Very short audio clip");
        let _ = writeln!(
            out,
            "          Context may be insufficient for accurate transcription"
        );
    }
    out
}

pub fn format_brightness(name: &str, mean: f32, confidence: BrightnessConfidence) -> String {
    let mut out = format!(
        "{}: mean brightness {:.1} - Confidence: {}\n",
        name, mean, confidence
    );
    if confidence == BrightnessConfidence::Low {
        out.push_str("[WARNING] Dark image; generated captions may be hallucinated\n");
    }
    out
}

/// Outcome of one file in a batch command.
#[derive(Debug, Clone, PartialEq)]
pub enum FileStatus {
    Analyzed(String),
    Missing,
    Failed(String),
}

pub fn format_summary(summary: &[(String, FileStatus)]) -> String {
    let mut out = String::new();
    if summary.is_empty() {
        return out;
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Processed files:");
    for (name, status) in summary {
        let _ = match status {
            FileStatus::Analyzed(detail) => writeln!(out, "  [OK] {}: {}", name, detail),
            FileStatus::Missing => writeln!(out, "  [SKIPPED] {}: not found", name),
            FileStatus::Failed(reason) => writeln!(out, "  [ERROR] {}: Error - {}", name, reason),
        };
    }
    out
}

pub fn search_json(
    query: &str,
    record_count: usize,
    requested: usize,
    decision: &GateDecision,
) -> serde_json::Value {
    serde_json::json!({
        "query": query,
        "database_record_count": record_count,
        "accepted": decision.accepted,
        "top_score": decision.top_score,
        "threshold": decision.threshold,
        "results": decision.shown.iter().map(|result| {
            serde_json::json!({
                "rank": result.rank,
                "id": result.id,
                "score": result.score,
            })
        }).collect::<Vec<_>>(),
        "actual_results_count": decision.shown.len(),
        "requested_results_count": requested,
    })
}
