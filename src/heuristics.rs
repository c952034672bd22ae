//! Cheap input-quality proxies used to qualify model output.
//!
//! Neither heuristic is calibrated. The thresholds are configurable defaults.

use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::config::Number;
use crate::error::{ClipdexError, Result};

pub const DEFAULT_AUDIO_HIGH: Number = 0.05;
pub const DEFAULT_AUDIO_MEDIUM: Number = 0.02;
pub const DEFAULT_MIN_AUDIO_SECS: Number = 1.0;
pub const DEFAULT_BRIGHTNESS_THRESHOLD: Number = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AudioQuality {
    High,
    Medium,
    Low,
}

impl fmt::Display for AudioQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AudioQuality::High => "High",
            AudioQuality::Medium => "Medium",
            AudioQuality::Low => "Low",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioThresholds {
    pub high: Number,
    pub medium: Number,
    pub min_duration_secs: Number,
}

impl Default for AudioThresholds {
    fn default() -> Self {
        Self {
            high: DEFAULT_AUDIO_HIGH,
            medium: DEFAULT_AUDIO_MEDIUM,
            min_duration_secs: DEFAULT_MIN_AUDIO_SECS,
        }
    }
}

impl AudioThresholds {
    /// Both comparisons are strict: energy exactly at a threshold falls to the lower label.
    pub fn classify(&self, rms_energy: Number) -> AudioQuality {
        if rms_energy > self.high {
            AudioQuality::High
        } else if rms_energy > self.medium {
            AudioQuality::Medium
        } else {
            AudioQuality::Low
        }
    }
}

pub fn classify_quality(rms_energy: Number) -> AudioQuality {
    AudioThresholds::default().classify(rms_energy)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioReport {
    pub duration_secs: Number,
    pub rms_energy: Number,
    pub quality: AudioQuality,
    /// Advisory: the clip may be too short to carry context. Does not affect `quality`.
    pub short_clip: bool,
}

pub fn rms_energy(samples: &[Number]) -> Number {
    if samples.is_empty() {
        return 0.0;
    }
    let mean_square = samples
        .iter()
        .map(|&s| f64::from(s) * f64::from(s))
        .sum::<f64>()
        / samples.len() as f64;
    mean_square.sqrt() as Number
}

pub fn analyze_samples(
    samples: &[Number],
    sample_rate: u32,
    thresholds: &AudioThresholds,
) -> Result<AudioReport> {
    if sample_rate == 0 {
        return Err(ClipdexError::InvalidAudio("sample rate is zero".to_string()));
    }
    let duration_secs = samples.len() as Number / sample_rate as Number;
    let rms_energy = rms_energy(samples);
    Ok(AudioReport {
        duration_secs,
        rms_energy,
        quality: thresholds.classify(rms_energy),
        short_clip: duration_secs < thresholds.min_duration_secs,
    })
}

/// Decode a WAV file to mono samples in [-1, 1] plus its sample rate.
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<(Vec<Number>, u32)> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ClipdexError::InputNotFound(path.to_path_buf()));
    }

    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    let samples: Vec<Number> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<Number>, hound::Error>>()?,
        hound::SampleFormat::Int => {
            let max_val = (1u64 << (spec.bits_per_sample.saturating_sub(1))) as Number;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as Number / max_val))
                .collect::<std::result::Result<Vec<Number>, hound::Error>>()?
        }
    };

    let channels = spec.channels.max(1) as usize;
    let mono = if channels > 1 {
        samples
            .chunks(channels)
            .map(|chunk| chunk.iter().sum::<Number>() / chunk.len() as Number)
            .collect()
    } else {
        samples
    };

    debug!(
        path = %path.display(),
        samples = mono.len(),
        sample_rate = spec.sample_rate,
        channels,
        "Decoded WAV"
    );
    Ok((mono, spec.sample_rate))
}

pub fn analyze_wav<P: AsRef<Path>>(path: P, thresholds: &AudioThresholds) -> Result<AudioReport> {
    let (samples, sample_rate) = read_wav(path)?;
    analyze_samples(&samples, sample_rate, thresholds)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BrightnessConfidence {
    High,
    Low,
}

impl fmt::Display for BrightnessConfidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BrightnessConfidence::High => "High",
            BrightnessConfidence::Low => "Low",
        })
    }
}

/// Dark images make captioners hallucinate; anything at or under the
/// threshold (0-255 luma scale) is flagged.
pub fn classify_brightness(mean: Number, threshold: Number) -> BrightnessConfidence {
    if mean > threshold {
        BrightnessConfidence::High
    } else {
        BrightnessConfidence::Low
    }
}

/// ITU-R BT.601 luma in 16.16 fixed point, rounded. Not `to_luma8`, which
/// weights channels per BT.709.
fn luma_601([r, g, b]: [u8; 3]) -> u8 {
    ((u32::from(r) * 19_595 + u32::from(g) * 38_470 + u32::from(b) * 7_471 + 0x8000) >> 16) as u8
}

/// Mean 8-bit luma of an image file. Alpha is ignored.
pub fn mean_brightness<P: AsRef<Path>>(path: P) -> Result<Number> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ClipdexError::InputNotFound(path.to_path_buf()));
    }
    let rgb = image::open(path)?.to_rgb8();
    let pixel_count = rgb.pixels().len();
    if pixel_count == 0 {
        return Ok(0.0);
    }
    let total: u64 = rgb.pixels().map(|p| u64::from(luma_601(p.0))).sum();
    Ok((total as f64 / pixel_count as f64) as Number)
}
