use anyhow::Result;
use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::env;

use crate::gate::DEFAULT_THRESHOLD;
use crate::heuristics::{
    AudioThresholds, DEFAULT_AUDIO_HIGH, DEFAULT_AUDIO_MEDIUM, DEFAULT_BRIGHTNESS_THRESHOLD,
    DEFAULT_MIN_AUDIO_SECS,
};

pub type Number = f32;

pub const EPSILON: f32 = 1e-6;

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_INDEX_PATH: &str = "clipdex_index";
pub const DEFAULT_EMBEDDINGS_PATH: &str = "embeddings.jsonl";
pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Deserialize, Default)]
pub struct ClipdexConfig {
    pub index_path: Option<String>,
    pub embeddings_path: Option<String>,
    pub top_k: Option<usize>,
    pub threshold: Option<Number>,
    pub audio_high: Option<Number>,
    pub audio_medium: Option<Number>,
    pub min_audio_secs: Option<Number>,
    pub brightness_threshold: Option<Number>,
    pub image_extensions: Option<String>,
    pub workers: Option<usize>,
}

impl ClipdexConfig {
    pub fn try_from(config: &Config) -> Result<Self, ConfigError> {
        Ok(ClipdexConfig {
            index_path: config.get("index_path").ok(),
            embeddings_path: config.get("embeddings_path").ok(),
            top_k: config.get("top_k").ok(),
            threshold: config.get("threshold").ok(),
            audio_high: config.get("audio_high").ok(),
            audio_medium: config.get("audio_medium").ok(),
            min_audio_secs: config.get("min_audio_secs").ok(),
            brightness_threshold: config.get("brightness_threshold").ok(),
            image_extensions: config.get("image_extensions").ok(),
            workers: config.get("workers").ok(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct State {
    pub index_path: String,
    pub embeddings_path: String,
    pub top_k: usize,
    pub threshold: Number,
    pub audio: AudioThresholds,
    pub brightness_threshold: Number,
    pub image_extensions: Vec<String>,
    pub workers: usize,
}

impl State {
    pub fn new() -> Result<Self> {
        let mut config = Config::default();
        #[allow(deprecated)]
        {
            config.merge(ConfigFile::with_name("clipdex_config").required(false))?;
            config.merge(Environment::with_prefix("CLIPDEX"))?;
        }

        let clipdex_config = ClipdexConfig::try_from(&config)?;
        Self::from_config(clipdex_config)
    }

    /// Resolve a parsed config into concrete settings, filling defaults and
    /// falling back to raw `CLIPDEX_*` variables for anything the merge missed.
    pub fn from_config(clipdex_config: ClipdexConfig) -> Result<Self> {
        let index_path = clipdex_config
            .index_path
            .or_else(|| env::var("CLIPDEX_INDEX_PATH").ok())
            .unwrap_or_else(|| DEFAULT_INDEX_PATH.to_string());

        let embeddings_path = clipdex_config
            .embeddings_path
            .or_else(|| env::var("CLIPDEX_EMBEDDINGS_PATH").ok())
            .unwrap_or_else(|| DEFAULT_EMBEDDINGS_PATH.to_string());

        let top_k = clipdex_config
            .top_k
            .or_else(|| parse_env("CLIPDEX_TOP_K"))
            .unwrap_or(DEFAULT_TOP_K);

        let threshold = clipdex_config
            .threshold
            .or_else(|| parse_env("CLIPDEX_THRESHOLD"))
            .unwrap_or(DEFAULT_THRESHOLD);

        let audio = AudioThresholds {
            high: clipdex_config
                .audio_high
                .or_else(|| parse_env("CLIPDEX_AUDIO_HIGH"))
                .unwrap_or(DEFAULT_AUDIO_HIGH),
            medium: clipdex_config
                .audio_medium
                .or_else(|| parse_env("CLIPDEX_AUDIO_MEDIUM"))
                .unwrap_or(DEFAULT_AUDIO_MEDIUM),
            min_duration_secs: clipdex_config
                .min_audio_secs
                .or_else(|| parse_env("CLIPDEX_MIN_AUDIO_SECS"))
                .unwrap_or(DEFAULT_MIN_AUDIO_SECS),
        };

        let brightness_threshold = clipdex_config
            .brightness_threshold
            .or_else(|| parse_env("CLIPDEX_BRIGHTNESS_THRESHOLD"))
            .unwrap_or(DEFAULT_BRIGHTNESS_THRESHOLD);

        let image_extensions = clipdex_config
            .image_extensions
            .or_else(|| env::var("CLIPDEX_IMAGE_EXTENSIONS").ok())
            .map(|raw| parse_extensions(&raw))
            .unwrap_or_else(|| {
                DEFAULT_IMAGE_EXTENSIONS
                    .iter()
                    .map(|ext| ext.to_string())
                    .collect()
            });

        let workers = clipdex_config
            .workers
            .or_else(|| parse_env("CLIPDEX_WORKERS"))
            .unwrap_or(1);

        if top_k == 0 {
            anyhow::bail!("CLIPDEX_TOP_K must be greater than zero.");
        }
        if !(0.0..=1.0).contains(&threshold) {
            anyhow::bail!("CLIPDEX_THRESHOLD must be within [0, 1], got {}.", threshold);
        }
        if audio.medium > audio.high {
            anyhow::bail!(
                "CLIPDEX_AUDIO_MEDIUM ({}) must not exceed CLIPDEX_AUDIO_HIGH ({}).",
                audio.medium,
                audio.high
            );
        }
        if workers == 0 {
            anyhow::bail!("CLIPDEX_WORKERS must be greater than zero.");
        }
        if image_extensions.is_empty() {
            anyhow::bail!("CLIPDEX_IMAGE_EXTENSIONS must name at least one extension.");
        }

        Ok(Self {
            index_path,
            embeddings_path,
            top_k,
            threshold,
            audio,
            brightness_threshold,
            image_extensions,
            workers,
        })
    }

    pub fn print_config(&self) {
        println!("index_path={}", self.index_path);
        println!("embeddings_path={}", self.embeddings_path);
        println!("top_k={}", self.top_k);
        println!("threshold={}", self.threshold);
        println!("audio_high={}", self.audio.high);
        println!("audio_medium={}", self.audio.medium);
        println!("min_audio_secs={}", self.audio.min_duration_secs);
        println!("brightness_threshold={}", self.brightness_threshold);
        println!("image_extensions={}", self.image_extensions.join(","));
        println!("workers={}", self.workers);
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}

/// Split a comma separated list like `"jpg, PNG,.webp"` into bare lowercase extensions.
pub fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}
