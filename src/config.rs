//! Player configuration
//!
//! Loaded from an optional TOML file and overridden by command-line flags.
//! Every field has a default, so an empty file is a valid configuration.

use anyhow::{Context, Result};
use pixelsong_core::playback::SchedulerConfig;
use pixelsong_core::types::Tempo;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// File picked up from the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "pixelsong.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Built-in software synthesizer
    #[default]
    Synth,
    /// External synth over MIDI
    Midi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlayerConfig {
    pub lookahead_ms: u64,
    pub wake_period_ms: u64,
    pub start_delay_ms: u64,
    pub gain: f32,
    pub tempo: f64,
    pub backend: Backend,
    pub midi_port: Option<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        let scheduler = SchedulerConfig::default();
        Self {
            lookahead_ms: scheduler.lookahead.as_millis() as u64,
            wake_period_ms: scheduler.wake_period.as_millis() as u64,
            start_delay_ms: scheduler.start_delay.as_millis() as u64,
            gain: scheduler.gain,
            tempo: Tempo::DEFAULT_BPM,
            backend: Backend::default(),
            midi_port: None,
        }
    }
}

impl PlayerConfig {
    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let config = Self::from_toml(&raw)
            .with_context(|| format!("invalid TOML config: {}", path.display()))?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load `explicit` if given, else the default file in `dir` if it exists,
    /// else the built-in defaults
    pub fn resolve(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let fallback: PathBuf = dir.join(DEFAULT_CONFIG_FILE);
        if fallback.is_file() {
            Self::load(&fallback)
        } else {
            Ok(Self::default())
        }
    }

    /// Validated scheduler timing
    pub fn scheduler(&self) -> Result<SchedulerConfig> {
        let config = SchedulerConfig {
            lookahead: Duration::from_millis(self.lookahead_ms),
            wake_period: Duration::from_millis(self.wake_period_ms),
            start_delay: Duration::from_millis(self.start_delay_ms),
            gain: self.gain,
        };
        config.validate()?;
        if config.lookahead > config.wake_period * 10 {
            warn!(
                lookahead_ms = self.lookahead_ms,
                "Long lookahead delays stop and tempo changes"
            );
        }
        Ok(config)
    }

    pub fn tempo(&self) -> Result<Tempo> {
        Ok(Tempo::new(self.tempo)?)
    }
}
