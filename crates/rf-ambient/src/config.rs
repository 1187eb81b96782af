//! Bus Configuration
//!
//! Statically typed settings passed to [`crate::AmbientBus::new`]. Every field
//! has a serde default so partial JSON documents are valid.

use crate::fade::FadeCurve;
use crate::scoring::ScoringWeights;
use crate::{AmbientError, AmbientResult, DIAGNOSTICS_CAPACITY, MAX_VOICES};
use serde::{Deserialize, Serialize};

/// Ambient bus configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Voice budget K
    #[serde(default = "default_voice_count")]
    pub voice_count: usize,
    /// Steady-state re-score interval (seconds)
    #[serde(default = "default_rescore_interval")]
    pub rescore_interval_seconds: f32,
    /// Fade used by `clear_ambient(None)` (seconds)
    #[serde(default = "default_fade")]
    pub default_fade_seconds: f32,
    /// A fading-out voice at or below this volume is released
    #[serde(default = "default_silence_threshold")]
    pub silence_threshold: f32,
    /// Registered emitters are the candidates instead of profile layers
    #[serde(default)]
    pub spatial_emitters: bool,
    /// Let several emitters of one track play at once
    #[serde(default)]
    pub allow_multiple_emitters_per_track: bool,
    /// Scoring policy
    #[serde(default)]
    pub weights: ScoringWeights,
    /// Curve shared by every voice ramp
    #[serde(default)]
    pub fade_curve: FadeCurve,
    /// Diagnostics ring buffer capacity
    #[serde(default = "default_diagnostics_capacity")]
    pub diagnostics_capacity: usize,
    /// Seed for pitch and start-offset randomization (None = OS entropy)
    #[serde(default)]
    pub rng_seed: Option<u64>,
    /// Master output gain
    #[serde(default = "default_gain")]
    pub master_gain: f32,
    /// Ambient channel gain
    #[serde(default = "default_gain")]
    pub ambient_gain: f32,
}

fn default_voice_count() -> usize {
    8
}
fn default_rescore_interval() -> f32 {
    0.25
}
fn default_fade() -> f32 {
    1.0
}
fn default_silence_threshold() -> f32 {
    0.001
}
fn default_diagnostics_capacity() -> usize {
    DIAGNOSTICS_CAPACITY
}
fn default_gain() -> f32 {
    1.0
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            voice_count: 8,
            rescore_interval_seconds: 0.25,
            default_fade_seconds: 1.0,
            silence_threshold: 0.001,
            spatial_emitters: false,
            allow_multiple_emitters_per_track: false,
            weights: ScoringWeights::default(),
            fade_curve: FadeCurve::Linear,
            diagnostics_capacity: DIAGNOSTICS_CAPACITY,
            rng_seed: None,
            master_gain: 1.0,
            ambient_gain: 1.0,
        }
    }
}

impl BusConfig {
    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> AmbientResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_voice_count(mut self, voice_count: usize) -> Self {
        self.voice_count = voice_count;
        self
    }

    /// Use registered emitters as candidates instead of layers
    pub fn with_spatial_emitters(mut self) -> Self {
        self.spatial_emitters = true;
        self
    }

    pub fn with_multiple_emitters_per_track(mut self, allow: bool) -> Self {
        self.allow_multiple_emitters_per_track = allow;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Check value ranges
    pub fn validate(&self) -> AmbientResult<()> {
        if self.voice_count == 0 || self.voice_count > MAX_VOICES {
            return Err(AmbientError::InvalidConfig(format!(
                "voice_count must be 1..={}, got {}",
                MAX_VOICES, self.voice_count
            )));
        }
        if !(self.rescore_interval_seconds.is_finite() && self.rescore_interval_seconds > 0.0) {
            return Err(AmbientError::InvalidConfig(format!(
                "rescore_interval_seconds must be > 0, got {}",
                self.rescore_interval_seconds
            )));
        }
        if !(self.default_fade_seconds.is_finite() && self.default_fade_seconds >= 0.0) {
            return Err(AmbientError::InvalidConfig(format!(
                "default_fade_seconds must be >= 0, got {}",
                self.default_fade_seconds
            )));
        }
        if !(0.0..1.0).contains(&self.silence_threshold) {
            return Err(AmbientError::InvalidConfig(format!(
                "silence_threshold must be in [0, 1), got {}",
                self.silence_threshold
            )));
        }

        let weights = [
            ("weights.priority", self.weights.priority),
            ("weights.volume", self.weights.volume),
            ("weights.audibility", self.weights.audibility),
            ("master_gain", self.master_gain),
            ("ambient_gain", self.ambient_gain),
        ];
        for (name, value) in weights {
            if !(value.is_finite() && value >= 0.0) {
                return Err(AmbientError::InvalidConfig(format!(
                    "{} must be finite and >= 0, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }
}
