//! Fade System
//!
//! Every bound voice owns a [`VolumeRamp`] that moves its volume toward a
//! target over a fade duration:
//!
//! `current = lerp(from, target, curve(clamp01(elapsed / fade_seconds)))`
//!
//! A retarget restarts the ramp from the current value, so the volume stays
//! continuous no matter how often the target moves. Only a zero-length fade
//! jumps.

use serde::{Deserialize, Serialize};

/// Fade curve type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    /// Linear fade
    #[default]
    Linear,
    /// Quadratic ease-in (slow start)
    EaseInQuad,
    /// Quadratic ease-out (slow end)
    EaseOutQuad,
    /// Quadratic ease-in-out
    EaseInOutQuad,
    /// S-curve (sine-based)
    SCurve,
}

impl FadeCurve {
    /// Apply the curve to a linear progress value (0.0-1.0)
    #[inline]
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => t,
            FadeCurve::EaseInQuad => t * t,
            FadeCurve::EaseOutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            FadeCurve::EaseInOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
            FadeCurve::SCurve => (1.0 - (t * std::f32::consts::PI).cos()) / 2.0,
        }
    }
}

/// Volume ramp toward a target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeRamp {
    from: f32,
    to: f32,
    current: f32,
    elapsed: f32,
    duration: f32,
    curve: FadeCurve,
}

impl Default for VolumeRamp {
    fn default() -> Self {
        Self::at(0.0)
    }
}

impl VolumeRamp {
    /// Settled ramp at a fixed value
    pub fn at(value: f32) -> Self {
        let value = value.clamp(0.0, 1.0);
        Self {
            from: value,
            to: value,
            current: value,
            elapsed: 0.0,
            duration: 0.0,
            curve: FadeCurve::Linear,
        }
    }

    /// Restart the ramp from the current value toward `target`
    pub fn retarget(&mut self, target: f32, fade_seconds: f32, curve: FadeCurve) {
        let target = if target.is_finite() {
            target.clamp(0.0, 1.0)
        } else {
            0.0
        };

        self.from = self.current;
        self.to = target;
        self.elapsed = 0.0;
        self.duration = fade_seconds;
        self.curve = curve;

        if fade_seconds <= 0.0 || !fade_seconds.is_finite() {
            self.current = target;
            self.from = target;
        }
    }

    /// Step the ramp by `dt` seconds and return the new volume
    pub fn advance(&mut self, dt: f32) -> f32 {
        if self.is_settled() || dt <= 0.0 {
            return self.current;
        }

        self.elapsed += dt;
        let progress = (self.elapsed / self.duration).clamp(0.0, 1.0);
        self.current = if progress >= 1.0 {
            self.to
        } else {
            self.from + (self.to - self.from) * self.curve.apply(progress)
        };
        self.current
    }

    #[inline]
    pub fn current(&self) -> f32 {
        self.current
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.to
    }

    /// Whether the ramp reached its target
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.current == self.to
    }
}
