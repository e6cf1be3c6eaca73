//! Scoring constants and bucket thresholds.
//!
//! These are fixed configuration, not learned values: the same history and
//! the same settings always produce the same records.

use super::MetricsError;
use serde::Serialize;

/// Weights of the durability components. Normalized by their sum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreWeights {
    pub longevity: f64,
    pub streak: f64,
    pub momentum: f64,
    pub stability: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            longevity: 0.35,
            streak: 0.25,
            momentum: 0.20,
            stability: 0.20,
        }
    }
}

impl ScoreWeights {
    pub fn total(&self) -> f64 {
        self.longevity + self.streak + self.momentum + self.stability
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketThresholds {
    /// Anchor: weeks on chart strictly above this...
    pub anchor_min_weeks: u32,
    /// ...and current streak strictly above this.
    pub anchor_min_streak: u32,
    /// Climber: momentum strictly above this.
    pub climber_min_momentum: f64,
    /// Climber: weeks on chart at most this.
    pub climber_max_weeks: u32,
    /// Fader: momentum strictly below this.
    pub fader_max_momentum: f64,
    /// Spike: weeks on chart at most this.
    pub spike_max_weeks: u32,
}

impl Default for BucketThresholds {
    fn default() -> Self {
        Self {
            anchor_min_weeks: 8,
            anchor_min_streak: 4,
            climber_min_momentum: 2.0,
            climber_max_weeks: 12,
            fader_max_momentum: -2.0,
            spike_max_weeks: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSettings {
    /// Lookback, in ok weeks, for momentum and volatility.
    pub window_weeks: usize,
    /// Rank change charged for each absent week inside the window.
    pub absence_penalty: f64,
    /// Momentum (ranks per week) mapped to the ends of the 0..1 range.
    pub momentum_scale: f64,
    /// Volatility at which stability drops to one half.
    pub volatility_scale: f64,
    pub weights: ScoreWeights,
    pub thresholds: BucketThresholds,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            window_weeks: 4,
            absence_penalty: 10.0,
            momentum_scale: 10.0,
            volatility_scale: 10.0,
            weights: ScoreWeights::default(),
            thresholds: BucketThresholds::default(),
        }
    }
}

impl MetricsSettings {
    pub fn validate(&self) -> Result<(), MetricsError> {
        let invalid = |msg: &str| Err(MetricsError::InvalidSettings(msg.to_string()));
        if self.window_weeks == 0 {
            return invalid("window_weeks must be at least 1");
        }
        if !self.absence_penalty.is_finite() || self.absence_penalty < 0.0 {
            return invalid("absence_penalty must be a non-negative number");
        }
        if !(self.momentum_scale.is_finite() && self.momentum_scale > 0.0) {
            return invalid("momentum_scale must be positive");
        }
        if !(self.volatility_scale.is_finite() && self.volatility_scale > 0.0) {
            return invalid("volatility_scale must be positive");
        }
        let w = &self.weights;
        if [w.longevity, w.streak, w.momentum, w.stability]
            .iter()
            .any(|x| !x.is_finite() || *x < 0.0)
        {
            return invalid("score weights must be non-negative");
        }
        if w.total() <= 0.0 {
            return invalid("score weights must sum to a positive value");
        }
        let t = &self.thresholds;
        if !t.climber_min_momentum.is_finite() || !t.fader_max_momentum.is_finite() {
            return invalid("momentum thresholds must be finite");
        }
        Ok(())
    }
}
