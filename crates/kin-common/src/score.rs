//! A score clamped to `[0, 1]`, used wherever the data model calls for a
//! bounded salience, confidence, importance, or bond-strength value.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A real number held in `[0.0, 1.0]`. Construction always clamps rather
/// than rejecting, since every producer in this system (appraisal
/// matching, attention weighting, decay) is a continuous function that can
/// legitimately overshoot at the edges through floating-point error.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitScore(f32);

impl UnitScore {
    pub const ZERO: UnitScore = UnitScore(0.0);
    pub const ONE: UnitScore = UnitScore(1.0);

    pub fn new(value: f32) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    pub fn get(&self) -> f32 {
        self.0
    }

    /// Multiplies two scores, staying in `[0, 1]` by construction.
    pub fn scale(&self, other: UnitScore) -> UnitScore {
        UnitScore::new(self.0 * other.0)
    }

    /// Exponential decay toward zero: `score * decay_factor`.
    pub fn decay(&self, decay_factor: f32) -> UnitScore {
        UnitScore::new(self.0 * decay_factor)
    }
}

impl Default for UnitScore {
    fn default() -> Self {
        UnitScore::ZERO
    }
}

impl From<f32> for UnitScore {
    fn from(value: f32) -> Self {
        UnitScore::new(value)
    }
}

impl fmt::Display for UnitScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_above_one_are_clamped() {
        assert_eq!(UnitScore::new(1.5).get(), 1.0);
    }

    #[test]
    fn negative_values_are_clamped_to_zero() {
        assert_eq!(UnitScore::new(-0.3).get(), 0.0);
    }

    #[test]
    fn scale_stays_in_bounds() {
        let a = UnitScore::new(0.8);
        let b = UnitScore::new(0.5);
        assert!((a.scale(b).get() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn decay_reduces_toward_zero() {
        let a = UnitScore::new(0.8);
        let decayed = a.decay(0.9);
        assert!(decayed.get() < a.get());
        assert!(decayed.get() > 0.0);
    }
}
