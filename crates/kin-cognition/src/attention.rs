//! C6 Attention/Salience: scores a token of attention as a weighted sum of
//! novelty, emotional weight, length, and working-memory relevance, then
//! applies the Creator boost. Grounded on
//! `beagle-personality::detector::ContextDetector`'s keyword/similarity
//! scoring idiom, generalized from domain detection to the weighted
//! feature sum spec.md §4.6 requires.

use kin_common::UnitScore;
use serde::{Deserialize, Serialize};

/// Weights for the four input features, summing to 1.0 in the spec's
/// default configuration (novelty 0.2, emotion 0.3, length 0.2,
/// working-memory relevance 0.3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AttentionWeights {
    pub novelty: f32,
    pub emotion: f32,
    pub length: f32,
    pub working_memory_relevance: f32,
}

impl Default for AttentionWeights {
    fn default() -> Self {
        Self {
            novelty: 0.2,
            emotion: 0.3,
            length: 0.2,
            working_memory_relevance: 0.3,
        }
    }
}

pub struct AttentionScorer {
    weights: AttentionWeights,
    creator_boost: f32,
}

impl AttentionScorer {
    pub fn new(weights: AttentionWeights, creator_boost: f32) -> Self {
        Self { weights, creator_boost }
    }

    /// Normalizes text length onto `[0, 1]`; inputs at or above 200
    /// characters are treated as maximally long.
    fn length_factor(text: &str) -> f32 {
        (text.chars().count() as f32 / 200.0).clamp(0.0, 1.0)
    }

    /// `base_salience` from novelty, emotional weight, and length
    /// (spec.md Phase 2), plus working-memory relevance (§4.6), then the
    /// Creator boost if `from_creator`, clamped to `[0, 1]`.
    pub fn score(
        &self,
        text: &str,
        from_creator: bool,
        novelty: f32,
        emotion_intensity: f32,
        working_memory_relevance: f32,
    ) -> UnitScore {
        let base = self.weights.novelty * novelty
            + self.weights.emotion * emotion_intensity
            + self.weights.length * Self::length_factor(text)
            + self.weights.working_memory_relevance * working_memory_relevance;

        let boosted = if from_creator { base * self.creator_boost } else { base };
        UnitScore::new(boosted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creator_flagged_input_is_boosted() {
        let scorer = AttentionScorer::new(AttentionWeights::default(), 2.0);
        let plain = scorer.score("hello", false, 0.5, 0.5, 0.5);
        let boosted = scorer.score("hello", true, 0.5, 0.5, 0.5);
        assert!(boosted.get() > plain.get());
    }

    #[test]
    fn score_never_exceeds_unit_range() {
        let scorer = AttentionScorer::new(AttentionWeights::default(), 2.0);
        let score = scorer.score(&"x".repeat(500), true, 1.0, 1.0, 1.0);
        assert!(score.get() <= 1.0);
    }

    #[test]
    fn longer_text_increases_the_length_term() {
        let scorer = AttentionScorer::new(AttentionWeights::default(), 2.0);
        let short = scorer.score("hi", false, 0.0, 0.0, 0.0);
        let long = scorer.score(&"word ".repeat(60), false, 0.0, 0.0, 0.0);
        assert!(long.get() > short.get());
    }
}
