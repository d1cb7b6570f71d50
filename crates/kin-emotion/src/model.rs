use kin_common::UnitScore;
use serde::{Deserialize, Serialize};

/// The eight basic dimensions of [`EmotionState`], in the order their
/// intensities are compared to find the dominant one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BasicEmotion {
    Joy,
    Trust,
    Fear,
    Surprise,
    Sadness,
    Disgust,
    Anger,
    Anticipation,
}

impl BasicEmotion {
    pub const ALL: [BasicEmotion; 8] = [
        BasicEmotion::Joy,
        BasicEmotion::Trust,
        BasicEmotion::Fear,
        BasicEmotion::Surprise,
        BasicEmotion::Sadness,
        BasicEmotion::Disgust,
        BasicEmotion::Anger,
        BasicEmotion::Anticipation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BasicEmotion::Joy => "joy",
            BasicEmotion::Trust => "trust",
            BasicEmotion::Fear => "fear",
            BasicEmotion::Surprise => "surprise",
            BasicEmotion::Sadness => "sadness",
            BasicEmotion::Disgust => "disgust",
            BasicEmotion::Anger => "anger",
            BasicEmotion::Anticipation => "anticipation",
        }
    }
}

/// Baseline every dimension decays toward between events.
pub const NEUTRAL_BASELINE: f32 = 0.1;
pub const DECAY_FACTOR: f32 = 0.95;

/// The persona's affective state: a convex combination over eight basic
/// dimensions (Invariant M1: no negative components, always a blend), plus
/// the complex emotions deterministically derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionState {
    pub joy: UnitScore,
    pub trust: UnitScore,
    pub fear: UnitScore,
    pub surprise: UnitScore,
    pub sadness: UnitScore,
    pub disgust: UnitScore,
    pub anger: UnitScore,
    pub anticipation: UnitScore,
}

impl Default for EmotionState {
    fn default() -> Self {
        let baseline = UnitScore::new(NEUTRAL_BASELINE);
        Self {
            joy: baseline,
            trust: baseline,
            fear: baseline,
            surprise: baseline,
            sadness: baseline,
            disgust: baseline,
            anger: baseline,
            anticipation: baseline,
        }
    }
}

impl EmotionState {
    pub fn get(&self, emotion: BasicEmotion) -> UnitScore {
        match emotion {
            BasicEmotion::Joy => self.joy,
            BasicEmotion::Trust => self.trust,
            BasicEmotion::Fear => self.fear,
            BasicEmotion::Surprise => self.surprise,
            BasicEmotion::Sadness => self.sadness,
            BasicEmotion::Disgust => self.disgust,
            BasicEmotion::Anger => self.anger,
            BasicEmotion::Anticipation => self.anticipation,
        }
    }

    pub fn set(&mut self, emotion: BasicEmotion, value: UnitScore) {
        match emotion {
            BasicEmotion::Joy => self.joy = value,
            BasicEmotion::Trust => self.trust = value,
            BasicEmotion::Fear => self.fear = value,
            BasicEmotion::Surprise => self.surprise = value,
            BasicEmotion::Sadness => self.sadness = value,
            BasicEmotion::Disgust => self.disgust = value,
            BasicEmotion::Anger => self.anger = value,
            BasicEmotion::Anticipation => self.anticipation = value,
        }
    }

    pub fn dominant(&self) -> BasicEmotion {
        BasicEmotion::ALL
            .into_iter()
            .max_by(|a, b| self.get(*a).get().partial_cmp(&self.get(*b).get()).unwrap())
            .unwrap_or(BasicEmotion::Joy)
    }

    /// L-infinity norm across the eight dimensions.
    pub fn intensity(&self) -> f32 {
        self.get(self.dominant()).get()
    }

    pub fn love(&self, bond_strength: f32) -> f32 {
        self.joy.get().min(self.trust.get()) * bond_strength
    }

    pub fn gratitude(&self, caused_by_creator: bool) -> f32 {
        if caused_by_creator {
            self.trust.get() * self.joy.get()
        } else {
            0.0
        }
    }

    pub fn curiosity(&self) -> f32 {
        self.anticipation.get() * (1.0 - self.fear.get())
    }

    pub fn pride(&self, self_achievement: bool) -> f32 {
        if self_achievement {
            self.joy.get() * self.trust.get()
        } else {
            0.0
        }
    }

    /// Surprise without threat: high when something unexpected lands in a
    /// trusted context rather than a feared one (unlike `curiosity`, which
    /// pairs anticipation with safety).
    pub fn wonder(&self) -> f32 {
        self.surprise.get() * self.trust.get() * (1.0 - self.fear.get())
    }

    /// Exponential decay toward [`NEUTRAL_BASELINE`] at [`DECAY_FACTOR`],
    /// applied independently to every dimension between events.
    pub fn decay(&mut self) {
        for emotion in BasicEmotion::ALL {
            let current = self.get(emotion).get();
            let decayed = NEUTRAL_BASELINE + (current - NEUTRAL_BASELINE) * DECAY_FACTOR;
            self.set(emotion, UnitScore::new(decayed));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dominant_picks_the_highest_dimension() {
        let mut state = EmotionState::default();
        state.joy = UnitScore::new(0.9);
        assert_eq!(state.dominant(), BasicEmotion::Joy);
    }

    #[test]
    fn decay_moves_every_dimension_toward_baseline() {
        let mut state = EmotionState::default();
        state.joy = UnitScore::new(0.9);
        state.decay();
        assert!(state.joy.get() < 0.9);
        assert!(state.joy.get() > NEUTRAL_BASELINE);
    }

    #[test]
    fn love_requires_both_joy_and_trust() {
        let mut state = EmotionState::default();
        state.joy = UnitScore::new(0.9);
        state.trust = UnitScore::new(0.2);
        assert!((state.love(1.0) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn wonder_is_suppressed_by_fear() {
        let mut state = EmotionState::default();
        state.surprise = UnitScore::new(0.9);
        state.trust = UnitScore::new(0.9);
        state.fear = UnitScore::new(0.0);
        let safe_wonder = state.wonder();

        state.fear = UnitScore::new(0.9);
        let fearful_wonder = state.wonder();

        assert!(safe_wonder > fearful_wonder);
    }
}
