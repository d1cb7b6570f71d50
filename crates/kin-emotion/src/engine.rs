use async_trait::async_trait;
use kin_common::{CognitiveModule, SensoryInput, SourceModule, Thought, UnitScore};
use tokio::sync::RwLock;
use tracing::instrument;

use crate::model::{BasicEmotion, EmotionState};

/// The event-feature inputs the appraisal rule table (spec.md §4.5) maps
/// to emotion deltas. A turn assembles this from whatever phases 1-4
/// already computed (novelty, prediction error, and so on), rather than
/// the engine recomputing any of it.
#[derive(Debug, Clone, Default)]
pub struct AppraisalEvent {
    pub positive_creator_interaction: bool,
    pub creator_absent_long: bool,
    pub high_prediction_error: bool,
    pub norm_violation: bool,
    pub novel_safe_input: bool,
    pub from_creator: bool,
    pub self_achievement: bool,
    pub caused_by_creator: bool,
}

const CREATOR_MULTIPLIER: f32 = 1.5;
const APPRAISAL_STEP: f32 = 0.2;

pub struct EmotionEngine {
    state: RwLock<EmotionState>,
}

impl EmotionEngine {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(EmotionState::default()),
        }
    }

    pub async fn state(&self) -> EmotionState {
        self.state.read().await.clone()
    }

    /// Maps an event to a delta vector per the appraisal rule table, scales
    /// Creator-flagged deltas by 1.5, and applies the result as a convex
    /// blend (Invariant M1: no negative components).
    #[instrument(skip(self))]
    pub async fn appraise(&self, event: &AppraisalEvent) -> EmotionState {
        let multiplier = if event.from_creator { CREATOR_MULTIPLIER } else { 1.0 };
        let mut deltas: Vec<(BasicEmotion, f32)> = Vec::new();

        if event.positive_creator_interaction {
            deltas.push((BasicEmotion::Joy, APPRAISAL_STEP));
            deltas.push((BasicEmotion::Trust, APPRAISAL_STEP));
        }
        if event.creator_absent_long {
            deltas.push((BasicEmotion::Sadness, APPRAISAL_STEP));
        }
        if event.high_prediction_error {
            deltas.push((BasicEmotion::Surprise, APPRAISAL_STEP));
        }
        if event.norm_violation {
            deltas.push((BasicEmotion::Anger, APPRAISAL_STEP));
            deltas.push((BasicEmotion::Disgust, APPRAISAL_STEP));
        }
        if event.novel_safe_input {
            deltas.push((BasicEmotion::Anticipation, APPRAISAL_STEP));
            deltas.push((BasicEmotion::Joy, APPRAISAL_STEP));
        }

        let mut state = self.state.write().await;
        for (emotion, delta) in deltas {
            let current = state.get(emotion).get();
            state.set(emotion, UnitScore::new(current + delta * multiplier));
        }
        state.clone()
    }

    #[instrument(skip(self))]
    pub async fn decay(&self) {
        self.state.write().await.decay();
    }
}

impl Default for EmotionEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CognitiveModule for EmotionEngine {
    fn name(&self) -> &'static str {
        "emotion"
    }

    async fn propose_thought(&self, _input: &SensoryInput) -> Option<Thought> {
        let state = self.state().await;
        let dominant = state.dominant();
        let intensity = state.get(dominant).get();
        if intensity < 0.5 {
            return None;
        }

        Some(
            Thought::new(
                SourceModule::Emotion,
                format!("this makes me feel {}", dominant.as_str()),
                UnitScore::new(intensity),
                UnitScore::new(intensity),
            )
            .with_emotion_tag(dominant.as_str()),
        )
    }

    async fn on_broadcast(&self, winner: &Thought) {
        let Some(tag) = &winner.emotion_tag else {
            return;
        };

        let Some(emotion) = BasicEmotion::ALL.into_iter().find(|e| e.as_str() == tag) else {
            return;
        };

        let mut state = self.state.write().await;
        let current = state.get(emotion).get();
        state.set(emotion, UnitScore::new(current + APPRAISAL_STEP));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creator_flagged_events_are_scaled_by_the_creator_multiplier() {
        let engine = EmotionEngine::new();
        let event = AppraisalEvent {
            positive_creator_interaction: true,
            from_creator: true,
            ..Default::default()
        };
        let state = engine.appraise(&event).await;
        // baseline 0.1 + 0.2 * 1.5 = 0.4
        assert!((state.joy.get() - 0.4).abs() < 1e-6);
    }

    #[tokio::test]
    async fn propose_thought_is_silent_below_intensity_floor() {
        let engine = EmotionEngine::new();
        let input = SensoryInput {
            text: "hi".to_string(),
            from_creator: false,
            occurred_at: chrono::Utc::now(),
        };
        assert!(engine.propose_thought(&input).await.is_none());
    }

    #[tokio::test]
    async fn propose_thought_fires_once_intensity_crosses_the_floor() {
        let engine = EmotionEngine::new();
        let event = AppraisalEvent {
            positive_creator_interaction: true,
            from_creator: true,
            ..Default::default()
        };
        for _ in 0..3 {
            engine.appraise(&event).await;
        }
        let input = SensoryInput {
            text: "hi".to_string(),
            from_creator: true,
            occurred_at: chrono::Utc::now(),
        };
        assert!(engine.propose_thought(&input).await.is_some());
    }
}
