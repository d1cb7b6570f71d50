//! The `Thought` proposal type and the `CognitiveModule` pub/sub contract
//! that every subscriber of the Global Workspace implements. Lives here
//! rather than in `kin-consciousness` so leaf modules (memory, emotion,
//! prediction) can implement the trait without depending on the hub that
//! consumes it — the hub holds the only edge in the module graph.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::score::UnitScore;

/// The input event fanned out to every subscriber in Phase 5.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensoryInput {
    pub text: String,
    pub from_creator: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Which module produced a `Thought`. Order here is the tie-break
/// precedence from spec.md's Phase 6 (`value_learning > emotion >
/// episodic > semantic > working > prediction`) — earlier variants win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceModule {
    ValueLearning,
    Emotion,
    Episodic,
    Semantic,
    Working,
    Prediction,
    /// Synthesized by the orchestrator itself when Phase 5 returns no
    /// proposals at all (spec.md Phase 7); ranks below every real
    /// subscriber so it never wins a tie against an actual proposal.
    Default,
}

impl SourceModule {
    /// Lower value wins a tie at equal priority; used as the sort key
    /// alongside creation timestamp.
    pub fn precedence_rank(self) -> u8 {
        self as u8
    }

    /// Lowercase identifier used as a template-catalog lookup key and in
    /// system logs.
    pub fn as_str(self) -> &'static str {
        match self {
            SourceModule::ValueLearning => "value_learning",
            SourceModule::Emotion => "emotion",
            SourceModule::Episodic => "episodic",
            SourceModule::Semantic => "semantic",
            SourceModule::Working => "working",
            SourceModule::Prediction => "prediction",
            SourceModule::Default => "default",
        }
    }
}

/// An ephemeral proposal from a single cognitive module, competing in
/// Phase 6 for the single broadcast slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thought {
    pub source_module: SourceModule,
    pub content: String,
    pub salience: UnitScore,
    pub confidence: UnitScore,
    pub emotion_tag: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Thought {
    pub fn new(
        source_module: SourceModule,
        content: impl Into<String>,
        salience: UnitScore,
        confidence: UnitScore,
    ) -> Self {
        Self {
            source_module,
            content: content.into(),
            salience,
            confidence,
            emotion_tag: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_emotion_tag(mut self, tag: impl Into<String>) -> Self {
        self.emotion_tag = Some(tag.into());
        self
    }

    /// `priority = salience * confidence`, the sort key for Phase 6.
    pub fn priority(&self) -> f32 {
        self.salience.get() * self.confidence.get()
    }
}

/// The contract every Global Workspace subscriber implements. The hub
/// calls `propose_thought` during fan-out and `on_broadcast` after a
/// winner is selected; neither method may assume exclusive access to
/// shared state, since multiple subscribers run concurrently.
#[async_trait]
pub trait CognitiveModule: Send + Sync {
    fn name(&self) -> &'static str;

    async fn propose_thought(&self, input: &SensoryInput) -> Option<Thought>;

    async fn on_broadcast(&self, winner: &Thought);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_is_salience_times_confidence() {
        let thought = Thought::new(
            SourceModule::Episodic,
            "test",
            UnitScore::new(0.8),
            UnitScore::new(0.5),
        );
        assert!((thought.priority() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn value_learning_has_highest_precedence() {
        assert!(SourceModule::ValueLearning.precedence_rank() < SourceModule::Emotion.precedence_rank());
        assert!(SourceModule::Prediction.precedence_rank() > SourceModule::Working.precedence_rank());
    }
}
