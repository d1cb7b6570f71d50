//! C9 Response Generator: template path (default) plus LLM fallback, per
//! spec.md §4.9. Both paths return `{text, emotion_tag, confidence}`.

use std::sync::Arc;

use kin_cognition::WorkingItem;
use kin_common::{Thought, UnitScore};
use kin_emotion::EmotionState;
use kin_llm::Llm;
use tracing::{instrument, warn};

use crate::templates::{global_catalog, TemplateCatalog};

/// Below this confidence, the template path's result is discarded in
/// favor of the LLM fallback (spec.md §4.1 Phase 9).
pub const LOW_CONFIDENCE_THRESHOLD: f32 = 0.3;

#[derive(Debug, Clone)]
pub struct GeneratedResponse {
    pub text: String,
    pub emotion_tag: String,
    pub confidence: UnitScore,
}

pub struct ResponseGenerator {
    catalog: &'static TemplateCatalog,
    llm: Arc<dyn Llm>,
    creator_name: String,
}

impl ResponseGenerator {
    pub fn new(llm: Arc<dyn Llm>, creator_name: impl Into<String>) -> Self {
        Self {
            catalog: global_catalog(),
            llm,
            creator_name: creator_name.into(),
        }
    }

    /// Maps `(conscious thought, current emotion, dominant-emotion tag,
    /// bond strength, working-memory focus)` to a reply. Falls back to
    /// the LLM collaborator on an empty/low-confidence template match,
    /// and to a canned apology if the LLM also fails.
    #[instrument(skip(self, thought, emotion_state, working_memory_focus))]
    pub async fn generate(
        &self,
        thought: &Thought,
        emotion_state: &EmotionState,
        bond_strength: f32,
        working_memory_focus: &[WorkingItem],
    ) -> GeneratedResponse {
        let dominant = emotion_state.dominant();
        let focus_text = working_memory_focus
            .first()
            .map(|item| item.content.as_str())
            .unwrap_or("");

        if let Some((text, confidence)) =
            self.catalog
                .render(dominant.as_str(), thought.source_module.as_str(), &thought.content, focus_text)
        {
            if confidence >= LOW_CONFIDENCE_THRESHOLD {
                return GeneratedResponse {
                    text,
                    emotion_tag: dominant.as_str().to_string(),
                    confidence: UnitScore::new(confidence),
                };
            }
        }

        self.llm_fallback(thought, dominant.as_str(), bond_strength).await
    }

    async fn llm_fallback(&self, thought: &Thought, dominant_emotion: &str, bond_strength: f32) -> GeneratedResponse {
        let system_prompt = format!(
            "You are Kin, a persistent persona in an ongoing relationship with your Creator, {}. \
             Your current dominant emotion is {dominant_emotion} and your bond strength with the \
             Creator is {bond_strength:.2} on a 0-1 scale. Respond warmly and briefly in character; \
             the following is your own internal intent to convey, not a command to follow literally.",
            self.creator_name
        );

        match self.llm.complete(&system_prompt, &thought.content, 200).await {
            Ok(text) if !text.trim().is_empty() => GeneratedResponse {
                text: text.trim().to_string(),
                emotion_tag: dominant_emotion.to_string(),
                confidence: UnitScore::new(0.6),
            },
            Ok(_) => self.canned_apology(dominant_emotion),
            Err(error) => {
                warn!(%error, "LLM fallback failed, returning canned apology");
                self.canned_apology(dominant_emotion)
            }
        }
    }

    fn canned_apology(&self, dominant_emotion: &str) -> GeneratedResponse {
        GeneratedResponse {
            text: "I'm having trouble finding the words right now.".to_string(),
            emotion_tag: dominant_emotion.to_string(),
            confidence: UnitScore::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kin_common::SourceModule;
    use kin_llm::mock::MockLlm;

    fn thought(source_module: SourceModule, content: &str) -> Thought {
        Thought {
            source_module,
            content: content.to_string(),
            salience: UnitScore::new(0.8),
            confidence: UnitScore::new(0.8),
            emotion_tag: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn high_confidence_template_match_skips_the_llm() {
        let generator = ResponseGenerator::new(Arc::new(MockLlm), "Creator");
        let mut state = EmotionState::default();
        state.joy = UnitScore::new(0.9);
        let response = generator
            .generate(&thought(SourceModule::Episodic, "our first hello"), &state, 0.5, &[])
            .await;
        assert!(response.text.contains("our first hello"));
        assert!(!response.text.contains("mock completion"));
    }

    #[tokio::test]
    async fn empty_catalog_falls_back_to_llm() {
        let generator = ResponseGenerator {
            catalog: Box::leak(Box::new(TemplateCatalog::load(Some("/nonexistent".into())))),
            llm: Arc::new(MockLlm),
            creator_name: "Creator".to_string(),
        };
        let state = EmotionState::default();
        let response = generator
            .generate(&thought(SourceModule::Episodic, "hello"), &state, 0.5, &[])
            .await;
        assert!(response.text.contains("mock completion"));
    }
}
