//! C7 Prediction Engine: an online `situation_key -> (running mean, running
//! variance)` world model, trimmed from the teacher's transformer/latent
//! `beagle-worldmodel::predictive` machinery down to the spec's actual
//! requirement — a lightweight expectation/surprise signal, no latent
//! dynamics model (see DESIGN.md).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use kin_common::{CognitiveModule, Embedding, SensoryInput, SourceModule, Thought, UnitScore};
use kin_llm::Embedder;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::instrument;

/// A coarse bag-of-stems key summarizing recent conversational context.
/// Naive stemming (truncate to 5 chars) is enough to bucket paraphrases
/// of the same situation without a real morphological analyzer.
pub fn situation_key(context: &str) -> String {
    let mut stems: Vec<String> = context
        .split_whitespace()
        .map(|word| word.to_lowercase().chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|word| !word.is_empty())
        .map(|word| word.chars().take(5).collect::<String>())
        .collect();
    stems.sort();
    stems.dedup();
    stems.truncate(8);
    stems.join("|")
}

/// Running mean/variance of the next-utterance embedding observed after a
/// given situation, updated online with a fixed learning rate (spec.md
/// §4.7: `learning_rate = 0.1`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldModelEntry {
    pub mean: Embedding,
    pub variance: Vec<f32>,
    pub observations: u64,
}

impl WorldModelEntry {
    fn new(first: &Embedding) -> Self {
        Self {
            mean: first.clone(),
            variance: vec![0.0; first.dim()],
            observations: 1,
        }
    }

    fn update(&mut self, actual: &Embedding, learning_rate: f32) {
        if actual.dim() != self.mean.dim() {
            return;
        }
        for i in 0..self.mean.dim() {
            let delta = actual.as_slice()[i] - self.mean.0[i];
            self.mean.0[i] += learning_rate * delta;
            self.variance[i] += learning_rate * (delta * delta - self.variance[i]);
        }
        self.observations += 1;
    }

    fn confidence(&self) -> f32 {
        if self.variance.is_empty() {
            return 0.0;
        }
        let mean_variance = self.variance.iter().sum::<f32>() / self.variance.len() as f32;
        (1.0 - mean_variance.min(1.0)).clamp(0.0, 1.0)
    }
}

const RECENT_CONTEXT_WINDOW: usize = 3;

pub struct PredictionEngine {
    world_model: RwLock<HashMap<String, WorldModelEntry>>,
    recent_context: RwLock<VecDeque<String>>,
    embedder: Arc<dyn Embedder>,
    learning_rate: f32,
    error_threshold: f32,
}

impl PredictionEngine {
    pub fn new(embedder: Arc<dyn Embedder>, learning_rate: f32, error_threshold: f32) -> Self {
        Self {
            world_model: RwLock::new(HashMap::new()),
            recent_context: RwLock::new(VecDeque::with_capacity(RECENT_CONTEXT_WINDOW)),
            embedder,
            learning_rate,
            error_threshold,
        }
    }

    /// `predict(context) -> (expected_embedding, confidence)`. Returns a
    /// zero vector with zero confidence for a never-seen situation, so
    /// callers never special-case an empty world model.
    #[instrument(skip(self, context))]
    pub async fn predict(&self, context: &str) -> (Embedding, f32) {
        let key = situation_key(context);
        let world_model = self.world_model.read().await;
        match world_model.get(&key) {
            Some(entry) => (entry.mean.clone(), entry.confidence()),
            None => (Embedding::zeros(0), 0.0),
        }
    }

    /// Online mean/variance update for the observed situation, learning
    /// rate from config (default 0.1).
    #[instrument(skip(self, context, actual))]
    pub async fn update(&self, context: &str, actual: &Embedding) {
        let key = situation_key(context);
        let mut world_model = self.world_model.write().await;
        world_model
            .entry(key)
            .and_modify(|entry| entry.update(actual, self.learning_rate))
            .or_insert_with(|| WorldModelEntry::new(actual));
    }

    async fn current_context(&self) -> String {
        self.recent_context.read().await.iter().cloned().collect::<Vec<_>>().join(" ")
    }

    async fn push_context(&self, text: &str) {
        let mut recent = self.recent_context.write().await;
        recent.push_back(text.to_string());
        while recent.len() > RECENT_CONTEXT_WINDOW {
            recent.pop_front();
        }
    }
}

#[async_trait]
impl CognitiveModule for PredictionEngine {
    fn name(&self) -> &'static str {
        "prediction"
    }

    /// Predicts against the context accumulated from prior turns, embeds
    /// the actual input, and emits a "surprise" thought if the prediction
    /// error exceeds the configured threshold (default 0.4).
    async fn propose_thought(&self, input: &SensoryInput) -> Option<Thought> {
        let context = self.current_context().await;
        let (expected, _confidence) = self.predict(&context).await;

        let Ok(actual) = self.embedder.embed(&input.text).await else {
            return None;
        };

        let error = if expected.dim() == 0 {
            0.0
        } else {
            expected.cosine_distance(&actual)
        };

        self.push_context(&input.text).await;
        self.update(&context, &actual).await;

        if error <= self.error_threshold {
            return None;
        }

        Some(Thought::new(
            SourceModule::Prediction,
            "this is not what I expected".to_string(),
            UnitScore::new(error),
            UnitScore::new(error),
        ))
    }

    async fn on_broadcast(&self, _winner: &Thought) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use kin_llm::mock::MockEmbedder;

    #[test]
    fn situation_key_is_order_independent_bag_of_stems() {
        let a = situation_key("Hello there friend");
        let b = situation_key("friend there hello");
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn unseen_situation_predicts_zero_confidence() {
        let engine = PredictionEngine::new(Arc::new(MockEmbedder { dim: 8 }), 0.1, 0.4);
        let (_, confidence) = engine.predict("never seen this before").await;
        assert_eq!(confidence, 0.0);
    }

    #[tokio::test]
    async fn repeated_observations_raise_confidence() {
        let embedder = Arc::new(MockEmbedder { dim: 8 });
        let engine = PredictionEngine::new(embedder.clone(), 0.5, 0.4);
        let actual = embedder.embed("hello").await.unwrap();
        for _ in 0..5 {
            engine.update("greeting", &actual).await;
        }
        let (_, confidence) = engine.predict("greeting").await;
        assert!(confidence > 0.9);
    }
}
