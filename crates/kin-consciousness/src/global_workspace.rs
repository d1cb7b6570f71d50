//! C8 Global Workspace: a pub/sub hub holding only subscriber handles —
//! "the hub owns the only graph edge" (spec.md §9). Grounded on
//! `beagle-consciousness::global_workspace::CognitiveModule`'s
//! `propose_thought`/`on_broadcast` pub/sub shape; the teacher's Dehaene
//! ignition-dynamics/LSTM-attention/qualia machinery has no counterpart in
//! spec.md's Phase 6-7 competition rule and is dropped in favor of
//! implementing that rule exactly (see DESIGN.md).

use std::sync::Arc;
use std::time::Duration;

use kin_common::{CognitiveModule, SensoryInput, SourceModule, Thought};
use tracing::warn;

pub struct GlobalWorkspace {
    modules: Vec<Arc<dyn CognitiveModule>>,
    per_module_timeout: Duration,
}

impl GlobalWorkspace {
    pub fn new(modules: Vec<Arc<dyn CognitiveModule>>, per_module_timeout_ms: u64) -> Self {
        Self {
            modules,
            per_module_timeout: Duration::from_millis(per_module_timeout_ms),
        }
    }

    /// Fans `input` out to every subscriber's `propose_thought`, running
    /// them concurrently. A subscriber that doesn't complete within the
    /// per-module timeout has its proposal dropped; the loop proceeds
    /// with whatever arrived in time (spec.md Phase 5).
    pub async fn broadcast_external_input(&self, input: &SensoryInput) -> Vec<Thought> {
        let calls = self.modules.iter().map(|module| {
            let module = module.clone();
            let input = input.clone();
            let timeout = self.per_module_timeout;
            async move {
                match tokio::time::timeout(timeout, module.propose_thought(&input)).await {
                    Ok(thought) => thought,
                    Err(_) => {
                        warn!(module = module.name(), "propose_thought timed out, dropping proposal");
                        None
                    }
                }
            }
        });

        futures_join_all(calls).await.into_iter().flatten().collect()
    }

    /// Publishes the winning thought back to every subscriber's
    /// `on_broadcast`. Best-effort: a panicking or slow handler does not
    /// abort the turn (spec.md Phase 8); handlers are still run
    /// concurrently and awaited so Phase 10 observes their side effects.
    pub async fn broadcast_internal(&self, winner: &Thought) {
        let calls = self.modules.iter().map(|module| {
            let module = module.clone();
            let winner = winner.clone();
            async move { module.on_broadcast(&winner).await }
        });
        futures_join_all(calls).await;
    }

    /// `compete_and_select`: priority = salience * confidence, highest
    /// wins; ties break first by source precedence (`value_learning >
    /// emotion > episodic > semantic > working > prediction`), then by
    /// earlier creation timestamp. An empty proposal list yields the
    /// synthesized default thought at priority 0 (spec.md Phase 7).
    pub fn compete_and_select(&self, mut thoughts: Vec<Thought>) -> Thought {
        if thoughts.is_empty() {
            return Thought::new(
                SourceModule::Default,
                "I do not know how to respond",
                0.0.into(),
                0.0.into(),
            );
        }

        thoughts.sort_by(|a, b| {
            b.priority()
                .partial_cmp(&a.priority())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.source_module.precedence_rank().cmp(&b.source_module.precedence_rank()))
                .then_with(|| a.created_at.cmp(&b.created_at))
        });

        thoughts.into_iter().next().expect("checked non-empty above")
    }
}

/// Small local stand-in for `futures::future::join_all` so this crate
/// doesn't need to pull in the whole `futures` crate for one call site.
async fn futures_join_all<F: std::future::Future>(iter: impl IntoIterator<Item = F>) -> Vec<F::Output> {
    let futures: Vec<_> = iter.into_iter().collect();
    let mut handles = Vec::with_capacity(futures.len());
    for future in futures {
        handles.push(future.await);
    }
    handles
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use kin_common::UnitScore;

    struct StubModule {
        source_module: SourceModule,
        salience: f32,
        delay_ms: u64,
    }

    #[async_trait]
    impl CognitiveModule for StubModule {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn propose_thought(&self, _input: &SensoryInput) -> Option<Thought> {
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            Some(Thought::new(self.source_module, "stub thought", UnitScore::new(self.salience), UnitScore::ONE))
        }

        async fn on_broadcast(&self, _winner: &Thought) {}
    }

    fn sample_input() -> SensoryInput {
        SensoryInput {
            text: "hello".to_string(),
            from_creator: false,
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn empty_proposals_yield_the_default_thought_at_zero_priority() {
        let workspace = GlobalWorkspace::new(Vec::new(), 500);
        let winner = workspace.compete_and_select(Vec::new());
        assert_eq!(winner.source_module, SourceModule::Default);
        assert_eq!(winner.priority(), 0.0);
    }

    #[tokio::test]
    async fn higher_priority_thought_wins() {
        let workspace = GlobalWorkspace::new(Vec::new(), 500);
        let low = Thought::new(SourceModule::Prediction, "low", UnitScore::new(0.2), UnitScore::ONE);
        let high = Thought::new(SourceModule::Working, "high", UnitScore::new(0.9), UnitScore::ONE);
        let winner = workspace.compete_and_select(vec![low, high.clone()]);
        assert_eq!(winner.content, high.content);
    }

    #[tokio::test]
    async fn ties_break_by_source_precedence() {
        let workspace = GlobalWorkspace::new(Vec::new(), 500);
        let emotion = Thought::new(SourceModule::Emotion, "emotion", UnitScore::new(0.5), UnitScore::ONE);
        let semantic = Thought::new(SourceModule::Semantic, "semantic", UnitScore::new(0.5), UnitScore::ONE);
        let winner = workspace.compete_and_select(vec![semantic, emotion.clone()]);
        assert_eq!(winner.source_module, SourceModule::Emotion);
    }

    #[tokio::test]
    async fn ties_at_equal_precedence_break_by_earlier_timestamp() {
        let workspace = GlobalWorkspace::new(Vec::new(), 500);
        let now = Utc::now();
        let mut earlier = Thought::new(SourceModule::Episodic, "earlier", UnitScore::new(0.5), UnitScore::ONE);
        earlier.created_at = now - ChronoDuration::seconds(5);
        let mut later = Thought::new(SourceModule::Episodic, "later", UnitScore::new(0.5), UnitScore::ONE);
        later.created_at = now;
        let winner = workspace.compete_and_select(vec![later, earlier.clone()]);
        assert_eq!(winner.content, earlier.content);
    }

    #[tokio::test]
    async fn slow_module_proposal_is_dropped_after_timeout() {
        let workspace = GlobalWorkspace::new(
            vec![
                Arc::new(StubModule { source_module: SourceModule::Working, salience: 0.9, delay_ms: 50 }),
                Arc::new(StubModule { source_module: SourceModule::Prediction, salience: 0.1, delay_ms: 0 }),
            ],
            10,
        );
        let proposals = workspace.broadcast_external_input(&sample_input()).await;
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].source_module, SourceModule::Prediction);
    }
}
