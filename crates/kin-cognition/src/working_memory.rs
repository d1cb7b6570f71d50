//! C4 Working Memory: the bounded (7±2), volatile short-term buffer that
//! Phase 3 admits items into and Phase 5 polls for a "continuation"
//! proposal. In-process `RwLock<Vec<WorkingItem>>`-backed, matching the
//! teacher's `GlobalWorkspace`'s `Arc<RwLock<...>>` idiom for shared
//! mutable state that a single session owns exclusively — no external KV
//! store is warranted at this scale (spec.md §4.4).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kin_common::{CognitiveModule, Embedding, SensoryInput, SourceModule, Thought, UnitScore};
use kin_llm::Embedder;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::instrument;
use uuid::Uuid;

/// Tag marking the item admitted this turn; such items are never evicted
/// even when the buffer is over capacity (spec.md §4.4 `admit`).
pub const CURRENT_TURN_TAG: &str = "current_turn";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingItem {
    pub item_id: Uuid,
    pub content: String,
    pub salience: UnitScore,
    pub inserted_at: DateTime<Utc>,
    pub ttl_remaining: i64,
    pub tag: Option<String>,
    #[serde(skip)]
    pub embedding: Embedding,
}

impl WorkingItem {
    /// Effective salience used for eviction and ranking: raw salience
    /// scaled by a simple linear time-decay factor over the remaining TTL.
    fn effective_salience(&self, now: DateTime<Utc>) -> f32 {
        let age_secs = now.signed_duration_since(self.inserted_at).num_seconds().max(0) as f32;
        let ttl = self.ttl_remaining.max(1) as f32;
        let time_decay = (1.0 - age_secs / ttl).clamp(0.0, 1.0);
        self.salience.get() * time_decay
    }
}

/// Hard cap from Invariant W1; the spec allows a default capacity as low
/// as 7 but never more than 9 live items.
pub const HARD_CAP: usize = 9;

pub struct WorkingMemory {
    items: RwLock<Vec<WorkingItem>>,
    embedder: Arc<dyn Embedder>,
    capacity: usize,
    decay_factor: f32,
    default_ttl_secs: i64,
}

impl WorkingMemory {
    pub fn new(embedder: Arc<dyn Embedder>, capacity: usize, decay_factor: f32) -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            embedder,
            capacity: capacity.min(HARD_CAP),
            decay_factor,
            default_ttl_secs: 600,
        }
    }

    /// Inserts `{content, salience}` (spec.md §4.3's Phase-3 wording),
    /// computing its embedding for later similarity checks. Evicts the
    /// lowest effective-salience item when over capacity; an item tagged
    /// `current_turn` is never evicted.
    #[instrument(skip(self, content))]
    pub async fn admit(&self, content: &str, salience: UnitScore, tag: Option<&str>) -> Uuid {
        let embedding = self.embedder.embed(content).await.unwrap_or_else(|_| Embedding::zeros(0));
        let item = WorkingItem {
            item_id: Uuid::new_v4(),
            content: content.to_string(),
            salience,
            inserted_at: Utc::now(),
            ttl_remaining: self.default_ttl_secs,
            tag: tag.map(str::to_string),
            embedding,
        };
        let item_id = item.item_id;

        let mut items = self.items.write().await;
        items.push(item);
        self.evict_if_over_capacity(&mut items).await;
        item_id
    }

    async fn evict_if_over_capacity(&self, items: &mut Vec<WorkingItem>) {
        let now = Utc::now();
        while items.len() > self.capacity {
            let evict_index = items
                .iter()
                .enumerate()
                .filter(|(_, item)| item.tag.as_deref() != Some(CURRENT_TURN_TAG))
                .min_by(|(_, a), (_, b)| {
                    a.effective_salience(now)
                        .partial_cmp(&b.effective_salience(now))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(index, _)| index);

            let Some(index) = evict_index else {
                // Every remaining item is tagged current_turn; the hard cap
                // still binds, so evict the oldest regardless of tag.
                if let Some((index, _)) = items.iter().enumerate().min_by_key(|(_, item)| item.inserted_at) {
                    items.remove(index);
                }
                break;
            };
            items.remove(index);
        }
    }

    /// Invariant W2: multiplies every item's salience by `decay_factor`
    /// when not refreshed this turn.
    #[instrument(skip(self))]
    pub async fn decay(&self) {
        let mut items = self.items.write().await;
        for item in items.iter_mut() {
            item.salience = item.salience.decay(self.decay_factor);
        }
    }

    /// Top-N items by effective salience, most salient first.
    pub async fn focus(&self, n: usize) -> Vec<WorkingItem> {
        let now = Utc::now();
        let mut items = self.items.read().await.clone();
        items.sort_by(|a, b| {
            b.effective_salience(now)
                .partial_cmp(&a.effective_salience(now))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        items.truncate(n);
        items
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CognitiveModule for WorkingMemory {
    fn name(&self) -> &'static str {
        "working_memory"
    }

    /// If the input relates (cosine similarity >= 0.5) to a focused item,
    /// emits a "continuation" thought referencing it.
    async fn propose_thought(&self, input: &SensoryInput) -> Option<Thought> {
        let Ok(input_embedding) = self.embedder.embed(&input.text).await else {
            return None;
        };

        let focused = self.focus(5).await;
        let best = focused
            .iter()
            .map(|item| (item, input_embedding.cosine_similarity(&item.embedding)))
            .filter(|(_, similarity)| *similarity >= 0.5)
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))?;

        let (item, similarity) = best;
        Some(Thought::new(
            SourceModule::Working,
            format!("continuing from: {}", item.content),
            UnitScore::new(similarity),
            item.salience,
        ))
    }

    async fn on_broadcast(&self, winner: &Thought) {
        self.admit(&winner.content, winner.salience, None).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kin_llm::mock::MockEmbedder;

    fn memory() -> WorkingMemory {
        WorkingMemory::new(Arc::new(MockEmbedder { dim: 16 }), 7, 0.9)
    }

    #[tokio::test]
    async fn admit_evicts_lowest_salience_when_over_capacity() {
        let memory = memory();
        for i in 0..HARD_CAP + 3 {
            memory
                .admit(&format!("item {i}"), UnitScore::new(0.1 * i as f32 / 10.0), None)
                .await;
        }
        assert!(memory.len().await <= HARD_CAP);
    }

    #[tokio::test]
    async fn current_turn_tagged_item_is_never_evicted() {
        let memory = memory();
        let protected_id = memory.admit("protected", UnitScore::ZERO, Some(CURRENT_TURN_TAG)).await;
        for i in 0..HARD_CAP + 5 {
            memory.admit(&format!("filler {i}"), UnitScore::ONE, None).await;
        }
        let items = memory.items.read().await;
        assert!(items.iter().any(|item| item.item_id == protected_id));
    }

    #[tokio::test]
    async fn decay_reduces_every_items_salience() {
        let memory = memory();
        memory.admit("x", UnitScore::new(0.8), None).await;
        memory.decay().await;
        let items = memory.items.read().await;
        assert!(items[0].salience.get() < 0.8);
    }
}
