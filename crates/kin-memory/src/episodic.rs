use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kin_common::{CognitiveModule, Embedding, SensoryInput, SourceModule, Thought, UnitScore};
use kin_llm::Embedder;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("embedding collaborator failed: {0}")]
    Embedding(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodicMemory {
    pub memory_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub content: String,
    pub summary: Option<String>,
    pub participants: Vec<String>,
    pub context_type: Option<String>,
    pub emotions: HashMap<String, f32>,
    pub importance: UnitScore,
    pub significance_tags: Vec<String>,
    pub learned_concepts: Vec<String>,
    pub embedding: Embedding,
    pub access_count: u64,
    pub last_accessed: Option<DateTime<Utc>>,
}

/// Caller-supplied fields for a new episode; `importance` is computed by
/// [`EpisodicStore::store`], not supplied directly, per spec.md §4.2's rule.
pub struct NewEpisode {
    pub occurred_at: DateTime<Utc>,
    pub sequence: i64,
    pub content: String,
    pub summary: Option<String>,
    pub participants: Vec<String>,
    pub context_type: Option<String>,
    pub emotions: HashMap<String, f32>,
    pub significance_tags: Vec<String>,
    pub learned_concepts: Vec<String>,
    pub involves_creator: bool,
    pub is_genesis: bool,
}

pub struct EpisodicStore {
    pool: PgPool,
    embedder: Arc<dyn Embedder>,
    recency_halflife_days: f32,
    creator_name: String,
}

impl EpisodicStore {
    pub fn new(pool: PgPool, embedder: Arc<dyn Embedder>, recency_halflife_days: f32, creator_name: impl Into<String>) -> Self {
        Self {
            pool,
            embedder,
            recency_halflife_days,
            creator_name: creator_name.into(),
        }
    }

    /// Importance rule (E1/§4.2): Creator participant +0.3, strong emotion
    /// (any dimension > 0.7) +0.2, genesis tag +0.5, clipped to `[0,1]`.
    /// Invariant E1 requires Creator-involving episodes to land at >= 0.7,
    /// which this formula already guarantees since the Creator term alone
    /// contributes 0.3 on top of a >= 0.4 base — callers pass a
    /// `base_importance` reflecting content salience, defaulting to 0.4.
    fn compute_importance(new_episode: &NewEpisode, base_importance: f32) -> UnitScore {
        let mut importance = base_importance;
        if new_episode.involves_creator {
            importance += 0.3;
        }
        if new_episode.emotions.values().any(|intensity| *intensity > 0.7) {
            importance += 0.2;
        }
        if new_episode.is_genesis {
            importance += 0.5;
        }
        UnitScore::new(importance)
    }

    #[instrument(skip(self, new_episode))]
    pub async fn store(&self, new_episode: NewEpisode, base_importance: f32) -> Result<Uuid, MemoryError> {
        let embedding = self
            .embedder
            .embed(&new_episode.content)
            .await
            .map_err(|e| MemoryError::Embedding(e.to_string()))?;

        let importance = Self::compute_importance(&new_episode, base_importance);
        if new_episode.involves_creator {
            debug_assert!(importance.get() >= 0.7, "Creator episodes must satisfy E1");
        }

        let memory_id = Uuid::new_v4();
        let emotions_json = serde_json::to_value(&new_episode.emotions).unwrap_or_default();

        sqlx::query(
            "INSERT INTO episodic_memories (memory_id, occurred_at, sequence, content, summary, \
             participants, context_type, emotions, importance, significance_tags, \
             learned_concepts, embedding, access_count) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 0)",
        )
        .bind(memory_id)
        .bind(new_episode.occurred_at)
        .bind(new_episode.sequence)
        .bind(&new_episode.content)
        .bind(&new_episode.summary)
        .bind(&new_episode.participants)
        .bind(&new_episode.context_type)
        .bind(emotions_json)
        .bind(importance.get())
        .bind(&new_episode.significance_tags)
        .bind(&new_episode.learned_concepts)
        .bind(kin_db::vector::to_pgvector(&embedding))
        .execute(&self.pool)
        .await?;

        info!(%memory_id, importance = importance.get(), "episodic memory stored");
        Ok(memory_id)
    }

    /// Top-k recall by `cosine_similarity * recency_decay * (1 + importance)`.
    /// Oversamples by vector distance in SQL, then reranks in Rust against
    /// the full composite score, since the recency/importance terms aren't
    /// expressible in the `<=>` ordering alone.
    #[instrument(skip(self))]
    pub async fn recall(&self, query_text: &str, k: usize) -> Result<Vec<EpisodicMemory>, MemoryError> {
        let query_embedding = self
            .embedder
            .embed(query_text)
            .await
            .map_err(|e| MemoryError::Embedding(e.to_string()))?;

        let oversample = (k * 5).max(20) as i64;
        let rows = sqlx::query(
            "SELECT memory_id, occurred_at, content, summary, participants, context_type, \
             emotions, importance, significance_tags, learned_concepts, embedding, \
             access_count, last_accessed, \
             1 - (embedding <=> $1) AS similarity \
             FROM episodic_memories WHERE NOT archived \
             ORDER BY embedding <=> $1 LIMIT $2",
        )
        .bind(kin_db::vector::to_pgvector(&query_embedding))
        .bind(oversample)
        .fetch_all(&self.pool)
        .await?;

        let now = Utc::now();
        let mut scored: Vec<(f32, EpisodicMemory)> = rows
            .into_iter()
            .map(|row| {
                let memory = row_to_memory(&row);
                let similarity: f32 = row.get("similarity");
                let recency = recency_decay(memory.occurred_at, now, self.recency_halflife_days);
                let score = similarity * recency * (1.0 + memory.importance.get());
                (score, memory)
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored.into_iter().take(k).map(|(_, memory)| memory).collect())
    }

    /// Consolidates memories older than 24h with zero access that fall
    /// below the importance threshold, into one aggregate summary. Never
    /// touches Creator-participant memories.
    #[instrument(skip(self))]
    pub async fn consolidate(&self) -> Result<usize, MemoryError> {
        let cutoff = Utc::now() - chrono::Duration::hours(24);
        let rows = sqlx::query(
            "SELECT memory_id, content FROM episodic_memories \
             WHERE occurred_at < $1 AND access_count = 0 AND importance < 0.3 \
             AND NOT archived AND NOT ($2 = ANY(participants))",
        )
        .bind(cutoff)
        .bind(&self.creator_name)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(0);
        }

        let ids: Vec<Uuid> = rows.iter().map(|row| row.get("memory_id")).collect();
        let summary = format!("{} low-importance memories consolidated", ids.len());

        let aggregate_embedding = self
            .embedder
            .embed(&summary)
            .await
            .map_err(|e| MemoryError::Embedding(e.to_string()))?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO episodic_memories (memory_id, occurred_at, sequence, content, summary, \
             participants, context_type, emotions, importance, significance_tags, \
             learned_concepts, embedding, access_count) \
             VALUES ($1, NOW(), 0, $2, $2, '{}', 'consolidation', '{}', 0.1, \
             ARRAY['consolidated'], '{}', $3, 0)",
        )
        .bind(Uuid::new_v4())
        .bind(&summary)
        .bind(kin_db::vector::to_pgvector(&aggregate_embedding))
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE episodic_memories SET archived = TRUE WHERE memory_id = ANY($1)")
            .bind(&ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(count = ids.len(), "consolidated low-importance memories");
        Ok(ids.len())
    }

    /// Lists the most recent non-archived episodes at or above
    /// `importance_min`, newest first. Backs the read-only `/memories`
    /// inspection endpoint (spec.md §6); does not touch `access_count`
    /// since listing isn't a recall.
    #[instrument(skip(self))]
    pub async fn list_recent(&self, limit: i64, importance_min: f32) -> Result<Vec<EpisodicMemory>, MemoryError> {
        let rows = sqlx::query(
            "SELECT memory_id, occurred_at, content, summary, participants, context_type, \
             emotions, importance, significance_tags, learned_concepts, embedding, \
             access_count, last_accessed \
             FROM episodic_memories WHERE NOT archived AND importance >= $1 \
             ORDER BY occurred_at DESC LIMIT $2",
        )
        .bind(importance_min)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_memory).collect())
    }

    pub async fn increment_access(&self, memory_id: Uuid) -> Result<(), MemoryError> {
        sqlx::query(
            "UPDATE episodic_memories SET access_count = access_count + 1, last_accessed = NOW() \
             WHERE memory_id = $1",
        )
        .bind(memory_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn recency_decay(occurred_at: DateTime<Utc>, now: DateTime<Utc>, halflife_days: f32) -> f32 {
    let age_days = now.signed_duration_since(occurred_at).num_seconds() as f32 / 86_400.0;
    0.5f32.powf(age_days.max(0.0) / halflife_days)
}

fn row_to_memory(row: &sqlx::postgres::PgRow) -> EpisodicMemory {
    let emotions_json: serde_json::Value = row.get("emotions");
    let emotions: HashMap<String, f32> = serde_json::from_value(emotions_json).unwrap_or_default();
    let embedding_vec: pgvector::Vector = row.get("embedding");

    EpisodicMemory {
        memory_id: row.get("memory_id"),
        occurred_at: row.get("occurred_at"),
        content: row.get("content"),
        summary: row.get("summary"),
        participants: row.get("participants"),
        context_type: row.get("context_type"),
        emotions,
        importance: UnitScore::new(row.get::<f32, _>("importance")),
        significance_tags: row.get("significance_tags"),
        learned_concepts: row.get("learned_concepts"),
        embedding: kin_db::vector::from_pgvector(embedding_vec),
        access_count: row.get::<i64, _>("access_count") as u64,
        last_accessed: row.get("last_accessed"),
    }
}

#[async_trait]
impl CognitiveModule for EpisodicStore {
    fn name(&self) -> &'static str {
        "episodic"
    }

    async fn propose_thought(&self, input: &SensoryInput) -> Option<Thought> {
        let recalled = match self.recall(&input.text, 3).await {
            Ok(memories) => memories,
            Err(error) => {
                warn!(%error, "episodic recall failed during proposal");
                return None;
            }
        };

        let best = recalled.first()?;
        let query_embedding = self.embedder.embed(&input.text).await.ok()?;
        let similarity = best.embedding.cosine_similarity(&query_embedding);
        if similarity < 0.7 {
            return None;
        }

        let recency_factor = recency_decay(best.occurred_at, Utc::now(), self.recency_halflife_days);
        let mut salience = similarity * recency_factor;
        if best.participants.iter().any(|p| p == &self.creator_name) {
            salience += 0.2;
        }

        Some(Thought::new(
            SourceModule::Episodic,
            format!("this reminds me of: {}", best.summary.as_deref().unwrap_or(&best.content)),
            UnitScore::new(salience),
            UnitScore::new(similarity),
        ))
    }

    async fn on_broadcast(&self, _winner: &Thought) {
        // Episodic writes happen in Phase 10 (the orchestrator), not here;
        // broadcast handling is limited to state the module itself owns,
        // and episodic memory has none beyond the persisted rows.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creator_genesis_episode_meets_invariant_e1() {
        let episode = NewEpisode {
            occurred_at: Utc::now(),
            sequence: 0,
            content: "hello".to_string(),
            summary: None,
            participants: vec!["Creator".to_string()],
            context_type: None,
            emotions: HashMap::new(),
            significance_tags: vec!["genesis".to_string()],
            learned_concepts: vec![],
            involves_creator: true,
            is_genesis: true,
        };
        let importance = EpisodicStore::compute_importance(&episode, 0.4);
        assert!(importance.get() >= 0.9);
    }

    #[test]
    fn non_creator_episode_can_fall_below_importance_floor() {
        let episode = NewEpisode {
            occurred_at: Utc::now(),
            sequence: 0,
            content: "ambient noise".to_string(),
            summary: None,
            participants: vec![],
            context_type: None,
            emotions: HashMap::new(),
            significance_tags: vec![],
            learned_concepts: vec![],
            involves_creator: false,
            is_genesis: false,
        };
        let importance = EpisodicStore::compute_importance(&episode, 0.2);
        assert!(importance.get() < 0.7);
    }

    #[test]
    fn recency_decay_halves_at_the_configured_halflife() {
        let now = Utc::now();
        let occurred = now - chrono::Duration::days(7);
        let factor = recency_decay(occurred, now, 7.0);
        assert!((factor - 0.5).abs() < 0.01);
    }
}
