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
pub enum SemanticError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("embedding collaborator failed: {0}")]
    Embedding(String),

    #[error("is_creator_teaching requires exact_words")]
    MissingExactWords,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticItem {
    pub concept_id: Uuid,
    pub name: String,
    pub item_type: String,
    pub definition: String,
    pub learned_from: String,
    pub confidence: UnitScore,
    pub is_creator_teaching: bool,
    pub creator_exact_words: Option<String>,
    pub embedding: Embedding,
    pub importance: UnitScore,
    pub related_ids: Vec<Uuid>,
    pub updated_at: DateTime<Utc>,
}

pub struct SemanticStore {
    pool: PgPool,
    embedder: Arc<dyn Embedder>,
}

impl SemanticStore {
    pub fn new(pool: PgPool, embedder: Arc<dyn Embedder>) -> Self {
        Self { pool, embedder }
    }

    /// Writes or merges a concept. `is_creator_teaching` forces importance
    /// to >= 0.9 and requires `exact_words` (Invariant S1); confidence on a
    /// Creator teaching only ever grows — a non-Creator write can never
    /// lower it.
    #[instrument(skip(self, definition))]
    pub async fn teach(
        &self,
        name: &str,
        definition: &str,
        learned_from: &str,
        is_creator_teaching: bool,
        exact_words: Option<String>,
    ) -> Result<Uuid, SemanticError> {
        validate_creator_teaching(is_creator_teaching, &exact_words)?;

        let embedding = self
            .embedder
            .embed(definition)
            .await
            .map_err(|e| SemanticError::Embedding(e.to_string()))?;

        let existing = sqlx::query(
            "SELECT concept_id, confidence, is_creator_teaching FROM semantic_memory WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        let importance = if is_creator_teaching { 0.9_f32 } else { 0.5 };
        let confidence = match &existing {
            Some(row) => {
                let existing_confidence: f32 = row.get("confidence");
                let existing_is_creator: bool = row.get("is_creator_teaching");
                if existing_is_creator && !is_creator_teaching {
                    // Non-Creator writes may never lower a Creator teaching's confidence.
                    existing_confidence
                } else {
                    (existing_confidence + 0.1).min(1.0)
                }
            }
            None => 0.6,
        };

        let concept_id = existing
            .as_ref()
            .map(|row| row.get::<Uuid, _>("concept_id"))
            .unwrap_or_else(Uuid::new_v4);

        sqlx::query(
            "INSERT INTO semantic_memory (concept_id, name, item_type, definition, learned_from, \
             confidence, is_creator_teaching, creator_exact_words, embedding, importance, \
             related_ids) \
             VALUES ($1, $2, 'fact', $3, $4, $5, $6, $7, $8, $9, '{}') \
             ON CONFLICT (concept_id) DO UPDATE SET \
             definition = EXCLUDED.definition, confidence = EXCLUDED.confidence, \
             is_creator_teaching = EXCLUDED.is_creator_teaching OR semantic_memory.is_creator_teaching, \
             creator_exact_words = COALESCE(EXCLUDED.creator_exact_words, semantic_memory.creator_exact_words), \
             embedding = EXCLUDED.embedding, importance = GREATEST(EXCLUDED.importance, semantic_memory.importance), \
             updated_at = NOW()",
        )
        .bind(concept_id)
        .bind(name)
        .bind(definition)
        .bind(learned_from)
        .bind(confidence)
        .bind(is_creator_teaching)
        .bind(&exact_words)
        .bind(kin_db::vector::to_pgvector(&embedding))
        .bind(importance)
        .execute(&self.pool)
        .await?;

        info!(%concept_id, is_creator_teaching, "semantic item taught");
        Ok(concept_id)
    }

    /// Top-k by embedding similarity weighted by `importance * (1 + 0.8 *
    /// is_creator_teaching)`.
    #[instrument(skip(self))]
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<SemanticItem>, SemanticError> {
        let query_embedding = self
            .embedder
            .embed(text)
            .await
            .map_err(|e| SemanticError::Embedding(e.to_string()))?;

        let oversample = (k * 5).max(20) as i64;
        let rows = sqlx::query(
            "SELECT concept_id, name, item_type, definition, learned_from, confidence, \
             is_creator_teaching, creator_exact_words, embedding, importance, related_ids, \
             updated_at, 1 - (embedding <=> $1) AS similarity \
             FROM semantic_memory ORDER BY embedding <=> $1 LIMIT $2",
        )
        .bind(kin_db::vector::to_pgvector(&query_embedding))
        .bind(oversample)
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<(f32, SemanticItem)> = rows
            .into_iter()
            .map(|row| {
                let item = row_to_item(&row);
                let similarity: f32 = row.get("similarity");
                let weight = item.importance.get() * (1.0 + 0.8 * item.is_creator_teaching as i32 as f32);
                (similarity * weight, item)
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored.into_iter().take(k).map(|(_, item)| item).collect())
    }
}

fn validate_creator_teaching(
    is_creator_teaching: bool,
    exact_words: &Option<String>,
) -> Result<(), SemanticError> {
    if is_creator_teaching && exact_words.is_none() {
        Err(SemanticError::MissingExactWords)
    } else {
        Ok(())
    }
}

fn row_to_item(row: &sqlx::postgres::PgRow) -> SemanticItem {
    let embedding_vec: pgvector::Vector = row.get("embedding");
    SemanticItem {
        concept_id: row.get("concept_id"),
        name: row.get("name"),
        item_type: row.get("item_type"),
        definition: row.get("definition"),
        learned_from: row.get("learned_from"),
        confidence: UnitScore::new(row.get::<f32, _>("confidence")),
        is_creator_teaching: row.get("is_creator_teaching"),
        creator_exact_words: row.get("creator_exact_words"),
        embedding: kin_db::vector::from_pgvector(embedding_vec),
        importance: UnitScore::new(row.get::<f32, _>("importance")),
        related_ids: row.get("related_ids"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl CognitiveModule for SemanticStore {
    fn name(&self) -> &'static str {
        "semantic"
    }

    async fn propose_thought(&self, input: &SensoryInput) -> Option<Thought> {
        let matches = match self.query(&input.text, 1).await {
            Ok(matches) => matches,
            Err(error) => {
                warn!(%error, "semantic query failed during proposal");
                return None;
            }
        };

        let best = matches.first()?;
        let query_embedding = self.embedder.embed(&input.text).await.ok()?;
        let similarity = best.embedding.cosine_similarity(&query_embedding);
        if similarity < 0.6 {
            return None;
        }

        let salience = (best.importance.get() * similarity).clamp(0.0, 1.0);
        Some(Thought::new(
            if best.is_creator_teaching {
                SourceModule::ValueLearning
            } else {
                SourceModule::Semantic
            },
            format!("I know that {}", best.definition),
            UnitScore::new(salience),
            UnitScore::new(similarity),
        ))
    }

    async fn on_broadcast(&self, _winner: &Thought) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creator_teaching_without_exact_words_is_rejected() {
        assert!(validate_creator_teaching(true, &None).is_err());
    }

    #[test]
    fn creator_teaching_with_exact_words_is_accepted() {
        assert!(validate_creator_teaching(true, &Some("exact".to_string())).is_ok());
    }

    #[test]
    fn non_creator_teaching_never_requires_exact_words() {
        assert!(validate_creator_teaching(false, &None).is_ok());
    }
}
