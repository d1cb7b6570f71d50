//! `Turn`: one pass through the ten phases, modeled as an explicit struct
//! rather than nested futures (spec.md §9 Design Note). Each
//! `ConsciousnessLoop` phase method takes `&mut Turn` and fills in the
//! field(s) that phase is responsible for.

use chrono::{DateTime, Utc};
use kin_common::{Embedding, Thought, UnitScore};
use kin_response::GeneratedResponse;

#[derive(Debug, Clone)]
pub struct Turn {
    pub sequence: i64,
    pub occurred_at: DateTime<Utc>,
    pub from_creator: bool,
    pub raw_text: String,
    pub stt_confidence: Option<f32>,
    pub attention_score: UnitScore,
    pub novelty: f32,
    pub short_circuited: bool,
    pub expected_embedding: Embedding,
    pub prediction_confidence: f32,
    pub actual_embedding: Embedding,
    pub prediction_error: f32,
    pub proposals: Vec<Thought>,
    pub conscious_thought: Option<Thought>,
    pub response: Option<GeneratedResponse>,
    pub degraded: bool,
}

impl Turn {
    pub fn new(sequence: i64, from_creator: bool) -> Self {
        Self {
            sequence,
            occurred_at: Utc::now(),
            from_creator,
            raw_text: String::new(),
            stt_confidence: None,
            attention_score: UnitScore::ZERO,
            novelty: 0.0,
            short_circuited: false,
            expected_embedding: Embedding::zeros(0),
            prediction_confidence: 0.0,
            actual_embedding: Embedding::zeros(0),
            prediction_error: 0.0,
            proposals: Vec::new(),
            conscious_thought: None,
            response: None,
            degraded: false,
        }
    }
}
