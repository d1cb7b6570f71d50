//! Synthetic collaborator implementations for tests; no network calls.

use async_trait::async_trait;
use kin_common::Embedding;

use crate::traits::{CollaboratorError, Embedder, Llm, Stt, Tts};

pub struct MockStt;

#[async_trait]
impl Stt for MockStt {
    async fn transcribe(&self, audio: &[u8], _format: &str) -> Result<(String, f32), CollaboratorError> {
        if audio.is_empty() {
            return Ok((String::new(), 0.0));
        }
        Ok(("mock transcript".to_string(), 0.9))
    }
}

pub struct MockTts;

#[async_trait]
impl Tts for MockTts {
    async fn synthesize(&self, text: &str, _emotion_tag: &str) -> Result<Vec<u8>, CollaboratorError> {
        Ok(text.as_bytes().to_vec())
    }
}

pub struct MockLlm;

#[async_trait]
impl Llm for MockLlm {
    async fn complete(
        &self,
        _system_prompt: &str,
        user_prompt: &str,
        _max_tokens: u32,
    ) -> Result<String, CollaboratorError> {
        Ok(format!("mock completion for: {}", user_prompt))
    }
}

/// Deterministic hash-based embedding so tests get stable, reproducible
/// vectors without a real embedding model.
pub struct MockEmbedder {
    pub dim: usize,
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding, CollaboratorError> {
        let mut values = vec![0.0f32; self.dim];
        for (i, byte) in text.bytes().enumerate() {
            values[i % self.dim] += byte as f32 / 255.0;
        }
        let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in values.iter_mut() {
                *value /= norm;
            }
        }
        Ok(Embedding::new(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_embedder_is_deterministic() {
        let embedder = MockEmbedder { dim: 8 };
        let a = embedder.embed("hello").await.unwrap();
        let b = embedder.embed("hello").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn mock_stt_returns_empty_for_empty_audio() {
        let stt = MockStt;
        let (text, confidence) = stt.transcribe(&[], "wav").await.unwrap();
        assert!(text.is_empty());
        assert_eq!(confidence, 0.0);
    }
}
