//! Contracts for the four pluggable collaborators. The core never assumes
//! a specific vendor or model; it only calls these traits, each under a
//! `tokio::time::timeout` at the deadlines in `CoreConfig`.

use async_trait::async_trait;
use kin_common::Embedding;

#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("collaborator call timed out")]
    Timeout,

    #[error("collaborator call failed: {0}")]
    Failed(#[from] anyhow::Error),
}

/// Speech-to-text. `format` is the audio container/codec tag from the
/// client message (`"opus"` or `"wav"`).
#[async_trait]
pub trait Stt: Send + Sync {
    async fn transcribe(&self, audio: &[u8], format: &str) -> Result<(String, f32), CollaboratorError>;
}

/// Text-to-speech.
#[async_trait]
pub trait Tts: Send + Sync {
    async fn synthesize(&self, text: &str, emotion_tag: &str) -> Result<Vec<u8>, CollaboratorError>;
}

/// The LLM fallback collaborator used by the Response Generator when the
/// template path misses.
#[async_trait]
pub trait Llm: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> Result<String, CollaboratorError>;
}

/// Produces the fixed-dimension embeddings used by every vector store and
/// by the Prediction Engine.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Embedding, CollaboratorError>;
}
