//! Pluggable collaborator contracts (STT, TTS, LLM, Embedder) plus an
//! Anthropic-backed `Llm` client and mock implementations for tests.

pub mod anthropic;
pub mod mock;
pub mod traits;

pub use anthropic::AnthropicClient;
pub use traits::{CollaboratorError, Embedder, Llm, Stt, Tts};
