//! C9 Response Generator: maps a conscious thought to a natural-language
//! reply via a TOML template catalog, falling back to an LLM collaborator.

pub mod generator;
pub mod templates;

pub use generator::{GeneratedResponse, ResponseGenerator, LOW_CONFIDENCE_THRESHOLD};
pub use templates::{global_catalog, TemplateCatalog, TemplateEntry};
