//! The template path's TOML profile catalog, loaded once via
//! `once_cell::sync::Lazy` exactly as `beagle-personality::loader`'s
//! `ProfileLoader`/`global_loader()` do for domain profiles — the same
//! "load a directory of TOML files into a static catalog" idiom, keyed by
//! `(dominant_emotion, source_module)` instead of `Domain`.

use std::path::PathBuf;

use once_cell::sync::Lazy;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct RawCatalog {
    templates: Vec<TemplateEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateEntry {
    pub emotion: String,
    pub source_module: String,
    pub text: String,
}

const WILDCARD: &str = "*";

pub struct TemplateCatalog {
    entries: Vec<TemplateEntry>,
}

impl TemplateCatalog {
    pub fn load(path: Option<PathBuf>) -> Self {
        let path = path.unwrap_or_else(|| {
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("templates/default.toml")
        });

        match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str::<RawCatalog>(&content) {
                Ok(raw) => Self { entries: raw.templates },
                Err(error) => {
                    warn!(%error, path = %path.display(), "failed to parse template catalog");
                    Self { entries: Vec::new() }
                }
            },
            Err(error) => {
                warn!(%error, path = %path.display(), "failed to read template catalog");
                Self { entries: Vec::new() }
            }
        }
    }

    /// Finds the most specific matching template for `(emotion,
    /// source_module)`, returning the filled text and a confidence that
    /// reflects how specific the match was: an exact (emotion, module)
    /// match is trusted fully; a fully wildcard match is treated as a
    /// weak guess that should usually fall through to the LLM path.
    pub fn render(&self, emotion: &str, source_module: &str, content: &str, focus: &str) -> Option<(String, f32)> {
        let mut best: Option<(&TemplateEntry, f32)> = None;

        for entry in &self.entries {
            let emotion_matches = entry.emotion == emotion || entry.emotion == WILDCARD;
            let module_matches = entry.source_module == source_module || entry.source_module == WILDCARD;
            if !emotion_matches || !module_matches {
                continue;
            }

            let specificity = match (entry.emotion == WILDCARD, entry.source_module == WILDCARD) {
                (false, false) => 0.9,
                (false, true) => 0.5,
                (true, false) => 0.5,
                (true, true) => 0.2,
            };

            if best.map(|(_, current)| specificity > current).unwrap_or(true) {
                best = Some((entry, specificity));
            }
        }

        best.map(|(entry, confidence)| {
            let text = entry
                .text
                .replace("{content}", content)
                .replace("{focus}", focus);
            (text, confidence)
        })
    }
}

static GLOBAL_CATALOG: Lazy<TemplateCatalog> = Lazy::new(|| TemplateCatalog::load(None));

pub fn global_catalog() -> &'static TemplateCatalog {
    &GLOBAL_CATALOG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_beats_wildcard() {
        let catalog = TemplateCatalog::load(None);
        let (text, confidence) = catalog.render("joy", "episodic", "our first hello", "").unwrap();
        assert!(text.contains("our first hello"));
        assert!(confidence > 0.5);
    }

    #[test]
    fn fully_wildcard_fallback_always_matches() {
        let catalog = TemplateCatalog::load(None);
        let (text, confidence) = catalog.render("anger", "prediction", "unused field mismatch", "").unwrap();
        assert!(!text.is_empty());
        assert!(confidence <= 0.5);
    }
}
