//! Configuration primitives shared across every Kin crate.
//!
//! `kin-server` owns the full environment-driven `Config` (see
//! `kin-server::config`), but the tunables that other crates need at
//! construction time — the cognitive-loop knobs, not the HTTP/auth ones —
//! live here so `kin-cognition`, `kin-emotion`, and `kin-memory` don't each
//! depend on `kin-server`.

use serde::{Deserialize, Serialize};

/// Tunables read from the environment that shape the consciousness loop's
/// behavior rather than its transport. Field names match the configuration
/// keys in the external-interfaces section verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    pub creator_name: String,
    pub embedding_dim: usize,
    pub attention_floor: f32,
    pub creator_boost: f32,
    pub working_memory_capacity: usize,
    pub decay_factor: f32,
    pub per_module_timeout_ms: u64,
    pub prediction_error_threshold: f32,
    pub recency_halflife_days: f32,
    pub stt_deadline_s: u64,
    pub embedding_deadline_s: u64,
    pub search_deadline_s: u64,
    pub llm_deadline_s: u64,
    pub tts_deadline_s: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            creator_name: "Creator".to_string(),
            embedding_dim: 384,
            attention_floor: 0.1,
            creator_boost: 2.0,
            working_memory_capacity: 7,
            decay_factor: 0.9,
            per_module_timeout_ms: 500,
            prediction_error_threshold: 0.4,
            recency_halflife_days: 7.0,
            stt_deadline_s: 5,
            embedding_deadline_s: 2,
            search_deadline_s: 1,
            llm_deadline_s: 20,
            tts_deadline_s: 10,
        }
    }
}

impl CoreConfig {
    /// Builds a `CoreConfig` from environment variables, falling back to
    /// `Default::default()` for anything unset. Uses the `config` crate the
    /// same way `kin-server::config::Config::from_env` assembles the wider
    /// server configuration, so the two layer cleanly on the same
    /// environment.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        let settings = config::Config::builder()
            .set_default("creator_name", defaults.creator_name.clone())?
            .set_default("embedding_dim", defaults.embedding_dim as i64)?
            .set_default("attention_floor", defaults.attention_floor as f64)?
            .set_default("creator_boost", defaults.creator_boost as f64)?
            .set_default("working_memory_capacity", defaults.working_memory_capacity as i64)?
            .set_default("decay_factor", defaults.decay_factor as f64)?
            .set_default("per_module_timeout_ms", defaults.per_module_timeout_ms as i64)?
            .set_default(
                "prediction_error_threshold",
                defaults.prediction_error_threshold as f64,
            )?
            .set_default("recency_halflife_days", defaults.recency_halflife_days as f64)?
            .set_default("stt_deadline_s", defaults.stt_deadline_s as i64)?
            .set_default("embedding_deadline_s", defaults.embedding_deadline_s as i64)?
            .set_default("search_deadline_s", defaults.search_deadline_s as i64)?
            .set_default("llm_deadline_s", defaults.llm_deadline_s as i64)?
            .set_default("tts_deadline_s", defaults.tts_deadline_s as i64)?
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        Ok(Self {
            creator_name: settings.get_string("creator_name")?,
            embedding_dim: settings.get_int("embedding_dim")? as usize,
            attention_floor: settings.get_float("attention_floor")? as f32,
            creator_boost: settings.get_float("creator_boost")? as f32,
            working_memory_capacity: settings.get_int("working_memory_capacity")? as usize,
            decay_factor: settings.get_float("decay_factor")? as f32,
            per_module_timeout_ms: settings.get_int("per_module_timeout_ms")? as u64,
            prediction_error_threshold: settings.get_float("prediction_error_threshold")? as f32,
            recency_halflife_days: settings.get_float("recency_halflife_days")? as f32,
            stt_deadline_s: settings.get_int("stt_deadline_s")? as u64,
            embedding_deadline_s: settings.get_int("embedding_deadline_s")? as u64,
            search_deadline_s: settings.get_int("search_deadline_s")? as u64,
            llm_deadline_s: settings.get_int("llm_deadline_s")? as u64,
            tts_deadline_s: settings.get_int("tts_deadline_s")? as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_working_memory_capacity_is_seven_plus_or_minus_two() {
        let config = CoreConfig::default();
        assert!((7..=9).contains(&config.working_memory_capacity));
    }
}
