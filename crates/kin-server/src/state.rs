//! Shared Axum application state, grounded on `beagle-server::state::AppState`'s
//! pattern of an async `AppState::new(&config)` constructor assembling every
//! collaborator and wrapping the result in `Arc`s cloned into each handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use kin_cognition::{AttentionScorer, AttentionWeights, PredictionEngine, WorkingMemory};
use kin_common::CognitiveModule;
use kin_consciousness::{ConsciousnessLoop, GlobalWorkspace};
use kin_emotion::EmotionEngine;
use kin_identity::IdentityStore;
use kin_llm::mock::{MockEmbedder, MockStt, MockTts};
use kin_llm::{AnthropicClient, Embedder, Llm, Stt, Tts};
use kin_memory::episodic::EpisodicStore;
use kin_memory::semantic::SemanticStore;
use kin_policy::PolicyGuard;
use kin_response::ResponseGenerator;
use tracing::{info, warn};

use crate::config::Config;

/// Shared across every handler; `Clone` because Axum requires its state
/// type to be cheaply cloneable per request.
#[derive(Clone)]
pub struct AppState {
    pub consciousness: Arc<ConsciousnessLoop>,
    pub identity: Arc<IdentityStore>,
    pub episodic: Arc<EpisodicStore>,
    jwt_secret: Arc<String>,
    jwt_expiration_hours: i64,
    creator_name: Arc<String>,
    admin_password_hash: Arc<String>,
    /// Toggled by `{type:"control", action:"sleep"|"resume"}` messages on
    /// the session WebSocket; surfaced on `/health` as `is_awake`.
    awake: Arc<AtomicBool>,
    /// Exactly one live session is allowed at a time (spec.md §5's session
    /// cardinality rule); a second `GET /ws` upgrade while this is held
    /// must be rejected with a busy error rather than queued.
    session_occupied: Arc<AtomicBool>,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let pool = kin_db::connect_pool(config.database_url(), config.max_db_connections())
            .await
            .context("failed to connect to Postgres")?;

        let embedder: Arc<dyn Embedder> = Arc::new(MockEmbedder { dim: config.core.embedding_dim });
        let stt: Arc<dyn Stt> = Arc::new(MockStt);
        let tts: Arc<dyn Tts> = Arc::new(MockTts);

        let llm: Arc<dyn Llm> = match config.anthropic_api_key() {
            Some(api_key) => match AnthropicClient::new(api_key, config.anthropic_model()) {
                Ok(client) => {
                    info!("Anthropic LLM fallback client initialized");
                    Arc::new(client)
                }
                Err(error) => {
                    warn!(%error, "failed to initialize Anthropic client, falling back to a mock LLM");
                    Arc::new(kin_llm::mock::MockLlm)
                }
            },
            None => {
                info!("ANTHROPIC_API_KEY not set; using a mock LLM fallback");
                Arc::new(kin_llm::mock::MockLlm)
            }
        };

        let identity = Arc::new(IdentityStore::new(pool.clone()));
        let episodic = Arc::new(EpisodicStore::new(
            pool.clone(),
            embedder.clone(),
            config.core.recency_halflife_days,
            config.core.creator_name.clone(),
        ));
        let semantic = Arc::new(SemanticStore::new(pool.clone(), embedder.clone()));
        let working_memory = Arc::new(WorkingMemory::new(
            embedder.clone(),
            config.core.working_memory_capacity,
            config.core.decay_factor,
        ));
        let emotion = Arc::new(EmotionEngine::new());
        let attention = AttentionScorer::new(AttentionWeights::default(), config.core.creator_boost);
        let prediction = Arc::new(PredictionEngine::new(embedder.clone(), 0.1, config.core.prediction_error_threshold));

        let modules: Vec<Arc<dyn CognitiveModule>> = vec![
            episodic.clone(),
            semantic.clone(),
            working_memory.clone(),
            emotion.clone(),
            prediction.clone(),
        ];
        let workspace = GlobalWorkspace::new(modules, config.core.per_module_timeout_ms);

        let response_generator = ResponseGenerator::new(llm.clone(), config.core.creator_name.clone());
        let policy = Arc::new(PolicyGuard::boot(config.policy_pinned_hash())?);

        let consciousness = Arc::new(ConsciousnessLoop::new(
            identity.clone(),
            episodic.clone(),
            semantic,
            working_memory,
            emotion,
            attention,
            prediction,
            workspace,
            response_generator,
            policy,
            embedder,
            stt,
            tts,
            config.core.clone(),
        ));

        Ok(Self {
            consciousness,
            identity,
            episodic,
            jwt_secret: Arc::new(config.jwt_secret().to_owned()),
            jwt_expiration_hours: config.jwt_expiration_hours(),
            creator_name: Arc::new(config.core.creator_name.clone()),
            admin_password_hash: Arc::new(config.admin_password_hash().to_owned()),
            awake: Arc::new(AtomicBool::new(true)),
            session_occupied: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn is_awake(&self) -> bool {
        self.awake.load(Ordering::SeqCst)
    }

    pub fn set_awake(&self, value: bool) {
        self.awake.store(value, Ordering::SeqCst);
    }

    /// Attempts to claim the single session slot. Returns `true` and holds
    /// the slot if it was free; the caller must call [`Self::release_session`]
    /// when the connection ends.
    pub fn try_claim_session(&self) -> bool {
        self.session_occupied
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn release_session(&self) {
        self.session_occupied.store(false, Ordering::SeqCst);
    }

    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }

    pub fn jwt_expiration_hours(&self) -> i64 {
        self.jwt_expiration_hours
    }

    pub fn creator_name(&self) -> &str {
        &self.creator_name
    }

    pub fn admin_password_hash(&self) -> &str {
        &self.admin_password_hash
    }
}
