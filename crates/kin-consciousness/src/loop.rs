//! C11 Consciousness Loop: the orchestrator that drives a `Turn` through
//! phases 1-10 exactly as spec.md §4.1 lists them, holding the one
//! `Arc` handle to every component plus the session-cardinality lock and
//! the duplicate-input cache. Grounded on the teacher's `tracing`
//! instrumentation idiom throughout `beagle-server` for per-phase logging.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use kin_common::{CoreConfig, SensoryInput, Thought};
use kin_cognition::{AttentionScorer, PredictionEngine, WorkingMemory, CURRENT_TURN_TAG};
use kin_emotion::engine::EmotionEngine;
use kin_identity::{IdentityError, IdentityStore};
use kin_llm::{Embedder, Llm, Stt, Tts};
use kin_memory::episodic::{EpisodicStore, NewEpisode};
use kin_memory::semantic::SemanticStore;
use kin_policy::{PolicyGuard, PolicyViolation};
use kin_response::ResponseGenerator;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument, warn};

use crate::global_workspace::GlobalWorkspace;
use crate::turn::Turn;

/// Below this, Phase 2 short-circuits to a minimal acknowledgment
/// (spec.md §6, `attention_floor`, default 0.1 when not overridden by
/// `CoreConfig`).
const MINIMUM_BASE_IMPORTANCE: f32 = 0.4;
const DEDUP_WINDOW_SECS: i64 = 2;
const BOND_BUMP_DELTA: f32 = 0.05;
/// How long the Creator must have been silent before a new Creator turn
/// appraises as "creator absent long" (spec.md §4.5's appraisal rule table).
const CREATOR_ABSENCE_HOURS: i64 = 24;

#[derive(Debug, Error)]
pub enum ConsciousnessError {
    #[error("a turn is already in progress for this session")]
    Busy,

    #[error("no usable input in this turn")]
    NoUsableInput,

    #[error("persistence failed during phase 10: {0}")]
    Storage(String),
}

/// The reply returned to the transport layer: text plus synthesized audio.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub text: String,
    pub emotion_tag: String,
    pub audio: Vec<u8>,
    pub phi: u64,
}

struct CachedReply {
    text: String,
    occurred_at: chrono::DateTime<Utc>,
    outcome: TurnOutcome,
}

pub struct ConsciousnessLoop {
    identity: Arc<IdentityStore>,
    episodic: Arc<EpisodicStore>,
    semantic: Arc<SemanticStore>,
    working_memory: Arc<WorkingMemory>,
    emotion: Arc<EmotionEngine>,
    attention: AttentionScorer,
    prediction: Arc<PredictionEngine>,
    workspace: GlobalWorkspace,
    response_generator: ResponseGenerator,
    policy: Arc<PolicyGuard>,
    embedder: Arc<dyn Embedder>,
    stt: Arc<dyn Stt>,
    tts: Arc<dyn Tts>,
    config: CoreConfig,
    turn_lock: Mutex<()>,
    sequence: AtomicI64,
    dedup_cache: RwLock<Option<CachedReply>>,
    last_turn_at: RwLock<Option<chrono::DateTime<Utc>>>,
}

impl ConsciousnessLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        identity: Arc<IdentityStore>,
        episodic: Arc<EpisodicStore>,
        semantic: Arc<SemanticStore>,
        working_memory: Arc<WorkingMemory>,
        emotion: Arc<EmotionEngine>,
        attention: AttentionScorer,
        prediction: Arc<PredictionEngine>,
        workspace: GlobalWorkspace,
        response_generator: ResponseGenerator,
        policy: Arc<PolicyGuard>,
        embedder: Arc<dyn Embedder>,
        stt: Arc<dyn Stt>,
        tts: Arc<dyn Tts>,
        config: CoreConfig,
    ) -> Self {
        Self {
            identity,
            episodic,
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
            config,
            turn_lock: Mutex::new(()),
            sequence: AtomicI64::new(0),
            dedup_cache: RwLock::new(None),
            last_turn_at: RwLock::new(None),
        }
    }

    /// Runs one full turn. `audio` takes precedence over `text` when both
    /// are given, per Phase 1. Rejects a second concurrent call with
    /// [`ConsciousnessError::Busy`] rather than queuing it (spec.md's
    /// single-session cardinality rule).
    #[instrument(skip(self, text, audio))]
    pub async fn process_input(
        &self,
        text: Option<String>,
        audio: Option<(&[u8], &str)>,
        from_creator: bool,
    ) -> Result<TurnOutcome, ConsciousnessError> {
        let _permit = self.turn_lock.try_lock().map_err(|_| ConsciousnessError::Busy)?;

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let mut turn = Turn::new(sequence, from_creator);

        // Phase 1 — sensory intake.
        self.phase1_sensory_intake(&mut turn, text, audio).await?;

        if turn.raw_text.trim().is_empty() {
            return Ok(TurnOutcome {
                text: "I didn't quite catch that — could you say it again?".to_string(),
                emotion_tag: "neutral".to_string(),
                audio: Vec::new(),
                phi: self.identity.load().await.ok().flatten().map(|i| i.phi).unwrap_or(0),
            });
        }

        if let Some(cached) = self.check_dedup(&turn.raw_text, turn.occurred_at).await {
            return Ok(cached);
        }

        // Phase 2 — attention scoring.
        self.phase2_attention(&mut turn).await;

        if turn.attention_score.get() < self.config.attention_floor {
            return self.short_circuit(turn).await;
        }

        // Phase 3 — working-memory admit.
        self.working_memory.admit(&turn.raw_text, turn.attention_score, Some(CURRENT_TURN_TAG)).await;

        // Phase 4 — prediction.
        self.phase4_prediction(&mut turn).await;

        // Appraise the event against the emotion engine before the workspace
        // competes on thoughts, so a module reading current emotion state in
        // Phase 5 sees this turn's mood shift rather than last turn's.
        let creator_absent_long = self.record_turn_time(turn.occurred_at).await;
        self.appraise_turn(&turn, creator_absent_long).await;

        // Phase 5 — thought proposals.
        let input = SensoryInput {
            text: turn.raw_text.clone(),
            from_creator: turn.from_creator,
            occurred_at: turn.occurred_at,
        };
        turn.proposals = self.workspace.broadcast_external_input(&input).await;

        // Phase 6-7 — competition and winner selection.
        let winner = self.workspace.compete_and_select(std::mem::take(&mut turn.proposals));
        turn.conscious_thought = Some(winner.clone());

        // Phase 8 — global broadcast.
        self.workspace.broadcast_internal(&winner).await;

        // Phase 9 — response generation.
        let generated = self.generate_response(&winner).await;
        let final_text = self.enforce_policy(&generated.text).await;
        turn.response = Some(kin_response::GeneratedResponse {
            text: final_text,
            emotion_tag: generated.emotion_tag,
            confidence: generated.confidence,
        });

        // Phase 10 — learning & persistence.
        let phi = self.phase10_persist(&turn).await?;

        let audio = match self.tts.synthesize(&turn.response.as_ref().unwrap().text, &turn.response.as_ref().unwrap().emotion_tag).await {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(%error, "tts synthesis failed, returning text-only reply");
                Vec::new()
            }
        };

        let outcome = TurnOutcome {
            text: turn.response.as_ref().unwrap().text.clone(),
            emotion_tag: turn.response.as_ref().unwrap().emotion_tag.clone(),
            audio,
            phi,
        };

        self.cache_reply(&turn.raw_text, turn.occurred_at, outcome.clone()).await;
        Ok(outcome)
    }

    async fn phase1_sensory_intake(
        &self,
        turn: &mut Turn,
        text: Option<String>,
        audio: Option<(&[u8], &str)>,
    ) -> Result<(), ConsciousnessError> {
        if let Some((bytes, format)) = audio {
            let timeout = std::time::Duration::from_secs(self.config.stt_deadline_s);
            match tokio::time::timeout(timeout, self.stt.transcribe(bytes, format)).await {
                Ok(Ok((transcript, confidence))) => {
                    turn.raw_text = transcript;
                    turn.stt_confidence = Some(confidence);
                }
                Ok(Err(error)) => {
                    warn!(%error, "stt transcription failed");
                    return Err(ConsciousnessError::NoUsableInput);
                }
                Err(_) => {
                    warn!("stt transcription timed out");
                    return Err(ConsciousnessError::NoUsableInput);
                }
            }
        } else {
            turn.raw_text = text.unwrap_or_default();
        }
        Ok(())
    }

    async fn check_dedup(&self, text: &str, occurred_at: chrono::DateTime<Utc>) -> Option<TurnOutcome> {
        let cache = self.dedup_cache.read().await;
        let cached = cache.as_ref()?;
        if cached.text == text && (occurred_at - cached.occurred_at).num_seconds() <= DEDUP_WINDOW_SECS {
            info!("duplicate input within dedup window, returning cached reply");
            Some(cached.outcome.clone())
        } else {
            None
        }
    }

    async fn cache_reply(&self, text: &str, occurred_at: chrono::DateTime<Utc>, outcome: TurnOutcome) {
        *self.dedup_cache.write().await = Some(CachedReply {
            text: text.to_string(),
            occurred_at,
            outcome,
        });
    }

    async fn phase2_attention(&self, turn: &mut Turn) {
        let focused = self.working_memory.focus(5).await;
        let novelty = match self.embedder.embed(&turn.raw_text).await {
            Ok(embedding) => {
                let max_similarity = focused
                    .iter()
                    .map(|item| embedding.cosine_similarity(&item.embedding))
                    .fold(0.0_f32, f32::max);
                1.0 - max_similarity
            }
            Err(_) => 1.0,
        };
        let working_memory_relevance = 1.0 - novelty;
        let emotion_intensity = self.emotion.state().await.intensity();

        turn.novelty = novelty;
        turn.attention_score = self.attention.score(
            &turn.raw_text,
            turn.from_creator,
            novelty,
            emotion_intensity,
            working_memory_relevance,
        );
    }

    /// Builds the event-feature vector the appraisal rule table (spec.md
    /// §4.5) maps to emotion deltas, folding in whatever phases 1-4 already
    /// computed (novelty, prediction error) rather than recomputing them.
    async fn appraise_turn(&self, turn: &Turn, creator_absent_long: bool) {
        let event = kin_emotion::engine::AppraisalEvent {
            positive_creator_interaction: turn.from_creator,
            creator_absent_long,
            high_prediction_error: turn.prediction_error > self.config.prediction_error_threshold,
            norm_violation: false,
            novel_safe_input: turn.novelty > 0.7,
            from_creator: turn.from_creator,
            self_achievement: false,
            caused_by_creator: turn.from_creator,
        };
        self.emotion.appraise(&event).await;
    }

    async fn record_turn_time(&self, occurred_at: chrono::DateTime<Utc>) -> bool {
        let mut last = self.last_turn_at.write().await;
        let creator_absent_long = last
            .map(|previous| {
                occurred_at.signed_duration_since(previous) >= chrono::Duration::hours(CREATOR_ABSENCE_HOURS)
            })
            .unwrap_or(false);
        *last = Some(occurred_at);
        creator_absent_long
    }

    async fn phase4_prediction(&self, turn: &mut Turn) {
        let context: String = self
            .working_memory
            .focus(3)
            .await
            .iter()
            .map(|item| item.content.clone())
            .collect::<Vec<_>>()
            .join(" ");

        let (expected, confidence) = self.prediction.predict(&context).await;
        turn.expected_embedding = expected.clone();
        turn.prediction_confidence = confidence;

        turn.actual_embedding = self.embedder.embed(&turn.raw_text).await.unwrap_or_else(|_| kin_common::Embedding::zeros(0));
        turn.prediction_error = if expected.dim() == 0 {
            0.0
        } else {
            expected.cosine_distance(&turn.actual_embedding)
        };
    }

    async fn short_circuit(&self, mut turn: Turn) -> Result<TurnOutcome, ConsciousnessError> {
        turn.short_circuited = true;
        let new_episode = NewEpisode {
            occurred_at: turn.occurred_at,
            sequence: turn.sequence,
            content: turn.raw_text.clone(),
            summary: None,
            participants: participants(turn.from_creator, &self.config.creator_name),
            context_type: Some("low_salience".to_string()),
            emotions: self.emotion_snapshot().await,
            significance_tags: vec![],
            learned_concepts: vec![],
            involves_creator: turn.from_creator,
            is_genesis: false,
        };

        self.ensure_identity_exists().await.map_err(|e| ConsciousnessError::Storage(e.to_string()))?;
        self.episodic
            .store(new_episode, turn.attention_score.get())
            .await
            .map_err(|e| ConsciousnessError::Storage(e.to_string()))?;

        let phi = self
            .identity
            .increment_phi()
            .await
            .map_err(|e| ConsciousnessError::Storage(e.to_string()))?;

        Ok(TurnOutcome {
            text: "Mm, I hear you.".to_string(),
            emotion_tag: "neutral".to_string(),
            audio: Vec::new(),
            phi,
        })
    }

    async fn generate_response(&self, winner: &Thought) -> kin_response::GeneratedResponse {
        let emotion_state = self.emotion.state().await;
        let bond_strength = self
            .identity
            .load()
            .await
            .ok()
            .flatten()
            .map(|identity| identity.bond_strength.get())
            .unwrap_or(0.0);
        let focus = self.working_memory.focus(5).await;
        self.response_generator.generate(winner, &emotion_state, bond_strength, &focus).await
    }

    /// Runs the generated text past the Policy Guard; a violation replaces
    /// the reply with a neutral refusal rather than surfacing the raw
    /// proposed text (spec.md §7's "policy violation" error class).
    async fn enforce_policy(&self, proposed_text: &str) -> String {
        match self.policy.verify_outbound(proposed_text).await {
            Ok(()) => proposed_text.to_string(),
            Err(violation) => {
                log_policy_violation(&violation);
                "I can't do that.".to_string()
            }
        }
    }

    async fn emotion_snapshot(&self) -> std::collections::HashMap<String, f32> {
        let state = self.emotion.state().await;
        kin_emotion::model::BasicEmotion::ALL
            .into_iter()
            .map(|emotion| (emotion.as_str().to_string(), state.get(emotion).get()))
            .collect()
    }

    async fn ensure_identity_exists(&self) -> Result<(), IdentityError> {
        if self.identity.load().await?.is_none() {
            self.identity.create_genesis(self.config.creator_name.clone()).await?;
        }
        Ok(())
    }

    #[instrument(skip(self, turn))]
    async fn phase10_persist(&self, turn: &Turn) -> Result<u64, ConsciousnessError> {
        let is_genesis = self.identity.load().await.ok().flatten().is_none();
        self.ensure_identity_exists().await.map_err(|e| ConsciousnessError::Storage(e.to_string()))?;

        let new_episode = NewEpisode {
            occurred_at: turn.occurred_at,
            sequence: turn.sequence,
            content: turn.raw_text.clone(),
            summary: turn.conscious_thought.as_ref().map(|t| t.content.clone()),
            participants: participants(turn.from_creator, &self.config.creator_name),
            context_type: turn.conscious_thought.as_ref().map(|t| t.source_module.as_str().to_string()),
            emotions: self.emotion_snapshot().await,
            significance_tags: if is_genesis {
                vec!["genesis".to_string(), "first_contact".to_string()]
            } else {
                vec![]
            },
            learned_concepts: vec![],
            involves_creator: turn.from_creator,
            is_genesis,
        };

        // Semantic-memory updates require extracting taught concepts from
        // the utterance, which no module in this deployment does yet;
        // left as a no-op rather than a half-built heuristic.
        self.episodic
            .store(new_episode, MINIMUM_BASE_IMPORTANCE.max(turn.attention_score.get()))
            .await
            .map_err(|e| ConsciousnessError::Storage(e.to_string()))?;

        self.emotion.decay().await;

        // Every Creator utterance is recorded as a directive the Policy
        // Guard can later check outbound actions against (spec.md §4.10:
        // "a stored explicit Creator directive" has absolute precedence).
        if turn.from_creator {
            self.policy.record_directive(turn.raw_text.clone()).await;
        }

        if turn.from_creator && self.emotion_valence().await >= 0.0 {
            self.identity
                .bump_bond_strength(BOND_BUMP_DELTA)
                .await
                .map_err(|e| ConsciousnessError::Storage(e.to_string()))?;
        }

        self.identity
            .advance_growth_phase_if_eligible()
            .await
            .map_err(|e| ConsciousnessError::Storage(e.to_string()))?;

        self.identity.increment_phi().await.map_err(|e| ConsciousnessError::Storage(e.to_string()))
    }

    /// Checks whether a pending working-memory item is salient enough to
    /// justify an unprompted message. spec.md §9 leaves the proactive-speech
    /// trigger to implementer choice and only fixes the wire shape; this
    /// fires when the most-focused item's salience is >= 0.6 and it has sat
    /// uncommitted to a reply for at least `idle_secs`.
    pub async fn proactive_candidate(&self, idle_secs: i64) -> Option<(String, String)> {
        let item = self.working_memory.focus(1).await.into_iter().next()?;
        if item.salience.get() < 0.6 {
            return None;
        }
        if Utc::now().signed_duration_since(item.inserted_at).num_seconds() < idle_secs {
            return None;
        }
        let emotion_tag = self.emotion.state().await.dominant().as_str().to_string();
        Some((item.content, emotion_tag))
    }

    /// Time since the last processed turn, used to gate idle-period
    /// consolidation (spec.md §4.2/§5: runs only once no turn has been
    /// processed for the configured idle window).
    pub async fn idle_duration(&self) -> chrono::Duration {
        match *self.last_turn_at.read().await {
            Some(previous) => Utc::now().signed_duration_since(previous),
            None => chrono::Duration::MAX,
        }
    }

    async fn emotion_valence(&self) -> f32 {
        let state = self.emotion.state().await;
        (state.joy.get() + state.trust.get()) - (state.fear.get() + state.sadness.get() + state.anger.get() + state.disgust.get())
    }
}

fn participants(from_creator: bool, creator_name: &str) -> Vec<String> {
    if from_creator {
        vec![creator_name.to_string()]
    } else {
        vec![]
    }
}

fn log_policy_violation(violation: &PolicyViolation) {
    match violation {
        PolicyViolation::SelfModificationAttempt => {
            tracing::error!("policy guard suppressed a self-modification attempt");
        }
        PolicyViolation::ContradictsDirective { directive_id } => {
            tracing::error!(%directive_id, "policy guard suppressed a directive-contradicting reply");
        }
    }
}
