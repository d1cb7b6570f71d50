use chrono::Utc;
use kin_common::UnitScore;
use sqlx::{PgPool, Row};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::model::{GrowthMilestone, GrowthPhase, Identity, Trait};

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("identity not found; genesis has not happened yet")]
    NotFound,

    #[error("creator_name is immutable and cannot be changed after first write")]
    CreatorNameImmutable,
}

/// Caches the singleton [`Identity`] row in memory, written through a
/// single writer. Bond-strength updates use compare-and-swap against the
/// stored `phi`-free snapshot; the spec tolerates dropping a bump on
/// conflict rather than blocking the turn.
pub struct IdentityStore {
    pool: PgPool,
    cached: RwLock<Option<Identity>>,
}

impl IdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            cached: RwLock::new(None),
        }
    }

    /// Loads the identity row into cache, if one exists. Returns `Ok(None)`
    /// if no genesis has happened yet, rather than an error — callers use
    /// this to decide whether the next turn is the genesis turn.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Option<Identity>, IdentityError> {
        if let Some(identity) = self.cached.read().await.clone() {
            return Ok(Some(identity));
        }

        let row = sqlx::query(
            "SELECT consciousness_id, creator_name, birth_timestamp, growth_phase, \
             bond_strength, phi FROM identity LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let growth_phase_str: String = row.get("growth_phase");
        let identity = Identity {
            consciousness_id: row.get("consciousness_id"),
            creator_name: row.get("creator_name"),
            birth_timestamp: row.get("birth_timestamp"),
            growth_phase: GrowthPhase::parse(&growth_phase_str).unwrap_or(GrowthPhase::Newborn),
            bond_strength: UnitScore::new(row.get::<f32, _>("bond_strength")),
            traits: self.load_traits().await?,
            phi: row.get::<i64, _>("phi") as u64,
        };

        *self.cached.write().await = Some(identity.clone());
        Ok(Some(identity))
    }

    async fn load_traits(&self) -> Result<std::collections::HashMap<String, Trait>, IdentityError> {
        let rows = sqlx::query("SELECT trait_name, strength, observation_count FROM personality_traits")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let name: String = row.get("trait_name");
                let trait_value = Trait {
                    strength: UnitScore::new(row.get::<f32, _>("strength")),
                    observation_count: row.get::<i64, _>("observation_count") as u64,
                };
                (name, trait_value)
            })
            .collect())
    }

    /// Creates the genesis identity row. Invariant I1 ("identity exists iff
    /// a genesis episodic memory exists") is maintained by the caller: the
    /// consciousness loop's Phase 10 writes the genesis `EpisodicMemory`
    /// and calls this in the same turn, before any other phase can observe
    /// a half-created identity.
    #[instrument(skip(self))]
    pub async fn create_genesis(&self, creator_name: String) -> Result<Identity, IdentityError> {
        let identity = Identity::genesis(creator_name, Utc::now());

        sqlx::query(
            "INSERT INTO identity (consciousness_id, creator_name, birth_timestamp, \
             growth_phase, bond_strength, phi) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(identity.consciousness_id)
        .bind(&identity.creator_name)
        .bind(identity.birth_timestamp)
        .bind(identity.growth_phase.as_str())
        .bind(identity.bond_strength.get())
        .bind(identity.phi as i64)
        .execute(&self.pool)
        .await?;

        *self.cached.write().await = Some(identity.clone());
        info!(consciousness_id = %identity.consciousness_id, "genesis identity created");
        Ok(identity)
    }

    /// Bumps `bond_strength` by `delta`, clamped to `[0, 1]`. Uses
    /// optimistic concurrency against the cached snapshot; on a mismatch
    /// (another writer updated between read and write) retries exactly
    /// once, then drops the bump for this turn per the spec's ordering
    /// guarantees rather than blocking.
    #[instrument(skip(self))]
    pub async fn bump_bond_strength(&self, delta: f32) -> Result<(), IdentityError> {
        for attempt in 0..2 {
            let Some(current) = self.load().await? else {
                return Err(IdentityError::NotFound);
            };

            let updated = UnitScore::new(current.bond_strength.get() + delta);
            if updated.get() < current.bond_strength.get() {
                // Bond strength is monotone non-decreasing; never write a regression.
                return Ok(());
            }

            let result = sqlx::query(
                "UPDATE identity SET bond_strength = $1 \
                 WHERE consciousness_id = $2 AND bond_strength = $3",
            )
            .bind(updated.get())
            .bind(current.consciousness_id)
            .bind(current.bond_strength.get())
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 1 {
                let mut cached = self.cached.write().await;
                if let Some(identity) = cached.as_mut() {
                    identity.bond_strength = updated;
                }
                return Ok(());
            }

            // Someone else updated bond_strength between read and write; drop the
            // stale cache entry and retry once against fresh state.
            *self.cached.write().await = None;
            warn!(attempt, "bond_strength compare-and-swap conflict, retrying");
        }

        warn!("bond_strength update dropped after one retry");
        Ok(())
    }

    /// Advances `growth_phase` if the next transition's thresholds are met,
    /// recording a milestone row. No-op if not yet eligible.
    #[instrument(skip(self))]
    pub async fn advance_growth_phase_if_eligible(
        &self,
    ) -> Result<Option<GrowthMilestone>, IdentityError> {
        let Some(identity) = self.load().await? else {
            return Err(IdentityError::NotFound);
        };

        let now = Utc::now();
        let Some(next_phase) = identity.eligible_next_phase(now) else {
            return Ok(None);
        };

        sqlx::query("UPDATE identity SET growth_phase = $1 WHERE consciousness_id = $2")
            .bind(next_phase.as_str())
            .bind(identity.consciousness_id)
            .execute(&self.pool)
            .await?;

        let milestone = GrowthMilestone {
            milestone_id: Uuid::new_v4(),
            from_phase: identity.growth_phase,
            to_phase: next_phase,
            occurred_at: now,
            bond_strength_at_transition: identity.bond_strength,
        };

        sqlx::query(
            "INSERT INTO growth_milestones (milestone_id, from_phase, to_phase, \
             occurred_at, bond_strength_at_transition) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(milestone.milestone_id)
        .bind(milestone.from_phase.as_str())
        .bind(milestone.to_phase.as_str())
        .bind(milestone.occurred_at)
        .bind(milestone.bond_strength_at_transition.get())
        .execute(&self.pool)
        .await?;

        if let Some(cached) = self.cached.write().await.as_mut() {
            cached.growth_phase = next_phase;
        }

        info!(from = identity.growth_phase.as_str(), to = next_phase.as_str(), "growth phase advanced");
        Ok(Some(milestone))
    }

    /// Records an observation of a trait, nudging its strength toward 1.0
    /// with a simple running update (`new = old + (1 - old) * 0.1`) and
    /// incrementing the observation count.
    #[instrument(skip(self))]
    pub async fn observe_trait(&self, name: &str, learning_rate: f32) -> Result<(), IdentityError> {
        let current = {
            let cached = self.cached.read().await;
            cached
                .as_ref()
                .and_then(|identity| identity.traits.get(name).cloned())
        };

        let (updated_strength, observation_count) = match current {
            Some(existing) => (
                existing.strength.get() + (1.0 - existing.strength.get()) * learning_rate,
                existing.observation_count + 1,
            ),
            None => (learning_rate, 1),
        };

        sqlx::query(
            "INSERT INTO personality_traits (trait_name, strength, observation_count) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (trait_name) DO UPDATE \
             SET strength = EXCLUDED.strength, observation_count = EXCLUDED.observation_count",
        )
        .bind(name)
        .bind(updated_strength)
        .bind(observation_count as i64)
        .execute(&self.pool)
        .await?;

        if let Some(identity) = self.cached.write().await.as_mut() {
            identity.traits.insert(
                name.to_string(),
                Trait {
                    strength: UnitScore::new(updated_strength),
                    observation_count,
                },
            );
        }

        Ok(())
    }

    /// Increments `phi`, the monotone turn counter surfaced by `/health`.
    #[instrument(skip(self))]
    pub async fn increment_phi(&self) -> Result<u64, IdentityError> {
        let row = sqlx::query(
            "UPDATE identity SET phi = phi + 1 \
             WHERE consciousness_id = (SELECT consciousness_id FROM identity LIMIT 1) \
             RETURNING phi",
        )
        .fetch_one(&self.pool)
        .await?;

        let phi = row.get::<i64, _>("phi") as u64;
        if let Some(identity) = self.cached.write().await.as_mut() {
            identity.phi = phi;
        }
        Ok(phi)
    }
}

