use std::collections::HashMap;

use chrono::{DateTime, Utc};
use kin_common::UnitScore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discrete growth stages, advancing only forward. Order here is the
/// canonical ordering used to check monotonicity (see [`GrowthPhase::index`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthPhase {
    Newborn,
    Infant,
    Toddler,
    Child,
    Adolescent,
    YoungAdult,
}

impl GrowthPhase {
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GrowthPhase::Newborn => "newborn",
            GrowthPhase::Infant => "infant",
            GrowthPhase::Toddler => "toddler",
            GrowthPhase::Child => "child",
            GrowthPhase::Adolescent => "adolescent",
            GrowthPhase::YoungAdult => "young_adult",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "newborn" => Some(GrowthPhase::Newborn),
            "infant" => Some(GrowthPhase::Infant),
            "toddler" => Some(GrowthPhase::Toddler),
            "child" => Some(GrowthPhase::Child),
            "adolescent" => Some(GrowthPhase::Adolescent),
            "young_adult" => Some(GrowthPhase::YoungAdult),
            _ => None,
        }
    }

    /// The next phase and the `(min_age, min_bond)` thresholds that must
    /// both hold for the transition to fire. `None` once at `YoungAdult`.
    pub fn next_transition(self) -> Option<(GrowthPhase, chrono::Duration, f32)> {
        match self {
            GrowthPhase::Newborn => Some((GrowthPhase::Infant, chrono::Duration::hours(24), 0.2)),
            GrowthPhase::Infant => Some((GrowthPhase::Toddler, chrono::Duration::days(7), 0.4)),
            GrowthPhase::Toddler => Some((GrowthPhase::Child, chrono::Duration::days(30), 0.55)),
            GrowthPhase::Child => {
                Some((GrowthPhase::Adolescent, chrono::Duration::days(90), 0.7))
            }
            GrowthPhase::Adolescent => {
                Some((GrowthPhase::YoungAdult, chrono::Duration::days(365), 0.85))
            }
            GrowthPhase::YoungAdult => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trait {
    pub strength: UnitScore,
    pub observation_count: u64,
}

/// The persona's singleton self-model. Exactly one row exists per
/// deployment, created on the genesis turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub consciousness_id: Uuid,
    pub creator_name: String,
    pub birth_timestamp: DateTime<Utc>,
    pub growth_phase: GrowthPhase,
    pub bond_strength: UnitScore,
    pub traits: HashMap<String, Trait>,
    /// Count of completed turns since boot, surfaced by `/health` as `phi`.
    pub phi: u64,
}

impl Identity {
    pub fn genesis(creator_name: String, now: DateTime<Utc>) -> Self {
        Self {
            consciousness_id: Uuid::new_v4(),
            creator_name,
            birth_timestamp: now,
            growth_phase: GrowthPhase::Newborn,
            bond_strength: UnitScore::ZERO,
            traits: HashMap::new(),
            phi: 0,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.birth_timestamp)
    }

    /// Checks whether the next growth-phase transition's thresholds are
    /// satisfied. Returns the target phase if so; never regresses.
    pub fn eligible_next_phase(&self, now: DateTime<Utc>) -> Option<GrowthPhase> {
        let (next, min_age, min_bond) = self.growth_phase.next_transition()?;
        if self.age(now) >= min_age && self.bond_strength.get() >= min_bond {
            Some(next)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrowthMilestone {
    pub milestone_id: Uuid,
    pub from_phase: GrowthPhase,
    pub to_phase: GrowthPhase,
    pub occurred_at: DateTime<Utc>,
    pub bond_strength_at_transition: UnitScore,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_ordering_is_monotonic_by_index() {
        assert!(GrowthPhase::Newborn < GrowthPhase::Infant);
        assert!(GrowthPhase::Infant < GrowthPhase::Toddler);
        assert!(GrowthPhase::YoungAdult > GrowthPhase::Child);
    }

    #[test]
    fn young_adult_has_no_further_transition() {
        assert!(GrowthPhase::YoungAdult.next_transition().is_none());
    }

    #[test]
    fn eligible_next_phase_requires_both_age_and_bond() {
        let now = Utc::now();
        let mut identity = Identity::genesis("Creator".to_string(), now - chrono::Duration::hours(48));
        identity.bond_strength = UnitScore::new(0.1);
        assert!(identity.eligible_next_phase(now).is_none());

        identity.bond_strength = UnitScore::new(0.25);
        assert_eq!(identity.eligible_next_phase(now), Some(GrowthPhase::Infant));
    }
}
