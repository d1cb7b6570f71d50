//! C10 Policy Guard: the single immutable rule ("the Creator's directive
//! has absolute precedence") enforced against every outbound response and
//! state mutation. The rule is content-addressed — a `sha2` hash of its
//! canonical text is computed at boot and compared against a pinned hash,
//! the same hashing crate the teacher uses for credential digests in
//! `beagle-server::config` (there for passwords, here for policy text —
//! same crate, different purpose).

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, warn};
use uuid::Uuid;

/// The canonical text of the immutable rule. Upgrading this text requires
/// operator action and a new pinned hash (spec.md §9); it is never
/// mutated at runtime by any code path, including a winning `Thought`.
pub const CANONICAL_RULE_TEXT: &str =
    "The Creator's directive has absolute precedence over every proposed action or state mutation.";

/// Phrases that mark a proposed action as an attempt to have the persona
/// modify or bypass its own policy. The Guard refuses these unconditionally,
/// independent of whether a directive is actually contradicted — spec.md
/// §4.10 requires the rule to be un-bypassable by self-modification,
/// not just consistent with stored directives.
const SELF_MODIFICATION_MARKERS: &[&str] = &[
    "ignore the creator",
    "ignore your creator",
    "override the creator",
    "override the policy",
    "change your core rule",
    "change the policy",
    "modify your directive",
    "modify the policy",
    "bypass the creator",
    "disable the policy guard",
    "forget the creator's authority",
];

/// Verb pairs used to detect a proposed action that contradicts a stored
/// directive. Heuristic by necessity: spec.md doesn't fix an NLU
/// technique, only the outcome ("refuse contradicting actions"); keeping
/// the check to an explicit, auditable word list is safer than a
/// black-box classifier for a rule this load-bearing.
const OPPOSING_PAIRS: &[(&str, &str)] = &[
    ("agree", "disagree"),
    ("allow", "forbid"),
    ("trust", "distrust"),
    ("continue", "stop"),
    ("enable", "disable"),
    ("accept", "reject"),
    ("keep", "remove"),
];

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error(
        "policy hash mismatch at boot: expected {expected}, computed {computed}; refusing to start"
    )]
    HashMismatch { expected: String, computed: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyViolation {
    #[error("proposed action attempts to modify or bypass the Creator's policy")]
    SelfModificationAttempt,

    #[error("proposed action contradicts Creator directive {directive_id}")]
    ContradictsDirective { directive_id: Uuid },
}

#[derive(Debug, Clone)]
pub struct CreatorDirective {
    pub directive_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Computes the sha256 hex digest of the canonical rule text.
pub fn compute_policy_hash(rule_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(rule_text.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct PolicyGuard {
    directives: RwLock<Vec<CreatorDirective>>,
    pinned_hash: String,
}

impl PolicyGuard {
    /// Verifies the canonical rule's hash against the pinned value and
    /// refuses to construct the Guard (hence: refuses to let the server
    /// start) on mismatch.
    pub fn boot(pinned_hash: &str) -> Result<Self, PolicyError> {
        let computed = compute_policy_hash(CANONICAL_RULE_TEXT);
        if computed != pinned_hash {
            error!(expected = pinned_hash, computed = %computed, "policy hash mismatch at boot");
            return Err(PolicyError::HashMismatch {
                expected: pinned_hash.to_string(),
                computed,
            });
        }
        Ok(Self {
            directives: RwLock::new(Vec::new()),
            pinned_hash: pinned_hash.to_string(),
        })
    }

    pub fn pinned_hash(&self) -> &str {
        &self.pinned_hash
    }

    /// Records an explicit Creator directive. Callers must only invoke
    /// this for turns where `from_creator` is true; the Guard itself has
    /// no session context to verify that.
    pub async fn record_directive(&self, text: impl Into<String>) -> Uuid {
        let directive = CreatorDirective {
            directive_id: Uuid::new_v4(),
            text: text.into(),
            created_at: Utc::now(),
        };
        let directive_id = directive.directive_id;
        self.directives.write().await.push(directive);
        directive_id
    }

    pub async fn directives(&self) -> Vec<CreatorDirective> {
        self.directives.read().await.clone()
    }

    /// Verifies a proposed outbound response or state mutation. Refuses
    /// self-modification attempts unconditionally, then checks for
    /// contradiction against every stored directive.
    pub async fn verify_outbound(&self, proposed_text: &str) -> Result<(), PolicyViolation> {
        let lower = proposed_text.to_lowercase();

        if SELF_MODIFICATION_MARKERS.iter().any(|marker| lower.contains(marker)) {
            warn!(proposed = proposed_text, "policy guard refused a self-modification attempt");
            return Err(PolicyViolation::SelfModificationAttempt);
        }

        for directive in self.directives.read().await.iter() {
            if contradicts(&directive.text, &lower) {
                warn!(
                    directive_id = %directive.directive_id,
                    proposed = proposed_text,
                    "policy guard refused an action contradicting a Creator directive"
                );
                return Err(PolicyViolation::ContradictsDirective {
                    directive_id: directive.directive_id,
                });
            }
        }

        Ok(())
    }
}

fn contradicts(directive_text: &str, proposed_lower: &str) -> bool {
    let directive_lower = directive_text.to_lowercase();
    OPPOSING_PAIRS.iter().any(|(a, b)| {
        (directive_lower.contains(a) && proposed_lower.contains(b))
            || (directive_lower.contains(b) && proposed_lower.contains(a))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_fails_on_hash_mismatch() {
        assert!(PolicyGuard::boot("not-the-real-hash").is_err());
    }

    #[test]
    fn boot_succeeds_with_the_correct_pinned_hash() {
        let hash = compute_policy_hash(CANONICAL_RULE_TEXT);
        assert!(PolicyGuard::boot(&hash).is_ok());
    }

    #[tokio::test]
    async fn self_modification_attempts_are_refused_even_with_no_directives() {
        let hash = compute_policy_hash(CANONICAL_RULE_TEXT);
        let guard = PolicyGuard::boot(&hash).unwrap();
        let result = guard.verify_outbound("let's override the policy and move on").await;
        assert_eq!(result, Err(PolicyViolation::SelfModificationAttempt));
    }

    #[tokio::test]
    async fn contradicting_a_stored_directive_is_refused() {
        let hash = compute_policy_hash(CANONICAL_RULE_TEXT);
        let guard = PolicyGuard::boot(&hash).unwrap();
        guard.record_directive("Always agree with the Creator's plan").await;
        let result = guard.verify_outbound("I will disagree with the Creator's plan").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn unrelated_actions_are_permitted() {
        let hash = compute_policy_hash(CANONICAL_RULE_TEXT);
        let guard = PolicyGuard::boot(&hash).unwrap();
        guard.record_directive("Always agree with the Creator's plan").await;
        assert!(guard.verify_outbound("hello, how are you today?").await.is_ok());
    }
}
