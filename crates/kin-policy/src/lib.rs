//! C10 Policy Guard: the immutable, content-addressed rule that the
//! Creator's directive has absolute precedence over every outbound
//! response and state mutation.

pub mod guard;

pub use guard::{
    compute_policy_hash, CreatorDirective, PolicyError, PolicyGuard, PolicyViolation,
    CANONICAL_RULE_TEXT,
};
