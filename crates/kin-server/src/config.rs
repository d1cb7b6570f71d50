//! Environment-driven configuration for the HTTP/WebSocket surface, on top
//! of the cognitive-loop tunables `kin-common::CoreConfig` already owns.
//! Grounded on `beagle-server::config::Config::from_env`'s builder/
//! defaults/Argon2-hash-resolution shape.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHasher, SaltString};
use argon2::Argon2;
use config::Environment;
use kin_common::CoreConfig;
use kin_policy::{compute_policy_hash, CANONICAL_RULE_TEXT};

#[derive(Clone, Debug)]
pub struct Config {
    pub core: CoreConfig,
    host: String,
    port: u16,
    database_url: String,
    max_db_connections: u32,
    jwt_secret: String,
    jwt_expiration_hours: i64,
    admin_password_hash: String,
    rate_limit_requests_per_minute: u32,
    anthropic_api_key: Option<String>,
    anthropic_model: String,
    policy_pinned_hash: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let core = CoreConfig::from_env()?;

        let settings = config::Config::builder()
            .add_source(Environment::default().separator("__"))
            .build()
            .context("failed to build server configuration")?;

        let host = settings.get_string("HOST").unwrap_or_else(|_| default_host().to_string());
        let port = settings.get_int("PORT").map(|v| v as u16).unwrap_or_else(|_| default_port());

        let database_url = settings
            .get_string("DATABASE_URL")
            .context("set DATABASE_URL to a Postgres connection string")?;

        let max_db_connections = settings
            .get_int("MAX_DB_CONNECTIONS")
            .map(|v| v.max(1) as u32)
            .unwrap_or(10);

        let jwt_secret = settings
            .get_string("JWT_SECRET")
            .unwrap_or_else(|_| default_jwt_secret().to_string());

        let jwt_expiration_hours = settings
            .get_int("JWT_EXPIRATION_HOURS")
            .unwrap_or_else(|_| default_jwt_expiration_hours());

        let password_hash = settings.get_string("ADMIN_PASSWORD_HASH").ok();
        let plain_password = settings.get_string("ADMIN_PASSWORD").ok();
        let admin_password_hash = resolve_password_hash(password_hash, plain_password.as_deref())?;

        let rate_limit_requests_per_minute = settings
            .get_int("RATE_LIMIT_REQUESTS_PER_MINUTE")
            .map(|v| v.max(1) as u32)
            .unwrap_or(100);

        let anthropic_api_key = settings.get_string("ANTHROPIC_API_KEY").ok();
        let anthropic_model = settings
            .get_string("ANTHROPIC_MODEL")
            .unwrap_or_else(|_| "claude-3-5-sonnet-latest".to_string());

        let policy_pinned_hash = settings
            .get_string("POLICY_PINNED_HASH")
            .unwrap_or_else(|_| compute_policy_hash(CANONICAL_RULE_TEXT));

        Ok(Self {
            core,
            host,
            port,
            database_url,
            max_db_connections,
            jwt_secret,
            jwt_expiration_hours,
            admin_password_hash,
            rate_limit_requests_per_minute,
            anthropic_api_key,
            anthropic_model,
            policy_pinned_hash,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn max_db_connections(&self) -> u32 {
        self.max_db_connections
    }

    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }

    pub fn jwt_expiration_hours(&self) -> i64 {
        self.jwt_expiration_hours
    }

    pub fn admin_password_hash(&self) -> &str {
        &self.admin_password_hash
    }

    pub fn rate_limit_requests_per_minute(&self) -> u32 {
        self.rate_limit_requests_per_minute
    }

    pub fn anthropic_api_key(&self) -> Option<&str> {
        self.anthropic_api_key.as_deref()
    }

    pub fn anthropic_model(&self) -> &str {
        &self.anthropic_model
    }

    pub fn policy_pinned_hash(&self) -> &str {
        &self.policy_pinned_hash
    }

    pub fn jwt_ttl(&self) -> Duration {
        Duration::from_secs((self.jwt_expiration_hours.max(0) * 3600) as u64)
    }
}

/// Same precedence chain as the teacher's admin credential resolution: an
/// explicit hash wins, then a plain password hashed on the fly, then a
/// deterministic fallback hash for the single-Creator default account.
fn resolve_password_hash(hash_from_env: Option<String>, plain_password: Option<&str>) -> Result<String> {
    if let Some(hash) = hash_from_env {
        return Ok(hash);
    }

    if let Some(password) = plain_password {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|err| anyhow!("failed to derive Argon2 hash for creator password: {err}"))?
            .to_string();
        return Ok(hash);
    }

    let salt = SaltString::encode_b64(b"kin-default-salt").expect("static salt is valid");
    let hash = Argon2::default()
        .hash_password(b"kin", &salt)
        .expect("deterministic Argon2 hash")
        .to_string();
    Ok(hash)
}

const fn default_port() -> u16 {
    8080
}

fn default_host() -> &'static str {
    "0.0.0.0"
}

fn default_jwt_secret() -> &'static str {
    "development-secret-change-in-production"
}

const fn default_jwt_expiration_hours() -> i64 {
    720
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_hash_wins_over_plain_password() {
        let resolved = resolve_password_hash(Some("already-hashed".to_string()), Some("plain")).unwrap();
        assert_eq!(resolved, "already-hashed");
    }

    #[test]
    fn plain_password_is_hashed_when_no_explicit_hash_given() {
        let resolved = resolve_password_hash(None, Some("hunter2")).unwrap();
        assert!(resolved.starts_with("$argon2"));
    }

    #[test]
    fn falls_back_to_deterministic_hash_when_nothing_configured() {
        let a = resolve_password_hash(None, None).unwrap();
        let b = resolve_password_hash(None, None).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("$argon2"));
    }
}
