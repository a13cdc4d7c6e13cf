use anyhow::{anyhow, Context};
use chrono::Duration;
use std::env;
use std::str::FromStr;

use crate::auth::{PasswordHasher, TokenService};

/// Prefix of `DATABASE_URL` that selects the in-memory store.
pub const MEMORY_DATABASE_URL: &str = "memory://";

/// Longest token lifetime accepted from the environment (ten years).
pub const MAX_TOKEN_TTL_SECS: i64 = 10 * 365 * 24 * 3600;

/// Runtime settings, read from the environment (after `.env` is loaded).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub server_host: String,
    pub server_port: u16,
    pub jwt_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub bcrypt_cost: u32,
    pub rate_limit_per_minute: u32,
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<String> {
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| anyhow!("{} must be set", key))
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number, got {:?}", key, raw)),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key/value source. Missing optional keys fall
    /// back to their defaults; malformed values are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let config = Self {
            database_url: required(&lookup, "DATABASE_URL")?,
            database_max_connections: parsed(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            server_port: parsed(&lookup, "SERVER_PORT", 8080)?,
            jwt_secret: required(&lookup, "JWT_SECRET")?,
            access_token_ttl_secs: parsed(&lookup, "JWT_ACCESS_TTL_SECS", 3600)?,
            refresh_token_ttl_secs: parsed(&lookup, "JWT_REFRESH_TTL_SECS", 30 * 24 * 3600)?,
            bcrypt_cost: parsed(&lookup, "BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            rate_limit_per_minute: parsed(&lookup, "RATE_LIMIT_PER_MINUTE", 100)?,
        };

        for (key, ttl) in [
            ("JWT_ACCESS_TTL_SECS", config.access_token_ttl_secs),
            ("JWT_REFRESH_TTL_SECS", config.refresh_token_ttl_secs),
        ] {
            if !(1..=MAX_TOKEN_TTL_SECS).contains(&ttl) {
                return Err(anyhow!(
                    "{} must be between 1 and {} seconds",
                    key,
                    MAX_TOKEN_TTL_SECS
                ));
            }
        }
        if !(4..=31).contains(&config.bcrypt_cost) {
            return Err(anyhow!("BCRYPT_COST must be between 4 and 31"));
        }
        if config.rate_limit_per_minute == 0 {
            return Err(anyhow!("RATE_LIMIT_PER_MINUTE must be at least 1"));
        }
        Ok(config)
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url.starts_with(MEMORY_DATABASE_URL)
    }

    pub fn token_service(&self) -> TokenService {
        TokenService::new(
            &self.jwt_secret,
            Duration::seconds(self.access_token_ttl_secs),
            Duration::seconds(self.refresh_token_ttl_secs),
        )
    }

    pub fn password_hasher(&self) -> PasswordHasher {
        PasswordHasher::new(self.bcrypt_cost)
    }
}
