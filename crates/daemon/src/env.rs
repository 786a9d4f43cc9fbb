// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub token_secret: String,
    pub refresh_token_secret: String,
    pub token_expiry: Duration,
    pub refresh_token_expiry: Duration,
    pub redis_url: String,
    pub database_url: String,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { name: "PORT", value: raw })?,
            Err(_) => 4000,
        };

        let token_secret =
            std::env::var("TOKEN_SECRET").map_err(|_| ConfigError::Missing("TOKEN_SECRET"))?;
        let refresh_token_secret = std::env::var("REFRESH_TOKEN_SECRET")
            .map_err(|_| ConfigError::Missing("REFRESH_TOKEN_SECRET"))?;

        let token_expiry = duration_var("TOKEN_EXPIRY", Duration::from_secs(1800))?;
        let refresh_token_expiry =
            duration_var("REFRESH_TOKEN_EXPIRY", Duration::from_secs(7 * 24 * 3600))?;

        let redis_host = std::env::var("REDIS_HOST").unwrap_or_else(|_| "localhost".into());
        let redis_port = std::env::var("REDIS_PORT").unwrap_or_else(|_| "6379".into());
        let redis_url = format!("redis://{redis_host}:{redis_port}");

        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        Ok(Self {
            port,
            token_secret,
            refresh_token_secret,
            token_expiry,
            refresh_token_expiry,
            redis_url,
            database_url,
        })
    }
}

fn duration_var(name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => {
            parse_duration(&raw).ok_or(ConfigError::Invalid { name, value: raw })
        }
        Err(_) => Ok(default),
    }
}

/// Parse `"1800s"`, `"30m"`, `"12h"`, `"7d"`, or bare seconds.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let (value, unit) = match raw.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&raw[..idx], Some(c)),
        _ => (raw, None),
    };
    let value: u64 = value.parse().ok()?;
    let seconds = match unit {
        None | Some('s') => value,
        Some('m') => value * 60,
        Some('h') => value * 3600,
        Some('d') => value * 86_400,
        _ => return None,
    };
    Some(Duration::from_secs(seconds))
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
