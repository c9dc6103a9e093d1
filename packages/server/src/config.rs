use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::kernel::GEMINI_2_5_FLASH;

/// Descriptive source fields stop being refreshed once a source has been
/// updated this many times.
pub const SOURCE_UPDATE_LIMIT: i32 = 2;

/// Words per minute used for reading-time estimates.
pub const DEFAULT_READING_WPM: usize = 400;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub port: u16,
    /// Shared secret for `x-cf-signature`. The webhook answers 500 while unset.
    pub webhook_secret: Option<String>,
    /// Without a key the extractor runs heuristics only.
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub ingest: IngestSettings,
}

/// Settings consumed on the request path.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    /// Reserved domain for per-user forwarding addresses.
    pub inbox_domain: String,
    /// Our own outbound sender; mail addressed to it is a bounce artifact.
    pub mail_from: String,
    pub ai_timeout: Duration,
    pub source_update_limit: i32,
    pub reading_wpm: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            inbox_domain: "lettertr.ee".to_string(),
            mail_from: "noreply@lettertr.ee".to_string(),
            ai_timeout: Duration::from_secs(20),
            source_update_limit: SOURCE_UPDATE_LIMIT,
            reading_wpm: DEFAULT_READING_WPM,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let defaults = IngestSettings::default();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10)?,
            port: parse_or("PORT", 8080)?,
            webhook_secret: non_empty_var("CLOUDFLARE_EMAIL_WEBHOOK_SECRET"),
            gemini_api_key: non_empty_var("GEMINI_API_KEY"),
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| GEMINI_2_5_FLASH.to_string()),
            ingest: IngestSettings {
                inbox_domain: env::var("INBOX_DOMAIN")
                    .map(|d| d.trim_start_matches('@').to_lowercase())
                    .unwrap_or(defaults.inbox_domain),
                mail_from: env::var("MAIL_FROM")
                    .map(|m| m.to_lowercase())
                    .unwrap_or(defaults.mail_from),
                ai_timeout: Duration::from_secs(parse_or("AI_TIMEOUT_SECS", 20)?),
                source_update_limit: parse_or("SOURCE_UPDATE_LIMIT", SOURCE_UPDATE_LIMIT)?,
                reading_wpm: defaults.reading_wpm,
            },
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .ok()
            .with_context(|| format!("{} must be a valid number", key)),
        Err(_) => Ok(default),
    }
}
