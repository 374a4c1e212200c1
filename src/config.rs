use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tracing::{info, warn};

use crate::moderation::GEMINI_BASE_URL;
use crate::store::RetryPolicy;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub store_url: String,
    pub store_api_key: String,
    pub access_token: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    /// Auto-approve images when no oracle key is configured
    pub moderation_bypass_unconfigured: bool,
    pub store_max_retries: u32,
    pub store_retry_base: Duration,
    pub http_timeout: Duration,
    pub images_bucket: String,
    pub guest_favorites_path: PathBuf,
    /// Flat fee for the optional cleaning service on rentals
    pub cleaning_fee: f64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let config = Self {
            store_url: env::var("SUPABASE_URL").context("SUPABASE_URL must be set")?,
            store_api_key: env::var("SUPABASE_ANON_KEY")
                .context("SUPABASE_ANON_KEY must be set")?,
            access_token: non_empty("SUPABASE_ACCESS_TOKEN"),
            gemini_api_key: non_empty("GEMINI_API_KEY"),
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
            gemini_base_url: env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| GEMINI_BASE_URL.to_string()),
            moderation_bypass_unconfigured: parse_or("MODERATION_BYPASS_UNCONFIGURED", true)?,
            store_max_retries: parse_or("STORE_MAX_RETRIES", 2)?,
            store_retry_base: Duration::from_millis(parse_or("STORE_RETRY_BASE_MS", 500)?),
            http_timeout: Duration::from_secs(parse_or("HTTP_TIMEOUT_SECS", 30)?),
            images_bucket: env::var("LISTING_IMAGES_BUCKET")
                .unwrap_or_else(|_| "listing-images".to_string()),
            guest_favorites_path: env::var("GUEST_FAVORITES_PATH")
                .unwrap_or_else(|_| "favorites.json".to_string())
                .into(),
            cleaning_fee: parse_or("CLEANING_SERVICE_FEE", 15.0)?,
        };

        if config.gemini_api_key.is_none() {
            if config.moderation_bypass_unconfigured {
                warn!("GEMINI_API_KEY not set, image moderation will auto-approve");
            } else {
                warn!("GEMINI_API_KEY not set, image moderation will reject every image");
            }
        }
        info!(
            store = %config.store_url,
            signed_in = config.access_token.is_some(),
            "Configuration loaded"
        );

        Ok(config)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.store_max_retries, self.store_retry_base)
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {}", key, raw)),
        Err(_) => Ok(default),
    }
}
