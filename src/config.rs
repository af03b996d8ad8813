use std::env;
use std::time::Duration;

use crate::services::pricing::{
    DEFAULT_CACHE_TTL_SECONDS, DEFAULT_COMPLETION_MODEL, DEFAULT_FALLBACK_PRICE,
    DEFAULT_MAX_TOKENS, DEFAULT_TIMEOUT_SECONDS,
};

pub struct Config {
    pub database_url: String,
    pub frontend_origin: String,
    pub pricing: PricingSettings,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok(); // Load .env file

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let frontend_origin = env::var("FRONTEND_ORIGIN").expect("FRONTEND_ORIGIN must be set");

        Config {
            database_url,
            frontend_origin,
            pricing: PricingSettings::from_env(),
        }
    }
}

/// Settings for the completion-backed price recommendation path. Everything
/// here defaults, so a deployment with no completion endpoint configured
/// still serves the fallback price on every request.
pub struct PricingSettings {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub fallback_price: i64,
    pub cache_ttl: Duration,
}

impl PricingSettings {
    pub fn from_env() -> Self {
        let api_url = env::var("PRICING_API_URL").unwrap_or_default();
        let api_key = env::var("PRICING_API_KEY").unwrap_or_default();
        let model =
            env::var("PRICING_MODEL").unwrap_or_else(|_| DEFAULT_COMPLETION_MODEL.to_string());
        let max_tokens = env::var("PRICING_MAX_TOKENS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_TOKENS);
        let timeout_seconds = env::var("PRICING_TIMEOUT_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS);
        let fallback_price = env::var("PRICING_FALLBACK_PRICE")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|price| *price > 0)
            .unwrap_or(DEFAULT_FALLBACK_PRICE);
        let cache_ttl_seconds = env::var("PRICING_CACHE_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_CACHE_TTL_SECONDS);

        PricingSettings {
            api_url,
            api_key,
            model,
            max_tokens,
            timeout: Duration::from_secs(timeout_seconds),
            fallback_price,
            cache_ttl: Duration::from_secs(cache_ttl_seconds),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_url.trim().is_empty()
    }
}
