#![allow(dead_code)]

use async_trait::async_trait;
use http::StatusCode;
use serde::{Deserialize, Serialize};

mod cache;
mod client;
mod gateway;
mod mock;

#[allow(unused_imports)]
pub use cache::{PriceRecommendationCache, DEFAULT_CACHE_TTL_SECONDS};
#[allow(unused_imports)]
pub use client::{
    HttpCompletionClient, DEFAULT_COMPLETION_MODEL, DEFAULT_MAX_TOKENS, DEFAULT_TIMEOUT_SECONDS,
};
#[allow(unused_imports)]
pub use gateway::{
    RecommendationGateway, DEFAULT_FALLBACK_PRICE, FALLBACK_REASON, PROMPT_KEY_MAX_CHARS,
};
#[allow(unused_imports)]
pub use mock::MockCompletionClient;

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("completion API error {status}: {message}")]
    Api { status: StatusCode, message: String },
    #[error("invalid completion response: {0}")]
    InvalidResponse(String),
    #[error("completion request timed out after {0}s")]
    Timeout(u64),
}

/// Request body for the text-completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub max_tokens: u32,
    pub prompt: String,
}

/// Response body from the text-completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub completion: String,
}

/// Shape the model is instructed to produce inside its completion text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PriceSuggestion {
    pub suggested_price: i64,
    pub reason: String,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Sends the prompt to the completion endpoint and returns the raw
    /// completion text.
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

/// Parses a raw completion into a price suggestion. The model is told to
/// answer with a single JSON object, so anything else is rejected rather
/// than repaired.
pub fn parse_suggestion(raw: &str) -> Result<PriceSuggestion, CompletionError> {
    let trimmed = raw.trim();
    let suggestion: PriceSuggestion = serde_json::from_str(trimmed)
        .map_err(|err| CompletionError::InvalidResponse(err.to_string()))?;
    if suggestion.suggested_price <= 0 {
        return Err(CompletionError::InvalidResponse(format!(
            "suggestedPrice must be positive, got {}",
            suggestion.suggested_price
        )));
    }
    Ok(suggestion)
}
