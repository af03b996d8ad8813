use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::{parse_suggestion, CompletionClient, PriceRecommendationCache};
use crate::db::recommendation_log_repository::RecommendationLogRepository;
use crate::models::recommendation::{
    NewRecommendationLogEntry, PriceRecommendation, RecommendationSource,
};

/// Normalized prompt prefix length used as the memoization key.
pub const PROMPT_KEY_MAX_CHARS: usize = 200;

/// Served whenever the completion endpoint cannot be reached or parsed.
pub const DEFAULT_FALLBACK_PRICE: i64 = 199_000;
pub const FALLBACK_REASON: &str =
    "Standard pricing applied while the recommendation service is unavailable";

/// Resolves price recommendations: cache first, then one live completion
/// call, then the configured fallback. `recommend` never returns an error;
/// checkout must not stall on the completion endpoint.
pub struct RecommendationGateway {
    client: Arc<dyn CompletionClient>,
    cache: PriceRecommendationCache,
    request_log: Arc<dyn RecommendationLogRepository>,
    fallback_price: i64,
}

impl RecommendationGateway {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        request_log: Arc<dyn RecommendationLogRepository>,
        fallback_price: i64,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            client,
            cache: PriceRecommendationCache::new(cache_ttl),
            request_log,
            fallback_price,
        }
    }

    /// Trims the prompt and keeps at most the first `PROMPT_KEY_MAX_CHARS`
    /// characters. Prompts sharing that prefix share one cache slot.
    pub fn prompt_key(prompt: &str) -> String {
        prompt.trim().chars().take(PROMPT_KEY_MAX_CHARS).collect()
    }

    pub async fn recommend(&self, prompt: &str, email: Option<&str>) -> PriceRecommendation {
        let key = Self::prompt_key(prompt);

        if let Some(mut hit) = self.cache.get(&key) {
            hit.source = RecommendationSource::Cache;
            self.record(email, &key, &hit).await;
            return hit;
        }

        let recommendation = match self
            .client
            .complete(prompt)
            .await
            .and_then(|raw| parse_suggestion(&raw))
        {
            Ok(suggestion) => PriceRecommendation {
                suggested_price: suggestion.suggested_price,
                reason: suggestion.reason,
                source: RecommendationSource::Live,
            },
            Err(err) => {
                warn!(?err, "Completion failed, serving fallback price");
                PriceRecommendation {
                    suggested_price: self.fallback_price,
                    reason: FALLBACK_REASON.to_string(),
                    source: RecommendationSource::Fallback,
                }
            }
        };

        // The fallback is cached too, so repeated failures for the same
        // prompt do not hammer the completion endpoint.
        self.cache.insert(&key, recommendation.clone());
        self.record(email, &key, &recommendation).await;
        recommendation
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    async fn record(&self, email: Option<&str>, prompt_key: &str, value: &PriceRecommendation) {
        let entry = NewRecommendationLogEntry {
            email: email.map(|e| e.to_string()),
            prompt_key: prompt_key.to_string(),
            suggested_price: value.suggested_price,
            reason: value.reason.clone(),
            source: value.source,
        };
        if let Err(err) = self.request_log.record(entry).await {
            warn!(?err, "Failed to record recommendation request");
        }
    }
}
