use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::models::recommendation::PriceRecommendation;

pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 3600;

#[derive(Clone, Debug)]
struct CachedRecommendation {
    value: PriceRecommendation,
    inserted_at: Instant,
}

/// Keyed by normalized prompt prefix. Entries expire lazily on read, so a
/// stale entry occupies memory until the same key is requested again or the
/// whole cache is cleared.
pub struct PriceRecommendationCache {
    entries: DashMap<String, CachedRecommendation>,
    ttl: Duration,
}

impl PriceRecommendationCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<PriceRecommendation> {
        if let Some(cached) = self.entries.get(key) {
            if cached.inserted_at.elapsed() < self.ttl {
                debug!(%key, "Recommendation cache hit");
                return Some(cached.value.clone());
            }

            debug!(%key, "Cached recommendation expired, evicting");
            drop(cached);
            self.entries.remove(key);
        } else {
            debug!(%key, "Recommendation cache miss");
        }

        None
    }

    pub fn insert(&self, key: &str, value: PriceRecommendation) {
        self.entries.insert(
            key.to_string(),
            CachedRecommendation {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
