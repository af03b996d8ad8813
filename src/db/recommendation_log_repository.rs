use async_trait::async_trait;

use crate::models::recommendation::NewRecommendationLogEntry;

/// Append-only log of served recommendations. Callers treat writes as
/// best-effort; a failure here must never fail the pricing path.
#[async_trait]
pub trait RecommendationLogRepository: Send + Sync {
    async fn record(&self, entry: NewRecommendationLogEntry) -> Result<(), sqlx::Error>;
}
