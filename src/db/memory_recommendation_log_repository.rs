use async_trait::async_trait;
use std::sync::Mutex;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::recommendation::{NewRecommendationLogEntry, RecommendationLogEntry};

use super::recommendation_log_repository::RecommendationLogRepository;

/// Recording stand-in used by gateway tests.
#[allow(dead_code)]
#[derive(Default)]
pub struct InMemoryRecommendationLogRepository {
    pub records: Mutex<Vec<RecommendationLogEntry>>,
    pub fail_writes: bool,
}

#[async_trait]
impl RecommendationLogRepository for InMemoryRecommendationLogRepository {
    async fn record(&self, entry: NewRecommendationLogEntry) -> Result<(), sqlx::Error> {
        if self.fail_writes {
            return Err(sqlx::Error::PoolClosed);
        }
        self.records.lock().unwrap().push(RecommendationLogEntry {
            id: Uuid::new_v4(),
            email: entry.email,
            prompt_key: entry.prompt_key,
            suggested_price: entry.suggested_price,
            reason: entry.reason,
            source: entry.source,
            created_at: OffsetDateTime::now_utc(),
        });
        Ok(())
    }
}
