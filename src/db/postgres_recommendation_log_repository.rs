use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::recommendation::NewRecommendationLogEntry;

use super::recommendation_log_repository::RecommendationLogRepository;

pub struct PostgresRecommendationLogRepository {
    pub pool: PgPool,
}

#[async_trait]
impl RecommendationLogRepository for PostgresRecommendationLogRepository {
    async fn record(&self, entry: NewRecommendationLogEntry) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO recommendation_log (id, email, prompt_key, suggested_price, reason, source, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, now())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&entry.email)
        .bind(&entry.prompt_key)
        .bind(entry.suggested_price)
        .bind(&entry.reason)
        .bind(entry.source)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
