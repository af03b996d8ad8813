use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Where a served price came from.
#[derive(sqlx::Type, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[sqlx(type_name = "recommendation_source", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RecommendationSource {
    Cache,
    Live,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRecommendation {
    pub suggested_price: i64,
    pub reason: String,
    pub source: RecommendationSource,
}

/// Append-only record of one served recommendation, kept for later analysis.
#[derive(Debug, FromRow, Serialize, Deserialize, Clone)]
pub struct RecommendationLogEntry {
    pub id: Uuid,
    pub email: Option<String>,
    pub prompt_key: String,
    pub suggested_price: i64,
    pub reason: String,
    pub source: RecommendationSource,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewRecommendationLogEntry {
    pub email: Option<String>,
    pub prompt_key: String,
    pub suggested_price: i64,
    pub reason: String,
    pub source: RecommendationSource,
}
