use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::plan::PlanTier;

#[derive(sqlx::Type, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[sqlx(type_name = "plan_change_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PlanChangeStatus {
    Pending,
    Completed,
    Failed,
}

impl PlanChangeStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PlanChangeStatus::Pending)
    }
}

/// One audit record of a plan transition attempt. Entries are append-only:
/// `from_plan`, `to_plan` and `payment_id` never change after creation, and
/// `status` moves pending -> completed|failed at most once.
#[derive(Debug, FromRow, Serialize, Deserialize, Clone)]
pub struct PlanChangeEntry {
    pub id: Uuid,
    pub user_id: String,
    pub user_email: String,
    pub from_plan: PlanTier,
    pub to_plan: PlanTier,
    pub payment_method: String,
    pub payment_id: String,
    pub reason: String,
    pub status: PlanChangeStatus,
    pub metadata: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct NewPlanChangeEntry {
    pub user_id: String,
    pub user_email: String,
    pub from_plan: PlanTier,
    pub to_plan: PlanTier,
    pub payment_method: String,
    pub payment_id: String,
    pub reason: String,
    pub metadata: serde_json::Value,
}

/// Terminal update for a pending entry. Plans and payment id are deliberately
/// absent; only the outcome fields may change.
#[derive(Debug, Clone)]
pub struct PlanChangePatch {
    pub status: PlanChangeStatus,
    pub reason: Option<String>,
    pub completed_at: Option<OffsetDateTime>,
}

/// Tabular projection served to the dashboard export (CSV rendering happens
/// downstream).
#[derive(Debug, Serialize, Deserialize)]
pub struct PlanChangeExportRow {
    pub email: String,
    pub previous_plan: PlanTier,
    pub new_plan: PlanTier,
    #[serde(with = "time::serde::rfc3339")]
    pub changed_at: OffsetDateTime,
}

impl From<&PlanChangeEntry> for PlanChangeExportRow {
    fn from(entry: &PlanChangeEntry) -> Self {
        PlanChangeExportRow {
            email: entry.user_email.clone(),
            previous_plan: entry.from_plan,
            new_plan: entry.to_plan,
            changed_at: entry.created_at,
        }
    }
}
