use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::plan::PlanTier;
use crate::models::plan_change::{NewPlanChangeEntry, PlanChangeEntry, PlanChangePatch};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("plan change entry not found")]
    NotFound,
    #[error("plan change entry already finalized")]
    AlreadyFinalized,
    #[error("ledger storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Append-only audit log of plan transitions. Entries are never deleted and a
/// pending entry can be finalized exactly once.
#[async_trait]
pub trait PlanChangeRepository: Send + Sync {
    /// Appends a new entry with `status = pending` and a fresh id/timestamp.
    async fn create(&self, new_entry: NewPlanChangeEntry) -> Result<PlanChangeEntry, LedgerError>;

    /// Applies the terminal outcome for a pending entry. Fails with
    /// `NotFound` for unknown ids and `AlreadyFinalized` once the entry has
    /// left `pending`, so concurrent finalizers cannot both win.
    async fn update_status(
        &self,
        id: Uuid,
        patch: PlanChangePatch,
    ) -> Result<PlanChangeEntry, LedgerError>;

    /// All entries for a user, newest first, optionally bounded by creation
    /// time.
    async fn list_by_user(
        &self,
        user_id: &str,
        from: Option<OffsetDateTime>,
        to: Option<OffsetDateTime>,
    ) -> Result<Vec<PlanChangeEntry>, LedgerError>;

    /// Dashboard query: filter by email and/or creation window, newest first.
    async fn search(
        &self,
        email: Option<&str>,
        from: Option<OffsetDateTime>,
        to: Option<OffsetDateTime>,
    ) -> Result<Vec<PlanChangeEntry>, LedgerError>;

    /// The plan in effect: `to_plan` of the most recent completed entry, or
    /// `free` when the user has none.
    async fn current_plan(&self, user_id: &str) -> Result<PlanTier, LedgerError>;

    /// Earliest completed/failed entry recorded for a provider payment id.
    /// Powers the duplicate-delivery notification check.
    async fn find_finalized_by_payment(
        &self,
        payment_id: &str,
    ) -> Result<Option<PlanChangeEntry>, LedgerError>;
}
