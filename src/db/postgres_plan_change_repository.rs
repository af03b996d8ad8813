use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::plan::PlanTier;
use crate::models::plan_change::{
    NewPlanChangeEntry, PlanChangeEntry, PlanChangePatch, PlanChangeStatus,
};

use super::plan_change_repository::{LedgerError, PlanChangeRepository};

pub struct PostgresPlanChangeRepository {
    pub pool: PgPool,
}

#[async_trait]
impl PlanChangeRepository for PostgresPlanChangeRepository {
    async fn create(&self, new_entry: NewPlanChangeEntry) -> Result<PlanChangeEntry, LedgerError> {
        let entry = sqlx::query_as::<_, PlanChangeEntry>(
            r#"
            INSERT INTO plan_changes (id, user_id, user_email, from_plan, to_plan, payment_method, payment_id, reason, status, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending', $9, now())
            RETURNING id, user_id, user_email, from_plan, to_plan, payment_method, payment_id, reason, status, metadata, created_at, completed_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new_entry.user_id)
        .bind(&new_entry.user_email)
        .bind(new_entry.from_plan)
        .bind(new_entry.to_plan)
        .bind(&new_entry.payment_method)
        .bind(&new_entry.payment_id)
        .bind(&new_entry.reason)
        .bind(&new_entry.metadata)
        .fetch_one(&self.pool)
        .await?;

        Ok(entry)
    }

    async fn update_status(
        &self,
        id: Uuid,
        patch: PlanChangePatch,
    ) -> Result<PlanChangeEntry, LedgerError> {
        // Conditional update so only one finalizer can ever win the
        // pending -> terminal transition.
        let updated = sqlx::query_as::<_, PlanChangeEntry>(
            r#"
            UPDATE plan_changes
            SET status = $2,
                reason = COALESCE($3, reason),
                completed_at = $4
            WHERE id = $1 AND status = 'pending'
            RETURNING id, user_id, user_email, from_plan, to_plan, payment_method, payment_id, reason, status, metadata, created_at, completed_at
            "#,
        )
        .bind(id)
        .bind(patch.status)
        .bind(patch.reason.as_deref())
        .bind(patch.completed_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(entry) = updated {
            return Ok(entry);
        }

        let existing = sqlx::query_scalar::<Postgres, PlanChangeStatus>(
            "SELECT status FROM plan_changes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match existing {
            Some(_) => Err(LedgerError::AlreadyFinalized),
            None => Err(LedgerError::NotFound),
        }
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        from: Option<OffsetDateTime>,
        to: Option<OffsetDateTime>,
    ) -> Result<Vec<PlanChangeEntry>, LedgerError> {
        let entries = sqlx::query_as::<_, PlanChangeEntry>(
            r#"
            SELECT id,
                   user_id,
                   user_email,
                   from_plan,
                   to_plan,
                   payment_method,
                   payment_id,
                   reason,
                   status,
                   metadata,
                   created_at,
                   completed_at
            FROM plan_changes
            WHERE user_id = $1
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at <= $3)
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn search(
        &self,
        email: Option<&str>,
        from: Option<OffsetDateTime>,
        to: Option<OffsetDateTime>,
    ) -> Result<Vec<PlanChangeEntry>, LedgerError> {
        let entries = sqlx::query_as::<_, PlanChangeEntry>(
            r#"
            SELECT id,
                   user_id,
                   user_email,
                   from_plan,
                   to_plan,
                   payment_method,
                   payment_id,
                   reason,
                   status,
                   metadata,
                   created_at,
                   completed_at
            FROM plan_changes
            WHERE ($1::text IS NULL OR user_email = $1)
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at <= $3)
            ORDER BY created_at DESC
            "#,
        )
        .bind(email)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn current_plan(&self, user_id: &str) -> Result<PlanTier, LedgerError> {
        let plan = sqlx::query_scalar::<Postgres, PlanTier>(
            r#"
            SELECT to_plan
            FROM plan_changes
            WHERE user_id = $1 AND status = 'completed'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(plan.unwrap_or(PlanTier::Free))
    }

    async fn find_finalized_by_payment(
        &self,
        payment_id: &str,
    ) -> Result<Option<PlanChangeEntry>, LedgerError> {
        let entry = sqlx::query_as::<_, PlanChangeEntry>(
            r#"
            SELECT id,
                   user_id,
                   user_email,
                   from_plan,
                   to_plan,
                   payment_method,
                   payment_id,
                   reason,
                   status,
                   metadata,
                   created_at,
                   completed_at
            FROM plan_changes
            WHERE payment_id = $1 AND status <> 'pending'
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }
}
