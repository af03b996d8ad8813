use async_trait::async_trait;
use std::sync::Mutex;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::plan::PlanTier;
use crate::models::plan_change::{
    NewPlanChangeEntry, PlanChangeEntry, PlanChangePatch, PlanChangeStatus,
};

use super::plan_change_repository::{LedgerError, PlanChangeRepository};

/// Mutex-backed ledger used by tests and by deployments that accept a
/// non-durable store. The lock also serializes finalization, which is what
/// keeps the pending -> terminal transition single-writer.
#[allow(dead_code)]
#[derive(Default)]
pub struct InMemoryPlanChangeRepository {
    entries: Mutex<Vec<PlanChangeEntry>>,
}

#[allow(dead_code)]
impl InMemoryPlanChangeRepository {
    pub fn entries(&self) -> Vec<PlanChangeEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlanChangeRepository for InMemoryPlanChangeRepository {
    async fn create(&self, new_entry: NewPlanChangeEntry) -> Result<PlanChangeEntry, LedgerError> {
        let entry = PlanChangeEntry {
            id: Uuid::new_v4(),
            user_id: new_entry.user_id,
            user_email: new_entry.user_email,
            from_plan: new_entry.from_plan,
            to_plan: new_entry.to_plan,
            payment_method: new_entry.payment_method,
            payment_id: new_entry.payment_id,
            reason: new_entry.reason,
            status: PlanChangeStatus::Pending,
            metadata: new_entry.metadata,
            created_at: OffsetDateTime::now_utc(),
            completed_at: None,
        };
        self.entries.lock().unwrap().push(entry.clone());
        Ok(entry)
    }

    async fn update_status(
        &self,
        id: Uuid,
        patch: PlanChangePatch,
    ) -> Result<PlanChangeEntry, LedgerError> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(LedgerError::NotFound)?;

        if entry.status.is_terminal() {
            return Err(LedgerError::AlreadyFinalized);
        }

        entry.status = patch.status;
        if let Some(reason) = patch.reason {
            entry.reason = reason;
        }
        entry.completed_at = patch.completed_at;
        Ok(entry.clone())
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        from: Option<OffsetDateTime>,
        to: Option<OffsetDateTime>,
    ) -> Result<Vec<PlanChangeEntry>, LedgerError> {
        let entries = self.entries.lock().unwrap();
        let mut matched: Vec<PlanChangeEntry> = entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .filter(|e| from.map_or(true, |f| e.created_at >= f))
            .filter(|e| to.map_or(true, |t| e.created_at <= t))
            .cloned()
            .collect();
        matched.reverse();
        Ok(matched)
    }

    async fn search(
        &self,
        email: Option<&str>,
        from: Option<OffsetDateTime>,
        to: Option<OffsetDateTime>,
    ) -> Result<Vec<PlanChangeEntry>, LedgerError> {
        let entries = self.entries.lock().unwrap();
        let mut matched: Vec<PlanChangeEntry> = entries
            .iter()
            .filter(|e| email.map_or(true, |email| e.user_email == email))
            .filter(|e| from.map_or(true, |f| e.created_at >= f))
            .filter(|e| to.map_or(true, |t| e.created_at <= t))
            .cloned()
            .collect();
        matched.reverse();
        Ok(matched)
    }

    async fn current_plan(&self, user_id: &str) -> Result<PlanTier, LedgerError> {
        let entries = self.entries.lock().unwrap();
        let plan = entries
            .iter()
            .rev()
            .find(|e| e.user_id == user_id && e.status == PlanChangeStatus::Completed)
            .map(|e| e.to_plan)
            .unwrap_or(PlanTier::Free);
        Ok(plan)
    }

    async fn find_finalized_by_payment(
        &self,
        payment_id: &str,
    ) -> Result<Option<PlanChangeEntry>, LedgerError> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .iter()
            .find(|e| e.payment_id == payment_id && e.status.is_terminal())
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_entry(
        user_id: &str,
        payment_id: &str,
        from: PlanTier,
        to: PlanTier,
    ) -> NewPlanChangeEntry {
        NewPlanChangeEntry {
            user_id: user_id.to_string(),
            user_email: format!("{user_id}@example.com"),
            from_plan: from,
            to_plan: to,
            payment_method: "toss".to_string(),
            payment_id: payment_id.to_string(),
            reason: "payment in progress".to_string(),
            metadata: json!({"orderId": "order-1"}),
        }
    }

    #[tokio::test]
    async fn create_appends_pending_entries() {
        let repo = InMemoryPlanChangeRepository::default();
        let entry = repo
            .create(new_entry("u1", "pay-1", PlanTier::Free, PlanTier::Basic))
            .await
            .unwrap();

        assert_eq!(entry.status, PlanChangeStatus::Pending);
        assert!(entry.completed_at.is_none());
        assert_eq!(repo.entries().len(), 1);
    }

    #[tokio::test]
    async fn finalization_wins_only_once() {
        let repo = InMemoryPlanChangeRepository::default();
        let entry = repo
            .create(new_entry("u1", "pay-1", PlanTier::Free, PlanTier::Pro))
            .await
            .unwrap();

        let done = repo
            .update_status(
                entry.id,
                PlanChangePatch {
                    status: PlanChangeStatus::Completed,
                    reason: Some("payment succeeded".to_string()),
                    completed_at: Some(OffsetDateTime::now_utc()),
                },
            )
            .await
            .unwrap();
        assert_eq!(done.status, PlanChangeStatus::Completed);
        assert_eq!(done.reason, "payment succeeded");
        assert!(done.completed_at.is_some());

        let second = repo
            .update_status(
                entry.id,
                PlanChangePatch {
                    status: PlanChangeStatus::Failed,
                    reason: Some("late cancel".to_string()),
                    completed_at: None,
                },
            )
            .await;
        assert!(matches!(second, Err(LedgerError::AlreadyFinalized)));

        // The losing update must not have touched the entry.
        let stored = &repo.entries()[0];
        assert_eq!(stored.status, PlanChangeStatus::Completed);
        assert_eq!(stored.reason, "payment succeeded");
    }

    #[tokio::test]
    async fn update_of_unknown_id_is_not_found() {
        let repo = InMemoryPlanChangeRepository::default();
        let missing = repo
            .update_status(
                Uuid::new_v4(),
                PlanChangePatch {
                    status: PlanChangeStatus::Completed,
                    reason: None,
                    completed_at: None,
                },
            )
            .await;
        assert!(matches!(missing, Err(LedgerError::NotFound)));
    }

    #[tokio::test]
    async fn current_plan_follows_most_recent_completed_entry() {
        let repo = InMemoryPlanChangeRepository::default();
        assert_eq!(repo.current_plan("u1").await.unwrap(), PlanTier::Free);

        let first = repo
            .create(new_entry("u1", "pay-1", PlanTier::Free, PlanTier::Basic))
            .await
            .unwrap();
        repo.update_status(
            first.id,
            PlanChangePatch {
                status: PlanChangeStatus::Completed,
                reason: None,
                completed_at: Some(OffsetDateTime::now_utc()),
            },
        )
        .await
        .unwrap();

        let second = repo
            .create(new_entry("u1", "pay-2", PlanTier::Basic, PlanTier::Pro))
            .await
            .unwrap();
        repo.update_status(
            second.id,
            PlanChangePatch {
                status: PlanChangeStatus::Completed,
                reason: None,
                completed_at: Some(OffsetDateTime::now_utc()),
            },
        )
        .await
        .unwrap();

        // A later pending entry does not change the derived plan.
        repo.create(new_entry("u1", "pay-3", PlanTier::Pro, PlanTier::Enterprise))
            .await
            .unwrap();

        assert_eq!(repo.current_plan("u1").await.unwrap(), PlanTier::Pro);
    }

    #[tokio::test]
    async fn list_by_user_honors_the_date_window() {
        let repo = InMemoryPlanChangeRepository::default();
        repo.create(new_entry("u1", "pay-1", PlanTier::Free, PlanTier::Basic))
            .await
            .unwrap();
        repo.create(new_entry("u2", "pay-2", PlanTier::Free, PlanTier::Pro))
            .await
            .unwrap();
        repo.create(new_entry("u1", "pay-3", PlanTier::Basic, PlanTier::Pro))
            .await
            .unwrap();

        let all = repo.list_by_user("u1", None, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].payment_id, "pay-3");
        assert_eq!(all[1].payment_id, "pay-1");

        let future = OffsetDateTime::now_utc() + time::Duration::hours(1);
        let none = repo.list_by_user("u1", Some(future), None).await.unwrap();
        assert!(none.is_empty());

        let windowed = repo
            .list_by_user("u1", None, Some(future))
            .await
            .unwrap();
        assert_eq!(windowed.len(), 2);
    }

    #[tokio::test]
    async fn search_filters_by_email_and_orders_newest_first() {
        let repo = InMemoryPlanChangeRepository::default();
        repo.create(new_entry("u1", "pay-1", PlanTier::Free, PlanTier::Basic))
            .await
            .unwrap();
        repo.create(new_entry("u2", "pay-2", PlanTier::Free, PlanTier::Pro))
            .await
            .unwrap();
        repo.create(new_entry("u1", "pay-3", PlanTier::Basic, PlanTier::Pro))
            .await
            .unwrap();

        let all = repo.search(None, None, None).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].payment_id, "pay-3");

        let u1 = repo
            .search(Some("u1@example.com"), None, None)
            .await
            .unwrap();
        assert_eq!(u1.len(), 2);
        assert!(u1.iter().all(|e| e.user_email == "u1@example.com"));
    }

    #[tokio::test]
    async fn finds_earliest_finalized_entry_for_payment() {
        let repo = InMemoryPlanChangeRepository::default();
        let entry = repo
            .create(new_entry("u1", "pay-1", PlanTier::Free, PlanTier::Basic))
            .await
            .unwrap();
        assert!(repo
            .find_finalized_by_payment("pay-1")
            .await
            .unwrap()
            .is_none());

        repo.update_status(
            entry.id,
            PlanChangePatch {
                status: PlanChangeStatus::Completed,
                reason: None,
                completed_at: Some(OffsetDateTime::now_utc()),
            },
        )
        .await
        .unwrap();

        let found = repo.find_finalized_by_payment("pay-1").await.unwrap();
        assert_eq!(found.map(|e| e.id), Some(entry.id));
    }
}
