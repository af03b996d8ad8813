use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::plan_change_repository::{LedgerError, PlanChangeRepository};
use crate::models::payment_event::{
    PaymentWebhookEvent, ProviderPaymentStatus, PAYMENT_STATUS_CHANGED,
};
use crate::models::plan::PlanTier;
use crate::models::plan_change::{
    NewPlanChangeEntry, PlanChangeEntry, PlanChangePatch, PlanChangeStatus,
};
use crate::services::smtp_mailer::Mailer;

/// Provider tag stored on every ledger entry this processor appends.
const PAYMENT_PROVIDER: &str = "toss";

#[derive(Debug, Error)]
pub enum ProcessError {
    /// Structural problem with the event itself. Permanent; the provider
    /// should not redeliver.
    #[error("webhook rejected: {0}")]
    Rejected(String),
    /// Ledger persistence failed. Transient; the provider's retry mechanism
    /// is expected to redeliver the event.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// What the processor did with an accepted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDisposition {
    /// Non-final provider status; a pending entry was appended.
    Recorded,
    Completed,
    Failed,
    /// Terminal event for a payment that was already finalized. The entry is
    /// still appended for the audit trail but no second notification goes
    /// out.
    DuplicatePayment,
    /// Event type or provider status this build does not act on.
    Ignored(String),
}

/// Maps provider payment lifecycle events onto the plan change ledger and
/// triggers the customer notification for terminal outcomes.
pub struct PaymentEventProcessor {
    ledger: Arc<dyn PlanChangeRepository>,
    mailer: Arc<dyn Mailer>,
}

fn reason_for(status: ProviderPaymentStatus) -> &'static str {
    match status {
        ProviderPaymentStatus::Ready => "payment ready",
        ProviderPaymentStatus::InProgress => "payment in progress",
        ProviderPaymentStatus::WaitingForDeposit => "waiting for deposit",
        ProviderPaymentStatus::Done => "payment succeeded",
        ProviderPaymentStatus::Canceled => "payment canceled",
        ProviderPaymentStatus::PartialCanceled => "partially cancelled",
        ProviderPaymentStatus::Aborted => "payment aborted",
        ProviderPaymentStatus::Expired => "payment expired",
    }
}

impl PaymentEventProcessor {
    pub fn new(ledger: Arc<dyn PlanChangeRepository>, mailer: Arc<dyn Mailer>) -> Self {
        Self { ledger, mailer }
    }

    pub async fn process(
        &self,
        event: &PaymentWebhookEvent,
    ) -> Result<EventDisposition, ProcessError> {
        if event.event_type != PAYMENT_STATUS_CHANGED {
            info!(event_type = %event.event_type, "Ignoring unhandled webhook event type");
            return Ok(EventDisposition::Ignored(event.event_type.clone()));
        }

        let data = &event.data;
        let email = data.resolve_email().ok_or_else(|| {
            ProcessError::Rejected("user email missing from customer and metadata".to_string())
        })?;
        let user_id = data.resolve_user_id(&email);

        let status = match ProviderPaymentStatus::parse(&data.status) {
            Some(status) => status,
            None => {
                warn!(
                    status = %data.status,
                    payment_id = %data.payment_key,
                    "Ignoring unknown provider payment status"
                );
                return Ok(EventDisposition::Ignored(data.status.clone()));
            }
        };

        // Snapshot before this event appends its own rows.
        let already_finalized = match self.ledger.find_finalized_by_payment(&data.payment_key).await
        {
            Ok(found) => found.is_some(),
            Err(err) => {
                error!(
                    ?err,
                    payment_id = %data.payment_key,
                    event_type = %event.event_type,
                    "Failed to look up prior finalization for payment"
                );
                return Err(err.into());
            }
        };

        let from_plan = match self.ledger.current_plan(&user_id).await {
            Ok(plan) => plan,
            Err(err) => {
                error!(
                    ?err,
                    %user_id,
                    payment_id = %data.payment_key,
                    "Failed to derive current plan"
                );
                return Err(err.into());
            }
        };

        // Amount drives the target tier for payment-bearing statuses; below
        // the lowest threshold the plan stays where it is. Failure statuses
        // never move the plan.
        let to_plan = match status {
            ProviderPaymentStatus::Ready
            | ProviderPaymentStatus::InProgress
            | ProviderPaymentStatus::WaitingForDeposit
            | ProviderPaymentStatus::Done => {
                PlanTier::from_amount(data.total_amount).unwrap_or(from_plan)
            }
            ProviderPaymentStatus::Canceled
            | ProviderPaymentStatus::PartialCanceled
            | ProviderPaymentStatus::Aborted
            | ProviderPaymentStatus::Expired => from_plan,
        };

        let metadata = json!({
            "orderId": data.order_id,
            "totalAmount": data.total_amount,
            "currency": data.currency,
            "method": data.method,
            "orderName": data.order_name,
            "providerMetadata": data.metadata,
        });

        let entry = match self
            .ledger
            .create(NewPlanChangeEntry {
                user_id: user_id.clone(),
                user_email: email.clone(),
                from_plan,
                to_plan,
                payment_method: PAYMENT_PROVIDER.to_string(),
                payment_id: data.payment_key.clone(),
                reason: reason_for(status).to_string(),
                metadata,
            })
            .await
        {
            Ok(entry) => entry,
            Err(err) => {
                error!(
                    ?err,
                    payment_id = %data.payment_key,
                    event_type = %event.event_type,
                    "Failed to persist plan change entry"
                );
                return Err(err.into());
            }
        };

        match status {
            ProviderPaymentStatus::Ready
            | ProviderPaymentStatus::InProgress
            | ProviderPaymentStatus::WaitingForDeposit => {
                info!(
                    payment_id = %data.payment_key,
                    status = status.as_str(),
                    "Recorded provisional plan change"
                );
                Ok(EventDisposition::Recorded)
            }
            ProviderPaymentStatus::Done => {
                let finalized = self
                    .finalize(
                        entry.id,
                        PlanChangePatch {
                            status: PlanChangeStatus::Completed,
                            reason: Some(reason_for(status).to_string()),
                            completed_at: Some(OffsetDateTime::now_utc()),
                        },
                        &data.payment_key,
                    )
                    .await?;

                if already_finalized {
                    info!(
                        payment_id = %data.payment_key,
                        "Payment already finalized, skipping duplicate notification"
                    );
                    return Ok(EventDisposition::DuplicatePayment);
                }

                if let Err(err) = self
                    .mailer
                    .send_payment_success_email(&email, finalized.to_plan, data.total_amount)
                    .await
                {
                    warn!(%err, %email, "Failed to send payment success email");
                }

                info!(
                    payment_id = %data.payment_key,
                    %user_id,
                    plan = finalized.to_plan.as_str(),
                    "Plan change completed"
                );
                Ok(EventDisposition::Completed)
            }
            ProviderPaymentStatus::Canceled
            | ProviderPaymentStatus::PartialCanceled
            | ProviderPaymentStatus::Aborted
            | ProviderPaymentStatus::Expired => {
                let reason = reason_for(status);
                self.finalize(
                    entry.id,
                    PlanChangePatch {
                        status: PlanChangeStatus::Failed,
                        reason: Some(reason.to_string()),
                        completed_at: None,
                    },
                    &data.payment_key,
                )
                .await?;

                if already_finalized {
                    info!(
                        payment_id = %data.payment_key,
                        "Payment already finalized, skipping duplicate notification"
                    );
                    return Ok(EventDisposition::DuplicatePayment);
                }

                if let Err(err) = self.mailer.send_payment_failure_email(&email, reason).await {
                    warn!(%err, %email, "Failed to send payment failure email");
                }

                info!(
                    payment_id = %data.payment_key,
                    %user_id,
                    reason,
                    "Plan change failed"
                );
                Ok(EventDisposition::Failed)
            }
        }
    }

    async fn finalize(
        &self,
        id: Uuid,
        patch: PlanChangePatch,
        payment_id: &str,
    ) -> Result<PlanChangeEntry, LedgerError> {
        match self.ledger.update_status(id, patch).await {
            Ok(entry) => Ok(entry),
            Err(err) => {
                error!(
                    ?err,
                    %id,
                    %payment_id,
                    "Failed to finalize plan change entry"
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_plan_change_repository::InMemoryPlanChangeRepository;
    use crate::services::smtp_mailer::MockMailer;

    fn processor() -> (
        PaymentEventProcessor,
        Arc<InMemoryPlanChangeRepository>,
        Arc<MockMailer>,
    ) {
        let ledger = Arc::new(InMemoryPlanChangeRepository::default());
        let mailer = Arc::new(MockMailer::default());
        let processor = PaymentEventProcessor::new(ledger.clone(), mailer.clone());
        (processor, ledger, mailer)
    }

    fn event_for(payment_id: &str, status: &str, amount: i64) -> PaymentWebhookEvent {
        serde_json::from_value(json!({
            "eventType": "PAYMENT_STATUS_CHANGED",
            "createdAt": "2025-03-01T09:30:00+09:00",
            "data": {
                "paymentKey": payment_id,
                "orderId": "order-1",
                "status": status,
                "totalAmount": amount,
                "currency": "KRW",
                "method": "card",
                "orderName": "Subscription",
                "customer": { "email": "user1@example.com" },
                "metadata": { "userId": "u-1" }
            }
        }))
        .expect("event should deserialize")
    }

    #[tokio::test]
    async fn done_event_completes_the_upgrade_end_to_end() {
        let (processor, ledger, mailer) = processor();

        // Establish basic first, then upgrade.
        let first = processor
            .process(&event_for("pay_0", "DONE", 38000))
            .await
            .unwrap();
        assert_eq!(first, EventDisposition::Completed);

        let second = processor
            .process(&event_for("pay_1", "DONE", 150000))
            .await
            .unwrap();
        assert_eq!(second, EventDisposition::Completed);

        let entries = ledger.entries();
        assert_eq!(entries.len(), 2);
        let upgrade = &entries[1];
        assert_eq!(upgrade.from_plan, PlanTier::Basic);
        assert_eq!(upgrade.to_plan, PlanTier::Pro);
        assert_eq!(upgrade.status, PlanChangeStatus::Completed);
        assert_eq!(upgrade.reason, "payment succeeded");
        assert_eq!(upgrade.payment_method, "toss");
        assert!(upgrade.completed_at.is_some());
        assert_eq!(upgrade.metadata["orderId"], "order-1");
        assert_eq!(upgrade.metadata["totalAmount"], 150000);
        assert_eq!(upgrade.metadata["providerMetadata"]["userId"], "u-1");

        assert_eq!(ledger.current_plan("u-1").await.unwrap(), PlanTier::Pro);

        let sent = mailer.sent_success_emails.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(
            sent[1],
            ("user1@example.com".to_string(), PlanTier::Pro, 150000)
        );
    }

    #[tokio::test]
    async fn done_amounts_map_to_tiers() {
        for (amount, expected) in [
            (390000, PlanTier::Enterprise),
            (389999, PlanTier::Pro),
            (129000, PlanTier::Pro),
            (128999, PlanTier::Basic),
            (38000, PlanTier::Basic),
        ] {
            let (processor, ledger, _mailer) = processor();
            processor
                .process(&event_for("pay_1", "DONE", amount))
                .await
                .unwrap();
            assert_eq!(ledger.entries()[0].to_plan, expected, "amount {amount}");
        }
    }

    #[tokio::test]
    async fn below_threshold_amount_keeps_the_current_plan() {
        let (processor, ledger, _mailer) = processor();
        processor
            .process(&event_for("pay_0", "DONE", 129000))
            .await
            .unwrap();

        let result = processor
            .process(&event_for("pay_1", "DONE", 9000))
            .await
            .unwrap();

        assert_eq!(result, EventDisposition::Completed);
        let entry = &ledger.entries()[1];
        assert_eq!(entry.from_plan, PlanTier::Pro);
        assert_eq!(entry.to_plan, PlanTier::Pro);
        assert_eq!(ledger.current_plan("u-1").await.unwrap(), PlanTier::Pro);
    }

    #[tokio::test]
    async fn provisional_statuses_record_pending_entries_without_email() {
        for status in ["READY", "IN_PROGRESS", "WAITING_FOR_DEPOSIT"] {
            let (processor, ledger, mailer) = processor();
            let result = processor
                .process(&event_for("pay_1", status, 150000))
                .await
                .unwrap();

            assert_eq!(result, EventDisposition::Recorded, "status {status}");
            let entries = ledger.entries();
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].status, PlanChangeStatus::Pending);
            assert_eq!(entries[0].to_plan, PlanTier::Pro);
            assert!(entries[0].completed_at.is_none());
            assert_eq!(ledger.current_plan("u-1").await.unwrap(), PlanTier::Free);
            assert!(mailer.sent_success_emails.lock().unwrap().is_empty());
            assert!(mailer.sent_failure_emails.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn failure_statuses_keep_the_plan_and_mark_failed() {
        for (status, reason) in [
            ("CANCELED", "payment canceled"),
            ("ABORTED", "payment aborted"),
            ("EXPIRED", "payment expired"),
            ("PARTIAL_CANCELED", "partially cancelled"),
        ] {
            let (processor, ledger, mailer) = processor();
            processor
                .process(&event_for("pay_0", "DONE", 150000))
                .await
                .unwrap();

            let result = processor
                .process(&event_for("pay_1", status, 150000))
                .await
                .unwrap();

            assert_eq!(result, EventDisposition::Failed, "status {status}");
            let entry = &ledger.entries()[1];
            assert_eq!(entry.from_plan, PlanTier::Pro);
            assert_eq!(entry.to_plan, PlanTier::Pro);
            assert_eq!(entry.status, PlanChangeStatus::Failed);
            assert_eq!(entry.reason, reason);
            assert!(entry.completed_at.is_none());
            assert_eq!(ledger.current_plan("u-1").await.unwrap(), PlanTier::Pro);

            let failures = mailer.sent_failure_emails.lock().unwrap();
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].1, reason);
        }
    }

    #[tokio::test]
    async fn redelivered_done_event_sends_no_second_email() {
        let (processor, ledger, mailer) = processor();

        let first = processor
            .process(&event_for("pay_1", "DONE", 38000))
            .await
            .unwrap();
        let second = processor
            .process(&event_for("pay_1", "DONE", 38000))
            .await
            .unwrap();

        assert_eq!(first, EventDisposition::Completed);
        assert_eq!(second, EventDisposition::DuplicatePayment);

        // Both deliveries are kept in the audit trail.
        let entries = ledger.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries
            .iter()
            .all(|e| e.status == PlanChangeStatus::Completed));
        assert_eq!(ledger.current_plan("u-1").await.unwrap(), PlanTier::Basic);
        assert_eq!(mailer.sent_success_emails.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn redelivered_failure_event_sends_no_second_email() {
        let (processor, _ledger, mailer) = processor();

        processor
            .process(&event_for("pay_1", "EXPIRED", 150000))
            .await
            .unwrap();
        let second = processor
            .process(&event_for("pay_1", "EXPIRED", 150000))
            .await
            .unwrap();

        assert_eq!(second, EventDisposition::DuplicatePayment);
        assert_eq!(mailer.sent_failure_emails.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn pending_entry_does_not_count_as_finalized() {
        let (processor, ledger, mailer) = processor();

        processor
            .process(&event_for("pay_1", "READY", 150000))
            .await
            .unwrap();
        let done = processor
            .process(&event_for("pay_1", "DONE", 150000))
            .await
            .unwrap();

        assert_eq!(done, EventDisposition::Completed);
        assert_eq!(ledger.entries().len(), 2);
        assert_eq!(mailer.sent_success_emails.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_email_is_rejected_without_touching_state() {
        let (processor, ledger, mailer) = processor();
        let event: PaymentWebhookEvent = serde_json::from_value(json!({
            "eventType": "PAYMENT_STATUS_CHANGED",
            "data": {
                "paymentKey": "pay_1",
                "orderId": "order-1",
                "status": "DONE",
                "totalAmount": 150000
            }
        }))
        .unwrap();

        let result = processor.process(&event).await;

        assert!(matches!(result, Err(ProcessError::Rejected(_))));
        assert!(ledger.entries().is_empty());
        assert!(mailer.sent_success_emails.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn other_event_types_are_acknowledged_and_ignored() {
        let (processor, ledger, _mailer) = processor();
        let mut event = event_for("pay_1", "DONE", 150000);
        event.event_type = "PAYMENT_CREATED".to_string();

        let result = processor.process(&event).await.unwrap();

        assert_eq!(
            result,
            EventDisposition::Ignored("PAYMENT_CREATED".to_string())
        );
        assert!(ledger.entries().is_empty());
    }

    #[tokio::test]
    async fn unknown_provider_status_is_acknowledged_and_ignored() {
        let (processor, ledger, mailer) = processor();

        let result = processor
            .process(&event_for("pay_1", "REFUND_PENDING", 150000))
            .await
            .unwrap();

        assert_eq!(
            result,
            EventDisposition::Ignored("REFUND_PENDING".to_string())
        );
        assert!(ledger.entries().is_empty());
        assert!(mailer.sent_failure_emails.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn mailer_failures_never_fail_the_event() {
        let ledger = Arc::new(InMemoryPlanChangeRepository::default());
        let mailer = Arc::new(MockMailer {
            fail_send: true,
            ..Default::default()
        });
        let processor = PaymentEventProcessor::new(ledger.clone(), mailer);

        let result = processor
            .process(&event_for("pay_1", "DONE", 150000))
            .await
            .unwrap();

        assert_eq!(result, EventDisposition::Completed);
        assert_eq!(ledger.entries()[0].status, PlanChangeStatus::Completed);
    }
}
