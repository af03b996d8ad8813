use crate::models::plan::PlanTier;
use crate::services::smtp_mailer::{MailError, Mailer};
use async_trait::async_trait;
use std::sync::Mutex;

/// A mock mailer that records sent emails for testing purposes.
#[derive(Debug, Default)]
#[allow(dead_code)]
pub struct MockMailer {
    pub sent_success_emails: Mutex<Vec<(String, PlanTier, i64)>>,
    pub sent_failure_emails: Mutex<Vec<(String, String)>>,
    pub fail_send: bool,
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send_payment_success_email(
        &self,
        to: &str,
        plan: PlanTier,
        amount: i64,
    ) -> Result<(), MailError> {
        if self.fail_send {
            return Err(MailError::Other("mock failure".into()));
        }
        self.sent_success_emails
            .lock()
            .unwrap()
            .push((to.to_string(), plan, amount));
        Ok(())
    }

    async fn send_payment_failure_email(&self, to: &str, reason: &str) -> Result<(), MailError> {
        if self.fail_send {
            return Err(MailError::Other("mock failure".into()));
        }
        self.sent_failure_emails
            .lock()
            .unwrap()
            .push((to.to_string(), reason.to_string()));
        Ok(())
    }
}
