use async_trait::async_trait;
use lettre::{
    message::Mailbox,
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

use crate::models::plan::PlanTier;
use crate::services::smtp_mailer::Mailer;

use super::MailError;

#[derive(Clone)]
pub struct SmtpMailer {
    transport: Arc<AsyncSmtpTransport<Tokio1Executor>>,
    sender: Mailbox,
}

impl SmtpMailer {
    pub fn new() -> Result<Self, anyhow::Error> {
        let host = std::env::var("SMTP_HOST")?;
        let username = std::env::var("SMTP_USERNAME")?;
        let password = std::env::var("SMTP_PASSWORD")?;
        let from = std::env::var("SMTP_FROM")?.parse()?;
        let port: u16 = std::env::var("SMTP_PORT")?.parse()?;

        let disabled_tls = std::env::var("SMTP_TLS_DISABLED")
            .unwrap_or_else(|_| "false".to_string())
            .to_lowercase()
            == "true";

        let mailer = if disabled_tls {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&host)
                .port(port)
                .build()
        } else {
            let creds = Credentials::new(username, password);
            let tls = TlsParameters::new(host.clone())?;

            AsyncSmtpTransport::<Tokio1Executor>::relay(&host)?
                .port(port)
                .tls(Tls::Required(tls))
                .credentials(creds)
                .build()
        };

        Ok(Self {
            transport: Arc::new(mailer),
            sender: from,
        })
    }

    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let email = Message::builder()
            .from(self.sender.clone())
            .to(to.parse::<Mailbox>()?)
            .subject(subject)
            .body(body.to_string())?;

        self.transport
            .send(email)
            .await
            .map(|_| ())
            .map_err(|e| e.into())
    }
}

fn payment_success_body(plan: PlanTier, amount: i64) -> String {
    format!(
        "Your payment was received.\n\nPlan: {}\nAmount: {}\n\nThanks for subscribing!",
        plan, amount
    )
}

fn payment_failure_body(reason: &str) -> String {
    format!(
        "We could not complete your payment.\n\nReason: {}\n\nYour current plan is unchanged. You can retry from your billing page.",
        reason
    )
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_payment_success_email(
        &self,
        to: &str,
        plan: PlanTier,
        amount: i64,
    ) -> Result<(), MailError> {
        let body = payment_success_body(plan, amount);
        self.send_email(to, "Your subscription is active", &body).await
    }

    async fn send_payment_failure_email(&self, to: &str, reason: &str) -> Result<(), MailError> {
        let body = payment_failure_body(reason);
        self.send_email(to, "There was a problem with your payment", &body)
            .await
    }
}
