use async_trait::async_trait;
use std::fmt;

use crate::models::plan::PlanTier;

#[derive(Debug)]
pub enum MailError {
    Other(String),
    InvalidEmailAddress(String),
    SendError(String),
}

impl fmt::Display for MailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MailError::Other(e) => write!(f, "Error: {}", e),
            MailError::InvalidEmailAddress(e) => write!(f, "Invalid Address: {}", e),
            MailError::SendError(e) => write!(f, "Send error: {}", e),
        }
    }
}

impl std::error::Error for MailError {}

use lettre::transport::smtp::Error as SmtpError;

impl From<SmtpError> for MailError {
    fn from(err: SmtpError) -> Self {
        MailError::SendError(err.to_string())
    }
}

impl From<lettre::error::Error> for MailError {
    fn from(err: lettre::error::Error) -> Self {
        MailError::SendError(err.to_string())
    }
}

impl From<AddressError> for MailError {
    fn from(e: AddressError) -> Self {
        MailError::InvalidEmailAddress(e.to_string())
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_payment_success_email(
        &self,
        to: &str,
        plan: PlanTier,
        amount: i64,
    ) -> Result<(), MailError>;
    async fn send_payment_failure_email(&self, to: &str, reason: &str) -> Result<(), MailError>;
}

mod mock_mailer;
mod smtp_impl;

use lettre::address::AddressError;
#[allow(unused_imports)]
pub use mock_mailer::MockMailer;
pub use smtp_impl::SmtpMailer;
