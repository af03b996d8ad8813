use serde::{Deserialize, Serialize};

/// The only webhook event type the processor acts on.
pub const PAYMENT_STATUS_CHANGED: &str = "PAYMENT_STATUS_CHANGED";

/// Transaction lifecycle labels as the payment provider reports them.
/// These are the provider's states, not ours; the ledger only ever records
/// pending/completed/failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderPaymentStatus {
    Ready,
    InProgress,
    WaitingForDeposit,
    Done,
    Canceled,
    PartialCanceled,
    Aborted,
    Expired,
}

impl ProviderPaymentStatus {
    /// Returns `None` for strings this build does not recognize so callers can
    /// log and acknowledge them instead of guessing a mapping.
    pub fn parse(raw: &str) -> Option<ProviderPaymentStatus> {
        match raw.trim() {
            "READY" => Some(ProviderPaymentStatus::Ready),
            "IN_PROGRESS" => Some(ProviderPaymentStatus::InProgress),
            "WAITING_FOR_DEPOSIT" => Some(ProviderPaymentStatus::WaitingForDeposit),
            "DONE" => Some(ProviderPaymentStatus::Done),
            "CANCELED" => Some(ProviderPaymentStatus::Canceled),
            "PARTIAL_CANCELED" => Some(ProviderPaymentStatus::PartialCanceled),
            "ABORTED" => Some(ProviderPaymentStatus::Aborted),
            "EXPIRED" => Some(ProviderPaymentStatus::Expired),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderPaymentStatus::Ready => "READY",
            ProviderPaymentStatus::InProgress => "IN_PROGRESS",
            ProviderPaymentStatus::WaitingForDeposit => "WAITING_FOR_DEPOSIT",
            ProviderPaymentStatus::Done => "DONE",
            ProviderPaymentStatus::Canceled => "CANCELED",
            ProviderPaymentStatus::PartialCanceled => "PARTIAL_CANCELED",
            ProviderPaymentStatus::Aborted => "ABORTED",
            ProviderPaymentStatus::Expired => "EXPIRED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentWebhookEvent {
    pub event_type: String,
    #[serde(default)]
    pub created_at: Option<String>,
    pub data: PaymentEventData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEventData {
    pub payment_key: String,
    pub order_id: String,
    pub status: String,
    pub total_amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub order_name: Option<String>,
    #[serde(default)]
    pub customer: Option<PaymentCustomer>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCustomer {
    #[serde(default)]
    pub email: Option<String>,
}

impl PaymentEventData {
    /// Customer email wins; `metadata.userEmail` is the checkout-flow fallback.
    pub fn resolve_email(&self) -> Option<String> {
        if let Some(customer) = &self.customer {
            if let Some(email) = customer.email.as_deref() {
                let trimmed = email.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
        self.metadata
            .as_ref()
            .and_then(|m| m.get("userEmail"))
            .and_then(|v| v.as_str())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
    }

    /// `metadata.userId` when the checkout flow supplied one, else the email
    /// doubles as the subject key.
    pub fn resolve_user_id(&self, email: &str) -> String {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("userId"))
            .and_then(|v| v.as_str())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .unwrap_or_else(|| email.to_string())
    }
}
