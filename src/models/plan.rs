use core::fmt;

use serde::{Deserialize, Serialize};

/// Subscription tiers ordered by entitlement level.
#[derive(
    sqlx::Type, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[sqlx(type_name = "plan_tier", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Basic,
    Pro,
    Enterprise,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Basic => "basic",
            PlanTier::Pro => "pro",
            PlanTier::Enterprise => "enterprise",
        }
    }

    /// Maps a payment amount (minor currency units) to the tier it buys.
    /// Returns `None` below the lowest paid threshold, which callers treat
    /// as "keep the current plan".
    pub fn from_amount(amount: i64) -> Option<PlanTier> {
        if amount >= 390_000 {
            Some(PlanTier::Enterprise)
        } else if amount >= 129_000 {
            Some(PlanTier::Pro)
        } else if amount >= 38_000 {
            Some(PlanTier::Basic)
        } else {
            None
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlanTier::Free => "Free",
            PlanTier::Basic => "Basic",
            PlanTier::Pro => "Pro",
            PlanTier::Enterprise => "Enterprise",
        };
        write!(f, "{}", s)
    }
}
