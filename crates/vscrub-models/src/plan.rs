//! Plan tiers, per-tier limits, and the payment-plan catalog.

use std::sync::LazyLock;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Upload ceilings in bytes for each plan tier (binary megabytes).
pub const FREE_UPLOAD_LIMIT_BYTES: u64 = 50 * 1024 * 1024; // 50 MiB
pub const PAID_UPLOAD_LIMIT_BYTES: u64 = 500 * 1024 * 1024; // 500 MiB
pub const VIP_UPLOAD_LIMIT_BYTES: u64 = 2 * 1024 * 1024 * 1024; // 2 GiB

/// Free-tier operations allowed per UTC calendar day.
pub const FREE_DAILY_QUOTA: u32 = 3;

/// Plan tier enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    #[default]
    Free,
    Paid,
    Vip,
}

impl PlanTier {
    /// Parse from string (case-insensitive, unknown maps to free).
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "paid" => PlanTier::Paid,
            "vip" => PlanTier::Vip,
            _ => PlanTier::Free,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Paid => "paid",
            PlanTier::Vip => "vip",
        }
    }

    /// Upload ceiling in bytes for this tier.
    pub fn upload_limit_bytes(&self) -> u64 {
        match self {
            PlanTier::Free => FREE_UPLOAD_LIMIT_BYTES,
            PlanTier::Paid => PAID_UPLOAD_LIMIT_BYTES,
            PlanTier::Vip => VIP_UPLOAD_LIMIT_BYTES,
        }
    }

    /// Upload ceiling in binary megabytes, for error messages.
    pub fn upload_limit_mib(&self) -> u64 {
        self.upload_limit_bytes() / (1024 * 1024)
    }

    /// Daily operation quota; `None` means unlimited.
    pub fn daily_quota(&self) -> Option<u32> {
        match self {
            PlanTier::Free => Some(FREE_DAILY_QUOTA),
            PlanTier::Paid | PlanTier::Vip => None,
        }
    }

    /// Whether multi-file batches are allowed.
    pub fn allows_batch(&self) -> bool {
        matches!(self, PlanTier::Vip)
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a purchased plan grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanKind {
    /// Sets the tier and extends the subscription by `duration_days`.
    Subscription { tier: PlanTier, duration_days: i64 },
    /// Adds `amount` to the credits balance; the tier is untouched.
    Credits { amount: u64 },
}

/// One entry of the purchasable-plan catalog.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Plan {
    pub id: String,
    pub name: String,
    /// Price in whole currency units.
    pub price: u64,
    pub currency: String,
    #[serde(flatten)]
    pub kind: PlanKind,
}

impl Plan {
    fn subscription(id: &str, name: &str, price: u64, tier: PlanTier, duration_days: i64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            price,
            currency: "CNY".to_string(),
            kind: PlanKind::Subscription {
                tier,
                duration_days,
            },
        }
    }

    fn credits(id: &str, name: &str, price: u64, amount: u64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            price,
            currency: "CNY".to_string(),
            kind: PlanKind::Credits { amount },
        }
    }

    pub fn is_credits(&self) -> bool {
        matches!(self.kind, PlanKind::Credits { .. })
    }
}

static CATALOG: LazyLock<Vec<Plan>> = LazyLock::new(|| {
    vec![
        Plan::subscription("paid_monthly", "Paid monthly", 29, PlanTier::Paid, 30),
        Plan::subscription("paid_yearly", "Paid yearly", 299, PlanTier::Paid, 365),
        Plan::subscription("vip_monthly", "VIP monthly", 99, PlanTier::Vip, 30),
        Plan::subscription("vip_yearly", "VIP yearly", 999, PlanTier::Vip, 365),
        Plan::credits("credits_100", "100 credits pack", 10, 100),
        Plan::credits("credits_500", "500 credits pack", 45, 500),
        Plan::credits("credits_1000", "1000 credits pack", 80, 1000),
    ]
});

/// The full purchasable-plan catalog.
pub fn catalog() -> &'static [Plan] {
    &CATALOG
}

/// Look up a plan by ID.
pub fn find_plan(id: &str) -> Option<&'static Plan> {
    CATALOG.iter().find(|p| p.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_upload_limits() {
        assert_eq!(PlanTier::Free.upload_limit_mib(), 50);
        assert_eq!(PlanTier::Paid.upload_limit_mib(), 500);
        assert_eq!(PlanTier::Vip.upload_limit_mib(), 2048);
    }

    #[test]
    fn test_tier_quotas() {
        assert_eq!(PlanTier::Free.daily_quota(), Some(3));
        assert_eq!(PlanTier::Paid.daily_quota(), None);
        assert!(!PlanTier::Paid.allows_batch());
        assert!(PlanTier::Vip.allows_batch());
    }

    #[test]
    fn test_tier_parse() {
        assert_eq!(PlanTier::parse("VIP"), PlanTier::Vip);
        assert_eq!(PlanTier::parse("paid"), PlanTier::Paid);
        assert_eq!(PlanTier::parse("unknown"), PlanTier::Free);
    }

    #[test]
    fn test_catalog_lookup() {
        let plan = find_plan("vip_yearly").unwrap();
        assert_eq!(plan.price, 999);
        assert!(matches!(
            plan.kind,
            PlanKind::Subscription {
                tier: PlanTier::Vip,
                duration_days: 365
            }
        ));

        let credits = find_plan("credits_500").unwrap();
        assert!(credits.is_credits());
        assert!(find_plan("nonexistent").is_none());
    }
}
