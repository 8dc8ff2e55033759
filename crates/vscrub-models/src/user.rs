//! User accounts and daily usage accounting.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::plan::PlanTier;

/// Format a timestamp as the UTC calendar-day key (`YYYY-MM-DD`).
///
/// Daily quotas compare these keys as strings, so the rollover point is
/// UTC midnight regardless of the client's timezone.
pub fn utc_day_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

/// A registered account.
///
/// The record is mutated by login (last-login stamp, usage-date rollover),
/// by video processing (usage increment), and by payment settlement
/// (tier/credits change). All mutations go through the store's per-user
/// lock.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct User {
    /// Unique user ID.
    pub id: String,
    pub username: String,
    /// Unique across all accounts.
    pub email: String,
    /// Bcrypt hash; never serialized to clients (see [`Profile`]).
    pub password_hash: String,
    #[serde(default)]
    pub plan_tier: PlanTier,
    /// Operations performed on `last_usage_date`.
    #[serde(default)]
    pub daily_usage: u32,
    /// UTC day key of the most recent usage, `None` until first use.
    #[serde(default)]
    pub last_usage_date: Option<String>,
    #[serde(default)]
    pub total_usage: u64,
    /// End of the current subscription period, for paid/vip tiers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_end: Option<DateTime<Utc>>,
    /// Prepaid credits balance.
    #[serde(default)]
    pub credits: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// Create a new free-tier account.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            plan_tier: PlanTier::Free,
            daily_usage: 0,
            last_usage_date: None,
            total_usage: 0,
            subscription_end: None,
            credits: 0,
            created_at: now,
            updated_at: now,
            last_login: None,
        }
    }

    /// Usage count effective for quota checks on `today`.
    ///
    /// Returns 0 when the stored counter belongs to an earlier day; the
    /// persisted reset is applied separately by [`User::roll_usage_date`].
    pub fn effective_daily_usage(&self, today: &str) -> u32 {
        if self.last_usage_date.as_deref() == Some(today) {
            self.daily_usage
        } else {
            0
        }
    }

    /// Reset the daily counter if `today` differs from the stored day key.
    ///
    /// Idempotent: calling it repeatedly within the same day is a no-op.
    pub fn roll_usage_date(&mut self, today: &str) {
        if self.last_usage_date.as_deref() != Some(today) {
            self.daily_usage = 0;
            self.last_usage_date = Some(today.to_string());
        }
    }

    /// Record one accepted operation on `today`.
    pub fn record_usage(&mut self, today: &str) {
        self.roll_usage_date(today);
        self.daily_usage += 1;
        self.total_usage += 1;
        self.updated_at = Utc::now();
    }

    /// Client-safe view of this record.
    pub fn profile(&self) -> Profile {
        Profile {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            plan_tier: self.plan_tier,
            daily_usage: self.daily_usage,
            total_usage: self.total_usage,
            subscription_end: self.subscription_end,
            credits: self.credits,
            created_at: self.created_at,
            last_login: self.last_login,
        }
    }
}

/// Sanitized user record returned to clients: everything but the hash.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub plan_tier: PlanTier,
    pub daily_usage: u32,
    pub total_usage: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_end: Option<DateTime<Utc>>,
    pub credits: u64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_usage_rolls_over() {
        let mut user = User::new("alice", "alice@example.com", "$2b$...");
        user.daily_usage = 3;
        user.last_usage_date = Some("2026-08-23".to_string());

        assert_eq!(user.effective_daily_usage("2026-08-23"), 3);
        assert_eq!(user.effective_daily_usage("2026-08-24"), 0);
    }

    #[test]
    fn test_roll_usage_date_is_idempotent() {
        let mut user = User::new("alice", "alice@example.com", "$2b$...");
        user.daily_usage = 3;
        user.last_usage_date = Some("2026-08-23".to_string());

        user.roll_usage_date("2026-08-24");
        assert_eq!(user.daily_usage, 0);

        user.daily_usage = 2;
        user.roll_usage_date("2026-08-24");
        assert_eq!(user.daily_usage, 2);
    }

    #[test]
    fn test_record_usage_increments_both_counters() {
        let mut user = User::new("alice", "alice@example.com", "$2b$...");
        user.record_usage("2026-08-24");
        user.record_usage("2026-08-24");

        assert_eq!(user.daily_usage, 2);
        assert_eq!(user.total_usage, 2);
        assert_eq!(user.last_usage_date.as_deref(), Some("2026-08-24"));

        // New day resets the daily counter but not the total
        user.record_usage("2026-08-25");
        assert_eq!(user.daily_usage, 1);
        assert_eq!(user.total_usage, 3);
    }

    #[test]
    fn test_profile_has_no_hash() {
        let user = User::new("alice", "alice@example.com", "$2b$secret");
        let json = serde_json::to_value(user.profile()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["username"], "alice");
    }
}
