//! Pure usage-policy gate for processing requests.
//!
//! `evaluate` is a pure function of its inputs; it performs no mutation.
//! The caller applies the usage increment only after the operation is
//! accepted, and the persisted daily reset happens with that increment.

use thiserror::Error;

use crate::job::Operation;
use crate::user::User;

/// Why a processing request was denied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Denial {
    #[error("daily limit of {limit} operations reached for the free tier")]
    DailyLimitExceeded { limit: u32 },

    #[error("file exceeds the {limit_mib} MiB ceiling for this plan")]
    FileTooLarge { limit_mib: u64 },

    #[error("batch processing requires a VIP plan")]
    VipRequired,
}

impl Denial {
    /// Stable machine-readable code for error responses.
    pub fn code(&self) -> &'static str {
        match self {
            Denial::DailyLimitExceeded { .. } => "DAILY_LIMIT_EXCEEDED",
            Denial::FileTooLarge { .. } => "FILE_TOO_LARGE",
            Denial::VipRequired => "VIP_REQUIRED",
        }
    }
}

/// Decide whether `user` may run `op` on a file of `file_size` bytes as
/// part of a batch of `batch_size` files, on the UTC day `today`.
///
/// A stored daily counter from an earlier day counts as 0 (the rollover
/// is implied here; the store persists it with the next mutation).
pub fn evaluate(
    user: &User,
    _op: Operation,
    file_size: u64,
    batch_size: usize,
    today: &str,
) -> Result<(), Denial> {
    let tier = user.plan_tier;

    if let Some(limit) = tier.daily_quota() {
        if user.effective_daily_usage(today) >= limit {
            return Err(Denial::DailyLimitExceeded { limit });
        }
    }

    if file_size > tier.upload_limit_bytes() {
        return Err(Denial::FileTooLarge {
            limit_mib: tier.upload_limit_mib(),
        });
    }

    if batch_size > 1 && !tier.allows_batch() {
        return Err(Denial::VipRequired);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::PlanTier;

    fn user_with(tier: PlanTier, daily_usage: u32, last_usage_date: Option<&str>) -> User {
        let mut user = User::new("alice", "alice@example.com", "$2b$...");
        user.plan_tier = tier;
        user.daily_usage = daily_usage;
        user.last_usage_date = last_usage_date.map(|s| s.to_string());
        user
    }

    #[test]
    fn test_free_fourth_request_denied() {
        let user = user_with(PlanTier::Free, 3, Some("2026-08-24"));
        let result = evaluate(&user, Operation::RemoveWatermark, 1024, 1, "2026-08-24");
        assert_eq!(result, Err(Denial::DailyLimitExceeded { limit: 3 }));
    }

    #[test]
    fn test_free_quota_resets_on_new_day() {
        // Prior-day counter is ignored regardless of its value
        let user = user_with(PlanTier::Free, 99, Some("2026-08-23"));
        assert!(evaluate(&user, Operation::RemoveWatermark, 1024, 1, "2026-08-24").is_ok());
    }

    #[test]
    fn test_paid_has_no_daily_quota() {
        let user = user_with(PlanTier::Paid, 1000, Some("2026-08-24"));
        assert!(evaluate(&user, Operation::Custom, 1024, 1, "2026-08-24").is_ok());
    }

    #[test]
    fn test_file_size_boundaries() {
        for (tier, limit_mib) in [
            (PlanTier::Free, 50),
            (PlanTier::Paid, 500),
            (PlanTier::Vip, 2048),
        ] {
            let user = user_with(tier, 0, None);
            let ceiling = limit_mib * 1024 * 1024;

            // Exactly at the ceiling is accepted
            assert!(
                evaluate(&user, Operation::Custom, ceiling, 1, "2026-08-24").is_ok(),
                "{tier} at ceiling"
            );
            // One byte over is rejected, citing the MiB value
            assert_eq!(
                evaluate(&user, Operation::Custom, ceiling + 1, 1, "2026-08-24"),
                Err(Denial::FileTooLarge { limit_mib }),
                "{tier} over ceiling"
            );
        }
    }

    #[test]
    fn test_batch_requires_vip() {
        let free = user_with(PlanTier::Free, 0, None);
        let paid = user_with(PlanTier::Paid, 0, None);
        let vip = user_with(PlanTier::Vip, 0, None);

        assert_eq!(
            evaluate(&free, Operation::Batch, 1024, 2, "2026-08-24"),
            Err(Denial::VipRequired)
        );
        assert_eq!(
            evaluate(&paid, Operation::Batch, 1024, 5, "2026-08-24"),
            Err(Denial::VipRequired)
        );
        assert!(evaluate(&vip, Operation::Batch, 1024, 20, "2026-08-24").is_ok());
        // A single file is never gated on tier
        assert!(evaluate(&paid, Operation::Batch, 1024, 1, "2026-08-24").is_ok());
    }

    #[test]
    fn test_evaluate_does_not_mutate() {
        let user = user_with(PlanTier::Free, 2, Some("2026-08-23"));
        let before = user.clone();
        let _ = evaluate(&user, Operation::RemoveWatermark, 1024, 1, "2026-08-24");
        assert_eq!(user.daily_usage, before.daily_usage);
        assert_eq!(user.last_usage_date, before.last_usage_date);
    }
}
