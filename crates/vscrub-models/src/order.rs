//! Payment orders.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::plan::Plan;

/// Pending orders expire this many minutes after creation.
pub const ORDER_TTL_MINUTES: i64 = 30;

/// Unique identifier for an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order lifecycle state. Only `pending` orders may transition; the
/// transition is one-way and final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Failed => "failed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome reported by the (simulated) payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SettleOutcome {
    Success,
    Failure,
    Cancel,
}

impl SettleOutcome {
    /// Order status this outcome settles to.
    pub fn target_status(&self) -> OrderStatus {
        match self {
            SettleOutcome::Success => OrderStatus::Paid,
            SettleOutcome::Failure => OrderStatus::Failed,
            SettleOutcome::Cancel => OrderStatus::Cancelled,
        }
    }
}

/// One payment transaction record, independent of any job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Order {
    pub id: OrderId,
    pub user_id: String,
    pub plan_id: String,
    pub plan_name: String,
    /// Price in whole currency units at creation time.
    pub amount: u64,
    pub currency: String,
    pub payment_method: String,
    #[serde(default)]
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    /// Pending orders past this instant can no longer settle as success.
    pub expires_at: DateTime<Utc>,
}

impl Order {
    /// Create a new pending order for `plan`.
    pub fn new(user_id: impl Into<String>, plan: &Plan, payment_method: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new(),
            user_id: user_id.into(),
            plan_id: plan.id.clone(),
            plan_name: plan.name.clone(),
            amount: plan.price,
            currency: plan.currency.clone(),
            payment_method: payment_method.into(),
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            paid_at: None,
            expires_at: now + Duration::minutes(ORDER_TTL_MINUTES),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
