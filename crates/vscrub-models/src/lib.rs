//! Shared data models for the vscrub backend.
//!
//! This crate provides Serde-serializable types for:
//! - User accounts and plan tiers
//! - The static payment-plan catalog
//! - Processing jobs and their lifecycle states
//! - Payment orders
//! - The pure usage-policy gate

pub mod job;
pub mod order;
pub mod plan;
pub mod policy;
pub mod user;

// Re-export common types
pub use job::{Job, JobId, JobState, Operation};
pub use order::{Order, OrderId, OrderStatus, SettleOutcome, ORDER_TTL_MINUTES};
pub use plan::{catalog, find_plan, Plan, PlanKind, PlanTier};
pub use policy::{evaluate, Denial};
pub use user::{utc_day_key, Profile, User};
