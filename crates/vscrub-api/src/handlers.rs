//! HTTP handlers.

pub mod account;
pub mod health;
pub mod payment;
pub mod video;

pub use health::{health, ready};
