//! Payment order ledger.
//!
//! No real gateway is involved: orders settle through a simulated
//! callback, and a successful settlement applies the purchased plan's
//! benefits to the buyer's account.

pub mod error;
pub mod ledger;

pub use error::OrderError;
pub use ledger::{OrderLedger, OrderStats};
