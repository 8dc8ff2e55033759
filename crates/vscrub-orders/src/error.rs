//! Order ledger errors.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("order not found")]
    NotFound,

    #[error("unknown plan: {0}")]
    UnknownPlan(String),

    #[error("order is {status} and cannot settle as {requested}")]
    InvalidState {
        status: &'static str,
        requested: &'static str,
    },

    #[error("order expired before payment completed")]
    Expired,
}
