//! Job tracking errors.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("job not found")]
    NotFound,

    #[error("job is {state} and cannot {action}")]
    InvalidTransition {
        state: &'static str,
        action: &'static str,
    },
}

impl JobError {
    pub(crate) fn invalid(state: &'static str, action: &'static str) -> Self {
        Self::InvalidTransition { state, action }
    }
}
