//! Auth error types.

use thiserror::Error;

/// Errors from token or password operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Uniform verification failure. Expired, malformed, and
    /// wrong-signature tokens all collapse into this variant so clients
    /// learn nothing about the signing setup.
    #[error("invalid token")]
    InvalidToken,

    #[error("token signing failed: {0}")]
    Signing(String),

    #[error("password hashing failed: {0}")]
    Hashing(String),
}
