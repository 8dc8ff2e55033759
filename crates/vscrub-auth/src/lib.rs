//! Bearer-token issuance/verification and password hashing.
//!
//! The token mechanism sits behind the [`TokenService`] trait so the
//! signing scheme (shared secret today, asymmetric later) can change
//! without touching handlers.

pub mod error;
pub mod password;
pub mod token;

pub use error::AuthError;
pub use password::{hash_password, verify_password};
pub use token::{default_token_ttl, Claims, HmacTokenService, TokenService};
