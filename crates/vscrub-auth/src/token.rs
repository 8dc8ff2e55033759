//! HS256 bearer tokens carrying identity and plan-tier claims.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use vscrub_models::{PlanTier, User};

use crate::error::AuthError;

/// Default token lifetime, matching the web client's session length.
pub fn default_token_ttl() -> Duration {
    Duration::days(7)
}

/// Claims carried by a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID.
    pub sub: String,
    pub username: String,
    /// Plan tier at issuance time; authorization re-reads the store for
    /// decisions that must see upgrades immediately.
    pub plan: PlanTier,
    /// Issued at (seconds since epoch).
    pub iat: i64,
    /// Expiration (seconds since epoch).
    pub exp: i64,
}

/// Capability interface for issuing and verifying bearer tokens.
pub trait TokenService: Send + Sync {
    /// Issue a token for `user` valid for `ttl`.
    fn issue(&self, user: &User, ttl: Duration) -> Result<String, AuthError>;

    /// Verify a token. Every failure mode maps to
    /// [`AuthError::InvalidToken`].
    fn verify(&self, token: &str) -> Result<Claims, AuthError>;
}

/// Token service backed by a shared HS256 secret.
pub struct HmacTokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl HmacTokenService {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

impl TokenService for HmacTokenService {
    fn issue(&self, user: &User, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.clone(),
            username: user.username.clone(),
            plan: user.plan_tier,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::default();
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                // Log the real reason server-side only
                debug!(error = %e, "token verification failed");
                AuthError::InvalidToken
            })
    }
}
