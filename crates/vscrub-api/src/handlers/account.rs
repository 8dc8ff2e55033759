//! Registration, login, and profile handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use vscrub_auth::{default_token_ttl, hash_password, verify_password};
use vscrub_models::{utc_day_key, Profile, User};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: Profile,
}

fn validate_registration(req: &RegisterRequest) -> ApiResult<()> {
    let username = req.username.trim();
    if username.len() < 3 || username.len() > 32 {
        return Err(ApiError::validation(
            "username must be 3-32 characters",
        ));
    }
    if !req.email.contains('@') || req.email.len() > 254 {
        return Err(ApiError::validation("invalid email address"));
    }
    if req.password.len() < 6 {
        return Err(ApiError::validation(
            "password must be at least 6 characters",
        ));
    }
    Ok(())
}

/// `POST /api/auth/register`
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    validate_registration(&req)?;

    let password_hash =
        hash_password(&req.password).map_err(|e| ApiError::internal(e.to_string()))?;
    let user = User::new(req.username.trim(), req.email.trim(), password_hash);
    let profile = user.profile();

    let token = state
        .tokens
        .issue(&user, default_token_ttl())
        .map_err(|e| ApiError::internal(e.to_string()))?;

    state.users.insert(user).await?;
    info!(username = %profile.username, "account registered");

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user: profile })))
}

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let user = state
        .users
        .find_by_email(req.email.trim())
        .await
        .map_err(|_| ApiError::InvalidCredentials)?;

    if !verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::InvalidCredentials);
    }

    let now = Utc::now();
    let today = utc_day_key(now);
    let user = state
        .users
        .update(&user.id, |u| {
            u.last_login = Some(now);
            u.roll_usage_date(&today);
            u.clone()
        })
        .await?;

    let token = state
        .tokens
        .issue(&user, default_token_ttl())
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Json(AuthResponse {
        token,
        user: user.profile(),
    }))
}

#[derive(Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub user: Profile,
}

/// `GET /api/auth/verify`
pub async fn verify(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<VerifyResponse>> {
    let user = state.current_user(&auth.user_id).await?;
    Ok(Json(VerifyResponse {
        valid: true,
        user: user.profile(),
    }))
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub token: String,
}

/// `POST /api/auth/refresh`
pub async fn refresh(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<RefreshResponse>> {
    // Re-read the account so the new token carries the current tier
    let user = state.current_user(&auth.user_id).await?;
    let token = state
        .tokens
        .issue(&user, default_token_ttl())
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Json(RefreshResponse { token }))
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub message: &'static str,
}

/// `POST /api/auth/logout`
///
/// Tokens are stateless, so there is nothing to revoke server-side; the
/// client discards its copy. Kept so the web client has a uniform flow.
pub async fn logout(_auth: AuthUser) -> Json<LogoutResponse> {
    Json(LogoutResponse {
        message: "logged out",
    })
}

/// `GET /api/user/profile`
pub async fn get_profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Profile>> {
    let user = state.current_user(&auth.user_id).await?;
    Ok(Json(user.profile()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
}

/// `PUT /api/user/profile`
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<Profile>> {
    if let Some(username) = req.username.as_deref() {
        let username = username.trim();
        if username.len() < 3 || username.len() > 32 {
            return Err(ApiError::validation("username must be 3-32 characters"));
        }
    }
    if let Some(email) = req.email.as_deref() {
        if !email.contains('@') {
            return Err(ApiError::validation("invalid email address"));
        }
    }

    let user = state
        .users
        .update_identity(
            &auth.user_id,
            req.username.as_deref().map(str::trim),
            req.email.as_deref().map(str::trim),
        )
        .await?;
    Ok(Json(user.profile()))
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// `PUT /api/user/password`
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    if req.new_password.len() < 6 {
        return Err(ApiError::validation(
            "password must be at least 6 characters",
        ));
    }

    let user = state.users.get(&auth.user_id).await?;
    if !verify_password(&req.current_password, &user.password_hash) {
        return Err(ApiError::forbidden("current password is incorrect"));
    }

    let password_hash =
        hash_password(&req.new_password).map_err(|e| ApiError::internal(e.to_string()))?;
    state
        .users
        .update(&auth.user_id, |u| u.password_hash = password_hash)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct UserStatsResponse {
    pub plan_tier: String,
    pub total_processed: u64,
    pub processed_today: u32,
    /// `None` means unlimited.
    pub remaining_today: Option<u32>,
    pub joined_at: chrono::DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<chrono::DateTime<Utc>>,
}

/// `GET /api/user/stats`
pub async fn user_stats(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<UserStatsResponse>> {
    let user = state.current_user(&auth.user_id).await?;
    let today = utc_day_key(Utc::now());
    let processed_today = user.effective_daily_usage(&today);

    Ok(Json(UserStatsResponse {
        plan_tier: user.plan_tier.as_str().to_string(),
        total_processed: user.total_usage,
        processed_today,
        remaining_today: user
            .plan_tier
            .daily_quota()
            .map(|quota| quota.saturating_sub(processed_today)),
        joined_at: user.created_at,
        last_login: user.last_login,
    }))
}

#[derive(Debug, Deserialize)]
pub struct DeleteAccountRequest {
    /// Password confirmation; deletion is not reversible.
    pub password: String,
}

/// `DELETE /api/user/account`
pub async fn delete_account(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<DeleteAccountRequest>,
) -> ApiResult<StatusCode> {
    let user = state.users.get(&auth.user_id).await?;
    if !verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::forbidden("password is incorrect"));
    }

    state.users.remove(&auth.user_id).await?;
    info!(user_id = %auth.user_id, "account deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct PermissionsResponse {
    pub plan_tier: String,
    /// `None` means unlimited.
    pub daily_quota: Option<u32>,
    pub remaining_today: Option<u32>,
    pub upload_limit_mib: u64,
    pub allows_batch: bool,
    pub credits: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_end: Option<chrono::DateTime<Utc>>,
}

/// `GET /api/user/permissions`
pub async fn permissions(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<PermissionsResponse>> {
    let user = state.current_user(&auth.user_id).await?;
    let today = utc_day_key(Utc::now());
    let tier = user.plan_tier;

    let daily_quota = tier.daily_quota();
    let remaining_today =
        daily_quota.map(|quota| quota.saturating_sub(user.effective_daily_usage(&today)));

    Ok(Json(PermissionsResponse {
        plan_tier: tier.as_str().to_string(),
        daily_quota,
        remaining_today,
        upload_limit_mib: tier.upload_limit_mib(),
        allows_batch: tier.allows_batch(),
        credits: user.credits,
        subscription_end: user.subscription_end,
    }))
}
