//! Application state.

use std::sync::Arc;

use chrono::Utc;
use vscrub_auth::{HmacTokenService, TokenService};
use vscrub_jobs::JobTracker;
use vscrub_media::{FfmpegEngine, TranscodeEngine};
use vscrub_models::{PlanTier, User};
use vscrub_orders::OrderLedger;
use vscrub_store::UserStore;

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub users: Arc<UserStore>,
    pub tokens: Arc<dyn TokenService>,
    pub tracker: Arc<JobTracker>,
    pub ledger: Arc<OrderLedger>,
    pub engine: Arc<dyn TranscodeEngine>,
}

impl AppState {
    /// Create new application state with the FFmpeg engine.
    pub async fn new(config: ApiConfig) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(&config.work_dir).await?;
        let engine = Arc::new(FfmpegEngine::new(config.ffmpeg_timeout_secs));
        Ok(Self::with_engine(config, engine))
    }

    /// Create state with a caller-provided engine. Tests use this to
    /// script engine behavior.
    pub fn with_engine(config: ApiConfig, engine: Arc<dyn TranscodeEngine>) -> Self {
        let users = Arc::new(UserStore::new());
        let tokens: Arc<dyn TokenService> =
            Arc::new(HmacTokenService::new(config.jwt_secret.as_bytes()));
        let ledger = Arc::new(OrderLedger::new(Arc::clone(&users)));

        Self {
            config,
            users,
            tokens,
            tracker: Arc::new(JobTracker::new()),
            ledger,
            engine,
        }
    }

    /// Load the caller's account, applying the lazy subscription-expiry
    /// downgrade under the user's lock.
    pub async fn current_user(&self, user_id: &str) -> ApiResult<User> {
        let user = self
            .users
            .update(user_id, |user| {
                if let Some(end) = user.subscription_end {
                    if end < Utc::now() && user.plan_tier != PlanTier::Free {
                        user.plan_tier = PlanTier::Free;
                        user.subscription_end = None;
                    }
                }
                user.clone()
            })
            .await
            .map_err(|_| ApiError::unauthorized("account no longer exists"))?;
        Ok(user)
    }
}
