use std::sync::Arc;

use crate::auth::TokenService;
use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::middleware::{rate_limit, EndpointRateLimiter};
use crate::storage::ObjectStorage;

/// Shared application state handed to every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Arc<AppConfig>,
    pub metrics: Metrics,
    /// Per-endpoint limits for login, registration, password changes and review creation.
    pub rate_limiter: EndpointRateLimiter,
    pub storage: Arc<dyn ObjectStorage>,
    pub tokens: TokenService,
}

impl AppState {
    pub fn new(db: sqlx::SqlitePool, config: AppConfig, storage: Arc<dyn ObjectStorage>) -> Self {
        let rate_limiter = EndpointRateLimiter::new().with_limits(vec![
            (rate_limit::LOGIN, 10, 60),         // 10 login attempts per minute
            (rate_limit::REGISTER, 5, 60),       // 5 registrations per minute
            (rate_limit::CHANGE_PASSWORD, 5, 60),
            (rate_limit::CREATE_REVIEW, 30, 60), // 30 reviews per minute
        ]);
        let tokens = TokenService::from_config(&config.auth);

        Self {
            db,
            config: Arc::new(config),
            metrics: Metrics::new(),
            rate_limiter,
            storage,
            tokens,
        }
    }
}
