//! HTTP route handlers and the API router.
//!
//! - `health`: liveness, readiness, metrics and version probes
//! - `auth`: registration, login, session, logout and password changes
//! - `books`, `categories`: the public catalog, gated reads/downloads and admin uploads
//! - `favorites`: each reader's saved books
//! - `dashboard`: admin totals
//! - `reviews`: threaded reviews behind the access gate
//! - `periods`, `enrollments`, `users`: admin management of the registry

pub mod auth;
pub mod books;
pub mod categories;
pub mod dashboard;
pub mod enrollments;
pub mod favorites;
pub mod health;
pub mod periods;
pub mod reviews;
pub mod users;

use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Router,
};

use crate::error::AppError;
use crate::middleware::{
    auth::{require_admin, require_auth},
    csrf::csrf_protection_middleware,
    validation::max_body_bytes,
    AuthUser,
};
use crate::registry::{self, AccessGrant};
use crate::state::AppState;

/// Runs the access gate for the caller, counting and logging refusals.
pub(crate) async fn gate(state: &AppState, auth: &AuthUser) -> Result<AccessGrant, AppError> {
    match registry::require_access(&state.db, auth.user_id).await {
        Ok(grant) => Ok(grant),
        Err(e) => {
            if matches!(e, AppError::NoCurrentPeriod | AppError::NotEnrolled(_) | AppError::AccessDenied(_)) {
                state.metrics.inc_access_denied();
                tracing::info!("Access gate refused user {}: {}", auth.user_id, e);
            }
            Err(e)
        }
    }
}

async fn route_not_found() -> AppError {
    AppError::NotFound("route not found".to_string())
}

/// All routes with their guards. Transport-level layers (tracing, compression,
/// global rate limiting, security headers) are added by the binary.
pub fn build_router(state: AppState) -> Router {
    let upload_limit = max_body_bytes(&state.config);

    let public = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics))
        .route("/metrics/prometheus", get(health::metrics_prometheus))
        .route("/version", get(health::version))
        .route("/api/health", get(health::api_health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/categories", get(categories::list_categories))
        .route("/api/books", get(books::list_books))
        .route("/api/books/{id}", get(books::get_book))
        .route("/api/periods", get(periods::list_periods))
        .route("/api/periods/current", get(periods::current_period));

    let authenticated = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/change-password", post(auth::change_password))
        .route("/api/books/{id}/read", get(books::read_book))
        .route("/api/books/{id}/download", get(books::download_book))
        .route(
            "/api/books/{id}/favorite",
            get(favorites::favorite_status).post(favorites::add_favorite).delete(favorites::remove_favorite),
        )
        .route("/api/favorites", get(favorites::list_favorites))
        .route("/api/books/{id}/reviews", get(reviews::list_reviews).post(reviews::create_review))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    // Layers run outside-in: require_auth, then require_admin
    let admin = Router::new()
        .route("/api/admin/dashboard", get(dashboard::admin_dashboard))
        .route("/api/admin/users", get(users::list_users).post(users::create_user))
        .route("/api/admin/users/{id}", patch(users::update_user))
        .route("/api/admin/categories", post(categories::create_category))
        .route("/api/admin/books", post(books::create_book).layer(DefaultBodyLimit::max(upload_limit)))
        .route(
            "/api/admin/enrollments",
            get(enrollments::list_enrollments).post(enrollments::create_enrollment),
        )
        .route("/api/admin/enrollments/{id}", patch(enrollments::update_enrollment))
        .route("/api/admin/periods", post(periods::create_period))
        .route("/api/admin/periods/{id}/current", patch(periods::set_current_period))
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public)
        .merge(authenticated)
        .merge(admin)
        .fallback(route_not_found)
        .layer(from_fn(csrf_protection_middleware))
        .with_state(state)
}
