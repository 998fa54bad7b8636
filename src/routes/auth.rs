use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Extension, Json,
};

use crate::accounts::{self, NewUser};
use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::ACCESS_TOKEN_COOKIE;
use crate::middleware::validation::sanitize_for_logging;
use crate::middleware::{rate_limit, AuthUser, MaybeRemoteAddr};
use crate::models::Role;
use crate::state::AppState;
use crate::types::{ChangePasswordRequest, LoginRequest, LoginResponse, RegisterRequest};

fn session_cookie(cfg: &AuthConfig, token: &str, max_age: i64) -> AppResult<HeaderValue> {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite={}; Max-Age={}",
        ACCESS_TOKEN_COOKIE,
        token,
        cfg.same_site(),
        max_age
    );
    if cfg.cookie_secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|e| AppError::Internal(anyhow::anyhow!("invalid cookie value: {}", e)))
}

pub async fn register(
    State(state): State<AppState>,
    remote: MaybeRemoteAddr,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    state.rate_limiter.check_endpoint_limit(rate_limit::REGISTER, remote.client_ip(&headers)).await?;

    let user = accounts::create_user(
        &state.db,
        NewUser {
            external_id: req.external_id,
            full_name: req.full_name,
            password: req.password,
            role: Role::Student,
        },
    )
    .await?;
    state.metrics.inc_registrations();
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    remote: MaybeRemoteAddr,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let ip = remote.client_ip(&headers);
    state.rate_limiter.check_endpoint_limit(rate_limit::LOGIN, ip).await?;

    let user = match accounts::authenticate(&state.db, &req.external_id, &req.password).await {
        Ok(user) => user,
        Err(e) => {
            state.metrics.inc_failed_logins();
            tracing::info!("Failed login for '{}' from {}: {}", sanitize_for_logging(&req.external_id), ip, e);
            return Err(e);
        }
    };

    let token = state.tokens.issue(&user)?;
    let cookie = session_cookie(&state.config.auth, &token, state.tokens.ttl_seconds())?;
    state.metrics.inc_logins();
    tracing::info!("User {} logged in", user.id);

    let body = LoginResponse {
        token,
        token_type: "Bearer",
        expires_in_seconds: state.tokens.ttl_seconds(),
        user,
    };
    Ok(([(header::SET_COOKIE, cookie)], Json(body)))
}

pub async fn me(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> AppResult<impl IntoResponse> {
    Ok(Json(accounts::find_user(&state.db, auth.user_id).await?))
}

/// Clears the session cookie. Bearer tokens stay valid until they expire.
pub async fn logout(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> AppResult<impl IntoResponse> {
    let cookie = session_cookie(&state.config.auth, "", 0)?;
    tracing::info!("User {} logged out", auth.user_id);
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    remote: MaybeRemoteAddr,
    headers: HeaderMap,
    Json(req): Json<ChangePasswordRequest>,
) -> AppResult<impl IntoResponse> {
    state
        .rate_limiter
        .check_endpoint_limit(rate_limit::CHANGE_PASSWORD, remote.client_ip(&headers))
        .await?;
    accounts::change_password(&state.db, auth.user_id, &req.current_password, &req.new_password).await?;
    Ok(StatusCode::NO_CONTENT)
}
