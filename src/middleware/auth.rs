//! Request authentication: JWT from `Authorization: Bearer` or the
//! `access_token` cookie, resolved to a live user row on every request.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::accounts;
use crate::error::AppError;
use crate::models::Role;
use crate::state::AppState;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// The authenticated caller, inserted into request extensions by [`require_auth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|t| !t.is_empty())
}

/// Value of the `access_token` cookie, if present.
pub fn cookie_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == ACCESS_TOKEN_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

/// The token a request authenticates with. A bearer header wins over the cookie.
pub fn request_token(headers: &HeaderMap) -> Option<&str> {
    bearer_token(headers).or_else(|| cookie_token(headers))
}

/// Rejects unauthenticated requests with 401.
///
/// The user row is reloaded so a deactivation or role change applies to the
/// very next request, whatever the token says.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, AppError> {
    let token = request_token(req.headers())
        .ok_or_else(|| AppError::Unauthorized("authentication required".to_string()))?;
    let claims = state.tokens.verify(token)?;

    let user = match accounts::find_user(&state.db, claims.sub).await {
        Ok(user) => user,
        Err(AppError::NotFound(_)) => return Err(AppError::Unauthorized("invalid token".to_string())),
        Err(e) => return Err(e),
    };
    if !user.is_active {
        return Err(AppError::Unauthorized("user is inactive".to_string()));
    }

    req.extensions_mut().insert(AuthUser { user_id: user.id, role: user.role });
    Ok(next.run(req).await)
}

/// Admin-only guard; must run inside [`require_auth`].
pub async fn require_admin(req: Request, next: Next) -> Result<Response, AppError> {
    match req.extensions().get::<AuthUser>() {
        Some(user) if user.is_admin() => Ok(next.run(req).await),
        Some(user) => {
            tracing::warn!("User {} attempted an admin operation", user.user_id);
            Err(AppError::Forbidden("administrator role required".to_string()))
        }
        None => Err(AppError::Unauthorized("authentication required".to_string())),
    }
}
