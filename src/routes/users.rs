use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};

use crate::accounts::{self, NewUser, UserUpdate};
use crate::catalog::PageQuery;
use crate::error::AppResult;
use crate::middleware::AuthUser;
use crate::models::Role;
use crate::state::AppState;
use crate::types::{CreateUserRequest, UpdateUserRequest};

pub async fn list_users(State(state): State<AppState>, Query(query): Query<PageQuery>) -> AppResult<impl IntoResponse> {
    let catalog = &state.config.catalog;
    let (page, limit) = query.normalize(catalog.default_limit, catalog.max_limit);
    Ok(Json(accounts::list_users(&state.db, page, limit).await?))
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Json(req): Json<CreateUserRequest>,
) -> AppResult<impl IntoResponse> {
    let user = accounts::create_user(
        &state.db,
        NewUser {
            external_id: req.external_id,
            full_name: req.full_name,
            password: req.password,
            role: req.role.unwrap_or(Role::Student),
        },
    )
    .await?;
    tracing::info!("Admin {} created user {}", admin.user_id, user.id);
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> AppResult<impl IntoResponse> {
    let user = accounts::update_user(
        &state.db,
        id,
        UserUpdate { full_name: req.full_name, role: req.role, is_active: req.is_active },
    )
    .await?;
    tracing::info!(
        "Admin {} updated user {}: role={}, active={}",
        admin.user_id,
        id,
        user.role.as_str(),
        user.is_active
    );
    Ok(Json(user))
}
