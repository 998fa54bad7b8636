use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};

use crate::catalog::{favorites, PageQuery};
use crate::error::AppResult;
use crate::middleware::AuthUser;
use crate::state::AppState;
use crate::types::FavoriteResponse;

/// 201 when newly added, 200 when the book already was a favorite.
pub async fn add_favorite(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let added = favorites::add_favorite(&state.db, auth.user_id, id).await?;
    let status = if added { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(FavoriteResponse { book_id: id, favorite: true })))
}

pub async fn remove_favorite(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    favorites::remove_favorite(&state.db, auth.user_id, id).await?;
    Ok(Json(FavoriteResponse { book_id: id, favorite: false }))
}

pub async fn favorite_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let favorite = favorites::is_favorite(&state.db, auth.user_id, id).await?;
    Ok(Json(FavoriteResponse { book_id: id, favorite }))
}

pub async fn list_favorites(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<PageQuery>,
) -> AppResult<impl IntoResponse> {
    let catalog = &state.config.catalog;
    let (page, limit) = query.normalize(catalog.default_limit, catalog.max_limit);
    Ok(Json(favorites::list_favorites(&state.db, auth.user_id, page, limit).await?))
}
