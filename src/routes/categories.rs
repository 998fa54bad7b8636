use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::catalog::categories;
use crate::error::AppResult;
use crate::state::AppState;
use crate::types::{CreateCategoryRequest, Items};

pub async fn list_categories(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(Items::from(categories::list_categories(&state.db).await?)))
}

pub async fn create_category(
    State(state): State<AppState>,
    Json(req): Json<CreateCategoryRequest>,
) -> AppResult<impl IntoResponse> {
    let category = categories::create_category(&state.db, &req.name, req.slug.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(category)))
}
