use axum::{extract::State, response::IntoResponse, Json};

use crate::dashboard;
use crate::error::AppResult;
use crate::state::AppState;

pub async fn admin_dashboard(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(dashboard::dashboard(&state.db).await?))
}
