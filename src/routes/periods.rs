use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::error::{AppError, AppResult};
use crate::registry::periods::{self, NewPeriod};
use crate::state::AppState;
use crate::types::{CreatePeriodRequest, Items};

pub async fn list_periods(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(Items::from(periods::list_periods(&state.db).await?)))
}

/// Public lookup; the absence of a current period is a plain 404 here.
pub async fn current_period(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    match periods::current_period(&state.db).await {
        Ok(period) => Ok(Json(period)),
        Err(AppError::NoCurrentPeriod) => Err(AppError::NotFound("no current academic period".to_string())),
        Err(e) => Err(e),
    }
}

pub async fn create_period(
    State(state): State<AppState>,
    Json(req): Json<CreatePeriodRequest>,
) -> AppResult<impl IntoResponse> {
    let input = NewPeriod {
        name: req.name,
        start_date: periods::parse_date(&req.start_date, "start_date")?,
        end_date: periods::parse_date(&req.end_date, "end_date")?,
        make_current: req.make_current,
    };
    let period = periods::create_period(&state.db, input).await?;
    Ok((StatusCode::CREATED, Json(period)))
}

pub async fn set_current_period(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<impl IntoResponse> {
    Ok(Json(periods::set_current_period(&state.db, id).await?))
}
