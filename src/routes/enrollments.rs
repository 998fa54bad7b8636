use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};

use crate::error::AppResult;
use crate::middleware::AuthUser;
use crate::registry::enrollments::{self, EnrollmentUpdate, NewEnrollment};
use crate::state::AppState;
use crate::types::{CreateEnrollmentRequest, Items, UpdateEnrollmentRequest};

pub async fn list_enrollments(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(Items::from(enrollments::list_enrollments(&state.db).await?)))
}

pub async fn create_enrollment(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Json(req): Json<CreateEnrollmentRequest>,
) -> AppResult<impl IntoResponse> {
    let enrollment = enrollments::create_enrollment(
        &state.db,
        NewEnrollment {
            user_id: req.user_id,
            period_id: req.period_id,
            display_name: req.display_name,
            avatar_url: req.avatar_url,
            career: req.career,
            semester: req.semester,
            can_access: req.can_access,
        },
    )
    .await?;
    tracing::info!(
        "Admin {} enrolled user {} in period {}",
        admin.user_id,
        enrollment.user_id,
        enrollment.period_id
    );
    Ok((StatusCode::CREATED, Json(enrollment)))
}

pub async fn update_enrollment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateEnrollmentRequest>,
) -> AppResult<impl IntoResponse> {
    let update = EnrollmentUpdate {
        display_name: req.display_name,
        avatar_url: req.avatar_url,
        career: req.career,
        semester: req.semester,
        can_access: req.can_access,
        is_active: req.is_active,
    };
    Ok(Json(enrollments::update_enrollment(&state.db, id, update).await?))
}
