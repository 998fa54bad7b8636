use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};

use crate::catalog::books;
use crate::error::{AppError, AppResult};
use crate::middleware::validation::sanitize_for_logging;
use crate::middleware::{rate_limit, AuthUser, MaybeRemoteAddr};
use crate::reviews::{self, NewReview};
use crate::routes::gate;
use crate::state::AppState;
use crate::types::{CreateReviewRequest, Items};

pub async fn list_reviews(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(book_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    books::find_book(&state.db, book_id).await?;
    gate(&state, &auth).await?;
    Ok(Json(Items::from(reviews::list_tree(&state.db, book_id).await?)))
}

pub async fn create_review(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(book_id): Path<i64>,
    remote: MaybeRemoteAddr,
    headers: HeaderMap,
    Json(req): Json<CreateReviewRequest>,
) -> AppResult<impl IntoResponse> {
    state
        .rate_limiter
        .check_endpoint_limit(rate_limit::CREATE_REVIEW, remote.client_ip(&headers))
        .await?;
    if req.parent_id.is_some_and(|id| id < 0) {
        return Err(AppError::InvalidInput("parent_id must be a positive integer".to_string()));
    }

    books::find_book(&state.db, book_id).await?;
    let grant = gate(&state, &auth).await?;

    let input = NewReview {
        book_id,
        author_id: auth.user_id,
        parent_id: req.parent_id,
        rating: req.rating,
        comment: req.comment,
    };
    match reviews::create_review(&state.db, input, &grant.enrollment, state.config.reviews.max_depth).await {
        Ok(review) => {
            state.metrics.inc_reviews_created();
            Ok((StatusCode::CREATED, Json(review)))
        }
        Err(e) => {
            if matches!(
                e,
                AppError::InvalidInput(_)
                    | AppError::InvalidRelation(_)
                    | AppError::DepthExceeded { .. }
                    | AppError::NotFound(_)
            ) {
                state.metrics.inc_reviews_rejected();
                tracing::info!(
                    "Rejected review by user {} on book {}: {}",
                    auth.user_id,
                    book_id,
                    sanitize_for_logging(&e.to_string())
                );
            }
            Err(e)
        }
    }
}
