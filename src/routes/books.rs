use std::time::Duration;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};

use crate::catalog::activity::{self, ActivityKind};
use crate::catalog::books::{self, BookFile, BookQuery, NewBook};
use crate::error::{AppError, AppResult};
use crate::middleware::{AuthUser, MaybeRemoteAddr};
use crate::routes::gate;
use crate::state::AppState;
use crate::types::ReadBookResponse;

pub async fn list_books(State(state): State<AppState>, Query(query): Query<BookQuery>) -> AppResult<impl IntoResponse> {
    let catalog = &state.config.catalog;
    let page = books::search_books(&state.db, &query, catalog.default_limit, catalog.max_limit).await?;
    Ok(Json(page))
}

pub async fn get_book(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<impl IntoResponse> {
    Ok(Json(books::find_book(&state.db, id).await?))
}

/// Presigned URL for an enrolled reader. The storage key never leaves the server.
pub async fn read_book(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    remote: MaybeRemoteAddr,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let book = books::find_book(&state.db, id).await?;
    gate(&state, &auth).await?;

    let ttl = state.config.storage.presign_ttl_seconds;
    let url = state.storage.presign_get(&book.storage_key, Duration::from_secs(ttl)).await?;
    let ip = remote.client_ip(&headers).to_string();
    activity::record(&state.db, auth.user_id, book.id, ActivityKind::Read, &ip).await?;
    state.metrics.inc_book_reads();
    tracing::info!("User {} opened book {}", auth.user_id, book.id);
    Ok(Json(ReadBookResponse { url, expires_in_seconds: ttl }))
}

/// Like `read_book`, for books the catalog marks as downloadable.
pub async fn download_book(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    remote: MaybeRemoteAddr,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let book = books::find_book(&state.db, id).await?;
    gate(&state, &auth).await?;
    if !book.is_downloadable {
        return Err(AppError::Forbidden("this book is not available for download".to_string()));
    }

    let ttl = state.config.storage.presign_ttl_seconds;
    let url = state.storage.presign_get(&book.storage_key, Duration::from_secs(ttl)).await?;
    let ip = remote.client_ip(&headers).to_string();
    activity::record(&state.db, auth.user_id, book.id, ActivityKind::Download, &ip).await?;
    state.metrics.inc_book_downloads();
    tracing::info!("User {} downloaded book {} from {}", auth.user_id, book.id, ip);
    Ok(Json(ReadBookResponse { url, expires_in_seconds: ttl }))
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Multipart book upload: text fields plus a `file` part.
pub async fn create_book(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let mut title = String::new();
    let mut author = String::new();
    let mut description = String::new();
    let mut cover_url = String::new();
    let mut is_downloadable = false;
    let mut category_id: Option<i64> = None;
    let mut file: Option<BookFile> = None;

    let max_upload = state.config.storage.max_upload_bytes;
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();
                let content = field.bytes().await?;
                if content.len() > max_upload {
                    return Err(AppError::ValidationError {
                        field: "file".to_string(),
                        message: format!("file exceeds the maximum size of {} bytes", max_upload),
                    });
                }
                file = Some(BookFile { filename, content_type, content });
            }
            "title" => title = field.text().await?,
            "author" => author = field.text().await?,
            "description" => description = field.text().await?,
            "cover_url" => cover_url = field.text().await?,
            "is_downloadable" => is_downloadable = parse_flag(&field.text().await?),
            "category_id" => {
                let raw = field.text().await?;
                let id = raw.trim().parse::<i64>().map_err(|_| AppError::ValidationError {
                    field: "category_id".to_string(),
                    message: format!("expected an integer, got '{}'", raw.trim()),
                })?;
                category_id = Some(id);
            }
            other => tracing::debug!("Ignoring unknown multipart field '{}'", other),
        }
    }

    let category_id = category_id.ok_or_else(|| AppError::ValidationError {
        field: "category_id".to_string(),
        message: "category_id is required".to_string(),
    })?;
    let file = file.ok_or_else(|| AppError::ValidationError {
        field: "file".to_string(),
        message: "file is required".to_string(),
    })?;

    let input = NewBook { title, author, description, cover_url, is_downloadable, category_id };
    let book = books::create_book(&state.db, state.storage.as_ref(), input, file).await?;
    state.metrics.inc_books_created();
    tracing::info!("Admin {} added book {}", admin.user_id, book.id);
    Ok((StatusCode::CREATED, Json(book)))
}
