use sqlx::SqlitePool;

use crate::catalog::books::{self, Page, BOOK_COLUMNS};
use crate::db::now_epoch;
use crate::error::{AppError, AppResult};
use crate::models::Book;

/// Marks a book as a favorite of the user. Returns `false` if it already was one.
pub async fn add_favorite(db: &SqlitePool, user_id: i64, book_id: i64) -> AppResult<bool> {
    books::find_book(db, book_id).await?;
    let result = sqlx::query(
        "INSERT INTO favorites (user_id, book_id, created_at) VALUES (?1, ?2, ?3) ON CONFLICT(user_id, book_id) DO NOTHING",
    )
    .bind(user_id)
    .bind(book_id)
    .bind(now_epoch())
    .execute(db)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn remove_favorite(db: &SqlitePool, user_id: i64, book_id: i64) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM favorites WHERE user_id = ?1 AND book_id = ?2")
        .bind(user_id)
        .bind(book_id)
        .execute(db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("book is not in favorites".to_string()));
    }
    Ok(())
}

pub async fn is_favorite(db: &SqlitePool, user_id: i64, book_id: i64) -> AppResult<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM favorites WHERE user_id = ?1 AND book_id = ?2")
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(db)
        .await?;
    Ok(found.is_some())
}

/// The user's favorites, most recently added first.
pub async fn list_favorites(db: &SqlitePool, user_id: i64, page: i64, limit: i64) -> AppResult<Page<Book>> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM favorites WHERE user_id = ?1")
        .bind(user_id)
        .fetch_one(db)
        .await?;
    let sql = format!(
        "{} JOIN favorites f ON f.book_id = b.id WHERE f.user_id = ?1 ORDER BY f.created_at DESC, b.id DESC LIMIT ?2 OFFSET ?3",
        BOOK_COLUMNS
    );
    let items = sqlx::query_as::<_, Book>(&sql)
        .bind(user_id)
        .bind(limit)
        .bind((page - 1).saturating_mul(limit))
        .fetch_all(db)
        .await?;
    Ok(Page { items, total, page, limit })
}
