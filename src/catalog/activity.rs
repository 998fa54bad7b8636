use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::now_epoch;
use crate::error::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum ActivityKind {
    Read,
    Download,
}

/// Per-book read and download totals.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BookActivity {
    pub book_id: i64,
    pub title: String,
    pub author: String,
    pub reads: i64,
    pub downloads: i64,
}

/// Logs one issued read or download URL.
pub async fn record(db: &SqlitePool, user_id: i64, book_id: i64, kind: ActivityKind, client_ip: &str) -> AppResult<()> {
    sqlx::query("INSERT INTO book_activity (user_id, book_id, kind, client_ip, created_at) VALUES (?1, ?2, ?3, ?4, ?5)")
        .bind(user_id)
        .bind(book_id)
        .bind(kind)
        .bind(client_ip)
        .bind(now_epoch())
        .execute(db)
        .await?;
    Ok(())
}

pub async fn count(db: &SqlitePool, kind: ActivityKind) -> AppResult<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM book_activity WHERE kind = ?1")
        .bind(kind)
        .fetch_one(db)
        .await?)
}

/// Books with the most recorded activity, ties broken by id.
pub async fn most_active_books(db: &SqlitePool, limit: i64) -> AppResult<Vec<BookActivity>> {
    Ok(sqlx::query_as::<_, BookActivity>(
        r#"SELECT b.id AS book_id, b.title, b.author,
                  COALESCE(SUM(CASE WHEN a.kind = 'READ' THEN 1 ELSE 0 END), 0) AS reads,
                  COALESCE(SUM(CASE WHEN a.kind = 'DOWNLOAD' THEN 1 ELSE 0 END), 0) AS downloads
           FROM book_activity a
           JOIN books b ON b.id = a.book_id
           GROUP BY b.id, b.title, b.author
           ORDER BY COUNT(*) DESC, b.id ASC
           LIMIT ?1"#,
    )
    .bind(limit)
    .fetch_all(db)
    .await?)
}
