//! Aggregate figures for the admin dashboard.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::catalog::activity::{self, ActivityKind, BookActivity};
use crate::error::{AppError, AppResult};
use crate::models::AcademicPeriod;
use crate::registry::periods;

const TOP_BOOKS: i64 = 5;

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub users: i64,
    pub books: i64,
    pub categories: i64,
    pub reviews: i64,
    pub enrollments: i64,
    /// Active, not revoked enrollments of the current period. Zero when no period is current.
    pub active_enrollments: i64,
    pub current_period: Option<AcademicPeriod>,
    pub reads: i64,
    pub downloads: i64,
    pub most_active_books: Vec<BookActivity>,
}

async fn count_rows(db: &SqlitePool, table: &str) -> AppResult<i64> {
    Ok(sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table)).fetch_one(db).await?)
}

pub async fn dashboard(db: &SqlitePool) -> AppResult<Dashboard> {
    let current_period = match periods::current_period(db).await {
        Ok(period) => Some(period),
        Err(AppError::NoCurrentPeriod) => None,
        Err(e) => return Err(e),
    };
    let active_enrollments: i64 = match &current_period {
        Some(period) => {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM enrollments WHERE period_id = ?1 AND is_active = 1 AND can_access = 1",
            )
            .bind(period.id)
            .fetch_one(db)
            .await?
        }
        None => 0,
    };

    Ok(Dashboard {
        users: count_rows(db, "users").await?,
        books: count_rows(db, "books").await?,
        categories: count_rows(db, "categories").await?,
        reviews: count_rows(db, "reviews").await?,
        enrollments: count_rows(db, "enrollments").await?,
        active_enrollments,
        current_period,
        reads: activity::count(db, ActivityKind::Read).await?,
        downloads: activity::count(db, ActivityKind::Download).await?,
        most_active_books: activity::most_active_books(db, TOP_BOOKS).await?,
    })
}
