use chrono::NaiveDate;
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::db::now_epoch;
use crate::error::{validation, AppError, AppResult, OptionExt};
use crate::models::AcademicPeriod;

#[derive(Debug, Clone)]
pub struct NewPeriod {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub make_current: bool,
}

/// Parses a `YYYY-MM-DD` calendar date.
pub fn parse_date(value: &str, field: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| AppError::ValidationError {
        field: field.to_string(),
        message: format!("expected a YYYY-MM-DD date, got '{}'", value),
    })
}

pub async fn create_period(db: &SqlitePool, input: NewPeriod) -> AppResult<AcademicPeriod> {
    let name = validation::require_text(&input.name, "name")?;
    if input.end_date < input.start_date {
        return Err(AppError::InvalidInput("end_date must not be before start_date".to_string()));
    }

    let mut tx = db.begin().await?;
    let result = sqlx::query(
        "INSERT INTO academic_periods (name, start_date, end_date, is_current, created_at) VALUES (?1, ?2, ?3, 0, ?4)",
    )
    .bind(&name)
    .bind(input.start_date)
    .bind(input.end_date)
    .bind(now_epoch())
    .execute(&mut *tx)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict(format!("academic period '{}' already exists", name)),
        other => other,
    })?;
    let id = result.last_insert_rowid();

    if input.make_current {
        switch_current(&mut tx, id).await?;
    }
    tx.commit().await?;

    tracing::info!("Created academic period {} ({}), current={}", id, name, input.make_current);
    find_period(db, id).await
}

pub async fn list_periods(db: &SqlitePool) -> AppResult<Vec<AcademicPeriod>> {
    Ok(sqlx::query_as::<_, AcademicPeriod>(
        "SELECT * FROM academic_periods ORDER BY start_date DESC, id DESC",
    )
    .fetch_all(db)
    .await?)
}

pub async fn find_period(db: &SqlitePool, id: i64) -> AppResult<AcademicPeriod> {
    sqlx::query_as::<_, AcademicPeriod>("SELECT * FROM academic_periods WHERE id = ?1")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_not_found("academic period")
}

/// Returns the single period flagged current.
pub async fn current_period(db: &SqlitePool) -> AppResult<AcademicPeriod> {
    sqlx::query_as::<_, AcademicPeriod>("SELECT * FROM academic_periods WHERE is_current = 1 LIMIT 1")
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NoCurrentPeriod)
}

/// Makes `id` the current period. Clearing and setting happen in one transaction;
/// on any failure the transaction is dropped and the previous current period stays.
pub async fn set_current_period(db: &SqlitePool, id: i64) -> AppResult<AcademicPeriod> {
    let mut tx = db.begin().await?;
    switch_current(&mut tx, id).await?;
    tx.commit().await?;

    tracing::info!("Academic period {} is now current", id);
    find_period(db, id).await
}

async fn switch_current(tx: &mut Transaction<'_, Sqlite>, id: i64) -> AppResult<()> {
    sqlx::query("UPDATE academic_periods SET is_current = 0 WHERE is_current = 1")
        .execute(&mut **tx)
        .await?;
    let result = sqlx::query("UPDATE academic_periods SET is_current = 1 WHERE id = ?1")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("academic period not found".to_string()));
    }
    Ok(())
}
