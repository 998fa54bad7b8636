use sqlx::SqlitePool;

use crate::db::now_epoch;
use crate::error::{validation, AppError, AppResult, OptionExt};
use crate::models::{Enrollment, EnrollmentView};
use crate::{accounts, registry::periods};

#[derive(Debug, Clone)]
pub struct NewEnrollment {
    pub user_id: i64,
    pub period_id: i64,
    pub display_name: String,
    pub avatar_url: String,
    pub career: String,
    pub semester: String,
    pub can_access: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct EnrollmentUpdate {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub career: Option<String>,
    pub semester: Option<String>,
    pub can_access: Option<bool>,
    pub is_active: Option<bool>,
}

pub async fn create_enrollment(db: &SqlitePool, input: NewEnrollment) -> AppResult<Enrollment> {
    let display_name = validation::require_text(&input.display_name, "display_name")?;
    accounts::find_user(db, input.user_id).await?;
    periods::find_period(db, input.period_id).await?;

    let result = sqlx::query(
        r#"INSERT INTO enrollments
            (user_id, period_id, display_name, avatar_url, career, semester, can_access, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8)"#,
    )
    .bind(input.user_id)
    .bind(input.period_id)
    .bind(&display_name)
    .bind(input.avatar_url.trim())
    .bind(input.career.trim())
    .bind(input.semester.trim())
    .bind(input.can_access.unwrap_or(true))
    .bind(now_epoch())
    .execute(db)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict("user is already enrolled in this period".to_string()),
        other => other,
    })?;

    find_enrollment(db, result.last_insert_rowid()).await
}

pub async fn find_enrollment(db: &SqlitePool, id: i64) -> AppResult<Enrollment> {
    sqlx::query_as::<_, Enrollment>("SELECT * FROM enrollments WHERE id = ?1")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_not_found("enrollment")
}

pub async fn list_enrollments(db: &SqlitePool) -> AppResult<Vec<EnrollmentView>> {
    Ok(sqlx::query_as::<_, EnrollmentView>(
        r#"SELECT e.id, e.user_id, u.external_id AS user_external_id, u.full_name AS user_full_name,
                  e.period_id, p.name AS period_name, e.display_name, e.avatar_url, e.career,
                  e.semester, e.can_access, e.is_active, e.created_at
           FROM enrollments e
           JOIN users u ON u.id = e.user_id
           JOIN academic_periods p ON p.id = e.period_id
           ORDER BY e.created_at DESC, e.id DESC"#,
    )
    .fetch_all(db)
    .await?)
}

/// Applies admin edits. Revocations apply to the next protected request; reviews keep the
/// display data they were created with.
pub async fn update_enrollment(db: &SqlitePool, id: i64, update: EnrollmentUpdate) -> AppResult<Enrollment> {
    let mut enrollment = find_enrollment(db, id).await?;
    if let Some(name) = update.display_name.as_deref() {
        enrollment.display_name = validation::require_text(name, "display_name")?;
    }
    if let Some(avatar) = update.avatar_url {
        enrollment.avatar_url = avatar.trim().to_string();
    }
    if let Some(career) = update.career {
        enrollment.career = career.trim().to_string();
    }
    if let Some(semester) = update.semester {
        enrollment.semester = semester.trim().to_string();
    }
    if let Some(can_access) = update.can_access {
        enrollment.can_access = can_access;
    }
    if let Some(is_active) = update.is_active {
        enrollment.is_active = is_active;
    }

    sqlx::query(
        r#"UPDATE enrollments
           SET display_name = ?1, avatar_url = ?2, career = ?3, semester = ?4, can_access = ?5, is_active = ?6
           WHERE id = ?7"#,
    )
    .bind(&enrollment.display_name)
    .bind(&enrollment.avatar_url)
    .bind(&enrollment.career)
    .bind(&enrollment.semester)
    .bind(enrollment.can_access)
    .bind(enrollment.is_active)
    .bind(id)
    .execute(db)
    .await?;

    tracing::info!(
        "Enrollment {} updated: can_access={}, is_active={}",
        id,
        enrollment.can_access,
        enrollment.is_active
    );
    Ok(enrollment)
}

/// The enrollment of `user_id` in `period_id`, if active and allowed to access.
///
/// * absent or inactive: `NotFound`
/// * active with `can_access = false`: `AccessDenied`
pub async fn active_enrollment(db: &SqlitePool, user_id: i64, period_id: i64) -> AppResult<Enrollment> {
    let enrollment = sqlx::query_as::<_, Enrollment>(
        "SELECT * FROM enrollments WHERE user_id = ?1 AND period_id = ?2 AND is_active = 1",
    )
    .bind(user_id)
    .bind(period_id)
    .fetch_optional(db)
    .await?
    .ok_or_not_found("active enrollment")?;

    if !enrollment.can_access {
        return Err(AppError::AccessDenied("access to the library has been revoked for this enrollment".to_string()));
    }
    Ok(enrollment)
}
