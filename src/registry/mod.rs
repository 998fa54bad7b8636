//! Academic periods, enrollments and the access gate built on them.
//!
//! Every protected operation (reading a book, listing or posting reviews) calls
//! [`require_access`] on each request. Nothing is cached, so revoking an
//! enrollment or switching the current period takes effect immediately.

pub mod enrollments;
pub mod periods;

use sqlx::SqlitePool;

use crate::error::{AppError, AppResult};
use crate::models::{AcademicPeriod, Enrollment};

/// The period and enrollment that authorised a protected request.
#[derive(Debug, Clone)]
pub struct AccessGrant {
    pub period: AcademicPeriod,
    pub enrollment: Enrollment,
}

/// Resolves the caller's enrollment in the current period.
///
/// Failures stay distinguishable: `NoCurrentPeriod` (misconfiguration),
/// `NotEnrolled` (no active enrollment) and `AccessDenied` (revoked).
pub async fn require_access(db: &SqlitePool, user_id: i64) -> AppResult<AccessGrant> {
    let period = periods::current_period(db).await?;
    let enrollment = match enrollments::active_enrollment(db, user_id, period.id).await {
        Ok(enrollment) => enrollment,
        Err(AppError::NotFound(_)) => {
            return Err(AppError::NotEnrolled(format!(
                "no active enrollment in the current period '{}'",
                period.name
            )))
        }
        Err(e) => return Err(e),
    };
    Ok(AccessGrant { period, enrollment })
}
