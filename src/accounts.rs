//! Credential store: user accounts, roles and password checks.

use sqlx::SqlitePool;

use crate::auth;
use crate::catalog::books::Page;
use crate::config::BootstrapConfig;
use crate::db::now_epoch;
use crate::error::{validation, AppError, AppResult, OptionExt};
use crate::models::{Role, User};

const MAX_EXTERNAL_ID_LEN: usize = 20;
const MAX_PASSWORD_LEN: usize = 128;
/// Lower bound for passwords chosen after the account exists.
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub external_id: String,
    pub full_name: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub full_name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

pub async fn create_user(db: &SqlitePool, input: NewUser) -> AppResult<User> {
    let external_id = validation::require_text(&input.external_id, "external_id")?;
    validation::validate_max_len(&external_id, MAX_EXTERNAL_ID_LEN, "external_id")?;
    let full_name = validation::require_text(&input.full_name, "full_name")?;
    if input.password.is_empty() {
        return Err(AppError::ValidationError {
            field: "password".to_string(),
            message: "password is required".to_string(),
        });
    }
    validation::validate_max_len(&input.password, MAX_PASSWORD_LEN, "password")?;

    let password = input.password;
    let password_hash = tokio::task::spawn_blocking(move || auth::hash_password(&password)).await??;

    let result = sqlx::query(
        "INSERT INTO users (external_id, full_name, password_hash, role, is_active, created_at) VALUES (?1, ?2, ?3, ?4, 1, ?5)",
    )
    .bind(&external_id)
    .bind(&full_name)
    .bind(&password_hash)
    .bind(input.role)
    .bind(now_epoch())
    .execute(db)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict("a user with this external id already exists".to_string()),
        other => other,
    })?;

    tracing::info!("Created {} account {}", input.role.as_str(), result.last_insert_rowid());
    find_user(db, result.last_insert_rowid()).await
}

pub async fn find_user(db: &SqlitePool, id: i64) -> AppResult<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?1")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_not_found("user")
}

pub async fn find_by_external_id(db: &SqlitePool, external_id: &str) -> AppResult<Option<User>> {
    Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE external_id = ?1")
        .bind(external_id.trim())
        .fetch_optional(db)
        .await?)
}

/// Verifies credentials. Unknown users and wrong passwords are indistinguishable to the caller.
pub async fn authenticate(db: &SqlitePool, external_id: &str, password: &str) -> AppResult<User> {
    let invalid = || AppError::Unauthorized("invalid credentials".to_string());
    let user = find_by_external_id(db, external_id).await?.ok_or_else(invalid)?;

    let candidate = password.to_string();
    let stored = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || auth::verify_password(&candidate, &stored)).await?;
    if !valid {
        return Err(invalid());
    }
    if !user.is_active {
        return Err(AppError::Unauthorized("user is inactive".to_string()));
    }
    Ok(user)
}

pub async fn update_user(db: &SqlitePool, id: i64, update: UserUpdate) -> AppResult<User> {
    let mut user = find_user(db, id).await?;
    if let Some(name) = update.full_name.as_deref() {
        user.full_name = validation::require_text(name, "full_name")?;
    }
    if let Some(role) = update.role {
        user.role = role;
    }
    if let Some(active) = update.is_active {
        user.is_active = active;
    }

    sqlx::query("UPDATE users SET full_name = ?1, role = ?2, is_active = ?3 WHERE id = ?4")
        .bind(&user.full_name)
        .bind(user.role)
        .bind(user.is_active)
        .bind(id)
        .execute(db)
        .await?;
    Ok(user)
}

/// Replaces the password after checking the current one.
pub async fn change_password(db: &SqlitePool, user_id: i64, current: &str, new_password: &str) -> AppResult<()> {
    if current.is_empty() || new_password.is_empty() {
        return Err(AppError::ValidationError {
            field: "password".to_string(),
            message: "current and new password are required".to_string(),
        });
    }
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::ValidationError {
            field: "new_password".to_string(),
            message: format!("new password must be at least {} characters", MIN_PASSWORD_LEN),
        });
    }
    validation::validate_max_len(new_password, MAX_PASSWORD_LEN, "new_password")?;

    let user = find_user(db, user_id).await?;
    let candidate = current.to_string();
    let stored = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || auth::verify_password(&candidate, &stored)).await?;
    if !valid {
        return Err(AppError::Unauthorized("current password is incorrect".to_string()));
    }

    let password = new_password.to_string();
    let password_hash = tokio::task::spawn_blocking(move || auth::hash_password(&password)).await??;
    sqlx::query("UPDATE users SET password_hash = ?1 WHERE id = ?2")
        .bind(&password_hash)
        .bind(user_id)
        .execute(db)
        .await?;
    tracing::info!("User {} changed their password", user_id);
    Ok(())
}

/// Creates the configured administrator unless an account with that id exists.
///
/// An existing account is left untouched, whatever its role or password.
pub async fn ensure_admin(db: &SqlitePool, bootstrap: &BootstrapConfig) -> AppResult<Option<User>> {
    if let Some(existing) = find_by_external_id(db, &bootstrap.admin_external_id).await? {
        if existing.role != Role::Admin {
            tracing::warn!(
                "Bootstrap admin id {} belongs to a {} account; leaving it unchanged",
                existing.external_id,
                existing.role.as_str()
            );
        }
        return Ok(None);
    }

    let admin = create_user(
        db,
        NewUser {
            external_id: bootstrap.admin_external_id.clone(),
            full_name: bootstrap.admin_full_name.clone().unwrap_or_else(|| "Administrator".to_string()),
            password: bootstrap.admin_password.clone(),
            role: Role::Admin,
        },
    )
    .await?;
    tracing::info!("Bootstrapped admin account {} ({})", admin.id, admin.external_id);
    Ok(Some(admin))
}

/// Accounts, newest first.
pub async fn list_users(db: &SqlitePool, page: i64, limit: i64) -> AppResult<Page<User>> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(db).await?;
    let items = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2")
        .bind(limit)
        .bind((page - 1).saturating_mul(limit))
        .fetch_all(db)
        .await?;
    Ok(Page { items, total, page, limit })
}
