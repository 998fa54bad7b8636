use sqlx::SqlitePool;

use crate::db::now_epoch;
use crate::error::{validation, AppError, AppResult, OptionExt};
use crate::models::Category;

const MAX_SLUG_LEN: usize = 64;

/// Derives a URL slug from a category name: lowercase ASCII alphanumerics
/// separated by single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

fn validate_slug(slug: &str) -> AppResult<()> {
    let valid = !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid {
        return Err(AppError::ValidationError {
            field: "slug".to_string(),
            message: "slug must contain lowercase letters, digits and inner dashes only".to_string(),
        });
    }
    validation::validate_max_len(slug, MAX_SLUG_LEN, "slug")
}

/// Creates a category. An empty `slug` is derived from the name.
pub async fn create_category(db: &SqlitePool, name: &str, slug: Option<&str>) -> AppResult<Category> {
    let name = validation::require_text(name, "name")?;
    let slug = match slug.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s.to_string(),
        None => slugify(&name),
    };
    validate_slug(&slug)?;

    let result = sqlx::query("INSERT INTO categories (name, slug, created_at) VALUES (?1, ?2, ?3)")
        .bind(&name)
        .bind(&slug)
        .bind(now_epoch())
        .execute(db)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => {
                AppError::Conflict(format!("a category named '{}' or with slug '{}' already exists", name, slug))
            }
            other => other,
        })?;

    tracing::info!("Created category {} ({})", result.last_insert_rowid(), slug);
    find_category(db, result.last_insert_rowid()).await
}

pub async fn list_categories(db: &SqlitePool) -> AppResult<Vec<Category>> {
    Ok(sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name ASC, id ASC")
        .fetch_all(db)
        .await?)
}

pub async fn find_category(db: &SqlitePool, id: i64) -> AppResult<Category> {
    sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?1")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_not_found("category")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Ciencias de la Computación"), "ciencias-de-la-computaci-n");
        assert_eq!(slugify("  Math & Logic  "), "math-logic");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn test_validate_slug() {
        assert!(validate_slug("systems-101").is_ok());
        assert!(validate_slug("Upper").is_err());
        assert!(validate_slug("-lead").is_err());
        assert!(validate_slug("").is_err());
    }
}
