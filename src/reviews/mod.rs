//! Threaded reviews: creation with depth and rating rules, and tree listing.
//!
//! Depth counts from the root, which sits at depth 1. Only roots may carry a
//! rating. Reviews are append-only.

pub mod tree;

use sqlx::SqlitePool;

use crate::db::now_epoch;
use crate::error::{AppError, AppResult, OptionExt};
use crate::models::{Enrollment, Review};

pub use tree::{build_forest, count_nodes, ReviewNode};

#[derive(Debug, Clone)]
pub struct NewReview {
    pub book_id: i64,
    pub author_id: i64,
    pub parent_id: Option<i64>,
    pub rating: Option<i64>,
    pub comment: String,
}

/// Creates a review authored through `enrollment`, which must already have
/// passed the access gate.
///
/// Every check runs before the single insert, so a rejected review writes nothing.
pub async fn create_review(
    db: &SqlitePool,
    input: NewReview,
    enrollment: &Enrollment,
    max_depth: u32,
) -> AppResult<Review> {
    let max_depth = max_depth.max(1);

    let comment = input.comment.trim();
    if comment.is_empty() {
        return Err(AppError::InvalidInput("comment is required".to_string()));
    }
    if let Some(rating) = input.rating {
        if !(1..=5).contains(&rating) {
            return Err(AppError::InvalidInput("rating must be between 1 and 5".to_string()));
        }
    }

    let parent_id = input.parent_id.filter(|&id| id != 0);
    if let Some(parent_id) = parent_id {
        let parent = fetch_review(db, parent_id, "parent review").await?;
        if parent.book_id != input.book_id {
            return Err(AppError::InvalidRelation(
                "parent review belongs to a different book".to_string(),
            ));
        }
        if input.rating.is_some() {
            return Err(AppError::InvalidInput("rating allowed only on root comments".to_string()));
        }
        let depth = parent_depth(db, &parent, max_depth).await?;
        if depth + 1 > max_depth {
            return Err(AppError::DepthExceeded { max_depth });
        }
    }

    let result = sqlx::query(
        r#"INSERT INTO reviews
            (book_id, user_id, enrollment_id, parent_id, rating, comment, display_name, avatar_url, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
    )
    .bind(input.book_id)
    .bind(input.author_id)
    .bind(enrollment.id)
    .bind(parent_id)
    .bind(input.rating)
    .bind(comment)
    .bind(&enrollment.display_name)
    .bind(&enrollment.avatar_url)
    .bind(now_epoch())
    .execute(db)
    .await?;

    let id = result.last_insert_rowid();
    tracing::info!(
        "Review {} created on book {} by user {} (parent: {:?})",
        id,
        input.book_id,
        input.author_id,
        parent_id
    );
    find_review(db, id).await
}

pub async fn find_review(db: &SqlitePool, id: i64) -> AppResult<Review> {
    fetch_review(db, id, "review").await
}

async fn fetch_review(db: &SqlitePool, id: i64, label: &str) -> AppResult<Review> {
    sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = ?1")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_not_found(label)
}

/// Depth of `parent`, walking `parent_id` links upward.
///
/// The walk stops once `cap` is reached, since any deeper value is rejected the
/// same way. A dangling ancestor ends the walk as if it were a root.
async fn parent_depth(db: &SqlitePool, parent: &Review, cap: u32) -> AppResult<u32> {
    let mut depth = 1;
    let mut next = parent.parent_id;
    while let Some(ancestor) = next {
        if depth >= cap {
            break;
        }
        let row: Option<Option<i64>> = sqlx::query_scalar("SELECT parent_id FROM reviews WHERE id = ?1")
            .bind(ancestor)
            .fetch_optional(db)
            .await?;
        match row {
            Some(up) => {
                depth += 1;
                next = up;
            }
            None => break,
        }
    }
    Ok(depth)
}

/// Loads a book's reviews oldest first and assembles the thread forest.
pub async fn list_tree(db: &SqlitePool, book_id: i64) -> AppResult<Vec<ReviewNode>> {
    let reviews = sqlx::query_as::<_, Review>(
        "SELECT * FROM reviews WHERE book_id = ?1 ORDER BY created_at ASC, id ASC",
    )
    .bind(book_id)
    .fetch_all(db)
    .await?;
    Ok(build_forest(reviews))
}
