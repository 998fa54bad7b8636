use axum::body::Bytes;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::catalog::categories;
use crate::db::{now_epoch, search_key};
use crate::error::{validation, AppError, AppResult, OptionExt};
use crate::models::Book;
use crate::storage::{generate_storage_key, ObjectStorage};

const MAX_QUERY_LEN: usize = 200;
const LIKE_ESCAPE: char = '!';

pub(crate) const BOOK_COLUMNS: &str = r#"SELECT b.id, b.title, b.author, b.description, b.cover_url, b.storage_key,
       b.is_downloadable, b.category_id, c.name AS category_name, c.slug AS category_slug, b.created_at
FROM books b
JOIN categories c ON c.id = b.category_id"#;

#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub description: String,
    pub cover_url: String,
    pub is_downloadable: bool,
    pub category_id: i64,
}

/// The uploaded document backing a book.
#[derive(Debug, Clone)]
pub struct BookFile {
    pub filename: String,
    pub content_type: String,
    pub content: Bytes,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookQuery {
    pub q: Option<String>,
    pub category_id: Option<i64>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl BookQuery {
    pub fn normalize(&self, default_limit: i64, max_limit: i64) -> (i64, i64) {
        PageQuery { page: self.page, limit: self.limit }.normalize(default_limit, max_limit)
    }
}

/// `?page=&limit=` for the plain paginated listings.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    /// Resolved `(page, limit)`: page at least 1, limit within `[1, max_limit]`.
    pub fn normalize(&self, default_limit: i64, max_limit: i64) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(default_limit).clamp(1, max_limit.max(1));
        (page, limit)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

fn escape_like_pattern(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | LIKE_ESCAPE) {
            out.push(LIKE_ESCAPE);
        }
        out.push(ch);
    }
    out
}

fn push_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, pattern: Option<&'a str>, category_id: Option<i64>) {
    qb.push(" WHERE 1 = 1");
    if let Some(pattern) = pattern {
        qb.push(" AND (b.title_search LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '!' OR b.author_search LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '!')");
    }
    if let Some(category_id) = category_id {
        qb.push(" AND b.category_id = ").push_bind(category_id);
    }
}

/// Paginated, newest-first book search over title and author.
pub async fn search_books(
    db: &SqlitePool,
    query: &BookQuery,
    default_limit: i64,
    max_limit: i64,
) -> AppResult<Page<Book>> {
    let (page, limit) = query.normalize(default_limit, max_limit);
    validation::validate_positive_id(query.category_id, "category_id")?;

    let term = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());
    if let Some(term) = term {
        validation::validate_max_len(term, MAX_QUERY_LEN, "q")?;
    }
    let pattern = term.map(|t| format!("%{}%", escape_like_pattern(&search_key(t))));

    let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM books b");
    push_filters(&mut count_qb, pattern.as_deref(), query.category_id);
    let total: i64 = count_qb.build_query_scalar().fetch_one(db).await?;

    let offset = (page - 1).saturating_mul(limit);
    let mut qb = QueryBuilder::new(BOOK_COLUMNS);
    push_filters(&mut qb, pattern.as_deref(), query.category_id);
    qb.push(" ORDER BY b.created_at DESC, b.id DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let items = qb.build_query_as::<Book>().fetch_all(db).await?;

    Ok(Page { items, total, page, limit })
}

pub async fn find_book(db: &SqlitePool, id: i64) -> AppResult<Book> {
    sqlx::query_as::<_, Book>(&format!("{} WHERE b.id = ?1", BOOK_COLUMNS))
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_not_found("book")
}

/// Uploads the document under a fresh key, then records the book.
///
/// If the row cannot be written the uploaded object is removed again.
pub async fn create_book(
    db: &SqlitePool,
    storage: &dyn ObjectStorage,
    input: NewBook,
    file: BookFile,
) -> AppResult<Book> {
    let title = validation::require_text(&input.title, "title")?;
    let author = validation::require_text(&input.author, "author")?;
    validation::validate_max_len(&title, 300, "title")?;
    validation::validate_max_len(&author, 200, "author")?;
    if file.content.is_empty() {
        return Err(AppError::ValidationError {
            field: "file".to_string(),
            message: "file is required".to_string(),
        });
    }
    categories::find_category(db, input.category_id).await?;

    let key = generate_storage_key(&file.filename);
    storage.upload(&key, file.content, &file.content_type).await?;

    let inserted = sqlx::query(
        r#"INSERT INTO books
            (title, author, description, cover_url, storage_key, is_downloadable, category_id, created_at,
             title_search, author_search)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
    )
    .bind(&title)
    .bind(&author)
    .bind(input.description.trim())
    .bind(input.cover_url.trim())
    .bind(&key)
    .bind(input.is_downloadable)
    .bind(input.category_id)
    .bind(now_epoch())
    .bind(search_key(&title))
    .bind(search_key(&author))
    .execute(db)
    .await;

    let id = match inserted {
        Ok(result) => result.last_insert_rowid(),
        Err(e) => {
            if let Err(cleanup) = storage.delete(&key).await {
                tracing::warn!("Failed to remove orphaned upload {}: {}", key, cleanup);
            }
            return Err(e.into());
        }
    };

    tracing::info!("Created book {} ({}) stored at {}", id, title, key);
    find_book(db, id).await
}
