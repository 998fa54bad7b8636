use chrono::NaiveDate;
use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::catalog::categories;
use crate::config::AppConfig;
use crate::db;
use crate::models::{AcademicPeriod, Category, Enrollment, Role};
use crate::registry::enrollments::{self, NewEnrollment};
use crate::registry::periods::{self, NewPeriod};

pub const TEST_JWT_SECRET: &str = "test-secret-0123456789abcdef";

/// A migrated database living in a temporary directory for the test's lifetime.
pub struct TestDb {
    pub pool: SqlitePool,
    _dir: TempDir,
}

pub async fn test_db() -> TestDb {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
    let pool = db::connect(&url, 8).await.unwrap();
    db::init_db(&pool).await.unwrap();
    TestDb { pool, _dir: dir }
}

pub fn test_config() -> AppConfig {
    crate::config::from_toml(&format!(
        "[auth]\njwt_secret = \"{}\"\n\n[storage]\nbackend = \"memory\"\nbucket = \"test-shelf\"\n",
        TEST_JWT_SECRET
    ))
    .unwrap()
}

/// Inserts a user row directly. The password hash is a placeholder, so these
/// users cannot log in; use `accounts::create_user` when a login is needed.
pub async fn insert_user(pool: &SqlitePool, external_id: &str, role: Role) -> i64 {
    sqlx::query(
        "INSERT INTO users (external_id, full_name, password_hash, role, is_active, created_at) VALUES (?1, ?2, 'unusable', ?3, 1, ?4)",
    )
    .bind(external_id)
    .bind(format!("User {}", external_id))
    .bind(role)
    .bind(db::now_epoch())
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

pub fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

pub async fn create_period(pool: &SqlitePool, name: &str, make_current: bool) -> AcademicPeriod {
    periods::create_period(
        pool,
        NewPeriod {
            name: name.to_string(),
            start_date: date("2025-02-01"),
            end_date: date("2025-06-30"),
            make_current,
        },
    )
    .await
    .unwrap()
}

pub async fn enroll(pool: &SqlitePool, user_id: i64, period_id: i64, display_name: &str) -> Enrollment {
    enrollments::create_enrollment(
        pool,
        NewEnrollment {
            user_id,
            period_id,
            display_name: display_name.to_string(),
            avatar_url: format!("https://avatars.example/{}.png", user_id),
            career: "Computer Science".to_string(),
            semester: "5".to_string(),
            can_access: None,
        },
    )
    .await
    .unwrap()
}

pub async fn create_category(pool: &SqlitePool, name: &str) -> Category {
    categories::create_category(pool, name, None).await.unwrap()
}

/// Inserts a book row directly with an explicit creation time.
pub async fn insert_book(pool: &SqlitePool, title: &str, author: &str, category_id: i64, created_at: i64) -> i64 {
    sqlx::query(
        r#"INSERT INTO books (title, author, description, cover_url, storage_key, is_downloadable, category_id, created_at,
                              title_search, author_search)
           VALUES (?1, ?2, '', '', ?3, 0, ?4, ?5, ?6, ?7)"#,
    )
    .bind(title)
    .bind(author)
    .bind(format!("books/{}.pdf", uuid::Uuid::new_v4()))
    .bind(category_id)
    .bind(created_at)
    .bind(crate::db::search_key(title))
    .bind(crate::db::search_key(author))
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

/// A student enrolled in a fresh current period, plus one book to review.
pub struct ReviewFixture {
    pub db: TestDb,
    pub user_id: i64,
    pub enrollment: Enrollment,
    pub book_id: i64,
    pub other_book_id: i64,
}

pub async fn review_fixture() -> ReviewFixture {
    let db = test_db().await;
    let user_id = insert_user(&db.pool, "A001", Role::Student).await;
    let period = create_period(&db.pool, "2025-1", true).await;
    let enrollment = enroll(&db.pool, user_id, period.id, "Ana Reader").await;
    let category = create_category(&db.pool, "Programming").await;
    let book_id = insert_book(&db.pool, "Intro to Rust", "Ferris", category.id, 1_700_000_000).await;
    let other_book_id = insert_book(&db.pool, "Intro to Go", "Gopher", category.id, 1_700_000_001).await;
    ReviewFixture { db, user_id, enrollment, book_id, other_book_id }
}
