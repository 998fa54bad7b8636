use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

/// Opens a connection pool with the per-connection pragmas the schema relies on.
pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                // Foreign keys are per-connection in SQLite
                sqlx::query("PRAGMA foreign_keys=ON;").execute(&mut *conn).await?;
                let _ = sqlx::query("PRAGMA busy_timeout=10000;").execute(&mut *conn).await;
                let _ = sqlx::query("PRAGMA temp_store=MEMORY;").execute(&mut *conn).await;
                Ok(())
            })
        })
        .connect(url)
        .await?;
    Ok(pool)
}

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    // Pragmas for better durability/performance
    if let Err(e) = sqlx::query("PRAGMA journal_mode=WAL;").execute(pool).await {
        tracing::warn!("Failed to set WAL journal mode: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA synchronous=NORMAL;").execute(pool).await {
        tracing::warn!("Failed to set synchronous mode: {}", e);
    }
    // Foreign keys are critical - fail if this doesn't work
    sqlx::query("PRAGMA foreign_keys=ON;").execute(pool).await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id TEXT NOT NULL UNIQUE,
            full_name TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'STUDENT' CHECK (role IN ('ADMIN', 'STUDENT')),
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS academic_periods (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            is_current INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS enrollments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            period_id INTEGER NOT NULL,
            display_name TEXT NOT NULL,
            avatar_url TEXT NOT NULL DEFAULT '',
            career TEXT NOT NULL DEFAULT '',
            semester TEXT NOT NULL DEFAULT '',
            can_access INTEGER NOT NULL DEFAULT 1,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            UNIQUE (user_id, period_id),
            FOREIGN KEY(user_id) REFERENCES users(id),
            FOREIGN KEY(period_id) REFERENCES academic_periods(id)
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            slug TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS books (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            author TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            cover_url TEXT NOT NULL DEFAULT '',
            storage_key TEXT NOT NULL UNIQUE,
            is_downloadable INTEGER NOT NULL DEFAULT 0,
            category_id INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            title_search TEXT NOT NULL DEFAULT '',
            author_search TEXT NOT NULL DEFAULT '',
            FOREIGN KEY(category_id) REFERENCES categories(id)
        )"#,
    )
    .execute(pool)
    .await?;

    // Append-only; parent_id points upward only
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS reviews (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            book_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            enrollment_id INTEGER NULL,
            parent_id INTEGER NULL,
            rating INTEGER NULL CHECK (rating IS NULL OR rating BETWEEN 1 AND 5),
            comment TEXT NOT NULL,
            display_name TEXT NOT NULL,
            avatar_url TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL,
            FOREIGN KEY(book_id) REFERENCES books(id),
            FOREIGN KEY(user_id) REFERENCES users(id),
            FOREIGN KEY(enrollment_id) REFERENCES enrollments(id),
            FOREIGN KEY(parent_id) REFERENCES reviews(id)
        )"#,
    )
    .execute(pool)
    .await?;

    // Search keys were added after the first release (migrations)
    for column in ["title_search", "author_search"] {
        let query = format!("ALTER TABLE books ADD COLUMN {} TEXT NOT NULL DEFAULT ''", column);
        if let Err(e) = sqlx::query(&query).execute(pool).await {
            match &e {
                sqlx::Error::Database(db_err) => {
                    let msg = db_err.message().to_lowercase();
                    if !msg.contains("duplicate") && !msg.contains("already exists") {
                        tracing::error!("Failed to add {} column to books: {}", column, e);
                        return Err(anyhow::anyhow!("Migration failed: {}", e));
                    }
                }
                _ => return Err(anyhow::anyhow!("Migration failed: {}", e)),
            }
        }
    }
    backfill_search_keys(pool).await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS favorites (
            user_id INTEGER NOT NULL,
            book_id INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (user_id, book_id),
            FOREIGN KEY(user_id) REFERENCES users(id),
            FOREIGN KEY(book_id) REFERENCES books(id)
        )"#,
    )
    .execute(pool)
    .await?;

    // Append-only log of presigned URLs handed out
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS book_activity (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            book_id INTEGER NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('READ', 'DOWNLOAD')),
            client_ip TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id),
            FOREIGN KEY(book_id) REFERENCES books(id)
        )"#,
    )
    .execute(pool)
    .await?;

    // The partial unique index is what keeps "at most one current period" true
    // even if a writer bypasses set_current_period; it must not be skipped.
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_periods_single_current ON academic_periods(is_current) WHERE is_current = 1",
    )
    .execute(pool)
    .await?;

    let indexes = [
        ("idx_enrollments_period", "CREATE INDEX IF NOT EXISTS idx_enrollments_period ON enrollments(period_id)"),
        ("idx_books_category", "CREATE INDEX IF NOT EXISTS idx_books_category ON books(category_id)"),
        ("idx_books_created", "CREATE INDEX IF NOT EXISTS idx_books_created ON books(created_at DESC, id DESC)"),
        ("idx_books_title", "CREATE INDEX IF NOT EXISTS idx_books_title ON books(title)"),
        ("idx_reviews_book_created", "CREATE INDEX IF NOT EXISTS idx_reviews_book_created ON reviews(book_id, created_at, id)"),
        ("idx_reviews_parent", "CREATE INDEX IF NOT EXISTS idx_reviews_parent ON reviews(parent_id)"),
        ("idx_favorites_user", "CREATE INDEX IF NOT EXISTS idx_favorites_user ON favorites(user_id, created_at DESC)"),
        ("idx_activity_book", "CREATE INDEX IF NOT EXISTS idx_activity_book ON book_activity(book_id, kind)"),
    ];

    for (name, query) in indexes {
        if let Err(e) = sqlx::query(query).execute(pool).await {
            match &e {
                sqlx::Error::Database(db_err) => {
                    let msg = db_err.message().to_lowercase();
                    if msg.contains("already exists") || msg.contains("duplicate") {
                        tracing::debug!("Index {} already exists, skipping", name);
                    } else {
                        tracing::warn!("Failed to create index {}: {}", name, e);
                    }
                }
                _ => {
                    tracing::warn!("Failed to create index {}: {}", name, e);
                }
            }
        }
    }

    Ok(())
}

/// Fills search keys for rows written before the columns existed.
async fn backfill_search_keys(pool: &SqlitePool) -> anyhow::Result<()> {
    let rows: Vec<(i64, String, String)> =
        sqlx::query_as("SELECT id, title, author FROM books WHERE title_search = '' OR author_search = ''")
            .fetch_all(pool)
            .await?;
    if rows.is_empty() {
        return Ok(());
    }
    tracing::info!("Backfilling search keys for {} books", rows.len());
    for (id, title, author) in rows {
        sqlx::query("UPDATE books SET title_search = ?1, author_search = ?2 WHERE id = ?3")
            .bind(search_key(&title))
            .bind(search_key(&author))
            .bind(id)
            .execute(pool)
            .await?;
    }
    Ok(())
}

/// Case-folded form of text used for substring search. SQLite's `LOWER()` only
/// folds ASCII, so folding happens here, on both the stored and the queried side.
pub fn search_key(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Current time as epoch seconds, the representation of every `created_at` column.
pub fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}
