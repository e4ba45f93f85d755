//! SQLite connection handling and initialization.
//!
//! Provides a thread-safe wrapper around rusqlite for async operations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, ErrorCode};
use thiserror::Error;
use tokio::sync::Mutex;

use super::schema;

/// Errors that can occur during database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid database URL: {0}")]
    InvalidUrl(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Blocking task failed: {0}")]
    TaskFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DatabaseError {
    /// True when SQLite refused a write because of a UNIQUE, FOREIGN KEY or
    /// CHECK constraint.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation
        )
    }
}

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Thread-safe database connection wrapper.
///
/// Uses a Mutex to ensure only one operation accesses the connection at a time.
/// All operations are run via `spawn_blocking` to avoid blocking the async runtime.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// Runs migrations to ensure the schema is up to date.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let conn = tokio::task::spawn_blocking(move || -> Result<Connection> {
            let conn = Connection::open(&path)?;
            configure(&conn)?;
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            Ok(conn)
        })
        .await
        .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))??;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.run_migrations().await?;

        Ok(db)
    }

    /// Opens the database named by a connection URL.
    ///
    /// Accepts `sqlite:///relative/path.db`, `sqlite:////abs/path.db`,
    /// `sqlite::memory:`, `:memory:`, or a plain filesystem path.
    pub async fn open_url(url: &str) -> Result<Self> {
        match parse_sqlite_url(url)? {
            None => Self::open_in_memory().await,
            Some(path) => Self::open(path).await,
        }
    }

    /// Opens an in-memory database for testing.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = tokio::task::spawn_blocking(|| -> Result<Connection> {
            let conn = Connection::open_in_memory()?;
            configure(&conn)?;
            Ok(conn)
        })
        .await
        .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))??;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.run_migrations().await?;

        Ok(db)
    }

    /// Runs all schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = conn.blocking_lock();

            for migration in schema::all_migrations() {
                conn.execute_batch(migration)?;
            }

            Ok(())
        })
        .await
        .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?
    }

    /// Executes a function with access to the database connection.
    ///
    /// The function runs in a blocking task to avoid blocking the async runtime.
    pub async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            f(&conn)
        })
        .await
        .map_err(|e| DatabaseError::TaskFailed(e.to_string()))?
    }

    /// Executes a transaction with the given function.
    ///
    /// The transaction is automatically committed on success or rolled back on error.
    pub async fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            let tx = conn.transaction()?;
            let result = f(&tx)?;
            tx.commit()?;
            Ok(result)
        })
        .await
        .map_err(|e| DatabaseError::TaskFailed(e.to_string()))?
    }
}

/// Resolves a connection URL to a file path, or `None` for in-memory.
/// Per-connection setup: foreign keys and the `unicode_lower` SQL function.
///
/// SQLite's own `lower()` and `LIKE` only fold ASCII, so text searches compare
/// `unicode_lower(column)` against an already lowercased pattern.
fn configure(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.create_scalar_function(
        "unicode_lower",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )
}

fn parse_sqlite_url(url: &str) -> Result<Option<PathBuf>> {
    let url = url.trim();
    if url.is_empty() {
        return Err(DatabaseError::InvalidUrl("empty".to_string()));
    }
    let rest = match url.strip_prefix("sqlite:") {
        Some(rest) => {
            let rest = rest.strip_prefix("//").unwrap_or(rest);
            rest.strip_prefix('/').unwrap_or(rest)
        }
        None if url.contains("://") => return Err(DatabaseError::InvalidUrl(url.to_string())),
        None => url,
    };
    if rest.is_empty() || rest == ":memory:" {
        return Ok(None);
    }
    Ok(Some(PathBuf::from(rest)))
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_in_memory_creates_schema() {
        let db = Database::open_in_memory().await.unwrap();

        let tables: Vec<String> = db
            .with_conn(|conn| {
                let mut stmt = conn
                    .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
            })
            .await
            .unwrap();

        for table in ["accounts", "categories", "emails", "templates", "threads"] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[tokio::test]
    async fn open_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mail.db");

        {
            let db = Database::open(&path).await.unwrap();
            db.with_conn(|conn| {
                conn.execute(
                    "INSERT INTO categories (name, created_at, updated_at) VALUES ('Travel', 'x', 'x')",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();
        }

        let db = Database::open(&path).await.unwrap();
        let count: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM categories", [], |r| r.get(0))?))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn parses_sqlite_urls() {
        assert_eq!(
            parse_sqlite_url("sqlite:///./emails.db").unwrap(),
            Some(PathBuf::from("./emails.db"))
        );
        assert_eq!(
            parse_sqlite_url("sqlite:////var/lib/mail.db").unwrap(),
            Some(PathBuf::from("/var/lib/mail.db"))
        );
        assert_eq!(parse_sqlite_url("sqlite::memory:").unwrap(), None);
        assert_eq!(parse_sqlite_url(":memory:").unwrap(), None);
        assert_eq!(
            parse_sqlite_url("data/mail.db").unwrap(),
            Some(PathBuf::from("data/mail.db"))
        );
        assert!(parse_sqlite_url("postgres://localhost/db").is_err());
    }

    #[tokio::test]
    async fn transaction_rolls_back_on_error() {
        let db = Database::open_in_memory().await.unwrap();

        let result: Result<()> = db
            .transaction(|tx| {
                tx.execute(
                    "INSERT INTO categories (name, created_at, updated_at) VALUES ('Tmp', 'x', 'x')",
                    [],
                )?;
                Err(DatabaseError::TaskFailed("intentional error".to_string()))
            })
            .await;

        assert!(result.is_err());

        let count: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM categories", [], |r| r.get(0))?))
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn category_scope_uniqueness_is_enforced() {
        let db = Database::open_in_memory().await.unwrap();

        let result = db
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO categories (name, created_at, updated_at) VALUES ('Dup', 'x', 'x')",
                    [],
                )?;
                conn.execute(
                    "INSERT INTO categories (name, created_at, updated_at) VALUES ('Dup', 'x', 'x')",
                    [],
                )?;
                Ok(())
            })
            .await;

        assert!(result.unwrap_err().is_constraint_violation());
    }

    #[tokio::test]
    async fn unicode_lower_is_registered() {
        let db = Database::open_in_memory().await.unwrap();
        let lowered: String = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT unicode_lower('ÉTÉ Straße')", [], |row| row.get(0))?)
            })
            .await
            .unwrap();
        assert_eq!(lowered, "été straße");
    }
}
