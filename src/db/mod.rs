mod meal_repo;

pub use meal_repo::MealRepository;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::error::{Result, StoreError};

/// Fixed file name of the meal database.
pub const DATABASE_NAME: &str = "meal-diary.db";

const SCHEMA: [&str; 2] = [
    r#"
    CREATE TABLE IF NOT EXISTS meals (
        id TEXT PRIMARY KEY,
        date TEXT NOT NULL,
        time TEXT NOT NULL,
        mealType TEXT NOT NULL,
        photoUri TEXT,
        note TEXT,
        createdAt INTEGER NOT NULL,
        updatedAt INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_meals_date ON meals(date)",
];

/// Open the database file and create the schema if needed
pub async fn init_db(path: &Path) -> std::result::Result<SqlitePool, sqlx::Error> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(sqlx::Error::Io)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);

    // One connection: the diary has a single writer.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    for statement in SCHEMA {
        sqlx::query(statement).execute(&pool).await?;
    }

    Ok(pool)
}

/// Shared handle to the meal database.
///
/// The pool is opened lazily on first use. Callers that arrive while the
/// first open is still in flight wait for that same open instead of starting
/// their own. A failed open leaves the handle empty so the next call retries.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

struct DatabaseInner {
    path: PathBuf,
    pool: OnceCell<SqlitePool>,
}

impl Database {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(DatabaseInner {
                path: path.into(),
                pool: OnceCell::new(),
            }),
        }
    }

    /// Handle for `<dir>/meal-diary.db`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(DATABASE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn is_open(&self) -> bool {
        self.inner.pool.initialized()
    }

    pub async fn pool(&self) -> Result<&SqlitePool> {
        self.inner
            .pool
            .get_or_try_init(|| async {
                tracing::debug!("Opening meal database at {}", self.inner.path.display());
                init_db(&self.inner.path).await.map_err(|e| {
                    tracing::error!(
                        "Failed to open meal database {}: {}",
                        self.inner.path.display(),
                        e
                    );
                    StoreError::Unavailable(e)
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_init_db_creates_table_and_index() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("test.db");

        let pool = init_db(&db_path).await.unwrap();
        assert!(db_path.exists());

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        let table_names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();
        assert_eq!(table_names, vec!["meals"]);

        let indexes: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type='index' AND tbl_name='meals'")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert!(indexes.iter().any(|i| i.0 == "idx_meals_date"));
    }

    #[tokio::test]
    async fn test_init_db_is_idempotent() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let pool = init_db(&db_path).await.unwrap();
        pool.close().await;

        init_db(&db_path).await.unwrap();
    }

    #[tokio::test]
    async fn test_database_opens_lazily() {
        let temp_dir = tempdir().unwrap();
        let db = Database::in_dir(temp_dir.path());

        assert!(!db.is_open());
        assert!(!db.path().exists());
        assert!(db.path().ends_with(DATABASE_NAME));

        db.pool().await.unwrap();
        assert!(db.is_open());
        assert!(db.path().exists());
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_pool() {
        let temp_dir = tempdir().unwrap();
        let db = Database::in_dir(temp_dir.path());
        let other = db.clone();

        let (a, b) = tokio::join!(db.pool(), other.pool());
        let (a, b) = (a.unwrap(), b.unwrap());

        assert!(std::ptr::eq(a, b));
    }

    #[tokio::test]
    async fn test_failed_open_is_retried() {
        let temp_dir = tempdir().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let db = Database::in_dir(&blocker);

        let err = db.pool().await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(!db.is_open());

        std::fs::remove_file(&blocker).unwrap();
        db.pool().await.unwrap();
        assert!(db.is_open());
    }
}
