/// Database layer for Courtline
///
/// Manages the SQLite connection pool, embedded migrations, and the
/// timestamp encoding shared by every waitlist table.

use crate::error::{WaitlistError, WaitlistResult};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::path::Path;
use std::str::FromStr;

/// Database connection options
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub max_connections: u32,
    pub enable_wal: bool,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            enable_wal: true,
        }
    }
}

/// Create a SQLite connection pool
pub async fn create_pool(path: &Path, options: DatabaseOptions) -> WaitlistResult<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(options.max_connections)
        .connect_with(
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(if options.enable_wal {
                    SqliteJournalMode::Wal
                } else {
                    SqliteJournalMode::Delete
                })
                .foreign_keys(true)
                .busy_timeout(std::time::Duration::from_secs(5)),
        )
        .await?;

    Ok(pool)
}

/// Create an in-memory pool with migrations applied.
///
/// Every SQLite `:memory:` connection is its own database, so the pool is
/// pinned to a single connection that never idles out.
pub async fn create_memory_pool() -> WaitlistResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run migrations for a database
/// Migrations are embedded at compile time from ./migrations directory
pub async fn run_migrations(pool: &SqlitePool) -> WaitlistResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;

    Ok(())
}

/// Test database connection
pub async fn test_connection(pool: &SqlitePool) -> WaitlistResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;

    Ok(())
}

/// Begin a transaction that takes the write lock up front.
///
/// A deferred transaction that reads before it writes fails with
/// `SQLITE_BUSY` when another writer got there first, without waiting on the
/// busy timeout. Taking the lock at `BEGIN` makes concurrent writers queue.
pub async fn begin_immediate(pool: &SqlitePool) -> WaitlistResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

/// Whether SQLite gave up waiting for a lock (`SQLITE_BUSY` or `SQLITE_LOCKED`)
pub fn is_busy(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .map(|code| matches!(code & 0xff, 5 | 6))
            .unwrap_or(false),
        _ => false,
    }
}

/// Encode a timestamp as fixed-width RFC 3339 text.
///
/// Fixed width keeps SQL text comparison chronological.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Decode a timestamp written by [`format_timestamp`]
pub fn parse_timestamp(s: &str) -> WaitlistResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| WaitlistError::Internal(format!("Invalid timestamp {}: {}", s, e)))
}

/// Decode an optional timestamp column
pub fn parse_optional_timestamp(s: Option<String>) -> WaitlistResult<Option<DateTime<Utc>>> {
    s.as_deref().map(parse_timestamp).transpose()
}

/// Current time truncated to the stored precision
pub fn now() -> DateTime<Utc> {
    // Round-tripping through the storage format keeps in-memory values equal to stored ones
    let now = Utc::now();
    parse_timestamp(&format_timestamp(now)).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_timestamp_text_order_is_chronological() {
        let earlier = parse_timestamp("2026-03-01T09:00:00.000Z").unwrap();
        let later = earlier + Duration::milliseconds(1);

        assert!(format_timestamp(earlier) < format_timestamp(later));
        assert_eq!(format_timestamp(earlier).len(), format_timestamp(later).len());
    }

    #[test]
    fn test_now_survives_round_trip() {
        let now = now();
        assert_eq!(parse_timestamp(&format_timestamp(now)).unwrap(), now);
    }

    #[tokio::test]
    async fn test_immediate_transaction_holds_write_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locks.sqlite");

        let pool = create_pool(&path, DatabaseOptions::default()).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let tx = begin_immediate(&pool).await.unwrap();

        // A second writer that refuses to wait sees the lock immediately
        let other = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(
                SqliteConnectOptions::new()
                    .filename(&path)
                    .busy_timeout(std::time::Duration::from_millis(0)),
            )
            .await
            .unwrap();
        let err = sqlx::query("INSERT INTO users (id, display_name) VALUES ('u1', 'Pat')")
            .execute(&other)
            .await
            .unwrap_err();
        assert!(is_busy(&err));

        tx.commit().await.unwrap();
        sqlx::query("INSERT INTO users (id, display_name) VALUES ('u1', 'Pat')")
            .execute(&other)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_memory_pool_has_schema() {
        let pool = create_memory_pool().await.unwrap();
        test_connection(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tournament_registrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_file_pool_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("courtline.sqlite");

        let pool = create_pool(&path, DatabaseOptions::default()).await.unwrap();
        run_migrations(&pool).await.unwrap();

        assert!(path.exists());
    }
}
