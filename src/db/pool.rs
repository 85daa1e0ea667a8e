//! Database connection pool

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Filesystem path behind a database URL, if it has one
fn file_path(database_path: &str) -> Option<&str> {
    let path = database_path
        .strip_prefix("sqlite://")
        .or_else(|| database_path.strip_prefix("sqlite:"))
        .unwrap_or(database_path);

    if path.is_empty() || path.starts_with(":memory:") {
        None
    } else {
        Some(path.split('?').next().unwrap_or(path))
    }
}

/// Create a new SQLite connection pool
pub async fn create_pool(database_path: &str) -> Result<SqlitePool, sqlx::Error> {
    // Ensure parent directory exists
    if let Some(parent) = file_path(database_path).and_then(|p| Path::new(p).parent()) {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).ok();
        }
    }

    let options = SqliteConnectOptions::from_str(database_path)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(10));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Take SQLite's write lock as the first statement of a transaction.
///
/// A transaction that reads first and writes later cannot wait for the lock
/// in WAL mode; it fails with `SQLITE_BUSY` if another writer committed in
/// between.
pub async fn claim_write_lock(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE cards SET key = key WHERE 0")
        .execute(conn)
        .await?;
    Ok(())
}

/// Run database migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let migrations = [include_str!("../../migrations/001_initial_schema.sql")];

    for migration_sql in migrations {
        for stmt in parse_sql_statements(migration_sql) {
            let stmt = stmt.trim();
            if stmt.is_empty() || stmt.starts_with("--") {
                continue;
            }

            if let Err(e) = sqlx::query(stmt).execute(pool).await {
                let err_str = e.to_string();
                if !err_str.contains("already exists") {
                    tracing::warn!(
                        "Migration statement failed: {} - {}",
                        &stmt[..stmt.len().min(50)],
                        e
                    );
                    return Err(e);
                }
            }
        }
    }

    Ok(())
}

/// Split a migration into statements, ignoring `;` inside parentheses,
/// string literals and line comments
fn parse_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut paren_depth: i32 = 0;
    let mut in_string = false;
    let mut in_line_comment = false;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '-' && chars.peek() == Some(&'-') && !in_string {
            in_line_comment = true;
            continue;
        }
        if in_line_comment {
            if c == '\n' {
                in_line_comment = false;
                current.push(c);
            }
            continue;
        }

        match c {
            '\'' => {
                in_string = !in_string;
                current.push(c);
            }
            '(' if !in_string => {
                paren_depth += 1;
                current.push(c);
            }
            ')' if !in_string => {
                paren_depth = (paren_depth - 1).max(0);
                current.push(c);
            }
            ';' if !in_string && paren_depth == 0 => {
                let stmt = current.trim().to_string();
                if !stmt.is_empty() {
                    statements.push(stmt);
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }

    let stmt = current.trim().to_string();
    if !stmt.is_empty() {
        statements.push(stmt);
    }

    statements
}

/// Initialize database - create pool and run migrations
pub async fn init_database(database_path: &str) -> Result<SqlitePool, sqlx::Error> {
    let pool = create_pool(database_path).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}
