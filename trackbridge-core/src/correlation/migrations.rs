//! Versioned schema for the correlation database
//!
//! Each migration is applied atomically and tracked in `schema_version`.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::info;

use super::{StoreError, StoreResult};
use crate::dates::persisted_now;

pub struct Migration {
    pub version: i32,
    pub description: &'static str,
    pub up_sql: &'static str,
}

/// All available migrations in order
pub fn get_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Project pairs and task/sprint/issue correlations",
            up_sql: r#"
                CREATE TABLE IF NOT EXISTS external_projects (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    source_workspace_id TEXT NOT NULL,
                    target_project_id INTEGER NOT NULL,
                    target_project_key TEXT NOT NULL,
                    target_epic_id INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS external_tasks (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    project_id INTEGER NOT NULL,
                    kind TEXT NOT NULL CHECK(kind IN ('sprint', 'issue')),
                    source_task_id INTEGER NOT NULL,
                    source_parent_id INTEGER NOT NULL DEFAULT 0,
                    target_issue_id INTEGER,
                    target_sprint_id INTEGER NOT NULL DEFAULT 0,
                    target_parent_id INTEGER,
                    created_at TEXT NOT NULL,           -- YYYY-MM-DD HH:MM:SS
                    updated_at TEXT NOT NULL,
                    deleted INTEGER NOT NULL DEFAULT 0
                );

                CREATE UNIQUE INDEX IF NOT EXISTS idx_tasks_active_source
                    ON external_tasks(kind, source_task_id) WHERE deleted = 0;
                CREATE INDEX IF NOT EXISTS idx_tasks_sprint ON external_tasks(target_sprint_id);
            "#,
        },
        Migration {
            version: 2,
            description: "Time entry/worklog correlations",
            up_sql: r#"
                CREATE TABLE IF NOT EXISTS external_time_entries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    target_issue_id INTEGER NOT NULL,
                    target_worklog_id INTEGER NOT NULL,
                    source_time_entry_id INTEGER NOT NULL,
                    target_user TEXT NOT NULL,
                    source_user_id INTEGER NOT NULL,
                    logged_seconds INTEGER NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    deleted INTEGER NOT NULL DEFAULT 0
                );

                CREATE UNIQUE INDEX IF NOT EXISTS idx_time_entries_active_source
                    ON external_time_entries(source_time_entry_id) WHERE deleted = 0;
            "#,
        },
    ]
}

fn storage(context: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::Storage(format!("{}: {}", context, e))
}

/// Get current schema version from database
pub fn get_current_version(pool: &Pool<SqliteConnectionManager>) -> StoreResult<i32> {
    let conn = pool.get().map_err(|e| storage("Failed to get connection", e))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
        [],
    )
    .map_err(|e| storage("Failed to create schema_version", e))?;

    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .map_err(|e| storage("Failed to read schema version", e))
}

/// Run all pending migrations
pub fn migrate(pool: &Pool<SqliteConnectionManager>) -> StoreResult<()> {
    let current_version = get_current_version(pool)?;
    let pending: Vec<_> = get_migrations()
        .into_iter()
        .filter(|m| m.version > current_version)
        .collect();

    if pending.is_empty() {
        return Ok(());
    }

    let conn = pool.get().map_err(|e| storage("Failed to get connection", e))?;

    for migration in pending {
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| storage("Failed to begin migration", e))?;

        tx.execute_batch(migration.up_sql)
            .map_err(|e| storage(migration.description, e))?;

        tx.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?, ?)",
            params![migration.version, persisted_now()],
        )
        .map_err(|e| storage("Failed to record migration", e))?;

        tx.commit()
            .map_err(|e| storage("Failed to commit migration", e))?;

        info!(
            version = migration.version,
            description = migration.description,
            "Applied correlation store migration"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_latest_version() -> i32 {
        get_migrations().iter().map(|m| m.version).max().unwrap_or(0)
    }

    fn setup_test_pool() -> Pool<SqliteConnectionManager> {
        Pool::builder()
            .max_size(1)
            .build(SqliteConnectionManager::memory())
            .expect("Failed to create pool")
    }

    #[test]
    fn test_initial_migration() {
        let pool = setup_test_pool();
        migrate(&pool).expect("Migration failed");

        let conn = pool.get().unwrap();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert!(tables.contains(&"external_projects".to_string()));
        assert!(tables.contains(&"external_tasks".to_string()));
        assert!(tables.contains(&"external_time_entries".to_string()));
    }

    #[test]
    fn test_migration_version_tracking() {
        let pool = setup_test_pool();
        assert_eq!(get_current_version(&pool).unwrap(), 0);

        migrate(&pool).unwrap();
        assert_eq!(get_current_version(&pool).unwrap(), get_latest_version());

        // idempotent
        migrate(&pool).unwrap();
        assert_eq!(get_current_version(&pool).unwrap(), 2);
    }

    #[test]
    fn test_active_uniqueness_enforced() {
        let pool = setup_test_pool();
        migrate(&pool).unwrap();
        let conn = pool.get().unwrap();
        let insert = "INSERT INTO external_tasks
            (project_id, kind, source_task_id, created_at, updated_at, deleted)
            VALUES (1, 'issue', 5, 'x', 'x', ?)";

        conn.execute(insert, params![0]).unwrap();
        assert!(conn.execute(insert, params![0]).is_err());
        // soft-deleted rows do not count
        conn.execute(insert, params![1]).unwrap();
    }
}
