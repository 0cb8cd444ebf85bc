//! SQLite-backed correlation store
//!
//! Connections come from an r2d2 pool; every query runs on the blocking
//! thread pool so callers on the async runtime never wait on disk I/O.

use super::{migrations, CorrelationStore, StoreError, StoreResult};
use crate::dates::persisted_now;
use crate::model::{
    CorrelationKind, IssueLink, NewProjectPair, ProjectPair, SprintLink, TaskCorrelation,
    WorklogCorrelation, WorklogLink,
};
use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const TASK_COLUMNS: &str = "id, project_id, kind, source_task_id, source_parent_id, target_issue_id,
     target_sprint_id, target_parent_id, created_at, updated_at, deleted";

const WORKLOG_COLUMNS: &str = "id, target_issue_id, target_worklog_id, source_time_entry_id,
     target_user, source_user_id, logged_seconds, created_at, updated_at, deleted";

fn storage(context: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::Storage(format!("{}: {}", context, e))
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<TaskCorrelation> {
    let kind: String = row.get(2)?;
    let kind = CorrelationKind::parse(&kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown correlation kind '{}'", kind).into(),
        )
    })?;
    Ok(TaskCorrelation {
        id: row.get(0)?,
        project_id: row.get(1)?,
        kind,
        source_task_id: row.get(3)?,
        source_parent_id: row.get(4)?,
        target_issue_id: row.get(5)?,
        target_sprint_id: row.get(6)?,
        target_parent_id: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        deleted: row.get(10)?,
    })
}

fn worklog_from_row(row: &Row<'_>) -> rusqlite::Result<WorklogCorrelation> {
    Ok(WorklogCorrelation {
        id: row.get(0)?,
        target_issue_id: row.get(1)?,
        target_worklog_id: row.get(2)?,
        source_time_entry_id: row.get(3)?,
        target_user: row.get(4)?,
        source_user_id: row.get(5)?,
        logged_seconds: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        deleted: row.get(9)?,
    })
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<ProjectPair> {
    Ok(ProjectPair {
        id: row.get(0)?,
        name: row.get(1)?,
        source_workspace_id: row.get(2)?,
        target_project_id: row.get(3)?,
        target_project_key: row.get(4)?,
        target_epic_id: row.get(5)?,
    })
}

fn query_task(
    conn: &Connection,
    filter: &str,
    args: impl rusqlite::Params,
) -> StoreResult<Option<TaskCorrelation>> {
    let sql = format!(
        "SELECT {} FROM external_tasks WHERE deleted = 0 AND {} ORDER BY id LIMIT 1",
        TASK_COLUMNS, filter
    );
    conn.query_row(&sql, args, task_from_row)
        .optional()
        .map_err(|e| storage("Failed to query task correlation", e))
}

fn query_worklog(
    conn: &Connection,
    filter: &str,
    args: impl rusqlite::Params,
) -> StoreResult<Option<WorklogCorrelation>> {
    let sql = format!(
        "SELECT {} FROM external_time_entries WHERE deleted = 0 AND {} ORDER BY id LIMIT 1",
        WORKLOG_COLUMNS, filter
    );
    conn.query_row(&sql, args, worklog_from_row)
        .optional()
        .map_err(|e| storage("Failed to query worklog correlation", e))
}

#[allow(clippy::too_many_arguments)]
fn upsert_task(
    conn: &Connection,
    project_id: i64,
    kind: CorrelationKind,
    source_task_id: i64,
    source_parent_id: i64,
    target_issue_id: Option<i64>,
    target_sprint_id: i64,
    target_parent_id: Option<i64>,
) -> StoreResult<TaskCorrelation> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| storage("Failed to begin transaction", e))?;
    let now = persisted_now();

    tx.execute(
        r#"
        INSERT INTO external_tasks
            (project_id, kind, source_task_id, source_parent_id, target_issue_id,
             target_sprint_id, target_parent_id, created_at, updated_at, deleted)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
        ON CONFLICT(kind, source_task_id) WHERE deleted = 0 DO UPDATE SET
            project_id = excluded.project_id,
            source_parent_id = excluded.source_parent_id,
            target_issue_id = excluded.target_issue_id,
            target_sprint_id = excluded.target_sprint_id,
            target_parent_id = excluded.target_parent_id,
            updated_at = excluded.updated_at
        "#,
        params![
            project_id,
            kind.as_str(),
            source_task_id,
            source_parent_id,
            target_issue_id,
            target_sprint_id,
            target_parent_id,
            now,
            now,
        ],
    )
    .map_err(|e| storage("Failed to save task correlation", e))?;

    let saved = query_task(
        &tx,
        "kind = ? AND source_task_id = ?",
        params![kind.as_str(), source_task_id],
    )?
    .ok_or_else(|| StoreError::Corrupt(format!("{} correlation {} vanished", kind, source_task_id)))?;

    tx.commit()
        .map_err(|e| storage("Failed to commit transaction", e))?;
    Ok(saved)
}

/// SQLite-backed correlation store
pub struct SqlCorrelationStore {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl SqlCorrelationStore {
    /// Open (creating if needed) the database at `db_path` and apply pending migrations
    pub fn open<P: AsRef<Path>>(db_path: P, pool_size: u32) -> StoreResult<Self> {
        let manager = SqliteConnectionManager::file(db_path)
            .with_init(|conn| conn.busy_timeout(Duration::from_secs(5)));
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)
            .map_err(|e| storage("Failed to create connection pool", e))?;
        Self::with_pool(pool)
    }

    /// Private in-memory database; a single connection so every query sees the same data
    pub fn memory() -> StoreResult<Self> {
        let pool = Pool::builder()
            .max_size(1)
            .build(SqliteConnectionManager::memory())
            .map_err(|e| storage("Failed to create connection pool", e))?;
        Self::with_pool(pool)
    }

    fn with_pool(pool: Pool<SqliteConnectionManager>) -> StoreResult<Self> {
        migrations::migrate(&pool)?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool
                .get()
                .map_err(|e| storage("Failed to get connection", e))?;
            f(&conn)
        })
        .await
        .map_err(|e| storage("Task join error", e))?
    }
}

#[async_trait]
impl CorrelationStore for SqlCorrelationStore {
    async fn list_projects(&self) -> StoreResult<Vec<ProjectPair>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, name, source_workspace_id, target_project_id, target_project_key,
                            target_epic_id
                     FROM external_projects ORDER BY id",
                )
                .map_err(|e| storage("Failed to prepare statement", e))?;
            let projects = stmt
                .query_map([], project_from_row)
                .map_err(|e| storage("Failed to list projects", e))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| storage("Failed to read project row", e))?;
            Ok(projects)
        })
        .await
    }

    async fn get_project(&self, id: i64) -> StoreResult<Option<ProjectPair>> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, name, source_workspace_id, target_project_id, target_project_key,
                        target_epic_id
                 FROM external_projects WHERE id = ?",
                params![id],
                project_from_row,
            )
            .optional()
            .map_err(|e| storage("Failed to get project", e))
        })
        .await
    }

    async fn add_project(&self, project: NewProjectPair) -> StoreResult<ProjectPair> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO external_projects
                    (name, source_workspace_id, target_project_id, target_project_key, target_epic_id)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    project.name,
                    project.source_workspace_id,
                    project.target_project_id,
                    project.target_project_key,
                    project.target_epic_id,
                ],
            )
            .map_err(|e| storage("Failed to add project", e))?;
            Ok(ProjectPair {
                id: conn.last_insert_rowid(),
                name: project.name,
                source_workspace_id: project.source_workspace_id,
                target_project_id: project.target_project_id,
                target_project_key: project.target_project_key,
                target_epic_id: project.target_epic_id,
            })
        })
        .await
    }

    async fn get_task_and_issue(
        &self,
        source_task_id: i64,
        target_issue_id: i64,
    ) -> StoreResult<Option<TaskCorrelation>> {
        self.with_conn(move |conn| {
            query_task(
                conn,
                "kind = 'issue' AND source_task_id = ? AND target_issue_id = ?",
                params![source_task_id, target_issue_id],
            )
        })
        .await
    }

    async fn get_task_and_sprint(
        &self,
        source_task_id: i64,
        target_sprint_id: i64,
    ) -> StoreResult<Option<TaskCorrelation>> {
        self.with_conn(move |conn| {
            query_task(
                conn,
                "kind = 'sprint' AND source_task_id = ? AND target_sprint_id = ?",
                params![source_task_id, target_sprint_id],
            )
        })
        .await
    }

    async fn get_task_if_exists(
        &self,
        source_task_id: i64,
    ) -> StoreResult<Option<TaskCorrelation>> {
        self.with_conn(move |conn| {
            query_task(
                conn,
                "kind = 'sprint' AND source_task_id = ?",
                params![source_task_id],
            )
        })
        .await
    }

    async fn get_sprint_if_exists(
        &self,
        target_sprint_id: i64,
    ) -> StoreResult<Option<TaskCorrelation>> {
        self.with_conn(move |conn| {
            query_task(
                conn,
                "kind = 'sprint' AND target_sprint_id = ?",
                params![target_sprint_id],
            )
        })
        .await
    }

    async fn get_task_in_sub_task(
        &self,
        source_task_id: i64,
    ) -> StoreResult<Option<TaskCorrelation>> {
        self.with_conn(move |conn| {
            query_task(
                conn,
                "kind = 'issue' AND source_task_id = ?",
                params![source_task_id],
            )
        })
        .await
    }

    async fn get_time_entry(
        &self,
        source_time_entry_id: i64,
    ) -> StoreResult<Option<WorklogCorrelation>> {
        self.with_conn(move |conn| {
            query_worklog(conn, "source_time_entry_id = ?", params![source_time_entry_id])
        })
        .await
    }

    async fn get_time_entry_and_worklog(
        &self,
        source_time_entry_id: i64,
        target_worklog_id: i64,
    ) -> StoreResult<Option<WorklogCorrelation>> {
        self.with_conn(move |conn| {
            query_worklog(
                conn,
                "source_time_entry_id = ? AND target_worklog_id = ?",
                params![source_time_entry_id, target_worklog_id],
            )
        })
        .await
    }

    async fn create_task_and_sprint(
        &self,
        project_id: i64,
        link: SprintLink,
    ) -> StoreResult<TaskCorrelation> {
        self.with_conn(move |conn| {
            upsert_task(
                conn,
                project_id,
                CorrelationKind::Sprint,
                link.source_task_id,
                link.source_parent_id,
                None,
                link.target_sprint_id,
                None,
            )
        })
        .await
    }

    async fn create_task_and_issue(
        &self,
        project_id: i64,
        link: IssueLink,
    ) -> StoreResult<TaskCorrelation> {
        self.with_conn(move |conn| {
            upsert_task(
                conn,
                project_id,
                CorrelationKind::Issue,
                link.source_task_id,
                link.source_parent_id,
                Some(link.target_issue_id),
                link.target_sprint_id,
                Some(link.target_sprint_id),
            )
        })
        .await
    }

    async fn update_task_and_issue(&self, record: TaskCorrelation) -> StoreResult<TaskCorrelation> {
        self.with_conn(move |conn| {
            let updated_at = persisted_now();
            let changed = conn
                .execute(
                    "UPDATE external_tasks SET
                        project_id = ?, source_task_id = ?, source_parent_id = ?,
                        target_issue_id = ?, target_sprint_id = ?, target_parent_id = ?,
                        created_at = ?, updated_at = ?
                     WHERE id = ? AND deleted = 0",
                    params![
                        record.project_id,
                        record.source_task_id,
                        record.source_parent_id,
                        record.target_issue_id,
                        record.target_sprint_id,
                        record.target_parent_id,
                        record.created_at,
                        updated_at,
                        record.id,
                    ],
                )
                .map_err(|e| storage("Failed to update task correlation", e))?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("task correlation {}", record.id)));
            }
            Ok(TaskCorrelation {
                updated_at,
                ..record
            })
        })
        .await
    }

    async fn create_time_entry_and_worklog(
        &self,
        link: WorklogLink,
    ) -> StoreResult<WorklogCorrelation> {
        self.with_conn(move |conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| storage("Failed to begin transaction", e))?;
            let now = persisted_now();
            tx.execute(
                r#"
                INSERT INTO external_time_entries
                    (target_issue_id, target_worklog_id, source_time_entry_id, target_user,
                     source_user_id, logged_seconds, created_at, updated_at, deleted)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0)
                ON CONFLICT(source_time_entry_id) WHERE deleted = 0 DO UPDATE SET
                    target_issue_id = excluded.target_issue_id,
                    target_worklog_id = excluded.target_worklog_id,
                    target_user = excluded.target_user,
                    source_user_id = excluded.source_user_id,
                    logged_seconds = excluded.logged_seconds,
                    updated_at = excluded.updated_at
                "#,
                params![
                    link.target_issue_id,
                    link.target_worklog_id,
                    link.source_time_entry_id,
                    link.target_user,
                    link.source_user_id,
                    link.logged_seconds,
                    now,
                    now,
                ],
            )
            .map_err(|e| storage("Failed to save worklog correlation", e))?;

            let saved = query_worklog(
                &tx,
                "source_time_entry_id = ?",
                params![link.source_time_entry_id],
            )?
            .ok_or_else(|| {
                StoreError::Corrupt(format!(
                    "worklog correlation {} vanished",
                    link.source_time_entry_id
                ))
            })?;
            tx.commit()
                .map_err(|e| storage("Failed to commit transaction", e))?;
            Ok(saved)
        })
        .await
    }

    async fn update_time_entry_and_worklog(
        &self,
        record: WorklogCorrelation,
    ) -> StoreResult<WorklogCorrelation> {
        self.with_conn(move |conn| {
            let updated_at = persisted_now();
            let changed = conn
                .execute(
                    "UPDATE external_time_entries SET
                        target_issue_id = ?, target_worklog_id = ?, source_time_entry_id = ?,
                        target_user = ?, source_user_id = ?, logged_seconds = ?,
                        created_at = ?, updated_at = ?
                     WHERE id = ? AND deleted = 0",
                    params![
                        record.target_issue_id,
                        record.target_worklog_id,
                        record.source_time_entry_id,
                        record.target_user,
                        record.source_user_id,
                        record.logged_seconds,
                        record.created_at,
                        updated_at,
                        record.id,
                    ],
                )
                .map_err(|e| storage("Failed to update worklog correlation", e))?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!(
                    "worklog correlation {}",
                    record.id
                )));
            }
            Ok(WorklogCorrelation {
                updated_at,
                ..record
            })
        })
        .await
    }
}
