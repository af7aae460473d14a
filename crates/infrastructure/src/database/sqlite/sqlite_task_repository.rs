use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use taskcache_domain::entities::{NewTask, Task};
use taskcache_domain::repositories::TaskRepository;
use taskcache_errors::{TaskCacheError, TaskCacheResult};
use tracing::{debug, instrument};

use crate::{
    error_handling::{RepositoryErrorHelpers, RepositoryOperation},
    task_context,
    timeout_handler::TimeoutUtils,
};

pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (or creates) a SQLite database and prepares the schema.
    pub async fn new_embedded(database_path: &str) -> TaskCacheResult<Self> {
        use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
        use std::str::FromStr;

        debug!("Creating embedded SQLite task repository at: {}", database_path);

        let connect_options = SqliteConnectOptions::from_str(database_path)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .min_connections(1)
            .connect_with(connect_options)
            .await?;

        let repository = Self { pool };
        repository.run_migrations().await?;
        Ok(repository)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> TaskCacheResult<()> {
        let context = task_context!(RepositoryOperation::Migrate, owner_id = 0);
        debug!("Running SQLite database migrations");

        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                description TEXT NOT NULL,
                owner_id INTEGER NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_tasks_owner_id ON tasks(owner_id)",
        ];

        for sql in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| RepositoryErrorHelpers::task_database_error(&context, e))?;
        }

        debug!("Successfully completed SQLite database migrations");
        Ok(())
    }

    fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> TaskCacheResult<Task> {
        Ok(Task {
            id: row.try_get("id")?,
            description: row.try_get("description")?,
            owner_id: row.try_get("owner_id")?,
        })
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    #[instrument(skip(self, task))]
    async fn create(&self, owner_id: i64, task: &NewTask) -> TaskCacheResult<i64> {
        let context = task_context!(RepositoryOperation::Create, owner_id = owner_id);

        let id = TimeoutUtils::database(
            async {
                let mut tx = self
                    .pool
                    .begin()
                    .await
                    .map_err(|e| RepositoryErrorHelpers::task_database_error(&context, e))?;
                let row = sqlx::query(
                    "INSERT INTO tasks (description, owner_id) VALUES (?, ?) RETURNING id",
                )
                .bind(&task.description)
                .bind(owner_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| RepositoryErrorHelpers::task_database_error(&context, e))?;
                tx.commit()
                    .await
                    .map_err(|e| RepositoryErrorHelpers::task_database_error(&context, e))?;
                Ok::<_, TaskCacheError>(row.try_get::<i64, _>("id")?)
            },
            "create task",
        )
        .await?;

        RepositoryErrorHelpers::log_operation_success(
            &context.clone().with_task_id(id),
            None,
        );
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn list_all(&self, owner_id: i64) -> TaskCacheResult<Vec<Task>> {
        let context = task_context!(RepositoryOperation::List, owner_id = owner_id);

        let rows = TimeoutUtils::database(
            async {
                sqlx::query(
                    "SELECT id, description, owner_id FROM tasks WHERE owner_id = ? ORDER BY id",
                )
                .bind(owner_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| RepositoryErrorHelpers::task_database_error(&context, e))
            },
            "list tasks",
        )
        .await?;

        let tasks = rows
            .iter()
            .map(Self::row_to_task)
            .collect::<TaskCacheResult<Vec<_>>>()?;
        RepositoryErrorHelpers::log_operation_success(
            &context,
            Some(&format!("{} rows", tasks.len())),
        );
        Ok(tasks)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, owner_id: i64, id: i64) -> TaskCacheResult<Option<Task>> {
        let context = task_context!(RepositoryOperation::Read, owner_id = owner_id, task_id = id);

        let row = TimeoutUtils::database(
            async {
                sqlx::query(
                    "SELECT id, description, owner_id FROM tasks WHERE id = ? AND owner_id = ?",
                )
                .bind(id)
                .bind(owner_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| RepositoryErrorHelpers::task_database_error(&context, e))
            },
            "find task",
        )
        .await?;

        row.as_ref().map(Self::row_to_task).transpose()
    }

    #[instrument(skip(self, description))]
    async fn update_description(
        &self,
        owner_id: i64,
        id: i64,
        description: &str,
    ) -> TaskCacheResult<()> {
        let context = task_context!(RepositoryOperation::Update, owner_id = owner_id, task_id = id);

        let rows_affected = TimeoutUtils::database(
            async {
                let mut tx = self
                    .pool
                    .begin()
                    .await
                    .map_err(|e| RepositoryErrorHelpers::task_database_error(&context, e))?;
                let result =
                    sqlx::query("UPDATE tasks SET description = ? WHERE id = ? AND owner_id = ?")
                        .bind(description)
                        .bind(id)
                        .bind(owner_id)
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| RepositoryErrorHelpers::task_database_error(&context, e))?;
                tx.commit()
                    .await
                    .map_err(|e| RepositoryErrorHelpers::task_database_error(&context, e))?;
                Ok::<_, TaskCacheError>(result.rows_affected())
            },
            "update task",
        )
        .await?;

        if rows_affected == 0 {
            return Err(RepositoryErrorHelpers::task_not_found(&context));
        }
        RepositoryErrorHelpers::log_operation_success(&context, None);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, owner_id: i64, id: i64) -> TaskCacheResult<()> {
        let context = task_context!(RepositoryOperation::Delete, owner_id = owner_id, task_id = id);

        let rows_affected = TimeoutUtils::database(
            async {
                let mut tx = self
                    .pool
                    .begin()
                    .await
                    .map_err(|e| RepositoryErrorHelpers::task_database_error(&context, e))?;
                let result = sqlx::query("DELETE FROM tasks WHERE id = ? AND owner_id = ?")
                    .bind(id)
                    .bind(owner_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| RepositoryErrorHelpers::task_database_error(&context, e))?;
                tx.commit()
                    .await
                    .map_err(|e| RepositoryErrorHelpers::task_database_error(&context, e))?;
                Ok::<_, TaskCacheError>(result.rows_affected())
            },
            "delete task",
        )
        .await?;

        if rows_affected == 0 {
            return Err(RepositoryErrorHelpers::task_not_found(&context));
        }
        RepositoryErrorHelpers::log_operation_success(&context, None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn repository() -> SqliteTaskRepository {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let repository = SqliteTaskRepository::new(pool);
        repository.run_migrations().await.unwrap();
        repository
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let repo = repository().await;
        let id = repo.create(7, &NewTask::new("buy milk")).await.unwrap();
        assert!(id > 0);

        let task = repo.find_by_id(7, id).await.unwrap().unwrap();
        assert_eq!(task, Task::new(id, "buy milk", 7));
    }

    #[tokio::test]
    async fn test_rows_are_owner_scoped() {
        let repo = repository().await;
        let id = repo.create(7, &NewTask::new("mine")).await.unwrap();
        repo.create(8, &NewTask::new("theirs")).await.unwrap();

        assert!(repo.find_by_id(8, id).await.unwrap().is_none());
        assert_eq!(repo.list_all(7).await.unwrap().len(), 1);

        let err = repo.delete(8, id).await.unwrap_err();
        assert!(matches!(err, TaskCacheError::TaskNotFound { owner_id: 8, .. }));
        assert!(repo.find_by_id(7, id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_id() {
        let repo = repository().await;
        for description in ["a", "b", "c"] {
            repo.create(7, &NewTask::new(description)).await.unwrap();
        }
        let ids: Vec<i64> = repo.list_all(7).await.unwrap().iter().map(|t| t.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert_eq!(ids.len(), 3);
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_found() {
        let repo = repository().await;
        let err = repo.update_description(7, 99, "x").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(repo.list_all(7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let repo = repository().await;
        let id = repo.create(7, &NewTask::new("draft")).await.unwrap();

        repo.update_description(7, id, "final").await.unwrap();
        assert_eq!(repo.find_by_id(7, id).await.unwrap().unwrap().description, "final");

        repo.delete(7, id).await.unwrap();
        assert!(repo.find_by_id(7, id).await.unwrap().is_none());
        assert!(repo.delete(7, id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_embedded_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = format!("sqlite://{}", dir.path().join("tasks.db").display());

        let repo = SqliteTaskRepository::new_embedded(&path).await.unwrap();
        let id = repo.create(1, &NewTask::new("persisted")).await.unwrap();
        repo.pool().close().await;

        let reopened = SqliteTaskRepository::new_embedded(&path).await.unwrap();
        assert_eq!(
            reopened.find_by_id(1, id).await.unwrap().unwrap().description,
            "persisted"
        );
    }
}
