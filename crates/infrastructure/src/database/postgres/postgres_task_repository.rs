use async_trait::async_trait;
use sqlx::{PgPool, Row};
use taskcache_domain::entities::{NewTask, Task};
use taskcache_domain::repositories::TaskRepository;
use taskcache_errors::{TaskCacheError, TaskCacheResult};
use tracing::{debug, instrument};

use crate::{
    error_handling::{RepositoryErrorHelpers, RepositoryOperation},
    task_context,
    timeout_handler::TimeoutUtils,
};

pub struct PostgresTaskRepository {
    pool: PgPool,
}

impl PostgresTaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> TaskCacheResult<()> {
        let context = task_context!(RepositoryOperation::Migrate, owner_id = 0);
        debug!("Running PostgreSQL database migrations");

        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id BIGSERIAL PRIMARY KEY,
                description TEXT NOT NULL,
                owner_id BIGINT NOT NULL
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

        debug!("Successfully completed PostgreSQL database migrations");
        Ok(())
    }

    fn row_to_task(row: &sqlx::postgres::PgRow) -> TaskCacheResult<Task> {
        Ok(Task {
            id: row.try_get("id")?,
            description: row.try_get("description")?,
            owner_id: row.try_get("owner_id")?,
        })
    }
}

#[async_trait]
impl TaskRepository for PostgresTaskRepository {
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
                    "INSERT INTO tasks (description, owner_id) VALUES ($1, $2) RETURNING id",
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
                    "SELECT id, description, owner_id FROM tasks WHERE owner_id = $1 ORDER BY id",
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
                    "SELECT id, description, owner_id FROM tasks WHERE id = $1 AND owner_id = $2",
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
                    sqlx::query("UPDATE tasks SET description = $1 WHERE id = $2 AND owner_id = $3")
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
                let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND owner_id = $2")
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
