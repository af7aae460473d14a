use std::sync::Arc;
use std::time::Duration;

use taskcache_config::DatabaseConfig;
use taskcache_domain::repositories::TaskRepository;
use taskcache_errors::TaskCacheResult;
use tracing::info;

use super::postgres::PostgresTaskRepository;
use super::sqlite::SqliteTaskRepository;

/// Database type detection
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseType {
    PostgreSQL,
    SQLite,
}

impl DatabaseType {
    pub fn from_url(url: &str) -> Self {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            DatabaseType::PostgreSQL
        } else {
            DatabaseType::SQLite
        }
    }
}

/// Database connection pool
pub enum DatabasePool {
    PostgreSQL(sqlx::PgPool),
    SQLite(sqlx::SqlitePool),
}

impl DatabasePool {
    /// Create pool from config with automatic type detection
    pub async fn new(config: &DatabaseConfig) -> TaskCacheResult<Self> {
        let acquire_timeout = Duration::from_secs(config.connection_timeout_seconds);

        match DatabaseType::from_url(&config.url) {
            DatabaseType::PostgreSQL => {
                let pool = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .min_connections(config.min_connections)
                    .acquire_timeout(acquire_timeout)
                    .connect(&config.url)
                    .await?;
                Ok(DatabasePool::PostgreSQL(pool))
            }
            DatabaseType::SQLite => {
                let pool = sqlx::sqlite::SqlitePoolOptions::new()
                    .max_connections(config.max_connections)
                    .min_connections(config.min_connections)
                    .acquire_timeout(acquire_timeout)
                    .connect(&config.url)
                    .await?;
                Ok(DatabasePool::SQLite(pool))
            }
        }
    }

    pub fn database_type(&self) -> DatabaseType {
        match self {
            DatabasePool::PostgreSQL(_) => DatabaseType::PostgreSQL,
            DatabasePool::SQLite(_) => DatabaseType::SQLite,
        }
    }

    pub async fn health_check(&self) -> TaskCacheResult<()> {
        match self {
            DatabasePool::PostgreSQL(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
            DatabasePool::SQLite(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
        }
        Ok(())
    }

    pub async fn close(&self) {
        match self {
            DatabasePool::PostgreSQL(pool) => pool.close().await,
            DatabasePool::SQLite(pool) => pool.close().await,
        }
    }
}

/// Unified database manager
pub struct DatabaseManager {
    pool: DatabasePool,
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> TaskCacheResult<Self> {
        let pool = DatabasePool::new(config).await?;
        info!("Connected to {:?} backing store", pool.database_type());
        Ok(Self { pool })
    }

    pub fn database_type(&self) -> DatabaseType {
        self.pool.database_type()
    }

    pub async fn run_migrations(&self) -> TaskCacheResult<()> {
        match &self.pool {
            DatabasePool::PostgreSQL(pool) => {
                PostgresTaskRepository::new(pool.clone())
                    .run_migrations()
                    .await
            }
            DatabasePool::SQLite(pool) => SqliteTaskRepository::new(pool.clone()).run_migrations().await,
        }
    }

    pub async fn health_check(&self) -> TaskCacheResult<()> {
        self.pool.health_check().await
    }

    pub async fn close(&self) {
        self.pool.close().await
    }

    /// Factory method for the task repository
    pub fn task_repository(&self) -> Arc<dyn TaskRepository> {
        match &self.pool {
            DatabasePool::PostgreSQL(pool) => Arc::new(PostgresTaskRepository::new(pool.clone())),
            DatabasePool::SQLite(pool) => Arc::new(SqliteTaskRepository::new(pool.clone())),
        }
    }
}
