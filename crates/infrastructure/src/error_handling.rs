//! Context-rich error helpers for task repository operations.

use sqlx::Error as SqlxError;
use std::fmt;
use taskcache_errors::TaskCacheError;
use tracing::{debug, error, instrument};

/// Operation context for repository operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryOperation {
    Create,
    Read,
    List,
    Update,
    Delete,
    Migrate,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryOperation::Create => write!(f, "create"),
            RepositoryOperation::Read => write!(f, "read"),
            RepositoryOperation::List => write!(f, "list"),
            RepositoryOperation::Update => write!(f, "update"),
            RepositoryOperation::Delete => write!(f, "delete"),
            RepositoryOperation::Migrate => write!(f, "migrate"),
        }
    }
}

/// Context information for task repository operations
#[derive(Debug, Clone)]
pub struct TaskOperationContext {
    pub operation: RepositoryOperation,
    pub owner_id: i64,
    pub task_id: Option<i64>,
}

impl TaskOperationContext {
    pub fn new(operation: RepositoryOperation, owner_id: i64) -> Self {
        Self {
            operation,
            owner_id,
            task_id: None,
        }
    }

    pub fn with_task_id(mut self, task_id: i64) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn entity_description(&self) -> String {
        match self.task_id {
            Some(id) => format!("task {} of owner {}", id, self.owner_id),
            None => format!("tasks of owner {}", self.owner_id),
        }
    }
}

/// Error helpers for repository operations
pub struct RepositoryErrorHelpers;

impl RepositoryErrorHelpers {
    /// Map a sqlx error to a backing-store error, logging the context.
    #[instrument(skip_all, fields(
        operation = %context.operation,
        owner_id = context.owner_id,
        task_id = ?context.task_id,
    ))]
    pub fn task_database_error(context: &TaskOperationContext, error: SqlxError) -> TaskCacheError {
        if let (SqlxError::RowNotFound, Some(_)) = (&error, context.task_id) {
            return Self::task_not_found(context);
        }

        let error_msg = format!(
            "{} {} failed: {}",
            context.operation,
            context.entity_description(),
            error
        );
        error!(error = %error, "{}", error_msg);
        TaskCacheError::backing_store(error_msg)
    }

    pub fn task_not_found(context: &TaskOperationContext) -> TaskCacheError {
        debug!(
            "{} {}: not found",
            context.operation,
            context.entity_description()
        );
        TaskCacheError::task_not_found(context.owner_id, context.task_id.unwrap_or(0))
    }

    pub fn log_operation_success(context: &TaskOperationContext, additional_info: Option<&str>) {
        let base_msg = format!("{} {} succeeded", context.operation, context.entity_description());
        match additional_info {
            Some(info) => debug!("{}: {}", base_msg, info),
            None => debug!("{}", base_msg),
        }
    }
}

/// Macro for creating task operation context easily
#[macro_export]
macro_rules! task_context {
    ($operation:expr, owner_id = $owner_id:expr) => {
        $crate::error_handling::TaskOperationContext::new($operation, $owner_id)
    };
    ($operation:expr, owner_id = $owner_id:expr, task_id = $task_id:expr) => {
        $crate::error_handling::TaskOperationContext::new($operation, $owner_id)
            .with_task_id($task_id)
    };
}
