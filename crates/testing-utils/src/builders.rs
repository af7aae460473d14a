//! Test data builders

use taskcache_domain::entities::{NewTask, Task};

/// Builder for creating test Task entities
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new() -> Self {
        Self {
            task: Task::new(1, "test task", 1),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.task.id = id;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.task.description = description.into();
        self
    }

    pub fn with_owner(mut self, owner_id: i64) -> Self {
        self.task.owner_id = owner_id;
        self
    }

    pub fn build(self) -> Task {
        self.task
    }

    pub fn build_new(self) -> NewTask {
        NewTask::new(self.task.description)
    }

    /// `count` tasks for one owner with ids `1..=count`.
    pub fn many(owner_id: i64, count: i64) -> Vec<Task> {
        (1..=count)
            .map(|id| {
                Self::new()
                    .with_id(id)
                    .with_owner(owner_id)
                    .with_description(format!("task {id}"))
                    .build()
            })
            .collect()
    }
}

impl Default for TaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}
