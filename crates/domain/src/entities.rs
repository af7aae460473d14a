use serde::{Deserialize, Serialize};

/// A single entry in an owner's task list.
///
/// `id` is assigned by the backing store on creation. `owner_id` always comes
/// from the authenticated identity of the caller, never from a request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub description: String,
    pub owner_id: i64,
}

impl Task {
    pub fn new(id: i64, description: impl Into<String>, owner_id: i64) -> Self {
        Self {
            id,
            description: description.into(),
            owner_id,
        }
    }

    pub fn entity_description(&self) -> String {
        format!("task {} of owner {}", self.id, self.owner_id)
    }
}

/// Create request body. Carries no id and no owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub description: String,
}

impl NewTask {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }

    pub fn into_task(self, id: i64, owner_id: i64) -> Task {
        Task {
            id,
            description: self.description,
            owner_id,
        }
    }
}
