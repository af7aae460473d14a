//! JSON encoding of task records stored as hash values

use std::collections::HashMap;
use taskcache_domain::entities::Task;
use taskcache_errors::{TaskCacheError, TaskCacheResult};

use super::{task_field, COMPLETENESS_FIELD};

pub fn encode_task(task: &Task) -> TaskCacheResult<String> {
    serde_json::to_string(task).map_err(|e| {
        TaskCacheError::Serialization(format!("failed to encode task {}: {}", task.id, e))
    })
}

/// Encodes tasks as `(field, value)` pairs ready for a hash write.
pub fn encode_tasks(tasks: &[Task]) -> TaskCacheResult<Vec<(String, String)>> {
    tasks
        .iter()
        .map(|task| Ok((task_field(task.id), encode_task(task)?)))
        .collect()
}

/// Decodes one hash value and checks it belongs under `key`/`field`.
pub fn decode_task(key: &str, field: &str, owner_id: i64, raw: &str) -> TaskCacheResult<Task> {
    let task: Task = serde_json::from_str(raw).map_err(|e| {
        TaskCacheError::Serialization(format!("malformed task in {key} field {field}: {e}"))
    })?;

    if task_field(task.id) != field || task.owner_id != owner_id {
        return Err(TaskCacheError::Serialization(format!(
            "record in {key} field {field} belongs to task {} of owner {}",
            task.id, task.owner_id
        )));
    }

    Ok(task)
}

/// Decodes a whole hash, skipping the completeness field. Ordered by id.
pub fn decode_hash(
    key: &str,
    owner_id: i64,
    fields: &HashMap<String, String>,
) -> TaskCacheResult<Vec<Task>> {
    let mut tasks = fields
        .iter()
        .filter(|(field, _)| field.as_str() != COMPLETENESS_FIELD)
        .map(|(field, raw)| decode_task(key, field, owner_id, raw))
        .collect::<TaskCacheResult<Vec<_>>>()?;
    tasks.sort_by_key(|task| task.id);
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_preserves_record() {
        let task = Task::new(12, "write \"quarterly\" report ✓", 7);
        let raw = encode_task(&task).unwrap();
        assert_eq!(decode_task("user:7:tasks", "12", 7, &raw).unwrap(), task);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_task("user:7:tasks", "1", 7, "{not json").unwrap_err();
        assert!(matches!(err, TaskCacheError::Serialization(_)));
    }

    #[test]
    fn test_decode_rejects_misfiled_record() {
        let raw = encode_task(&Task::new(2, "x", 7)).unwrap();
        assert!(decode_task("user:7:tasks", "1", 7, &raw).is_err());

        let raw = encode_task(&Task::new(1, "x", 8)).unwrap();
        assert!(decode_task("user:7:tasks", "1", 7, &raw).is_err());
    }

    #[test]
    fn test_decode_hash_sorts_and_skips_marker() {
        let tasks = vec![Task::new(3, "c", 7), Task::new(1, "a", 7)];
        let mut fields: HashMap<String, String> = encode_tasks(&tasks).unwrap().into_iter().collect();
        fields.insert(COMPLETENESS_FIELD.to_string(), "1700000000".to_string());

        let decoded = decode_hash("user:7:tasks", 7, &fields).unwrap();
        assert_eq!(decoded, vec![Task::new(1, "a", 7), Task::new(3, "c", 7)]);
    }
}
