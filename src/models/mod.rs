pub mod project;
pub mod task;
pub mod user;

use serde::{de, Deserialize, Deserializer};

pub use project::{NewProject, Project, ProjectChanges, ProjectPayload};
pub use task::{
    NewTask, StatusCounts, Task, TaskChanges, TaskFilter, TaskPayload, TaskPriority, TaskQuery,
    TaskStatus,
};
pub use user::{NewUser, User, UserChanges};

/// Accepts an id sent either as a JSON number or as a numeric string, the way
/// HTML form values arrive. `null` and `""` both mean "no id".
pub(crate) fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Int(i32),
        Text(String),
    }

    match Option::<RawId>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawId::Int(id)) => Ok(Some(id)),
        Some(RawId::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(RawId::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| de::Error::custom("project_id must be an integer")),
    }
}
