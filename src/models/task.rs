use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::error::AppError;
use crate::models::deserialize_optional_id;
use crate::validation::{
    parse_iso8601, validate_due_date, validate_priority, validate_status, validate_title,
};

/// Represents the priority of a task.
/// Corresponds to the `task_priority` SQL enum.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    High,
    #[default]
    Medium,
    Low,
}

/// Represents the status of a task.
/// Corresponds to the `task_status` SQL enum.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Completed,
}

impl TaskPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskPriority::High => "high",
            TaskPriority::Medium => "medium",
            TaskPriority::Low => "low",
        }
    }
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
        }
    }
}

impl FromStr for TaskPriority {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(TaskPriority::High),
            "medium" => Ok(TaskPriority::Medium),
            "low" => Ok(TaskPriority::Low),
            _ => Err(()),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(TaskStatus::Todo),
            "in-progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            _ => Err(()),
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents a task entity as stored in the database and returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    /// Identifier of the owning user.
    pub user_id: i32,
    pub project_id: Option<i32>,
    /// Name of the referenced project, joined in for display.
    pub project_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating or updating a task.
///
/// Enum-valued fields arrive as plain strings so that a bad value is reported
/// as a field error alongside the others instead of failing deserialization.
#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct TaskPayload {
    #[validate(required(message = "Title is required"), custom = "validate_title")]
    pub title: Option<String>,
    pub description: Option<String>,
    /// ISO-8601; an empty string clears the due date on update.
    #[validate(custom = "validate_due_date")]
    pub due_date: Option<String>,
    #[validate(custom = "validate_priority")]
    pub priority: Option<String>,
    #[validate(custom = "validate_status")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub project_id: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub project_id: Option<i32>,
}

/// Partial update. `due_date: Some(None)` clears the due date.
#[derive(Debug, Clone, Default)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    pub project_id: Option<i32>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl TaskPayload {
    /// Converts a validated payload into an insert, applying defaults
    /// (priority medium, status todo, empty description).
    pub fn into_new_task(self) -> NewTask {
        NewTask {
            title: self.title.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            due_date: non_empty(self.due_date).and_then(|d| parse_iso8601(&d)),
            priority: non_empty(self.priority)
                .and_then(|p| p.parse().ok())
                .unwrap_or_default(),
            status: non_empty(self.status)
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            project_id: self.project_id,
        }
    }

    /// Converts a validated payload into an update touching only the fields
    /// that were sent.
    pub fn into_changes(self) -> TaskChanges {
        TaskChanges {
            title: self.title,
            description: self.description,
            due_date: self.due_date.map(|d| {
                if d.is_empty() {
                    None
                } else {
                    parse_iso8601(&d)
                }
            }),
            priority: non_empty(self.priority).and_then(|p| p.parse().ok()),
            status: non_empty(self.status).and_then(|s| s.parse().ok()),
            project_id: self.project_id,
        }
    }
}

/// Query parameters accepted by the task listing endpoint.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TaskQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub project_id: Option<String>,
    /// Inclusive upper bound on the due date.
    pub due_date: Option<String>,
    /// Case-insensitive substring of title or description.
    pub search: Option<String>,
}

/// Parsed, typed listing filter. All present criteria must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub project_id: Option<i32>,
    pub due_before: Option<DateTime<Utc>>,
    pub search: Option<String>,
}

impl TaskQuery {
    /// Parses the raw query. Empty parameters are ignored; malformed ones fail
    /// the request rather than being dropped.
    pub fn into_filter(self) -> Result<TaskFilter, AppError> {
        let status = match non_empty(self.status) {
            Some(s) => Some(s.parse().map_err(|_| {
                AppError::BadRequest("Invalid status filter".into())
            })?),
            None => None,
        };
        let priority = match non_empty(self.priority) {
            Some(p) => Some(p.parse().map_err(|_| {
                AppError::BadRequest("Invalid priority filter".into())
            })?),
            None => None,
        };
        let project_id = match non_empty(self.project_id) {
            Some(id) => Some(id.trim().parse().map_err(|_| {
                AppError::BadRequest("Invalid project filter".into())
            })?),
            None => None,
        };
        let due_before = match non_empty(self.due_date) {
            Some(d) => Some(
                parse_iso8601(&d)
                    .ok_or_else(|| AppError::BadRequest("Invalid due date format".into()))?,
            ),
            None => None,
        };
        Ok(TaskFilter {
            status,
            priority,
            project_id,
            due_before,
            search: non_empty(self.search),
        })
    }
}

impl TaskFilter {
    /// Evaluates the filter against one task. Tasks without a due date never
    /// satisfy a due-date bound, matching SQL `NULL <= x`.
    pub fn matches(&self, task: &Task) -> bool {
        if self.status.is_some_and(|s| s != task.status) {
            return false;
        }
        if self.priority.is_some_and(|p| p != task.priority) {
            return false;
        }
        if self.project_id.is_some() && self.project_id != task.project_id {
            return false;
        }
        if let Some(bound) = self.due_before {
            match task.due_date {
                Some(due) if due <= bound => {}
                _ => return false,
            }
        }
        if let Some(term) = &self.search {
            let term = term.to_lowercase();
            if !task.title.to_lowercase().contains(&term)
                && !task.description.to_lowercase().contains(&term)
            {
                return false;
            }
        }
        true
    }
}

/// Per-status totals for one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub todo: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub total: i64,
}

impl StatusCounts {
    pub fn add(&mut self, status: TaskStatus, count: i64) {
        match status {
            TaskStatus::Todo => self.todo += count,
            TaskStatus::InProgress => self.in_progress += count,
            TaskStatus::Completed => self.completed += count,
        }
        self.total += count;
    }
}
