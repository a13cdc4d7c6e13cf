use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::validation::validate_name;

/// A named grouping of tasks, owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating or updating a project.
#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct ProjectPayload {
    /// Required, at most 100 characters.
    #[validate(
        required(message = "Name is required"),
        custom = "validate_name"
    )]
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub description: String,
}

/// Partial update; `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProjectChanges {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl ProjectPayload {
    /// Call only after `validate()` succeeded.
    pub fn into_new_project(self) -> NewProject {
        NewProject {
            name: self.name.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
        }
    }

    pub fn into_changes(self) -> ProjectChanges {
        ProjectChanges {
            name: self.name,
            description: self.description,
        }
    }
}
