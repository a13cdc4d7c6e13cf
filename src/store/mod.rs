//! Persistence handle.
//!
//! Handlers receive the store as `web::Data<dyn Store>`. Every project and
//! task operation takes the owner's id and must never touch rows owned by
//! anybody else; a row owned by another user is reported exactly like a
//! missing one (`None` / `false`).
//!
//! Every mutation is atomic: either all of its writes land or none do.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{
    NewProject, NewTask, NewUser, Project, ProjectChanges, StatusCounts, Task, TaskChanges,
    TaskFilter, User, UserChanges,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts a user. A taken email yields `AppError::Conflict`.
    async fn create_user(&self, user: NewUser) -> Result<User, AppError>;
    async fn find_user(&self, id: i32) -> Result<Option<User>, AppError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn update_user(&self, id: i32, changes: UserChanges) -> Result<Option<User>, AppError>;
    /// Deletes the user with every task and project they own.
    async fn delete_user(&self, id: i32) -> Result<bool, AppError>;

    async fn list_projects(&self, owner: i32) -> Result<Vec<Project>, AppError>;
    async fn find_project(&self, owner: i32, id: i32) -> Result<Option<Project>, AppError>;
    async fn create_project(&self, owner: i32, project: NewProject) -> Result<Project, AppError>;
    async fn update_project(
        &self,
        owner: i32,
        id: i32,
        changes: ProjectChanges,
    ) -> Result<Option<Project>, AppError>;
    /// Deletes the project and the tasks filed under it.
    async fn delete_project(&self, owner: i32, id: i32) -> Result<bool, AppError>;

    /// Lists the owner's tasks matching `filter`, newest first.
    async fn list_tasks(&self, owner: i32, filter: &TaskFilter) -> Result<Vec<Task>, AppError>;
    async fn find_task(&self, owner: i32, id: i32) -> Result<Option<Task>, AppError>;
    /// Inserts a task. The caller has already checked that `project_id`, if
    /// any, belongs to `owner`.
    async fn create_task(&self, owner: i32, task: NewTask) -> Result<Task, AppError>;
    async fn update_task(
        &self,
        owner: i32,
        id: i32,
        changes: TaskChanges,
    ) -> Result<Option<Task>, AppError>;
    async fn delete_task(&self, owner: i32, id: i32) -> Result<bool, AppError>;
    async fn task_status_counts(&self, owner: i32) -> Result<StatusCounts, AppError>;
}
