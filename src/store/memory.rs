use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::models::{
    NewProject, NewTask, NewUser, Project, ProjectChanges, StatusCounts, Task, TaskChanges,
    TaskFilter, User, UserChanges,
};
use crate::store::Store;

#[derive(Default)]
struct Tables {
    users: BTreeMap<i32, User>,
    projects: BTreeMap<i32, Project>,
    tasks: BTreeMap<i32, Task>,
    next_user_id: i32,
    next_project_id: i32,
    next_task_id: i32,
}

impl Tables {
    fn email_taken(&self, email: &str, except: Option<i32>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }

    fn project_name(&self, project_id: Option<i32>) -> Option<String> {
        project_id
            .and_then(|id| self.projects.get(&id))
            .map(|p| p.name.clone())
    }

    fn with_project_name(&self, task: &Task) -> Task {
        let mut task = task.clone();
        task.project_name = self.project_name(task.project_id);
        task
    }
}

fn next(counter: &mut i32) -> i32 {
    *counter += 1;
    *counter
}

/// In-process store, used for `DATABASE_URL=memory://` and in tests.
///
/// All tables sit behind one lock, so each call observes and produces a
/// consistent snapshot.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut tables = self.tables.write().await;
        if tables.email_taken(&user.email, None) {
            return Err(AppError::Conflict("User already exists".into()));
        }
        let now = Utc::now();
        let user = User {
            id: next(&mut tables.next_user_id),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: i32) -> Result<Option<User>, AppError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn update_user(&self, id: i32, changes: UserChanges) -> Result<Option<User>, AppError> {
        let mut tables = self.tables.write().await;
        if let Some(email) = &changes.email {
            if tables.email_taken(email, Some(id)) {
                return Err(AppError::Conflict("Email already in use".into()));
            }
        }
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: i32) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(&id).is_none() {
            return Ok(false);
        }
        tables.tasks.retain(|_, t| t.user_id != id);
        tables.projects.retain(|_, p| p.user_id != id);
        Ok(true)
    }

    async fn list_projects(&self, owner: i32) -> Result<Vec<Project>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .projects
            .values()
            .filter(|p| p.user_id == owner)
            .cloned()
            .collect())
    }

    async fn find_project(&self, owner: i32, id: i32) -> Result<Option<Project>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .projects
            .get(&id)
            .filter(|p| p.user_id == owner)
            .cloned())
    }

    async fn create_project(&self, owner: i32, project: NewProject) -> Result<Project, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&owner) {
            return Err(AppError::DatabaseError(format!(
                "projects.user_id references missing user {}",
                owner
            )));
        }
        let now = Utc::now();
        let project = Project {
            id: next(&mut tables.next_project_id),
            name: project.name,
            description: project.description,
            user_id: owner,
            created_at: now,
            updated_at: now,
        };
        tables.projects.insert(project.id, project.clone());
        Ok(project)
    }

    async fn update_project(
        &self,
        owner: i32,
        id: i32,
        changes: ProjectChanges,
    ) -> Result<Option<Project>, AppError> {
        let mut tables = self.tables.write().await;
        let Some(project) = tables.projects.get_mut(&id).filter(|p| p.user_id == owner) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            project.name = name;
        }
        if let Some(description) = changes.description {
            project.description = description;
        }
        project.updated_at = Utc::now();
        Ok(Some(project.clone()))
    }

    async fn delete_project(&self, owner: i32, id: i32) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.projects.get(&id).is_some_and(|p| p.user_id == owner) {
            return Ok(false);
        }
        tables.projects.remove(&id);
        tables.tasks.retain(|_, t| t.project_id != Some(id));
        Ok(true)
    }

    async fn list_tasks(&self, owner: i32, filter: &TaskFilter) -> Result<Vec<Task>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .tasks
            .values()
            .rev()
            .filter(|t| t.user_id == owner && filter.matches(t))
            .map(|t| tables.with_project_name(t))
            .collect())
    }

    async fn find_task(&self, owner: i32, id: i32) -> Result<Option<Task>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .tasks
            .get(&id)
            .filter(|t| t.user_id == owner)
            .map(|t| tables.with_project_name(t)))
    }

    async fn create_task(&self, owner: i32, task: NewTask) -> Result<Task, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&owner) {
            return Err(AppError::DatabaseError(format!(
                "tasks.user_id references missing user {}",
                owner
            )));
        }
        let now = Utc::now();
        let task = Task {
            id: next(&mut tables.next_task_id),
            title: task.title,
            description: task.description,
            due_date: task.due_date,
            priority: task.priority,
            status: task.status,
            user_id: owner,
            project_id: task.project_id,
            project_name: tables.project_name(task.project_id),
            created_at: now,
            updated_at: now,
        };
        tables.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn update_task(
        &self,
        owner: i32,
        id: i32,
        changes: TaskChanges,
    ) -> Result<Option<Task>, AppError> {
        let mut tables = self.tables.write().await;
        let Some(task) = tables.tasks.get_mut(&id).filter(|t| t.user_id == owner) else {
            return Ok(None);
        };
        if let Some(title) = changes.title {
            task.title = title;
        }
        if let Some(description) = changes.description {
            task.description = description;
        }
        if let Some(due_date) = changes.due_date {
            task.due_date = due_date;
        }
        if let Some(priority) = changes.priority {
            task.priority = priority;
        }
        if let Some(status) = changes.status {
            task.status = status;
        }
        if let Some(project_id) = changes.project_id {
            task.project_id = Some(project_id);
        }
        task.updated_at = Utc::now();
        let task = task.clone();
        Ok(Some(tables.with_project_name(&task)))
    }

    async fn delete_task(&self, owner: i32, id: i32) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.tasks.get(&id).is_some_and(|t| t.user_id == owner) {
            return Ok(false);
        }
        tables.tasks.remove(&id);
        Ok(true)
    }

    async fn task_status_counts(&self, owner: i32) -> Result<StatusCounts, AppError> {
        let tables = self.tables.read().await;
        let mut counts = StatusCounts::default();
        for task in tables.tasks.values().filter(|t| t.user_id == owner) {
            counts.add(task.status, 1);
        }
        Ok(counts)
    }
}
