use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder, Transaction};

use crate::error::AppError;
use crate::models::{
    NewProject, NewTask, NewUser, Project, ProjectChanges, StatusCounts, Task, TaskChanges,
    TaskFilter, TaskStatus, User, UserChanges,
};
use crate::store::Store;

const USER_COLUMNS: &str = "id, name, email, password_hash, created_at, updated_at";
const PROJECT_COLUMNS: &str = "id, name, description, user_id, created_at, updated_at";
const TASK_SELECT: &str = "SELECT t.id, t.title, t.description, t.due_date, t.priority, t.status, \
     t.user_id, t.project_id, p.name AS project_name, t.created_at, t.updated_at \
     FROM tasks t LEFT JOIN projects p ON p.id = t.project_id";

/// Escapes `%`, `_` and `\` so a search term is matched literally by `ILIKE`.
pub(crate) fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Gives a unique-violation `Conflict` the message of the operation that
/// raised it. Other errors pass through.
fn reword_conflict(err: AppError, message: &str) -> AppError {
    match err {
        AppError::Conflict(_) => AppError::Conflict(message.to_string()),
        other => other,
    }
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Applies the SQL files in `migrations/`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_task(
        tx: &mut Transaction<'_, Postgres>,
        owner: i32,
        id: i32,
    ) -> Result<Option<Task>, AppError> {
        let sql = format!("{} WHERE t.id = $1 AND t.user_id = $2", TASK_SELECT);
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(task)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        );
        let created = sqlx::query_as::<_, User>(&sql)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| reword_conflict(e.into(), "User already exists"))?;
        tx.commit().await?;
        Ok(created)
    }

    async fn find_user(&self, id: i32) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_user(&self, id: i32, changes: UserChanges) -> Result<Option<User>, AppError> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "UPDATE users SET name = COALESCE($1, name), email = COALESCE($2, email), \
             password_hash = COALESCE($3, password_hash), updated_at = NOW() \
             WHERE id = $4 RETURNING {}",
            USER_COLUMNS
        );
        let updated = sqlx::query_as::<_, User>(&sql)
            .bind(changes.name)
            .bind(changes.email)
            .bind(changes.password_hash)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| reword_conflict(e.into(), "Email already in use"))?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_user(&self, id: i32) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM tasks WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM projects WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_projects(&self, owner: i32) -> Result<Vec<Project>, AppError> {
        let sql = format!(
            "SELECT {} FROM projects WHERE user_id = $1 ORDER BY id",
            PROJECT_COLUMNS
        );
        Ok(sqlx::query_as::<_, Project>(&sql)
            .bind(owner)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_project(&self, owner: i32, id: i32) -> Result<Option<Project>, AppError> {
        let sql = format!(
            "SELECT {} FROM projects WHERE id = $1 AND user_id = $2",
            PROJECT_COLUMNS
        );
        Ok(sqlx::query_as::<_, Project>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_project(&self, owner: i32, project: NewProject) -> Result<Project, AppError> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "INSERT INTO projects (name, description, user_id) VALUES ($1, $2, $3) RETURNING {}",
            PROJECT_COLUMNS
        );
        let created = sqlx::query_as::<_, Project>(&sql)
            .bind(&project.name)
            .bind(&project.description)
            .bind(owner)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn update_project(
        &self,
        owner: i32,
        id: i32,
        changes: ProjectChanges,
    ) -> Result<Option<Project>, AppError> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "UPDATE projects SET name = COALESCE($1, name), \
             description = COALESCE($2, description), updated_at = NOW() \
             WHERE id = $3 AND user_id = $4 RETURNING {}",
            PROJECT_COLUMNS
        );
        let updated = sqlx::query_as::<_, Project>(&sql)
            .bind(changes.name)
            .bind(changes.description)
            .bind(id)
            .bind(owner)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_project(&self, owner: i32, id: i32) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;
        let owned = sqlx::query_as::<_, (i32,)>(
            "SELECT id FROM projects WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&mut *tx)
        .await?;
        if owned.is_none() {
            return Ok(false);
        }
        sqlx::query("DELETE FROM tasks WHERE project_id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM projects WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn list_tasks(&self, owner: i32, filter: &TaskFilter) -> Result<Vec<Task>, AppError> {
        let mut query = QueryBuilder::<Postgres>::new(TASK_SELECT);
        query.push(" WHERE t.user_id = ").push_bind(owner);

        if let Some(status) = filter.status {
            query.push(" AND t.status = ").push_bind(status);
        }
        if let Some(priority) = filter.priority {
            query.push(" AND t.priority = ").push_bind(priority);
        }
        if let Some(project_id) = filter.project_id {
            query.push(" AND t.project_id = ").push_bind(project_id);
        }
        if let Some(due_before) = filter.due_before {
            query.push(" AND t.due_date <= ").push_bind(due_before);
        }
        if let Some(search) = &filter.search {
            let pattern = format!("%{}%", escape_like(search));
            query
                .push(" AND (t.title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR t.description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        query.push(" ORDER BY t.created_at DESC, t.id DESC");

        Ok(query
            .build_query_as::<Task>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_task(&self, owner: i32, id: i32) -> Result<Option<Task>, AppError> {
        let sql = format!("{} WHERE t.id = $1 AND t.user_id = $2", TASK_SELECT);
        Ok(sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_task(&self, owner: i32, task: NewTask) -> Result<Task, AppError> {
        let mut tx = self.pool.begin().await?;
        let (id,) = sqlx::query_as::<_, (i32,)>(
            "INSERT INTO tasks (title, description, due_date, priority, status, user_id, project_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.due_date)
        .bind(task.priority)
        .bind(task.status)
        .bind(owner)
        .bind(task.project_id)
        .fetch_one(&mut *tx)
        .await?;
        let created = Self::fetch_task(&mut tx, owner, id)
            .await?
            .ok_or_else(|| AppError::DatabaseError(format!("task {} vanished after insert", id)))?;
        tx.commit().await?;
        Ok(created)
    }

    async fn update_task(
        &self,
        owner: i32,
        id: i32,
        changes: TaskChanges,
    ) -> Result<Option<Task>, AppError> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query_as::<_, (i32,)>(
            "UPDATE tasks SET title = COALESCE($1, title), \
             description = COALESCE($2, description), \
             due_date = CASE WHEN $3 THEN $4 ELSE due_date END, \
             priority = COALESCE($5, priority), status = COALESCE($6, status), \
             project_id = COALESCE($7, project_id), updated_at = NOW() \
             WHERE id = $8 AND user_id = $9 RETURNING id",
        )
        .bind(changes.title)
        .bind(changes.description)
        .bind(changes.due_date.is_some())
        .bind(changes.due_date.flatten())
        .bind(changes.priority)
        .bind(changes.status)
        .bind(changes.project_id)
        .bind(id)
        .bind(owner)
        .fetch_optional(&mut *tx)
        .await?;
        if updated.is_none() {
            return Ok(None);
        }
        let task = Self::fetch_task(&mut tx, owner, id).await?;
        tx.commit().await?;
        Ok(task)
    }

    async fn delete_task(&self, owner: i32, id: i32) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn task_status_counts(&self, owner: i32) -> Result<StatusCounts, AppError> {
        let rows = sqlx::query_as::<_, (TaskStatus, i64)>(
            "SELECT status, COUNT(*) FROM tasks WHERE user_id = $1 GROUP BY status",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            counts.add(status, count);
        }
        Ok(counts)
    }
}
