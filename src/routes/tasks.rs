use crate::{
    auth::AuthenticatedUserId,
    error::AppError,
    models::{TaskPayload, TaskQuery},
    response::{message_only, ApiResponse},
    store::Store,
};
use actix_web::{delete, get, post, put, web, Responder};
use validator::Validate;

fn task_not_found() -> AppError {
    AppError::NotFound("Task not found".into())
}

/// A task may only be filed under a project its owner also owns.
async fn ensure_project_owned(
    store: &dyn Store,
    owner: i32,
    project_id: Option<i32>,
) -> Result<(), AppError> {
    if let Some(project_id) = project_id {
        if store.find_project(owner, project_id).await?.is_none() {
            return Err(AppError::NotFound(
                "Project not found or does not belong to user".into(),
            ));
        }
    }
    Ok(())
}

fn validated(payload: web::Json<TaskPayload>) -> Result<TaskPayload, AppError> {
    let payload = payload.into_inner();
    payload
        .validate()
        .map_err(|e| AppError::invalid("Invalid task data", e))?;
    Ok(payload)
}

/// Retrieves the authenticated user's tasks, newest first.
///
/// ## Query Parameters:
/// - `status` (optional): `todo`, `in-progress` or `completed`.
/// - `priority` (optional): `high`, `medium` or `low`.
/// - `project_id` (optional): only tasks filed under this project.
/// - `due_date` (optional): ISO-8601; only tasks due at or before it.
/// - `search` (optional): case-insensitive match on title or description.
///
/// ## Responses:
/// - `200 OK`: the matching tasks.
/// - `400 Bad Request`: a filter value could not be parsed.
/// - `401 Unauthorized`: missing or invalid access token.
#[get("")]
pub async fn get_tasks(
    store: web::Data<dyn Store>,
    user_id: AuthenticatedUserId,
    query: web::Query<TaskQuery>,
) -> Result<impl Responder, AppError> {
    let filter = query.into_inner().into_filter()?;
    let tasks = store.list_tasks(user_id.0, &filter).await?;
    Ok(ApiResponse::ok(tasks, "Tasks retrieved successfully"))
}

/// Per-status totals for the caller.
#[get("/status-counts")]
pub async fn get_status_counts(
    store: web::Data<dyn Store>,
    user_id: AuthenticatedUserId,
) -> Result<impl Responder, AppError> {
    let counts = store.task_status_counts(user_id.0).await?;
    Ok(ApiResponse::ok(
        counts,
        "Task status counts retrieved successfully",
    ))
}

#[get("/{id}")]
pub async fn get_task(
    store: web::Data<dyn Store>,
    user_id: AuthenticatedUserId,
    path: web::Path<i32>,
) -> Result<impl Responder, AppError> {
    let task = store
        .find_task(user_id.0, path.into_inner())
        .await?
        .ok_or_else(task_not_found)?;
    Ok(ApiResponse::ok(task, "Task retrieved successfully"))
}

/// Creates a task. Priority defaults to `medium` and status to `todo`.
///
/// ## Responses:
/// - `201 Created`: the stored task.
/// - `400 Bad Request`: field errors under `errors`.
/// - `404 Not Found`: `project_id` names a project the caller does not own.
#[post("")]
pub async fn create_task(
    store: web::Data<dyn Store>,
    user_id: AuthenticatedUserId,
    payload: web::Json<TaskPayload>,
) -> Result<impl Responder, AppError> {
    let payload = validated(payload)?;
    ensure_project_owned(store.get_ref(), user_id.0, payload.project_id).await?;

    let task = store.create_task(user_id.0, payload.into_new_task()).await?;
    log::info!("User {} created task {}", user_id.0, task.id);
    Ok(ApiResponse::created(task, "Task created successfully"))
}

/// Applies the fields present in the body. An empty `due_date` clears it.
#[put("/{id}")]
pub async fn update_task(
    store: web::Data<dyn Store>,
    user_id: AuthenticatedUserId,
    path: web::Path<i32>,
    payload: web::Json<TaskPayload>,
) -> Result<impl Responder, AppError> {
    let task_id = path.into_inner();
    store
        .find_task(user_id.0, task_id)
        .await?
        .ok_or_else(task_not_found)?;

    let payload = validated(payload)?;
    ensure_project_owned(store.get_ref(), user_id.0, payload.project_id).await?;

    let task = store
        .update_task(user_id.0, task_id, payload.into_changes())
        .await?
        .ok_or_else(task_not_found)?;
    Ok(ApiResponse::ok(task, "Task updated successfully"))
}

#[delete("/{id}")]
pub async fn delete_task(
    store: web::Data<dyn Store>,
    user_id: AuthenticatedUserId,
    path: web::Path<i32>,
) -> Result<impl Responder, AppError> {
    let task_id = path.into_inner();
    if !store.delete_task(user_id.0, task_id).await? {
        return Err(task_not_found());
    }
    log::info!("User {} deleted task {}", user_id.0, task_id);
    Ok(message_only("Task deleted successfully"))
}
