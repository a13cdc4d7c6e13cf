use crate::{
    auth::AuthenticatedUserId,
    error::AppError,
    models::ProjectPayload,
    response::{message_only, ApiResponse},
    store::Store,
};
use actix_web::{delete, get, post, put, web, Responder};
use validator::Validate;

fn project_not_found() -> AppError {
    AppError::NotFound("Project not found".into())
}

/// Lists the caller's projects in creation order.
#[get("")]
pub async fn get_projects(
    store: web::Data<dyn Store>,
    user_id: AuthenticatedUserId,
) -> Result<impl Responder, AppError> {
    let projects = store.list_projects(user_id.0).await?;
    Ok(ApiResponse::ok(projects, "Projects retrieved successfully"))
}

#[get("/{id}")]
pub async fn get_project(
    store: web::Data<dyn Store>,
    user_id: AuthenticatedUserId,
    path: web::Path<i32>,
) -> Result<impl Responder, AppError> {
    let project = store
        .find_project(user_id.0, path.into_inner())
        .await?
        .ok_or_else(project_not_found)?;
    Ok(ApiResponse::ok(project, "Project retrieved successfully"))
}

#[post("")]
pub async fn create_project(
    store: web::Data<dyn Store>,
    user_id: AuthenticatedUserId,
    payload: web::Json<ProjectPayload>,
) -> Result<impl Responder, AppError> {
    let payload = payload.into_inner();
    payload
        .validate()
        .map_err(|e| AppError::invalid("Invalid project data", e))?;

    let project = store
        .create_project(user_id.0, payload.into_new_project())
        .await?;
    log::info!("User {} created project {}", user_id.0, project.id);
    Ok(ApiResponse::created(project, "Project created successfully"))
}

/// Updates name and/or description. Ownership is checked before the payload
/// so that another user's project is a 404 even for an invalid body.
#[put("/{id}")]
pub async fn update_project(
    store: web::Data<dyn Store>,
    user_id: AuthenticatedUserId,
    path: web::Path<i32>,
    payload: web::Json<ProjectPayload>,
) -> Result<impl Responder, AppError> {
    let project_id = path.into_inner();
    store
        .find_project(user_id.0, project_id)
        .await?
        .ok_or_else(project_not_found)?;

    let payload = payload.into_inner();
    payload
        .validate()
        .map_err(|e| AppError::invalid("Invalid project data", e))?;

    let project = store
        .update_project(user_id.0, project_id, payload.into_changes())
        .await?
        .ok_or_else(project_not_found)?;
    Ok(ApiResponse::ok(project, "Project updated successfully"))
}

/// Deletes the project together with its tasks.
#[delete("/{id}")]
pub async fn delete_project(
    store: web::Data<dyn Store>,
    user_id: AuthenticatedUserId,
    path: web::Path<i32>,
) -> Result<impl Responder, AppError> {
    let project_id = path.into_inner();
    if !store.delete_project(user_id.0, project_id).await? {
        return Err(project_not_found());
    }
    log::info!("User {} deleted project {}", user_id.0, project_id);
    Ok(message_only("Project deleted successfully"))
}
