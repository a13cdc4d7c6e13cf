pub mod auth;
pub mod health;
pub mod projects;
pub mod tasks;

use actix_web::{error, web, HttpRequest, HttpResponse};

use crate::auth::AuthMiddleware;
use crate::error::AppError;

fn json_error(err: error::JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(format!("Invalid JSON payload: {}", err)).into()
}

fn query_error(err: error::QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(format!("Invalid query string: {}", err)).into()
}

fn path_error(err: error::PathError, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(format!("Invalid path parameter: {}", err)).into()
}

/// Fallback for unmatched routes.
pub async fn not_found() -> Result<HttpResponse, AppError> {
    Err(AppError::NotFound("Resource not found".into()))
}

/// Registers the `/api` routes, each resource scope behind [`AuthMiddleware`].
/// Extractor failures (bad JSON, query strings or path ids) are reported as
/// 400 envelopes.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::QueryConfig::default().error_handler(query_error))
        .app_data(web::PathConfig::default().error_handler(path_error))
        .service(
            web::scope("/auth")
                .wrap(AuthMiddleware)
                .service(auth::register)
                .service(auth::login)
                .service(auth::refresh)
                .service(auth::get_profile)
                .service(auth::update_profile)
                .service(auth::delete_profile),
        )
        .service(
            web::scope("/projects")
                .wrap(AuthMiddleware)
                .service(projects::get_projects)
                .service(projects::create_project)
                .service(projects::get_project)
                .service(projects::update_project)
                .service(projects::delete_project),
        )
        .service(
            web::scope("/tasks")
                .wrap(AuthMiddleware)
                // Before `/{id}` so the literal segment wins.
                .service(tasks::get_status_counts)
                .service(tasks::get_tasks)
                .service(tasks::create_task)
                .service(tasks::get_task)
                .service(tasks::update_task)
                .service(tasks::delete_task),
        );
}

/// Registers the whole application: public root and health routes, the
/// `/api` scope and the 404 fallback. Unknown `/api` paths are 404s whether or
/// not a token is sent.
pub fn app(cfg: &mut web::ServiceConfig) {
    cfg.service(health::index)
        .service(health::health)
        .service(
            web::scope("/api")
                .configure(config)
                .default_service(web::route().to(not_found)),
        )
        .default_service(web::route().to(not_found));
}
