use actix_web::{get, HttpResponse, Responder};
use chrono::Utc;
use serde_json::json;

/// API banner with the running version.
#[get("/")]
pub async fn index() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Task Management API",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Health check endpoint
///
/// Returns the current status of the API and timestamp.
#[get("/health")]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "success": true,
        "status": "ok",
        "timestamp": Utc::now()
    }))
}
