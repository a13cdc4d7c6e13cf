#![allow(dead_code)]

use actix_cors::Cors;
use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use chrono::Duration;
use serde_json::{json, Value};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Connection, PgConnection};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use taskdeck::auth::{PasswordHasher, TokenService};
use taskdeck::rate_limit::RateLimiter;
use taskdeck::routes;
use taskdeck::store::{MemoryStore, PgStore, Store};

pub const TEST_SECRET: &str = "integration-test-secret";
pub const PASSWORD: &str = "Password123";

pub fn token_service() -> TokenService {
    TokenService::new(TEST_SECRET, Duration::hours(1), Duration::days(30))
}

/// Same secret as the app, but access tokens that are already expired.
pub fn expired_token_service() -> TokenService {
    TokenService::new(TEST_SECRET, Duration::hours(-2), Duration::days(30))
}

pub fn memory_store() -> Arc<dyn Store> {
    Arc::new(MemoryStore::new())
}

/// The store the HTTP suites run against.
///
/// With `TEST_DATABASE_URL` set (e.g. `postgres://localhost/taskdeck_test`)
/// every call gets a fresh schema in that database, so the same suites
/// exercise `PgStore`; otherwise a new `MemoryStore`. The schemas are named
/// `taskdeck_test_*` and are left behind for inspection.
pub async fn test_store() -> Arc<dyn Store> {
    dotenv::dotenv().ok();
    match std::env::var("TEST_DATABASE_URL") {
        Ok(url) if !url.is_empty() => Arc::new(isolated_pg_store(&url).await),
        _ => memory_store(),
    }
}

static SCHEMA_SEQ: AtomicUsize = AtomicUsize::new(0);

async fn isolated_pg_store(url: &str) -> PgStore {
    let schema = format!(
        "taskdeck_test_{}_{}_{}",
        std::process::id(),
        chrono::Utc::now().timestamp_micros(),
        SCHEMA_SEQ.fetch_add(1, Ordering::SeqCst)
    );

    let mut conn = PgConnection::connect(url).await.unwrap();
    sqlx::query(&format!("CREATE SCHEMA {}", schema))
        .execute(&mut conn)
        .await
        .unwrap();
    conn.close().await.unwrap();

    let options = PgConnectOptions::from_str(url)
        .unwrap()
        .options([("search_path", schema.as_str())]);
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect_with(options)
        .await
        .unwrap();
    let store = PgStore::new(pool);
    store.migrate().await.unwrap();
    store
}

/// Same CORS policy as the server binary.
pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allow_any_method()
        .allow_any_header()
        .max_age(3600)
}

/// The full application around `store`, wrapped like the server binary, with
/// a cheap bcrypt cost and a rate limit high enough not to interfere.
pub async fn init_app(
    store: Arc<dyn Store>,
) -> impl Service<
    actix_http::Request,
    Response = ServiceResponse<impl MessageBody>,
    Error = actix_web::Error,
> {
    init_app_with_limit(store, 10_000).await
}

pub async fn init_app_with_limit(
    store: Arc<dyn Store>,
    per_minute: u32,
) -> impl Service<
    actix_http::Request,
    Response = ServiceResponse<impl MessageBody>,
    Error = actix_web::Error,
> {
    test::init_service(
        App::new()
            .app_data(web::Data::from(store))
            .app_data(web::Data::new(token_service()))
            .app_data(web::Data::new(PasswordHasher::new(4)))
            .wrap(RateLimiter::per_minute(per_minute))
            .wrap(cors())
            .configure(routes::app),
    )
    .await
}

/// Credentials of a registered test user.
pub struct TestUser {
    pub id: i32,
    pub access_token: String,
    pub refresh_token: String,
}

impl TestUser {
    pub fn bearer(&self) -> (header::HeaderName, String) {
        bearer(&self.access_token)
    }
}

pub fn bearer(token: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {}", token))
}

/// Sends `req` and returns the status with the decoded JSON envelope.
pub async fn send(
    app: &impl Service<
        actix_http::Request,
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
    >,
    req: test::TestRequest,
) -> (StatusCode, Value) {
    let resp = test::call_service(app, req.to_request()).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

pub async fn register_user(
    app: &impl Service<
        actix_http::Request,
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
    >,
    name: &str,
    email: &str,
) -> TestUser {
    let (status, body) = send(
        app,
        test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({
                "name": name,
                "email": email,
                "password": PASSWORD
            })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);

    let data = &body["data"];
    TestUser {
        id: data["user"]["id"].as_i64().unwrap() as i32,
        access_token: data["access_token"].as_str().unwrap().to_string(),
        refresh_token: data["refresh_token"].as_str().unwrap().to_string(),
    }
}

pub async fn create_project(
    app: &impl Service<
        actix_http::Request,
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
    >,
    user: &TestUser,
    name: &str,
) -> i64 {
    let (status, body) = send(
        app,
        test::TestRequest::post()
            .uri("/api/projects")
            .insert_header(user.bearer())
            .set_json(json!({ "name": name })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create project failed: {}", body);
    body["data"]["id"].as_i64().unwrap()
}

pub async fn create_task(
    app: &impl Service<
        actix_http::Request,
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
    >,
    user: &TestUser,
    payload: Value,
) -> Value {
    let (status, body) = send(
        app,
        test::TestRequest::post()
            .uri("/api/tasks")
            .insert_header(user.bearer())
            .set_json(payload),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create task failed: {}", body);
    body["data"].clone()
}
