mod common;

use actix_web::http::StatusCode;
use actix_web::{rt, test, web, App, HttpServer};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::net::TcpListener;

use common::{
    create_project, create_task, init_app, memory_store, register_user, send, test_store, TestUser,
};
use taskdeck::auth::PasswordHasher;
use taskdeck::routes;

fn titles(body: &Value) -> Vec<String> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap().to_string())
        .collect()
}

async fn list(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
        Error = actix_web::Error,
    >,
    user: &TestUser,
    query: &str,
) -> (StatusCode, Value) {
    send(
        app,
        test::TestRequest::get()
            .uri(&format!("/api/tasks{}", query))
            .insert_header(user.bearer()),
    )
    .await
}

#[test_log::test(actix_rt::test)]
async fn test_task_crud() {
    let app = init_app(test_store().await).await;
    let alice = register_user(&app, "Alice", "alice@example.com").await;

    let (status, body) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/tasks")
            .insert_header(alice.bearer())
            .set_json(json!({ "title": "Write report" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Task created successfully");
    let task = &body["data"];
    assert_eq!(task["title"], "Write report");
    assert_eq!(task["description"], "");
    assert_eq!(task["priority"], "medium");
    assert_eq!(task["status"], "todo");
    assert_eq!(task["user_id"], alice.id);
    assert!(task["due_date"].is_null());
    assert!(task["project_id"].is_null());
    let id = task["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        test::TestRequest::put()
            .uri(&format!("/api/tasks/{}", id))
            .insert_header(alice.bearer())
            .set_json(json!({
                "title": "Write final report",
                "status": "in-progress",
                "priority": "high",
                "due_date": "2030-01-15T09:00:00Z"
            })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Task updated successfully");
    assert_eq!(body["data"]["title"], "Write final report");
    assert_eq!(body["data"]["status"], "in-progress");
    assert_eq!(body["data"]["priority"], "high");
    assert!(body["data"]["due_date"]
        .as_str()
        .unwrap()
        .starts_with("2030-01-15T09:00:00"));

    // An empty due date clears it; omitted fields stay as they were.
    let (status, body) = send(
        &app,
        test::TestRequest::put()
            .uri(&format!("/api/tasks/{}", id))
            .insert_header(alice.bearer())
            .set_json(json!({ "title": "Write final report", "due_date": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["due_date"].is_null());
    assert_eq!(body["data"]["status"], "in-progress");

    let (status, body) = send(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/tasks/{}", id))
            .insert_header(alice.bearer()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Task retrieved successfully");
    assert_eq!(body["data"]["priority"], "high");

    let (status, body) = send(
        &app,
        test::TestRequest::delete()
            .uri(&format!("/api/tasks/{}", id))
            .insert_header(alice.bearer()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Task deleted successfully");

    let (status, body) = send(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/tasks/{}", id))
            .insert_header(alice.bearer()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Task not found");
}

#[actix_rt::test]
async fn test_task_validation_errors() {
    let app = init_app(test_store().await).await;
    let alice = register_user(&app, "Alice", "alice@example.com").await;

    let (status, body) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/tasks")
            .insert_header(alice.bearer())
            .set_json(json!({
                "priority": "urgent",
                "status": "done",
                "due_date": "someday"
            })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid task data");
    assert_eq!(
        body["errors"],
        json!({
            "title": "Title is required",
            "priority": "Priority must be one of: high, medium, low",
            "status": "Status must be one of: todo, in-progress, completed",
            "due_date": "Due date must be a valid ISO format date"
        })
    );

    let (status, body) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/tasks")
            .insert_header(alice.bearer())
            .set_json(json!({ "title": "t".repeat(101) })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["errors"]["title"],
        "Title must be less than 100 characters"
    );
}

#[actix_rt::test]
async fn test_task_project_must_belong_to_user() {
    let app = init_app(test_store().await).await;
    let alice = register_user(&app, "Alice", "alice@example.com").await;
    let bob = register_user(&app, "Bob", "bob@example.com").await;
    let alices_project = create_project(&app, &alice, "Alice's").await;

    let (status, body) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/tasks")
            .insert_header(bob.bearer())
            .set_json(json!({ "title": "Sneaky", "project_id": alices_project })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Project not found or does not belong to user");

    // Numeric strings are accepted as project ids.
    let task = create_task(
        &app,
        &alice,
        json!({ "title": "Filed", "project_id": alices_project.to_string() }),
    )
    .await;
    assert_eq!(task["project_id"], alices_project);
    assert_eq!(task["project_name"], "Alice's");

    let bobs_task = create_task(&app, &bob, json!({ "title": "Bob's" })).await;
    let (status, body) = send(
        &app,
        test::TestRequest::put()
            .uri(&format!("/api/tasks/{}", bobs_task["id"]))
            .insert_header(bob.bearer())
            .set_json(json!({ "title": "Bob's", "project_id": alices_project })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Project not found or does not belong to user");
}

#[actix_rt::test]
async fn test_tasks_are_invisible_to_other_users() {
    let app = init_app(test_store().await).await;
    let alice = register_user(&app, "Alice", "alice@example.com").await;
    let project = create_project(&app, &alice, "P").await;
    let task = create_task(&app, &alice, json!({ "title": "T", "project_id": project })).await;

    let bob = register_user(&app, "Bob", "bob@example.com").await;
    let uri = format!("/api/tasks/{}", task["id"]);

    let (status, body) = send(
        &app,
        test::TestRequest::get().uri(&uri).insert_header(bob.bearer()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Task not found");

    let (status, _) = send(
        &app,
        test::TestRequest::put()
            .uri(&uri)
            .insert_header(bob.bearer())
            .set_json(json!({ "title": "Hijacked" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        test::TestRequest::delete().uri(&uri).insert_header(bob.bearer()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = list(&app, &bob, "").await;
    assert_eq!(body["data"], json!([]));

    let (status, body) = send(
        &app,
        test::TestRequest::get().uri(&uri).insert_header(alice.bearer()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "T");
}

#[actix_rt::test]
async fn test_task_filters() {
    let app = init_app(test_store().await).await;
    let alice = register_user(&app, "Alice", "alice@example.com").await;
    let work = create_project(&app, &alice, "Work").await;

    create_task(
        &app,
        &alice,
        json!({
            "title": "Buy food",
            "description": "Milk and eggs",
            "priority": "low",
            "due_date": "2030-01-10"
        }),
    )
    .await;
    create_task(
        &app,
        &alice,
        json!({
            "title": "Quarterly report",
            "description": "Include FOOTNOTES",
            "priority": "high",
            "status": "in-progress",
            "due_date": "2030-03-01T12:00:00Z",
            "project_id": work
        }),
    )
    .await;
    create_task(
        &app,
        &alice,
        json!({ "title": "100% done", "status": "completed" }),
    )
    .await;

    let (status, body) = list(&app, &alice, "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Tasks retrieved successfully");
    assert_eq!(
        titles(&body),
        vec!["100% done", "Quarterly report", "Buy food"]
    );

    let (_, body) = list(&app, &alice, "?search=FOO").await;
    assert_eq!(titles(&body), vec!["Quarterly report", "Buy food"]);

    // LIKE wildcards in the term are literal.
    let (_, body) = list(&app, &alice, "?search=%25").await;
    assert_eq!(titles(&body), vec!["100% done"]);

    let (_, body) = list(&app, &alice, "?status=in-progress").await;
    assert_eq!(titles(&body), vec!["Quarterly report"]);

    let (_, body) = list(&app, &alice, "?priority=low").await;
    assert_eq!(titles(&body), vec!["Buy food"]);

    let (_, body) = list(&app, &alice, &format!("?project_id={}", work)).await;
    assert_eq!(titles(&body), vec!["Quarterly report"]);

    let (_, body) = list(&app, &alice, "?due_date=2030-02-01").await;
    assert_eq!(titles(&body), vec!["Buy food"]);

    // The due date bound is inclusive.
    let (_, body) = list(&app, &alice, "?due_date=2030-03-01T12:00:00Z").await;
    assert_eq!(titles(&body), vec!["Quarterly report", "Buy food"]);

    let (_, body) = list(&app, &alice, "?search=report&priority=low").await;
    assert_eq!(body["data"], json!([]));

    let (status, body) = list(&app, &alice, "?due_date=not-a-date").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid due date format");

    let (status, _) = list(&app, &alice, "?status=done").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_status_counts() {
    let app = init_app(test_store().await).await;
    let alice = register_user(&app, "Alice", "alice@example.com").await;
    let bob = register_user(&app, "Bob", "bob@example.com").await;

    for status in ["todo", "todo", "in-progress", "completed", "completed", "completed"] {
        create_task(&app, &alice, json!({ "title": "t", "status": status })).await;
    }
    create_task(&app, &bob, json!({ "title": "bob's" })).await;

    let (status, body) = send(
        &app,
        test::TestRequest::get()
            .uri("/api/tasks/status-counts")
            .insert_header(alice.bearer()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Task status counts retrieved successfully");
    assert_eq!(
        body["data"],
        json!({ "todo": 2, "in_progress": 1, "completed": 3, "total": 6 })
    );
}

#[actix_rt::test]
async fn test_create_task_unauthorized() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let store = web::Data::from(memory_store());
    let tokens = web::Data::new(common::token_service());
    let hasher = web::Data::new(PasswordHasher::new(4));
    let server = HttpServer::new(move || {
        App::new()
            .app_data(store.clone())
            .app_data(tokens.clone())
            .app_data(hasher.clone())
            .configure(routes::app)
    })
    .workers(1)
    .listen(listener)
    .expect("Failed to listen")
    .run();
    let handle = server.handle();
    rt::spawn(server);

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://127.0.0.1:{}/api/tasks", port))
        .json(&json!({ "title": "Unauthorized Task", "status": "todo" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.expect("Response is not JSON");
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "authorization_required");

    handle.stop(true).await;
}
