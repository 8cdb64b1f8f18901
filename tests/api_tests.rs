//! API integration tests over the in-memory repository

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;

use school_library::{
    api,
    config::AppConfig,
    models::{user::NewUser, Role, UserClaims},
    repository::Repository,
    services::Services,
    AppState,
};

const STAFF_ID: i32 = 1;
const ADMIN_ID: i32 = 2;

async fn app() -> (Router, AppConfig) {
    let config = AppConfig::default();
    let repository = Repository::in_memory();
    for (username, role) in [("desk", Role::Staff), ("head", Role::Admin)] {
        repository
            .users
            .create(&NewUser {
                username: username.to_string(),
                email: None,
                password: None,
                first_name: username.to_string(),
                last_name: "Library".to_string(),
                role,
                admission_number: None,
                phone: None,
            })
            .await
            .expect("seed user");
    }

    let services = Services::new(repository, &config);
    let state = AppState {
        config: Arc::new(config.clone()),
        services: Arc::new(services),
    };
    (api::create_router(state), config)
}

fn token(config: &AppConfig, role: Role, admission_number: Option<&str>) -> String {
    let now = Utc::now().timestamp();
    let user_id = match role {
        Role::Staff => STAFF_ID,
        Role::Admin | Role::SuperAdmin => ADMIN_ID,
        Role::Student => 0,
    };
    UserClaims {
        sub: format!("{}-tester", role),
        user_id,
        role,
        admission_number: admission_number.map(str::to_string),
        exp: now + 3600,
        iat: now,
    }
    .create_token(&config.auth.jwt_secret)
    .expect("token")
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Room, shelf limited to one book per student, two books on it, one student
async fn seed(app: &Router, staff: &str) -> (i64, i64, i64, i64, i64) {
    let (status, room) = send(
        app,
        Method::POST,
        "/api/v1/rooms",
        Some(staff),
        Some(json!({"form": "Form 2", "stream": "East", "class_teacher": "Mr. Otieno"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, shelf) = send(
        app,
        Method::POST,
        "/api/v1/shelves",
        Some(staff),
        Some(json!({"shelf_name": "Fiction", "shelf_code": "F1", "category": "Novels"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(shelf["max_borrow_per_student"], 1);

    let mut books = Vec::new();
    for (title, isbn, number) in [("The River", "978-1", "B-001"), ("Weep Not", "978-2", "B-002")] {
        let (status, book) = send(
            app,
            Method::POST,
            "/api/v1/books",
            Some(staff),
            Some(json!({
                "title": title,
                "publishers": "EAEP",
                "first_publication": 1964,
                "isbn": isbn,
                "book_number": number,
                "shelf_id": shelf["id"],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(book["category"], "Novels");
        books.push(book["id"].as_i64().expect("book id"));
    }

    let (status, student) = send(
        app,
        Method::POST,
        "/api/v1/students",
        Some(staff),
        Some(json!({
            "first_name": "Amina",
            "last_name": "Njeri",
            "admission_number": "4521",
            "year_of_study": 2,
            "current_class": "2E",
            "room_id": room["id"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    (
        room["id"].as_i64().expect("room id"),
        shelf["id"].as_i64().expect("shelf id"),
        books[0],
        books[1],
        student["id"].as_i64().expect("student id"),
    )
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = app().await;
    let (status, body) = send(&app, Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, Method::GET, "/api/v1/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_requires_bearer_token() {
    let (app, config) = app().await;
    let (status, body) = send(&app, Method::GET, "/api/v1/books", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 2);

    let (status, _) = send(&app, Method::GET, "/api/v1/books", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let student = token(&config, Role::Student, Some("4521"));
    let (status, _) = send(&app, Method::GET, "/api/v1/books", Some(&student), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::GET, "/api/v1/rooms", Some(&student), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let staff = token(&config, Role::Staff, None);
    let (status, _) = send(&app, Method::POST, "/api/v1/maintenance/recount", Some(&staff), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_borrow_desk_flow() {
    let (app, config) = app().await;
    let staff = token(&config, Role::Staff, None);
    let (room_id, shelf_id, first_book, second_book, student_id) = seed(&app, &staff).await;

    let (_, room) = send(&app, Method::GET, &format!("/api/v1/rooms/{}", room_id), Some(&staff), None).await;
    assert_eq!(room["total_students"], 1);
    let (_, shelf) = send(&app, Method::GET, &format!("/api/v1/shelves/{}", shelf_id), Some(&staff), None).await;
    assert_eq!(shelf["shelf_count"], 2);

    let (status, borrow) = send(
        &app,
        Method::POST,
        "/api/v1/borrows",
        Some(&staff),
        Some(json!({"book_id": first_book, "admission_number": "4521", "days": 7})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(borrow["returned"], false);
    let borrow_id = borrow["id"].as_i64().expect("borrow id");

    // Same book again
    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/books/{}/borrow", first_book),
        Some(&staff),
        Some(json!({"admission_number": "4521"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 6);

    // Shelf allows one book per student
    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/students/{}/assign-book", student_id),
        Some(&staff),
        Some(json!({"book_id": second_book})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], 8);

    let (status, available) = send(&app, Method::GET, "/api/v1/books/available", Some(&staff), None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = available
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|b| b["id"].as_i64())
        .collect();
    assert_eq!(ids, vec![second_book]);

    let (status, overview) = send(&app, Method::GET, "/api/v1/borrows?search=njeri", Some(&staff), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overview["active"].as_array().map(Vec::len), Some(1));
    assert_eq!(overview["active"][0]["student_name"], "Amina Njeri");

    let (status, returned) = send(
        &app,
        Method::POST,
        &format!("/api/v1/borrows/{}/return", borrow_id),
        Some(&staff),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(returned["returned"], true);
    assert!(returned["returned_date"].is_string());

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/borrows/{}/return", borrow_id),
        Some(&staff),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 11);

    // The returned book no longer counts against the shelf limit
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/v1/students/{}/assign-book", student_id),
        Some(&staff),
        Some(json!({"book_id": second_book, "days": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, history) = send(
        &app,
        Method::GET,
        &format!("/api/v1/students/{}/borrows", student_id),
        Some(&staff),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_borrow_errors() {
    let (app, config) = app().await;
    let staff = token(&config, Role::Staff, None);
    let (_, _, first_book, _, _) = seed(&app, &staff).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/borrows",
        Some(&staff),
        Some(json!({"book_id": first_book, "admission_number": "0000"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 4);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/borrows",
        Some(&staff),
        Some(json!({"book_id": first_book, "admission_number": "4521", "days": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 10);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/borrows",
        Some(&staff),
        Some(json!({"book_id": 999, "admission_number": "4521"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 6);

    let (status, _) = send(&app, Method::POST, "/api/v1/borrows/999/return", Some(&staff), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_room_with_students_cannot_be_deleted() {
    let (app, config) = app().await;
    let staff = token(&config, Role::Staff, None);
    let (room_id, _, _, _, student_id) = seed(&app, &staff).await;

    let uri = format!("/api/v1/rooms/{}", room_id);
    let (status, body) = send(&app, Method::DELETE, &uri, Some(&staff), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 12);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/v1/students/{}", student_id),
        Some(&staff),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::DELETE, &uri, Some(&staff), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_student_login_and_dashboard() {
    let (app, config) = app().await;
    let staff = token(&config, Role::Staff, None);
    let (room_id, _, first_book, _, _) = seed(&app, &staff).await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/revision-papers",
        Some(&staff),
        Some(json!({"title": "Mock 1", "subject": "Biology", "file": "papers/mock1.pdf", "room_id": room_id})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/borrows",
        Some(&staff),
        Some(json!({"book_id": first_book, "admission_number": "4521"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/auth/student-login",
        None,
        Some(json!({"first_name": "Someone", "admission_number": "4521"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, login) = send(
        &app,
        Method::POST,
        "/api/v1/auth/student-login",
        None,
        Some(json!({"first_name": "amina", "admission_number": "4521"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login["user"]["role"], "student");
    let student = login["token"].as_str().expect("token").to_string();

    let (status, dashboard) = send(&app, Method::GET, "/api/v1/dashboard/student", Some(&student), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["student"]["admission_number"], "4521");
    assert_eq!(dashboard["active_borrows"].as_array().map(Vec::len), Some(1));
    assert_eq!(dashboard["revision_papers"].as_array().map(Vec::len), Some(1));

    let (status, papers) = send(&app, Method::GET, "/api/v1/revision-papers", Some(&student), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(papers[0]["subject"], "Biology");

    let (status, _) = send(&app, Method::GET, "/api/v1/dashboard/student", Some(&staff), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_recount_and_analysis() {
    let (app, config) = app().await;
    let staff = token(&config, Role::Staff, None);
    let admin = token(&config, Role::Admin, None);
    seed(&app, &staff).await;

    let (status, report) = send(&app, Method::POST, "/api/v1/maintenance/recount", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["shelves_checked"], 1);
    assert_eq!(report["shelves_fixed"], 0);
    assert_eq!(report["rooms_fixed"], 0);

    let (status, analysis) = send(&app, Method::GET, "/api/v1/analysis", Some(&staff), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(analysis["per_form"][0]["label"], "Form 2");
    assert_eq!(analysis["per_teacher"][0]["label"], "Mr. Otieno");

    let (status, form) = send(&app, Method::GET, "/api/v1/forms/Form%202/rooms", Some(&staff), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(form["students"], 1);

    let (status, _) = send(&app, Method::GET, "/api/v1/forms/Form%209/rooms", Some(&staff), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let (app, _) = app().await;
    let (status, doc) = send(&app, Method::GET, "/api-docs/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc["info"]["title"], "School Library API");
}
