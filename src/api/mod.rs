//! API handlers for the school library REST endpoints

pub mod auth;
pub mod books;
pub mod borrows;
pub mod health;
pub mod maintenance;
pub mod openapi;
pub mod revision_papers;
pub mod rooms;
pub mod shelves;
pub mod stats;
pub mod students;
pub mod users;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, models::user::UserClaims, AppState};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Authentication
        .route("/auth/login", post(auth::login))
        .route("/auth/student-login", post(auth::student_login))
        .route("/auth/register", post(auth::register))
        .route("/auth/me", get(auth::me))
        .route("/auth/profile", put(auth::update_profile))
        .route("/auth/password-reset", post(auth::password_reset))
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/:id", delete(users::delete_user))
        .route("/users/:id/role", put(users::update_role))
        // Rooms
        .route("/rooms", get(rooms::list_rooms).post(rooms::create_room))
        .route(
            "/rooms/:id",
            get(rooms::get_room).put(rooms::update_room).delete(rooms::delete_room),
        )
        .route("/rooms/:id/dashboard", get(stats::room_dashboard))
        .route("/forms/:form/rooms", get(stats::form_rooms))
        // Shelves
        .route("/shelves", get(shelves::list_shelves).post(shelves::create_shelf))
        .route(
            "/shelves/:id",
            get(shelves::get_shelf)
                .put(shelves::update_shelf)
                .delete(shelves::delete_shelf),
        )
        // Books
        .route("/books", get(books::list_books).post(books::create_book))
        .route("/books/available", get(books::available_books))
        .route(
            "/books/:id",
            get(books::get_book).put(books::update_book).delete(books::delete_book),
        )
        .route("/books/:id/borrows", get(borrows::book_borrows))
        .route("/books/:id/borrow", post(borrows::borrow_from_book))
        // Students
        .route("/students", get(students::list_students).post(students::create_student))
        .route(
            "/students/:id",
            get(students::get_student)
                .put(students::update_student)
                .delete(students::delete_student),
        )
        .route("/students/:id/borrows", get(borrows::student_borrows))
        .route("/students/:id/assign-book", post(borrows::assign_book))
        // Borrows
        .route("/borrows", get(borrows::list_borrows).post(borrows::create_borrow))
        .route("/borrows/:id/return", post(borrows::return_borrow))
        .route("/borrows/:id/abort", post(borrows::abort_borrow))
        // Revision papers
        .route(
            "/revision-papers",
            get(revision_papers::list_papers).post(revision_papers::upload_paper),
        )
        .route(
            "/revision-papers/:id",
            delete(revision_papers::delete_paper),
        )
        // Reports
        .route("/dashboard", get(stats::dashboard))
        .route("/dashboard/student", get(stats::student_dashboard))
        .route("/analysis", get(stats::analysis))
        // Maintenance
        .route("/maintenance/recount", post(maintenance::recount))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}
