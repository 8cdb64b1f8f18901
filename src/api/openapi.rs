//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{
    auth, books, borrows, health, maintenance, revision_papers, rooms, shelves, stats, students,
    users,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "School Library API",
        version = "1.0.0",
        description = "School library administration REST API: books, shelves, rooms, students and borrows"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::login,
        auth::student_login,
        auth::register,
        auth::me,
        auth::update_profile,
        auth::password_reset,
        // Users
        users::list_users,
        users::create_user,
        users::delete_user,
        users::update_role,
        // Rooms
        rooms::list_rooms,
        rooms::get_room,
        rooms::create_room,
        rooms::update_room,
        rooms::delete_room,
        // Shelves
        shelves::list_shelves,
        shelves::get_shelf,
        shelves::create_shelf,
        shelves::update_shelf,
        shelves::delete_shelf,
        // Books
        books::list_books,
        books::available_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Students
        students::list_students,
        students::get_student,
        students::create_student,
        students::update_student,
        students::delete_student,
        // Borrows
        borrows::list_borrows,
        borrows::create_borrow,
        borrows::borrow_from_book,
        borrows::assign_book,
        borrows::return_borrow,
        borrows::abort_borrow,
        borrows::book_borrows,
        borrows::student_borrows,
        // Revision papers
        revision_papers::list_papers,
        revision_papers::upload_paper,
        revision_papers::delete_paper,
        // Reports
        stats::dashboard,
        stats::analysis,
        stats::room_dashboard,
        stats::form_rooms,
        stats::student_dashboard,
        // Maintenance
        maintenance::recount,
    ),
    components(
        schemas(
            // Auth
            crate::models::user::LoginRequest,
            crate::models::user::StudentLoginRequest,
            crate::models::user::LoginResponse,
            crate::models::user::RegisterUser,
            crate::models::user::PasswordResetRequest,
            auth::MessageResponse,
            // Users
            crate::models::user::Role,
            crate::models::user::User,
            crate::models::user::UserQuery,
            crate::models::user::CreateUser,
            crate::models::user::UpdateProfile,
            crate::models::user::UpdateRole,
            // Rooms
            crate::models::room::Room,
            crate::models::room::CreateRoom,
            crate::models::room::UpdateRoom,
            // Shelves
            crate::models::shelf::Shelf,
            crate::models::shelf::CreateShelf,
            crate::models::shelf::UpdateShelf,
            // Books
            crate::models::book::Book,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            // Students
            crate::models::student::Student,
            crate::models::student::CreateStudent,
            crate::models::student::UpdateStudent,
            // Borrows
            crate::models::borrow::BorrowState,
            crate::models::borrow::Borrow,
            crate::models::borrow::BorrowDetails,
            crate::models::borrow::BorrowOverview,
            crate::models::borrow::CreateBorrow,
            crate::models::borrow::BorrowBookRequest,
            crate::models::borrow::AssignBookRequest,
            // Revision papers
            crate::models::revision_paper::RevisionPaper,
            crate::models::revision_paper::CreateRevisionPaper,
            // Reports
            crate::models::stats::Totals,
            crate::models::stats::GroupStat,
            crate::models::stats::RoomStat,
            crate::models::stats::BookBorrowCount,
            crate::models::stats::StudentBorrowCount,
            crate::models::stats::Dashboard,
            crate::models::stats::Analysis,
            crate::models::stats::RoomDashboard,
            crate::models::stats::FormRooms,
            crate::models::stats::StudentDashboard,
            crate::models::stats::RecountReport,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "users", description = "User management"),
        (name = "rooms", description = "Rooms (classes)"),
        (name = "shelves", description = "Shelves and their borrow limits"),
        (name = "books", description = "Book catalog"),
        (name = "students", description = "Student records"),
        (name = "borrows", description = "Borrow desk"),
        (name = "revision-papers", description = "Revision papers shared with rooms"),
        (name = "stats", description = "Dashboards and reports"),
        (name = "maintenance", description = "Counter repair")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_borrow_paths_and_bearer_scheme() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/borrows"));
        assert!(doc.paths.paths.contains_key("/books/{id}/borrow"));
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
