//! Student endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::student::{CreateStudent, Student, StudentQuery, UpdateStudent},
    AppState,
};

use super::AuthenticatedUser;

/// List students
#[utoipa::path(
    get,
    path = "/students",
    tag = "students",
    security(("bearer_auth" = [])),
    params(StudentQuery),
    responses(
        (status = 200, description = "List of students", body = Vec<Student>),
        (status = 403, description = "Library staff privileges required")
    )
)]
pub async fn list_students(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<StudentQuery>,
) -> AppResult<Json<Vec<Student>>> {
    claims.require_staff()?;
    Ok(Json(state.services.students.list(&query).await?))
}

/// Get student by ID
#[utoipa::path(
    get,
    path = "/students/{id}",
    tag = "students",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Student details", body = Student),
        (status = 404, description = "Student not found")
    )
)]
pub async fn get_student(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Student>> {
    claims.require_staff()?;
    Ok(Json(state.services.students.get(id).await?))
}

/// Create student
#[utoipa::path(
    post,
    path = "/students",
    tag = "students",
    security(("bearer_auth" = [])),
    request_body = CreateStudent,
    responses(
        (status = 201, description = "Student created", body = Student),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Admission number already in use")
    )
)]
pub async fn create_student(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(student): Json<CreateStudent>,
) -> AppResult<(StatusCode, Json<Student>)> {
    claims.require_staff()?;
    let created = state.services.students.create(student).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update student
#[utoipa::path(
    put,
    path = "/students/{id}",
    tag = "students",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Student ID")),
    request_body = UpdateStudent,
    responses(
        (status = 200, description = "Student updated", body = Student),
        (status = 404, description = "Student or room not found"),
        (status = 409, description = "Admission number already in use")
    )
)]
pub async fn update_student(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(changes): Json<UpdateStudent>,
) -> AppResult<Json<Student>> {
    claims.require_staff()?;
    Ok(Json(state.services.students.update(id, changes).await?))
}

/// Delete student and their borrows
#[utoipa::path(
    delete,
    path = "/students/{id}",
    tag = "students",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Student ID")),
    responses(
        (status = 204, description = "Student deleted"),
        (status = 404, description = "Student not found")
    )
)]
pub async fn delete_student(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_staff()?;
    state.services.students.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
