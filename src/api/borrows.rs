//! Borrow desk endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::borrow::{
        AssignBookRequest, Borrow, BorrowBookRequest, BorrowDetails, BorrowOverview, BorrowSearch,
        CreateBorrow,
    },
    AppState,
};

use super::AuthenticatedUser;

/// Active borrows and the latest returns
#[utoipa::path(
    get,
    path = "/borrows",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(BorrowSearch),
    responses(
        (status = 200, description = "Borrow overview", body = BorrowOverview),
        (status = 403, description = "Library staff privileges required")
    )
)]
pub async fn list_borrows(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<BorrowSearch>,
) -> AppResult<Json<BorrowOverview>> {
    claims.require_staff()?;
    Ok(Json(state.services.borrows.overview(query.search).await?))
}

/// Lend a book to the student with the given admission number
#[utoipa::path(
    post,
    path = "/borrows",
    tag = "borrows",
    security(("bearer_auth" = [])),
    request_body = CreateBorrow,
    responses(
        (status = 201, description = "Book borrowed", body = Borrow),
        (status = 400, description = "Invalid loan length"),
        (status = 404, description = "No student with this admission number"),
        (status = 409, description = "Book is not available"),
        (status = 422, description = "Shelf borrow limit reached")
    )
)]
pub async fn create_borrow(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateBorrow>,
) -> AppResult<(StatusCode, Json<Borrow>)> {
    claims.require_staff()?;
    request.validate()?;
    let borrow = state
        .services
        .borrows
        .borrow_book(
            request.book_id,
            &request.admission_number,
            request.days,
            Some(claims.user_id),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(borrow)))
}

/// Lend this book
#[utoipa::path(
    post,
    path = "/books/{id}/borrow",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    request_body = BorrowBookRequest,
    responses(
        (status = 201, description = "Book borrowed", body = Borrow),
        (status = 400, description = "Invalid loan length"),
        (status = 404, description = "No student with this admission number"),
        (status = 409, description = "Book is not available"),
        (status = 422, description = "Shelf borrow limit reached")
    )
)]
pub async fn borrow_from_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(book_id): Path<i32>,
    Json(request): Json<BorrowBookRequest>,
) -> AppResult<(StatusCode, Json<Borrow>)> {
    claims.require_staff()?;
    request.validate()?;
    let borrow = state
        .services
        .borrows
        .borrow_book(
            book_id,
            &request.admission_number,
            request.days,
            Some(claims.user_id),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(borrow)))
}

/// Lend a book to this student
#[utoipa::path(
    post,
    path = "/students/{id}/assign-book",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Student ID")),
    request_body = AssignBookRequest,
    responses(
        (status = 201, description = "Book borrowed", body = Borrow),
        (status = 404, description = "Student not found"),
        (status = 409, description = "Book is not available"),
        (status = 422, description = "Shelf borrow limit reached")
    )
)]
pub async fn assign_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(student_id): Path<i32>,
    Json(request): Json<AssignBookRequest>,
) -> AppResult<(StatusCode, Json<Borrow>)> {
    claims.require_staff()?;
    let borrow = state
        .services
        .borrows
        .assign_to_student(student_id, request.book_id, request.days, Some(claims.user_id))
        .await?;
    Ok((StatusCode::CREATED, Json(borrow)))
}

/// Mark a borrow as returned
#[utoipa::path(
    post,
    path = "/borrows/{id}/return",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Borrow ID")),
    responses(
        (status = 200, description = "Book returned", body = Borrow),
        (status = 404, description = "Borrow not found"),
        (status = 409, description = "Borrow already returned")
    )
)]
pub async fn return_borrow(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Borrow>> {
    claims.require_staff()?;
    Ok(Json(state.services.borrows.return_book(id).await?))
}

/// Delete a borrow record
#[utoipa::path(
    post,
    path = "/borrows/{id}/abort",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Borrow ID")),
    responses(
        (status = 204, description = "Borrow deleted"),
        (status = 404, description = "Borrow not found")
    )
)]
pub async fn abort_borrow(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_staff()?;
    state.services.borrows.abort_borrow(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Borrow history of a book
#[utoipa::path(
    get,
    path = "/books/{id}/borrows",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Borrows of the book", body = Vec<BorrowDetails>),
        (status = 404, description = "Book not found")
    )
)]
pub async fn book_borrows(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<BorrowDetails>>> {
    claims.require_staff()?;
    Ok(Json(state.services.borrows.book_history(id).await?))
}

/// Borrow history of a student
#[utoipa::path(
    get,
    path = "/students/{id}/borrows",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Borrows of the student", body = Vec<BorrowDetails>),
        (status = 404, description = "Student not found")
    )
)]
pub async fn student_borrows(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<BorrowDetails>>> {
    claims.require_staff()?;
    Ok(Json(state.services.borrows.student_history(id).await?))
}
