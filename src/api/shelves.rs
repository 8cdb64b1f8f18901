//! Shelf endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::shelf::{CreateShelf, Shelf, ShelfQuery, UpdateShelf},
    AppState,
};

use super::AuthenticatedUser;

/// List shelves
#[utoipa::path(
    get,
    path = "/shelves",
    tag = "shelves",
    security(("bearer_auth" = [])),
    params(ShelfQuery),
    responses(
        (status = 200, description = "List of shelves", body = Vec<Shelf>)
    )
)]
pub async fn list_shelves(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<ShelfQuery>,
) -> AppResult<Json<Vec<Shelf>>> {
    Ok(Json(state.services.shelves.list(&query).await?))
}

/// Get shelf by ID
#[utoipa::path(
    get,
    path = "/shelves/{id}",
    tag = "shelves",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Shelf ID")),
    responses(
        (status = 200, description = "Shelf details", body = Shelf),
        (status = 404, description = "Shelf not found")
    )
)]
pub async fn get_shelf(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Shelf>> {
    Ok(Json(state.services.shelves.get(id).await?))
}

/// Create shelf
#[utoipa::path(
    post,
    path = "/shelves",
    tag = "shelves",
    security(("bearer_auth" = [])),
    request_body = CreateShelf,
    responses(
        (status = 201, description = "Shelf created", body = Shelf),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Shelf name or code already in use")
    )
)]
pub async fn create_shelf(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(shelf): Json<CreateShelf>,
) -> AppResult<(StatusCode, Json<Shelf>)> {
    claims.require_staff()?;
    let created = state.services.shelves.create(shelf).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update shelf
///
/// A category change is copied onto every book of the shelf.
#[utoipa::path(
    put,
    path = "/shelves/{id}",
    tag = "shelves",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Shelf ID")),
    request_body = UpdateShelf,
    responses(
        (status = 200, description = "Shelf updated", body = Shelf),
        (status = 404, description = "Shelf not found"),
        (status = 409, description = "Shelf name or code already in use")
    )
)]
pub async fn update_shelf(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(changes): Json<UpdateShelf>,
) -> AppResult<Json<Shelf>> {
    claims.require_staff()?;
    Ok(Json(state.services.shelves.update(id, changes).await?))
}

/// Delete shelf and its books
#[utoipa::path(
    delete,
    path = "/shelves/{id}",
    tag = "shelves",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Shelf ID")),
    responses(
        (status = 204, description = "Shelf deleted"),
        (status = 404, description = "Shelf not found")
    )
)]
pub async fn delete_shelf(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_staff()?;
    state.services.shelves.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
