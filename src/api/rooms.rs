//! Room (class) endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::room::{CreateRoom, Room, RoomQuery, UpdateRoom},
    AppState,
};

use super::AuthenticatedUser;

/// List rooms
#[utoipa::path(
    get,
    path = "/rooms",
    tag = "rooms",
    security(("bearer_auth" = [])),
    params(RoomQuery),
    responses(
        (status = 200, description = "List of rooms", body = Vec<Room>),
        (status = 403, description = "Library staff privileges required")
    )
)]
pub async fn list_rooms(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<RoomQuery>,
) -> AppResult<Json<Vec<Room>>> {
    claims.require_staff()?;
    Ok(Json(state.services.rooms.list(&query).await?))
}

/// Get room by ID
#[utoipa::path(
    get,
    path = "/rooms/{id}",
    tag = "rooms",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Room ID")),
    responses(
        (status = 200, description = "Room details", body = Room),
        (status = 404, description = "Room not found")
    )
)]
pub async fn get_room(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Room>> {
    claims.require_staff()?;
    Ok(Json(state.services.rooms.get(id).await?))
}

/// Create room
#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    security(("bearer_auth" = [])),
    request_body = CreateRoom,
    responses(
        (status = 201, description = "Room created", body = Room),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Form and stream already exist")
    )
)]
pub async fn create_room(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(room): Json<CreateRoom>,
) -> AppResult<(StatusCode, Json<Room>)> {
    claims.require_staff()?;
    let created = state.services.rooms.create(room).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update room
#[utoipa::path(
    put,
    path = "/rooms/{id}",
    tag = "rooms",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Room ID")),
    request_body = UpdateRoom,
    responses(
        (status = 200, description = "Room updated", body = Room),
        (status = 404, description = "Room not found"),
        (status = 409, description = "Form and stream already exist")
    )
)]
pub async fn update_room(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(changes): Json<UpdateRoom>,
) -> AppResult<Json<Room>> {
    claims.require_staff()?;
    Ok(Json(state.services.rooms.update(id, changes).await?))
}

/// Delete room
#[utoipa::path(
    delete,
    path = "/rooms/{id}",
    tag = "rooms",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Room ID")),
    responses(
        (status = 204, description = "Room deleted"),
        (status = 404, description = "Room not found"),
        (status = 409, description = "Room still has students")
    )
)]
pub async fn delete_room(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_staff()?;
    state.services.rooms.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
