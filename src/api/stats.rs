//! Dashboards and reports

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    error::AppResult,
    models::stats::{Analysis, Dashboard, FormRooms, RoomDashboard, StudentDashboard},
    AppState,
};

use super::AuthenticatedUser;

/// Staff dashboard: totals and borrows due soon
#[utoipa::path(
    get,
    path = "/dashboard",
    tag = "stats",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Dashboard", body = Dashboard),
        (status = 403, description = "Library staff privileges required")
    )
)]
pub async fn dashboard(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Dashboard>> {
    claims.require_staff()?;
    Ok(Json(state.services.stats.dashboard().await?))
}

/// Borrow activity grouped by room, form, stream and class teacher
#[utoipa::path(
    get,
    path = "/analysis",
    tag = "stats",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Analysis", body = Analysis),
        (status = 403, description = "Library staff privileges required")
    )
)]
pub async fn analysis(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Analysis>> {
    claims.require_staff()?;
    Ok(Json(state.services.stats.analysis().await?))
}

/// One room with its students and borrow counts
#[utoipa::path(
    get,
    path = "/rooms/{id}/dashboard",
    tag = "stats",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Room ID")),
    responses(
        (status = 200, description = "Room dashboard", body = RoomDashboard),
        (status = 404, description = "Room not found")
    )
)]
pub async fn room_dashboard(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<RoomDashboard>> {
    claims.require_staff()?;
    Ok(Json(state.services.stats.room_dashboard(id).await?))
}

/// Every room of a form
#[utoipa::path(
    get,
    path = "/forms/{form}/rooms",
    tag = "stats",
    security(("bearer_auth" = [])),
    params(("form" = String, Path, description = "Form, e.g. \"Form 2\"")),
    responses(
        (status = 200, description = "Rooms of the form", body = FormRooms),
        (status = 404, description = "No room in this form")
    )
)]
pub async fn form_rooms(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(form): Path<String>,
) -> AppResult<Json<FormRooms>> {
    claims.require_staff()?;
    Ok(Json(state.services.stats.form_rooms(&form).await?))
}

/// The logged-in student's borrows, room and revision papers
#[utoipa::path(
    get,
    path = "/dashboard/student",
    tag = "stats",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Student dashboard", body = StudentDashboard),
        (status = 403, description = "Student account required")
    )
)]
pub async fn student_dashboard(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<StudentDashboard>> {
    let admission_number = claims.require_student()?;
    Ok(Json(
        state.services.stats.student_dashboard(admission_number).await?,
    ))
}
