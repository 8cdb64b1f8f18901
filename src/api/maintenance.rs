//! Maintenance endpoints

use axum::{extract::State, Json};

use crate::{error::AppResult, models::stats::RecountReport, AppState};

use super::AuthenticatedUser;

/// Recompute every shelf and room counter from the live rows
#[utoipa::path(
    post,
    path = "/maintenance/recount",
    tag = "maintenance",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Counters repaired", body = RecountReport),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn recount(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<RecountReport>> {
    claims.require_admin()?;
    let report = state.services.counters.recount_all().await?;
    tracing::info!(
        shelves_fixed = report.shelves_fixed,
        rooms_fixed = report.rooms_fixed,
        "Counters recomputed"
    );
    Ok(Json(report))
}
