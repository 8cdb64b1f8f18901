//! Revision paper endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        revision_paper::{CreateRevisionPaper, RevisionPaper, RevisionPaperQuery},
        user::Role,
    },
    AppState,
};

use super::AuthenticatedUser;

/// List revision papers
///
/// Students only see the papers shared with their own room.
#[utoipa::path(
    get,
    path = "/revision-papers",
    tag = "revision-papers",
    security(("bearer_auth" = [])),
    params(RevisionPaperQuery),
    responses(
        (status = 200, description = "List of revision papers", body = Vec<RevisionPaper>)
    )
)]
pub async fn list_papers(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<RevisionPaperQuery>,
) -> AppResult<Json<Vec<RevisionPaper>>> {
    let papers = if claims.role == Role::Student {
        let admission_number = claims.require_student()?;
        state
            .services
            .revision_papers
            .list_for_student(admission_number, query)
            .await?
    } else {
        state.services.revision_papers.list(&query).await?
    };
    Ok(Json(papers))
}

/// Upload a revision paper
#[utoipa::path(
    post,
    path = "/revision-papers",
    tag = "revision-papers",
    security(("bearer_auth" = [])),
    request_body = CreateRevisionPaper,
    responses(
        (status = 201, description = "Paper uploaded", body = RevisionPaper),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Room not found")
    )
)]
pub async fn upload_paper(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(paper): Json<CreateRevisionPaper>,
) -> AppResult<(StatusCode, Json<RevisionPaper>)> {
    claims.require_staff()?;
    let created = state
        .services
        .revision_papers
        .upload(paper, Some(claims.user_id))
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Delete a revision paper
#[utoipa::path(
    delete,
    path = "/revision-papers/{id}",
    tag = "revision-papers",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Revision paper ID")),
    responses(
        (status = 204, description = "Paper deleted"),
        (status = 404, description = "Paper not found")
    )
)]
pub async fn delete_paper(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_staff()?;
    state.services.revision_papers.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
