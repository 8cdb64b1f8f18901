//! Revision paper model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Revision paper shared with a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct RevisionPaper {
    pub id: i32,
    pub title: String,
    pub subject: String,
    /// Opaque reference to the stored document
    pub file: String,
    pub room_id: Option<i32>,
    pub uploaded_by: Option<i32>,
    pub uploaded_at: DateTime<Utc>,
}

/// Revision paper row to insert
#[derive(Debug, Clone, PartialEq)]
pub struct NewRevisionPaper {
    pub title: String,
    pub subject: String,
    pub file: String,
    pub room_id: Option<i32>,
    pub uploaded_by: Option<i32>,
    pub uploaded_at: DateTime<Utc>,
}

/// Upload revision paper request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateRevisionPaper {
    #[validate(length(min = 1, max = 255, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, max = 255, message = "Subject is required"))]
    pub subject: String,
    /// Reference returned by the file store
    #[validate(length(min = 1, max = 512, message = "File reference is required"))]
    pub file: String,
    pub room_id: Option<i32>,
}

/// Revision paper query parameters
#[derive(Debug, Default, Clone, Deserialize, IntoParams, ToSchema)]
pub struct RevisionPaperQuery {
    /// Case-insensitive search over title and subject
    pub search: Option<String>,
    pub room_id: Option<i32>,
    pub subject: Option<String>,
}
