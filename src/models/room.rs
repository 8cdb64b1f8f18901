//! Room (class) model and related types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// A class room: one stream of one form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Room {
    pub id: i32,
    /// Grade level (e.g. "Form 2")
    pub form: String,
    /// Section label (e.g. "East")
    pub stream: String,
    pub class_teacher: Option<String>,
    /// Number of students currently assigned (maintained by the server)
    pub total_students: i32,
}

impl Room {
    /// Display label, e.g. "Form 2 East"
    pub fn label(&self) -> String {
        format!("{} {}", self.form, self.stream)
    }
}

/// Writable room fields as persisted by the store
#[derive(Debug, Clone, PartialEq)]
pub struct RoomRecord {
    pub form: String,
    pub stream: String,
    pub class_teacher: Option<String>,
}

/// Create room request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateRoom {
    #[validate(length(min = 1, max = 50, message = "Form is required"))]
    pub form: String,
    #[validate(length(min = 1, max = 50, message = "Stream is required"))]
    pub stream: String,
    #[validate(length(max = 255))]
    pub class_teacher: Option<String>,
}

/// Update room request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateRoom {
    #[validate(length(min = 1, max = 50, message = "Form cannot be empty"))]
    pub form: Option<String>,
    #[validate(length(min = 1, max = 50, message = "Stream cannot be empty"))]
    pub stream: Option<String>,
    #[validate(length(max = 255))]
    pub class_teacher: Option<String>,
}

/// Room query parameters
#[derive(Debug, Default, Clone, Deserialize, IntoParams, ToSchema)]
pub struct RoomQuery {
    /// Case-insensitive search over form, stream and class teacher
    pub search: Option<String>,
    /// Restrict to one form
    pub form: Option<String>,
}
