//! Student model and related types

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Student model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Student {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub admission_number: String,
    /// Generated identifier `INITIALS/SERIAL/YY`, never changed once set
    pub student_id: Option<String>,
    pub year_of_study: i32,
    pub current_class: String,
    /// Opaque reference to the student's picture
    pub picture: Option<String>,
    pub room_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Build a student identifier: upper-cased initials, admission number and
/// two-digit enrolment year, e.g. `JD/1234/25`.
pub fn generate_student_id(
    first_name: &str,
    last_name: &str,
    admission_number: &str,
    enrolled_at: DateTime<Utc>,
) -> String {
    let initials: String = [first_name, last_name]
        .iter()
        .filter_map(|name| name.trim().chars().next())
        .flat_map(char::to_uppercase)
        .collect();
    format!(
        "{}/{}/{:02}",
        initials,
        admission_number.trim(),
        enrolled_at.year().rem_euclid(100)
    )
}

/// Writable student fields as persisted by the store
#[derive(Debug, Clone, PartialEq)]
pub struct StudentRecord {
    pub first_name: String,
    pub last_name: String,
    pub admission_number: String,
    pub student_id: Option<String>,
    pub year_of_study: i32,
    pub current_class: String,
    pub picture: Option<String>,
    pub room_id: Option<i32>,
}

/// Create student request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateStudent {
    #[validate(length(min = 1, max = 255, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 255, message = "Last name is required"))]
    pub last_name: String,
    #[validate(length(min = 1, max = 50, message = "Admission number is required"))]
    pub admission_number: String,
    #[validate(range(min = 1, max = 12, message = "Invalid year of study"))]
    pub year_of_study: i32,
    #[validate(length(min = 1, max = 50, message = "Current class is required"))]
    pub current_class: String,
    pub picture: Option<String>,
    pub room_id: Option<i32>,
}

/// Update student request.
/// `room_id: Some(None)` (JSON `null`) removes the student from their room.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateStudent {
    #[validate(length(min = 1, max = 255, message = "First name cannot be empty"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Last name cannot be empty"))]
    pub last_name: Option<String>,
    #[validate(length(min = 1, max = 50, message = "Admission number cannot be empty"))]
    pub admission_number: Option<String>,
    #[validate(range(min = 1, max = 12, message = "Invalid year of study"))]
    pub year_of_study: Option<i32>,
    #[validate(length(min = 1, max = 50, message = "Current class cannot be empty"))]
    pub current_class: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub picture: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<i32>)]
    pub room_id: Option<Option<i32>>,
}

/// Student query parameters
#[derive(Debug, Default, Clone, Deserialize, IntoParams, ToSchema)]
pub struct StudentQuery {
    /// Case-insensitive search over names, admission number and student id
    pub search: Option<String>,
    pub room_id: Option<i32>,
}
