//! Shelf model and related types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// A shelf groups books of one category and caps how many of them a
/// student may hold at once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Shelf {
    pub id: i32,
    pub shelf_name: String,
    pub shelf_code: String,
    pub category: String,
    /// Simultaneous active borrows allowed per student from this shelf
    pub max_borrow_per_student: i32,
    /// Number of books currently on this shelf (maintained by the server)
    pub shelf_count: i32,
}

/// Writable shelf fields as persisted by the store
#[derive(Debug, Clone, PartialEq)]
pub struct ShelfRecord {
    pub shelf_name: String,
    pub shelf_code: String,
    pub category: String,
    pub max_borrow_per_student: i32,
}

/// Create shelf request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateShelf {
    #[validate(length(min = 1, max = 255, message = "Shelf name is required"))]
    pub shelf_name: String,
    #[validate(length(min = 1, max = 50, message = "Shelf code is required"))]
    pub shelf_code: String,
    #[validate(length(min = 1, max = 255, message = "Category is required"))]
    pub category: String,
    /// Defaults to 1
    #[validate(range(min = 1, message = "At least one borrow per student must be allowed"))]
    pub max_borrow_per_student: Option<i32>,
}

/// Update shelf request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateShelf {
    #[validate(length(min = 1, max = 255, message = "Shelf name cannot be empty"))]
    pub shelf_name: Option<String>,
    #[validate(length(min = 1, max = 50, message = "Shelf code cannot be empty"))]
    pub shelf_code: Option<String>,
    /// Changing the category re-labels every book on the shelf
    #[validate(length(min = 1, max = 255, message = "Category cannot be empty"))]
    pub category: Option<String>,
    #[validate(range(min = 1, message = "At least one borrow per student must be allowed"))]
    pub max_borrow_per_student: Option<i32>,
}

/// Shelf query parameters
#[derive(Debug, Default, Clone, Deserialize, IntoParams, ToSchema)]
pub struct ShelfQuery {
    /// Case-insensitive search over name, code and category
    pub search: Option<String>,
    pub category: Option<String>,
}
