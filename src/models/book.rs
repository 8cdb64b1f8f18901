//! Book model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Book model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub publishers: String,
    /// Year of first publication
    pub first_publication: i32,
    pub isbn: String,
    /// Library inventory number
    pub book_number: String,
    /// Category of the owning shelf (read-only)
    pub category: Option<String>,
    /// Opaque reference to the cover picture
    pub picture: Option<String>,
    pub shelf_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Writable book fields as persisted by the store.
/// `category` is always copied from the shelf by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct BookRecord {
    pub title: String,
    pub publishers: String,
    pub first_publication: i32,
    pub isbn: String,
    pub book_number: String,
    pub category: Option<String>,
    pub picture: Option<String>,
    pub shelf_id: Option<i32>,
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 255, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, max = 255, message = "Publishers are required"))]
    pub publishers: String,
    #[validate(range(min = 0, max = 9999, message = "Invalid publication year"))]
    pub first_publication: i32,
    #[validate(length(min = 1, max = 32, message = "ISBN is required"))]
    pub isbn: String,
    #[validate(length(min = 1, max = 50, message = "Book number is required"))]
    pub book_number: String,
    pub picture: Option<String>,
    pub shelf_id: Option<i32>,
}

/// Update book request.
/// `shelf_id: Some(None)` (JSON `null`) takes the book off its shelf.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 255, message = "Title cannot be empty"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Publishers cannot be empty"))]
    pub publishers: Option<String>,
    #[validate(range(min = 0, max = 9999, message = "Invalid publication year"))]
    pub first_publication: Option<i32>,
    #[validate(length(min = 1, max = 32, message = "ISBN cannot be empty"))]
    pub isbn: Option<String>,
    #[validate(length(min = 1, max = 50, message = "Book number cannot be empty"))]
    pub book_number: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub picture: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<i32>)]
    pub shelf_id: Option<Option<i32>>,
}

/// Book query parameters
#[derive(Debug, Default, Clone, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    /// Case-insensitive search over title, ISBN, book number, publishers and category
    pub search: Option<String>,
    pub shelf_id: Option<i32>,
    pub category: Option<String>,
    /// Only books without an active borrow
    pub available: Option<bool>,
}
