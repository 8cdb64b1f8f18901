//! Borrow (loan of one book to one student) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Borrow lifecycle state. Aborted borrows are deleted, so they have no state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BorrowState {
    Active,
    Returned,
}

/// Borrow model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Borrow {
    pub id: i32,
    pub book_id: i32,
    pub student_id: i32,
    pub borrowed_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned: bool,
    pub returned_date: Option<DateTime<Utc>>,
    /// Staff user who recorded the borrow; null once that user is removed
    pub processed_by: Option<i32>,
    /// Shelf the book was on when it was borrowed
    pub shelf_id: Option<i32>,
}

impl Borrow {
    pub fn state(&self) -> BorrowState {
        if self.returned {
            BorrowState::Returned
        } else {
            BorrowState::Active
        }
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.returned && now > self.due_date
    }

    /// Whole days past the due date, 0 when not overdue
    pub fn days_overdue(&self, now: DateTime<Utc>) -> i64 {
        if self.is_overdue(now) {
            (now - self.due_date).num_days()
        } else {
            0
        }
    }
}

/// Borrow row to insert; always starts active
#[derive(Debug, Clone, PartialEq)]
pub struct NewBorrow {
    pub book_id: i32,
    pub student_id: i32,
    pub borrowed_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub processed_by: Option<i32>,
    pub shelf_id: Option<i32>,
}

/// Borrow joined with its book, student and room for list views
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BorrowDetails {
    pub id: i32,
    pub book_id: i32,
    pub book_title: String,
    pub book_number: String,
    pub isbn: String,
    pub student_id: i32,
    pub student_name: String,
    pub admission_number: String,
    pub room_form: Option<String>,
    pub room_stream: Option<String>,
    pub borrowed_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned: bool,
    pub returned_date: Option<DateTime<Utc>>,
    pub processed_by: Option<i32>,
    #[sqlx(default)]
    pub is_overdue: bool,
    #[sqlx(default)]
    pub days_overdue: i64,
}

impl BorrowDetails {
    /// Fill the overdue flags relative to `now`
    pub fn with_overdue(mut self, now: DateTime<Utc>) -> Self {
        self.is_overdue = !self.returned && now > self.due_date;
        self.days_overdue = if self.is_overdue {
            (now - self.due_date).num_days()
        } else {
            0
        };
        self
    }
}

/// Borrow desk view: what is out now and what came back last
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BorrowOverview {
    /// Active borrows, soonest due first
    pub active: Vec<BorrowDetails>,
    /// Most recently returned borrows
    pub recently_returned: Vec<BorrowDetails>,
}

/// Search parameter of the borrow desk view
#[derive(Debug, Default, Clone, Deserialize, IntoParams, ToSchema)]
pub struct BorrowSearch {
    pub search: Option<String>,
}

/// Borrow a book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBorrow {
    pub book_id: i32,
    #[validate(length(min = 1, message = "Admission number is required"))]
    pub admission_number: String,
    /// Loan length in days; the configured default applies when omitted
    pub days: Option<i64>,
}

/// Borrow from a book's detail view
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BorrowBookRequest {
    #[validate(length(min = 1, message = "Admission number is required"))]
    pub admission_number: String,
    pub days: Option<i64>,
}

/// Assign a book to a student from the student's detail view
#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignBookRequest {
    pub book_id: i32,
    pub days: Option<i64>,
}

/// Borrow query parameters
#[derive(Debug, Default, Clone, Deserialize, IntoParams, ToSchema)]
pub struct BorrowQuery {
    /// Case-insensitive search over book title, number and ISBN and student names and admission number
    pub search: Option<String>,
    pub returned: Option<bool>,
    pub student_id: Option<i32>,
    pub book_id: Option<i32>,
    /// Only active borrows past their due date
    pub overdue: Option<bool>,
    pub limit: Option<i64>,
}
