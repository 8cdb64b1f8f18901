//! Dashboard and analysis report types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::{
    borrow::BorrowDetails, revision_paper::RevisionPaper, room::Room, student::Student,
};

/// Headline counts for the staff dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Totals {
    pub total_books: i64,
    pub total_students: i64,
    pub total_rooms: i64,
    pub total_shelves: i64,
    pub active_borrows: i64,
    pub overdue_borrows: i64,
}

/// Student and active-borrow counts for one group (room, form, stream or teacher)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct GroupStat {
    pub label: String,
    pub students: i64,
    pub active_borrows: i64,
}

/// Per-room breakdown, keeping the room id for drill-down links
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct RoomStat {
    pub room_id: i32,
    pub form: String,
    pub stream: String,
    pub class_teacher: Option<String>,
    pub students: i64,
    pub active_borrows: i64,
}

/// Book ranked by number of borrows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookBorrowCount {
    pub book_id: i32,
    pub title: String,
    pub book_number: String,
    pub borrow_count: i64,
}

/// Student ranked by number of borrows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct StudentBorrowCount {
    pub student_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub admission_number: String,
    pub borrow_count: i64,
}

/// Staff dashboard
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Dashboard {
    #[serde(flatten)]
    pub totals: Totals,
    pub due_soon: Vec<BorrowDetails>,
}

/// Analysis view
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Analysis {
    pub totals: Totals,
    pub per_room: Vec<RoomStat>,
    pub per_form: Vec<GroupStat>,
    pub per_stream: Vec<GroupStat>,
    pub per_teacher: Vec<GroupStat>,
    pub most_borrowed_books: Vec<BookBorrowCount>,
    pub most_active_students: Vec<StudentBorrowCount>,
    pub due_soon: Vec<BorrowDetails>,
}

/// One room with its students and borrow activity
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoomDashboard {
    pub room: Room,
    pub students: Vec<Student>,
    pub active_borrows: i64,
    pub overdue_borrows: i64,
}

/// Rooms of one form
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FormRooms {
    pub form: String,
    pub rooms: Vec<RoomStat>,
    pub students: i64,
    pub active_borrows: i64,
}

/// What a logged-in student sees
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentDashboard {
    pub student: Student,
    pub room: Option<Room>,
    pub active_borrows: Vec<BorrowDetails>,
    pub history: Vec<BorrowDetails>,
    pub revision_papers: Vec<RevisionPaper>,
}

/// Result of a full counter repair pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RecountReport {
    pub shelves_checked: usize,
    pub shelves_fixed: usize,
    pub rooms_checked: usize,
    pub rooms_fixed: usize,
}
