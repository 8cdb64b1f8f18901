//! Repository layer: store traits and their implementations
//!
//! Services only see the store traits below. `Repository::postgres` wires the
//! sqlx-backed stores; `Repository::in_memory` wires [`memory::MemoryStore`],
//! used by tests and demos.

pub mod books;
pub mod borrows;
pub mod memory;
pub mod revision_papers;
pub mod rooms;
pub mod shelves;
pub mod stats;
pub mod students;
pub mod users;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookQuery, BookRecord},
        borrow::{Borrow, BorrowDetails, BorrowQuery, NewBorrow},
        revision_paper::{NewRevisionPaper, RevisionPaper, RevisionPaperQuery},
        room::{Room, RoomQuery, RoomRecord},
        shelf::{Shelf, ShelfQuery, ShelfRecord},
        stats::{BookBorrowCount, GroupStat, RoomStat, StudentBorrowCount, Totals},
        student::{Student, StudentQuery, StudentRecord},
        user::{NewUser, ProfileChanges, Role, User, UserQuery},
    },
};

/// Shelf limit to enforce when inserting a borrow
#[derive(Debug, Clone, PartialEq)]
pub struct ShelfLimit {
    pub shelf_id: i32,
    pub shelf_code: String,
    pub max_per_student: i32,
}

/// Grouping key for student / active-borrow breakdowns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Form,
    Stream,
    Teacher,
}

/// Label used for rooms without a class teacher
pub const UNASSIGNED_TEACHER: &str = "Unassigned";

#[cfg_attr(test, automock)]
#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn list(&self, query: &RoomQuery) -> AppResult<Vec<Room>>;
    async fn get_by_id(&self, id: i32) -> AppResult<Room>;
    async fn create(&self, room: &RoomRecord) -> AppResult<Room>;
    async fn update(&self, id: i32, room: &RoomRecord) -> AppResult<Room>;
    /// Refused with `ProtectedDelete` while students are assigned
    async fn delete(&self, id: i32) -> AppResult<()>;
    /// Recompute and persist `total_students` only; returns the new value
    async fn recount_students(&self, id: i32) -> AppResult<i32>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ShelfStore: Send + Sync {
    async fn list(&self, query: &ShelfQuery) -> AppResult<Vec<Shelf>>;
    async fn get_by_id(&self, id: i32) -> AppResult<Shelf>;
    async fn create(&self, shelf: &ShelfRecord) -> AppResult<Shelf>;
    /// Also copies the shelf category onto every book of the shelf, atomically
    async fn update(&self, id: i32, shelf: &ShelfRecord) -> AppResult<Shelf>;
    /// Deletes the shelf with its books and their borrows
    async fn delete(&self, id: i32) -> AppResult<()>;
    /// Recompute and persist `shelf_count` only; returns the new value
    async fn recount_books(&self, id: i32) -> AppResult<i32>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait BookStore: Send + Sync {
    async fn list(&self, query: &BookQuery) -> AppResult<Vec<Book>>;
    async fn get_by_id(&self, id: i32) -> AppResult<Book>;
    async fn create(&self, book: &BookRecord) -> AppResult<Book>;
    async fn update(&self, id: i32, book: &BookRecord) -> AppResult<Book>;
    /// Deletes the book with its borrows
    async fn delete(&self, id: i32) -> AppResult<()>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait StudentStore: Send + Sync {
    async fn list(&self, query: &StudentQuery) -> AppResult<Vec<Student>>;
    async fn get_by_id(&self, id: i32) -> AppResult<Student>;
    async fn get_by_admission_number(&self, admission_number: &str) -> AppResult<Option<Student>>;
    async fn create(&self, student: &StudentRecord) -> AppResult<Student>;
    async fn update(&self, id: i32, student: &StudentRecord) -> AppResult<Student>;
    /// Deletes the student with their borrows
    async fn delete(&self, id: i32) -> AppResult<()>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait BorrowStore: Send + Sync {
    async fn get_by_id(&self, id: i32) -> AppResult<Borrow>;
    async fn list(&self, query: &BorrowQuery) -> AppResult<Vec<BorrowDetails>>;
    async fn has_active_for_book(&self, book_id: i32) -> AppResult<bool>;
    /// Active borrows of a student on books currently on the shelf
    async fn count_active_for_student_on_shelf(&self, student_id: i32, shelf_id: i32) -> AppResult<i64>;
    /// Insert an active borrow. Availability of the book and the shelf limit
    /// are re-checked atomically with the insert.
    async fn create_active(&self, borrow: &NewBorrow, limit: Option<ShelfLimit>) -> AppResult<Borrow>;
    /// Active -> Returned; `AlreadyReturned` if the borrow is not active
    async fn mark_returned(&self, id: i32, at: DateTime<Utc>) -> AppResult<Borrow>;
    async fn delete(&self, id: i32) -> AppResult<()>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait RevisionPaperStore: Send + Sync {
    async fn list(&self, query: &RevisionPaperQuery) -> AppResult<Vec<RevisionPaper>>;
    async fn get_by_id(&self, id: i32) -> AppResult<RevisionPaper>;
    async fn create(&self, paper: &NewRevisionPaper) -> AppResult<RevisionPaper>;
    async fn delete(&self, id: i32) -> AppResult<()>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn list(&self, query: &UserQuery) -> AppResult<Vec<User>>;
    async fn get_by_id(&self, id: i32) -> AppResult<User>;
    /// Case-insensitive match on username, email or phone
    async fn find_by_login(&self, identifier: &str) -> AppResult<Option<User>>;
    /// Oldest student account linked to an admission number
    async fn find_student(&self, admission_number: &str) -> AppResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn create(&self, user: &NewUser) -> AppResult<User>;
    async fn update_profile(&self, id: i32, changes: &ProfileChanges) -> AppResult<User>;
    async fn set_role(&self, id: i32, role: Role) -> AppResult<User>;
    async fn set_password(&self, id: i32, password_hash: &str) -> AppResult<()>;
    /// Removes the account; borrows and papers keep their history with a null actor
    async fn delete(&self, id: i32) -> AppResult<()>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait StatsStore: Send + Sync {
    async fn totals(&self, now: DateTime<Utc>) -> AppResult<Totals>;
    async fn room_stats(&self, form: Option<String>) -> AppResult<Vec<RoomStat>>;
    async fn group_stats(&self, group_by: GroupBy) -> AppResult<Vec<GroupStat>>;
    async fn most_borrowed_books(&self, limit: i64) -> AppResult<Vec<BookBorrowCount>>;
    /// Students with at least one borrow, busiest first
    async fn most_active_students(&self, limit: i64) -> AppResult<Vec<StudentBorrowCount>>;
    /// Active borrows due in `[from, until]`, soonest first
    async fn due_between(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> AppResult<Vec<BorrowDetails>>;
    /// (active, overdue) borrows held by students of a room
    async fn room_borrow_counts(&self, room_id: i32, now: DateTime<Utc>) -> AppResult<(i64, i64)>;
}

/// Handles to every store, shared by the services
#[derive(Clone)]
pub struct Repository {
    pub rooms: Arc<dyn RoomStore>,
    pub shelves: Arc<dyn ShelfStore>,
    pub books: Arc<dyn BookStore>,
    pub students: Arc<dyn StudentStore>,
    pub borrows: Arc<dyn BorrowStore>,
    pub revision_papers: Arc<dyn RevisionPaperStore>,
    pub users: Arc<dyn UserStore>,
    pub stats: Arc<dyn StatsStore>,
}

impl Repository {
    /// Create a repository backed by PostgreSQL
    pub fn postgres(pool: Pool<Postgres>) -> Self {
        Self {
            rooms: Arc::new(rooms::RoomsRepository::new(pool.clone())),
            shelves: Arc::new(shelves::ShelvesRepository::new(pool.clone())),
            books: Arc::new(books::BooksRepository::new(pool.clone())),
            students: Arc::new(students::StudentsRepository::new(pool.clone())),
            borrows: Arc::new(borrows::BorrowsRepository::new(pool.clone())),
            revision_papers: Arc::new(revision_papers::RevisionPapersRepository::new(pool.clone())),
            users: Arc::new(users::UsersRepository::new(pool.clone())),
            stats: Arc::new(stats::StatsRepository::new(pool)),
        }
    }

    /// Create a repository backed by a fresh in-memory store
    pub fn in_memory() -> Self {
        let store = Arc::new(memory::MemoryStore::default());
        Self {
            rooms: store.clone(),
            shelves: store.clone(),
            books: store.clone(),
            students: store.clone(),
            borrows: store.clone(),
            revision_papers: store.clone(),
            users: store.clone(),
            stats: store,
        }
    }
}

/// User-facing message for a unique constraint
pub fn conflict_message(constraint: &str) -> String {
    match constraint {
        "books_isbn_unique" => "A book with this ISBN already exists",
        "books_book_number_unique" => "A book with this book number already exists",
        "shelves_shelf_name_unique" => "A shelf with this name already exists",
        "shelves_shelf_code_unique" => "A shelf with this code already exists",
        "students_admission_number_unique" => "A student with this admission number already exists",
        "rooms_form_stream_unique" => "A room with this form and stream already exists",
        "users_username_key" => "This username is already taken",
        "users_email_unique" => "This email address is already in use",
        _ => "Duplicate value",
    }
    .to_string()
}

/// User-facing message for a foreign key that points at a missing row
pub fn missing_reference_message(constraint: &str) -> String {
    match constraint {
        "books_shelf_id_fkey" | "borrows_shelf_id_fkey" => "The shelf no longer exists",
        "students_room_id_fkey" | "revision_papers_room_id_fkey" => "The room no longer exists",
        "borrows_book_id_fkey" => "The book no longer exists",
        "borrows_student_id_fkey" => "The student no longer exists",
        "borrows_processed_by_fkey" | "revision_papers_uploaded_by_fkey" => {
            "The acting user account no longer exists"
        }
        _ => "A referenced record no longer exists",
    }
    .to_string()
}

/// Map constraint violations on inserts and updates to domain errors,
/// anything else to `Database`. A foreign key failure there means the
/// referenced row is gone.
pub(crate) fn map_db_error(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        let constraint = db_err.constraint().unwrap_or_default();
        match db_err.code().as_deref() {
            Some("23505") => return AppError::Conflict(conflict_message(constraint)),
            Some("23503") => return AppError::NotFound(missing_reference_message(constraint)),
            Some("23514") => {
                return AppError::Validation(format!("Value rejected by check {}", constraint));
            }
            _ => {}
        }
    }
    AppError::Database(err)
}

/// Like [`map_db_error`], but a foreign key failure on delete means other
/// rows still point at the one being removed
pub(crate) fn map_delete_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23503") => {
            AppError::ProtectedDelete("The record is still referenced by other records".to_string())
        }
        _ => map_db_error(err),
    }
}

/// `%term%` pattern for a case-insensitive `LIKE` against a lowered column
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Search term normalized for matching, `None` when blank
pub(crate) fn search_term(search: &Option<String>) -> Option<String> {
    search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::*;

    #[derive(Debug)]
    struct ConstraintViolation {
        code: &'static str,
        constraint: &'static str,
    }

    impl std::fmt::Display for ConstraintViolation {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "violates {}", self.constraint)
        }
    }

    impl std::error::Error for ConstraintViolation {}

    impl sqlx::error::DatabaseError for ConstraintViolation {
        fn message(&self) -> &str {
            "constraint violated"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.code))
        }

        fn constraint(&self) -> Option<&str> {
            Some(self.constraint)
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            match self.code {
                "23505" => sqlx::error::ErrorKind::UniqueViolation,
                "23503" => sqlx::error::ErrorKind::ForeignKeyViolation,
                _ => sqlx::error::ErrorKind::Other,
            }
        }
    }

    fn violation(code: &'static str, constraint: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(ConstraintViolation { code, constraint }))
    }

    #[test]
    fn test_foreign_key_on_write_is_not_found() {
        let err = map_db_error(violation("23503", "borrows_processed_by_fkey"));
        assert!(matches!(err, AppError::NotFound(ref m) if m.contains("acting user")));
        let err = map_db_error(violation("23503", "books_shelf_id_fkey"));
        assert!(matches!(err, AppError::NotFound(ref m) if m.contains("shelf")));
    }

    #[test]
    fn test_foreign_key_on_delete_is_protected() {
        let err = map_delete_error(violation("23503", "students_room_id_fkey"));
        assert!(matches!(err, AppError::ProtectedDelete(_)));
        let err = map_delete_error(violation("23505", "books_isbn_unique"));
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" Fiction "), "%fiction%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_search_term() {
        assert_eq!(search_term(&Some("  ".to_string())), None);
        assert_eq!(search_term(&Some(" AbC ".to_string())), Some("abc".to_string()));
        assert_eq!(search_term(&None), None);
    }
}
