//! Data models for the school library

pub mod book;
pub mod borrow;
pub mod revision_paper;
pub mod room;
pub mod shelf;
pub mod stats;
pub mod student;
pub mod user;

// Re-export commonly used types
pub use book::Book;
pub use borrow::{Borrow, BorrowDetails, BorrowState};
pub use revision_paper::RevisionPaper;
pub use room::Room;
pub use shelf::Shelf;
pub use student::Student;
pub use user::{Role, User, UserClaims};
