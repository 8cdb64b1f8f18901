//! Borrow workflow: borrow, return and abort
//!
//! Preconditions of a borrow are checked in a fixed order so callers always
//! see the first failing rule. The store repeats the availability and shelf
//! limit checks atomically with the insert, which closes the race between two
//! desks lending the same book.

use chrono::{Duration, Utc};

use super::counters::CounterService;
use crate::{
    config::LibraryConfig,
    error::{AppError, AppResult},
    models::borrow::{Borrow, BorrowDetails, BorrowOverview, BorrowQuery, NewBorrow},
    repository::{Repository, ShelfLimit},
};

#[derive(Clone)]
pub struct BorrowsService {
    repository: Repository,
    counters: CounterService,
    config: LibraryConfig,
}

impl BorrowsService {
    pub fn new(repository: Repository, counters: CounterService, config: LibraryConfig) -> Self {
        Self {
            repository,
            counters,
            config,
        }
    }

    /// Lend a book to the student holding `admission_number`.
    ///
    /// Fails with, in order: `UnknownStudent`, `InvalidDuration`,
    /// `BookUnavailable` (missing or already lent), `ShelfLimitExceeded`.
    /// `days` falls back to the configured default loan length.
    pub async fn borrow_book(
        &self,
        book_id: i32,
        admission_number: &str,
        days: Option<i64>,
        acting_user: Option<i32>,
    ) -> AppResult<Borrow> {
        let student = self
            .repository
            .students
            .get_by_admission_number(admission_number.trim())
            .await?
            .ok_or_else(|| AppError::UnknownStudent(admission_number.trim().to_string()))?;

        let days = days.unwrap_or(self.config.default_borrow_days);
        if days <= 0 {
            return Err(AppError::InvalidDuration(days));
        }
        let now = Utc::now();
        let due_date = Duration::try_days(days)
            .and_then(|d| now.checked_add_signed(d))
            .ok_or(AppError::InvalidDuration(days))?;

        let book = match self.repository.books.get_by_id(book_id).await {
            Ok(book) => book,
            Err(AppError::NotFound(_)) => return Err(AppError::BookUnavailable(book_id)),
            Err(e) => return Err(e),
        };
        if self.repository.borrows.has_active_for_book(book.id).await? {
            return Err(AppError::BookUnavailable(book.id));
        }

        let limit = match book.shelf_id {
            Some(shelf_id) => {
                let shelf = self.repository.shelves.get_by_id(shelf_id).await?;
                let held = self
                    .repository
                    .borrows
                    .count_active_for_student_on_shelf(student.id, shelf.id)
                    .await?;
                if held >= shelf.max_borrow_per_student as i64 {
                    return Err(AppError::ShelfLimitExceeded {
                        shelf: shelf.shelf_code,
                        held,
                        limit: shelf.max_borrow_per_student,
                    });
                }
                Some(ShelfLimit {
                    shelf_id: shelf.id,
                    shelf_code: shelf.shelf_code,
                    max_per_student: shelf.max_borrow_per_student,
                })
            }
            None => None,
        };

        let borrow = self
            .repository
            .borrows
            .create_active(
                &NewBorrow {
                    book_id: book.id,
                    student_id: student.id,
                    borrowed_date: now,
                    due_date,
                    processed_by: acting_user,
                    shelf_id: book.shelf_id,
                },
                limit,
            )
            .await?;

        tracing::info!(
            borrow_id = borrow.id,
            book_id = book.id,
            student_id = student.id,
            processed_by = ?acting_user,
            "Book {} lent to {} until {}",
            book.book_number,
            student.admission_number,
            borrow.due_date.date_naive()
        );
        Ok(borrow)
    }

    /// Lend a book to a student picked from the student's page
    pub async fn assign_to_student(
        &self,
        student_id: i32,
        book_id: i32,
        days: Option<i64>,
        acting_user: Option<i32>,
    ) -> AppResult<Borrow> {
        let student = self.repository.students.get_by_id(student_id).await?;
        self.borrow_book(book_id, &student.admission_number, days, acting_user)
            .await
    }

    /// Active -> Returned, then refresh the book's shelf count
    pub async fn return_book(&self, borrow_id: i32) -> AppResult<Borrow> {
        let borrow = self
            .repository
            .borrows
            .mark_returned(borrow_id, Utc::now())
            .await?;

        match self.repository.books.get_by_id(borrow.book_id).await {
            Ok(book) => self.counters.refresh_shelves(&[book.shelf_id]).await,
            Err(e) => tracing::warn!(borrow_id, error = %e, "Returned borrow has no readable book"),
        }

        tracing::info!(borrow_id, book_id = borrow.book_id, "Book returned");
        Ok(borrow)
    }

    /// Delete a borrow outright, whatever its state
    pub async fn abort_borrow(&self, borrow_id: i32) -> AppResult<()> {
        self.repository.borrows.delete(borrow_id).await?;
        tracing::info!(borrow_id, "Borrow aborted");
        Ok(())
    }

    pub async fn get(&self, borrow_id: i32) -> AppResult<Borrow> {
        self.repository.borrows.get_by_id(borrow_id).await
    }

    pub async fn list(&self, query: &BorrowQuery) -> AppResult<Vec<BorrowDetails>> {
        let now = Utc::now();
        let borrows = self.repository.borrows.list(query).await?;
        Ok(borrows.into_iter().map(|b| b.with_overdue(now)).collect())
    }

    /// Active borrows by due date plus the latest returns
    pub async fn overview(&self, search: Option<String>) -> AppResult<BorrowOverview> {
        let active = self
            .list(&BorrowQuery {
                search: search.clone(),
                returned: Some(false),
                ..Default::default()
            })
            .await?;
        let recently_returned = self
            .list(&BorrowQuery {
                search,
                returned: Some(true),
                limit: Some(self.config.recent_returns),
                ..Default::default()
            })
            .await?;

        Ok(BorrowOverview {
            active,
            recently_returned,
        })
    }

    /// Every borrow of a book, newest first
    pub async fn book_history(&self, book_id: i32) -> AppResult<Vec<BorrowDetails>> {
        self.repository.books.get_by_id(book_id).await?;
        self.list(&BorrowQuery {
            book_id: Some(book_id),
            ..Default::default()
        })
        .await
    }

    /// Every borrow of a student, newest first
    pub async fn student_history(&self, student_id: i32) -> AppResult<Vec<BorrowDetails>> {
        self.repository.students.get_by_id(student_id).await?;
        self.list(&BorrowQuery {
            student_id: Some(student_id),
            ..Default::default()
        })
        .await
    }
}
