//! Borrows repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use super::{like_pattern, map_db_error, search_term, BorrowStore, ShelfLimit};
use crate::{
    error::{AppError, AppResult},
    models::borrow::{Borrow, BorrowDetails, BorrowQuery, NewBorrow},
};

/// Borrow joined with book, student and room; shared with the stats queries
pub(crate) const BORROW_DETAILS_SELECT: &str = r#"
    SELECT br.id, br.book_id, b.title AS book_title, b.book_number, b.isbn,
           br.student_id, (s.first_name || ' ' || s.last_name) AS student_name,
           s.admission_number, r.form AS room_form, r.stream AS room_stream,
           br.borrowed_date, br.due_date, br.returned, br.returned_date, br.processed_by
    FROM borrows br
    JOIN books b ON b.id = br.book_id
    JOIN students s ON s.id = br.student_id
    LEFT JOIN rooms r ON r.id = s.room_id
"#;

#[derive(Clone)]
pub struct BorrowsRepository {
    pool: Pool<Postgres>,
}

impl BorrowsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BorrowStore for BorrowsRepository {
    async fn get_by_id(&self, id: i32) -> AppResult<Borrow> {
        sqlx::query_as::<_, Borrow>("SELECT * FROM borrows WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrow with id {} not found", id)))
    }

    /// Active borrows come soonest-due first, returned ones latest-returned first,
    /// mixed listings newest first
    async fn list(&self, query: &BorrowQuery) -> AppResult<Vec<BorrowDetails>> {
        let pattern = search_term(&query.search).map(|s| like_pattern(&s));

        let order_by = match query.returned {
            Some(false) => "br.due_date ASC, br.id",
            Some(true) => "br.returned_date DESC, br.id DESC",
            None => "br.borrowed_date DESC, br.id DESC",
        };

        let sql = format!(
            r#"
            {}
            WHERE ($1::text IS NULL
                   OR LOWER(b.title) LIKE $1
                   OR LOWER(b.book_number) LIKE $1
                   OR LOWER(b.isbn) LIKE $1
                   OR LOWER(s.admission_number) LIKE $1
                   OR LOWER(s.first_name) LIKE $1
                   OR LOWER(s.last_name) LIKE $1)
              AND ($2::bool IS NULL OR br.returned = $2)
              AND ($3::int IS NULL OR br.student_id = $3)
              AND ($4::int IS NULL OR br.book_id = $4)
              AND ($5::bool IS NULL OR $5 = (NOT br.returned AND br.due_date < NOW()))
            ORDER BY {}
            LIMIT $6
            "#,
            BORROW_DETAILS_SELECT, order_by
        );

        let borrows = sqlx::query_as::<_, BorrowDetails>(&sql)
            .bind(pattern)
            .bind(query.returned)
            .bind(query.student_id)
            .bind(query.book_id)
            .bind(query.overdue)
            .bind(query.limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(borrows)
    }

    async fn has_active_for_book(&self, book_id: i32) -> AppResult<bool> {
        let active: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM borrows WHERE book_id = $1 AND NOT returned)",
        )
        .bind(book_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(active)
    }

    async fn count_active_for_student_on_shelf(&self, student_id: i32, shelf_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM borrows br
            JOIN books b ON b.id = br.book_id
            WHERE br.student_id = $1 AND b.shelf_id = $2 AND NOT br.returned
            "#,
        )
        .bind(student_id)
        .bind(shelf_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// The book row lock serializes borrows of one book, the student row lock
    /// serializes one student's borrows; the partial unique index
    /// `borrows_one_active_per_book` backs both.
    async fn create_active(&self, borrow: &NewBorrow, limit: Option<ShelfLimit>) -> AppResult<Borrow> {
        let mut tx = self.pool.begin().await?;

        let book: Option<i32> = sqlx::query_scalar("SELECT id FROM books WHERE id = $1 FOR UPDATE")
            .bind(borrow.book_id)
            .fetch_optional(&mut *tx)
            .await?;
        if book.is_none() {
            return Err(AppError::BookUnavailable(borrow.book_id));
        }

        let active: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM borrows WHERE book_id = $1 AND NOT returned)",
        )
        .bind(borrow.book_id)
        .fetch_one(&mut *tx)
        .await?;
        if active {
            return Err(AppError::BookUnavailable(borrow.book_id));
        }

        if let Some(limit) = limit {
            sqlx::query("SELECT id FROM students WHERE id = $1 FOR UPDATE")
                .bind(borrow.student_id)
                .execute(&mut *tx)
                .await?;

            let held: i64 = sqlx::query_scalar(
                r#"
                SELECT COUNT(*) FROM borrows br
                JOIN books b ON b.id = br.book_id
                WHERE br.student_id = $1 AND b.shelf_id = $2 AND NOT br.returned
                "#,
            )
            .bind(borrow.student_id)
            .bind(limit.shelf_id)
            .fetch_one(&mut *tx)
            .await?;

            if held >= limit.max_per_student as i64 {
                return Err(AppError::ShelfLimitExceeded {
                    shelf: limit.shelf_code,
                    held,
                    limit: limit.max_per_student,
                });
            }
        }

        let created = sqlx::query_as::<_, Borrow>(
            r#"
            INSERT INTO borrows (
                book_id, student_id, borrowed_date, due_date,
                returned, returned_date, processed_by, shelf_id
            )
            VALUES ($1, $2, $3, $4, FALSE, NULL, $5, $6)
            RETURNING *
            "#,
        )
        .bind(borrow.book_id)
        .bind(borrow.student_id)
        .bind(borrow.borrowed_date)
        .bind(borrow.due_date)
        .bind(borrow.processed_by)
        .bind(borrow.shelf_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err)
                if db_err.constraint() == Some("borrows_one_active_per_book") =>
            {
                AppError::BookUnavailable(borrow.book_id)
            }
            _ => map_db_error(e),
        })?;

        tx.commit().await?;
        Ok(created)
    }

    async fn mark_returned(&self, id: i32, at: DateTime<Utc>) -> AppResult<Borrow> {
        let updated = sqlx::query_as::<_, Borrow>(
            r#"
            UPDATE borrows SET returned = TRUE, returned_date = $1
            WHERE id = $2 AND NOT returned
            RETURNING *
            "#,
        )
        .bind(at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(borrow) => Ok(borrow),
            // Either missing or already returned
            None => {
                self.get_by_id(id).await?;
                Err(AppError::AlreadyReturned(id))
            }
        }
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM borrows WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Borrow with id {} not found", id)));
        }
        Ok(())
    }
}
