//! Books repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::{like_pattern, map_db_error, map_delete_error, search_term, BookStore};
use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookQuery, BookRecord},
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookStore for BooksRepository {
    async fn list(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        let pattern = search_term(&query.search).map(|s| like_pattern(&s));

        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT b.* FROM books b
            WHERE ($1::text IS NULL
                   OR LOWER(b.title) LIKE $1
                   OR LOWER(b.isbn) LIKE $1
                   OR LOWER(b.book_number) LIKE $1
                   OR LOWER(b.publishers) LIKE $1
                   OR LOWER(COALESCE(b.category, '')) LIKE $1)
              AND ($2::int IS NULL OR b.shelf_id = $2)
              AND ($3::text IS NULL OR LOWER(b.category) = LOWER($3))
              AND ($4::bool IS NULL OR $4 = NOT EXISTS (
                    SELECT 1 FROM borrows br WHERE br.book_id = b.id AND NOT br.returned))
            ORDER BY b.title
            "#,
        )
        .bind(pattern)
        .bind(query.shelf_id)
        .bind(&query.category)
        .bind(query.available)
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn create(&self, book: &BookRecord) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (
                title, publishers, first_publication, isbn, book_number,
                category, picture, shelf_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(&book.publishers)
        .bind(book.first_publication)
        .bind(&book.isbn)
        .bind(&book.book_number)
        .bind(&book.category)
        .bind(&book.picture)
        .bind(book.shelf_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn update(&self, id: i32, book: &BookRecord) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                title = $1, publishers = $2, first_publication = $3, isbn = $4,
                book_number = $5, category = $6, picture = $7, shelf_id = $8
            WHERE id = $9
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(&book.publishers)
        .bind(book.first_publication)
        .bind(&book.isbn)
        .bind(&book.book_number)
        .bind(&book.category)
        .bind(&book.picture)
        .bind(book.shelf_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_delete_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        Ok(())
    }
}
