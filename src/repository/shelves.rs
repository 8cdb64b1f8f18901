//! Shelves repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::{like_pattern, map_db_error, map_delete_error, search_term, ShelfStore};
use crate::{
    error::{AppError, AppResult},
    models::shelf::{Shelf, ShelfQuery, ShelfRecord},
};

#[derive(Clone)]
pub struct ShelvesRepository {
    pool: Pool<Postgres>,
}

impl ShelvesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShelfStore for ShelvesRepository {
    async fn list(&self, query: &ShelfQuery) -> AppResult<Vec<Shelf>> {
        let pattern = search_term(&query.search).map(|s| like_pattern(&s));

        let shelves = sqlx::query_as::<_, Shelf>(
            r#"
            SELECT * FROM shelves
            WHERE ($1::text IS NULL
                   OR LOWER(shelf_name) LIKE $1
                   OR LOWER(shelf_code) LIKE $1
                   OR LOWER(category) LIKE $1)
              AND ($2::text IS NULL OR LOWER(category) = LOWER($2))
            ORDER BY shelf_name
            "#,
        )
        .bind(pattern)
        .bind(&query.category)
        .fetch_all(&self.pool)
        .await?;

        Ok(shelves)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Shelf> {
        sqlx::query_as::<_, Shelf>("SELECT * FROM shelves WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Shelf with id {} not found", id)))
    }

    async fn create(&self, shelf: &ShelfRecord) -> AppResult<Shelf> {
        sqlx::query_as::<_, Shelf>(
            r#"
            INSERT INTO shelves (shelf_name, shelf_code, category, max_borrow_per_student, shelf_count)
            VALUES ($1, $2, $3, $4, 0)
            RETURNING *
            "#,
        )
        .bind(&shelf.shelf_name)
        .bind(&shelf.shelf_code)
        .bind(&shelf.category)
        .bind(shelf.max_borrow_per_student)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    /// The shelf row and the category of its books change in one transaction
    async fn update(&self, id: i32, shelf: &ShelfRecord) -> AppResult<Shelf> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Shelf>(
            r#"
            UPDATE shelves
            SET shelf_name = $1, shelf_code = $2, category = $3, max_borrow_per_student = $4
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(&shelf.shelf_name)
        .bind(&shelf.shelf_code)
        .bind(&shelf.category)
        .bind(shelf.max_borrow_per_student)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| AppError::NotFound(format!("Shelf with id {} not found", id)))?;

        let relabeled = sqlx::query(
            "UPDATE books SET category = $1 WHERE shelf_id = $2 AND category IS DISTINCT FROM $1",
        )
        .bind(&updated.category)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if relabeled.rows_affected() > 0 {
            tracing::debug!(shelf_id = id, books = relabeled.rows_affected(), "Books relabeled");
        }
        Ok(updated)
    }

    /// Books (and through them, borrows) go with the shelf via ON DELETE CASCADE
    async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM shelves WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_delete_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Shelf with id {} not found", id)));
        }
        Ok(())
    }

    async fn recount_books(&self, id: i32) -> AppResult<i32> {
        sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE shelves
            SET shelf_count = (SELECT COUNT(*) FROM books WHERE shelf_id = $1)::int
            WHERE id = $1
            RETURNING shelf_count
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Shelf with id {} not found", id)))
    }
}
