//! Revision papers repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::{like_pattern, map_db_error, search_term, RevisionPaperStore};
use crate::{
    error::{AppError, AppResult},
    models::revision_paper::{NewRevisionPaper, RevisionPaper, RevisionPaperQuery},
};

#[derive(Clone)]
pub struct RevisionPapersRepository {
    pool: Pool<Postgres>,
}

impl RevisionPapersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RevisionPaperStore for RevisionPapersRepository {
    /// Newest uploads first
    async fn list(&self, query: &RevisionPaperQuery) -> AppResult<Vec<RevisionPaper>> {
        let pattern = search_term(&query.search).map(|s| like_pattern(&s));

        let papers = sqlx::query_as::<_, RevisionPaper>(
            r#"
            SELECT * FROM revision_papers
            WHERE ($1::text IS NULL OR LOWER(title) LIKE $1 OR LOWER(subject) LIKE $1)
              AND ($2::int IS NULL OR room_id = $2)
              AND ($3::text IS NULL OR LOWER(subject) = LOWER($3))
            ORDER BY uploaded_at DESC, id DESC
            "#,
        )
        .bind(pattern)
        .bind(query.room_id)
        .bind(&query.subject)
        .fetch_all(&self.pool)
        .await?;

        Ok(papers)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<RevisionPaper> {
        sqlx::query_as::<_, RevisionPaper>("SELECT * FROM revision_papers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Revision paper with id {} not found", id)))
    }

    async fn create(&self, paper: &NewRevisionPaper) -> AppResult<RevisionPaper> {
        sqlx::query_as::<_, RevisionPaper>(
            r#"
            INSERT INTO revision_papers (title, subject, file, room_id, uploaded_by, uploaded_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&paper.title)
        .bind(&paper.subject)
        .bind(&paper.file)
        .bind(paper.room_id)
        .bind(paper.uploaded_by)
        .bind(paper.uploaded_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM revision_papers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Revision paper with id {} not found", id)));
        }
        Ok(())
    }
}
