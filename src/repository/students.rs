//! Students repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::{like_pattern, map_db_error, map_delete_error, search_term, StudentStore};
use crate::{
    error::{AppError, AppResult},
    models::student::{Student, StudentQuery, StudentRecord},
};

#[derive(Clone)]
pub struct StudentsRepository {
    pool: Pool<Postgres>,
}

impl StudentsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StudentStore for StudentsRepository {
    /// List students ordered by room then admission number
    async fn list(&self, query: &StudentQuery) -> AppResult<Vec<Student>> {
        let pattern = search_term(&query.search).map(|s| like_pattern(&s));

        let students = sqlx::query_as::<_, Student>(
            r#"
            SELECT * FROM students
            WHERE ($1::text IS NULL
                   OR LOWER(first_name) LIKE $1
                   OR LOWER(last_name) LIKE $1
                   OR LOWER(admission_number) LIKE $1
                   OR LOWER(COALESCE(student_id, '')) LIKE $1)
              AND ($2::int IS NULL OR room_id = $2)
            ORDER BY room_id NULLS LAST, admission_number
            "#,
        )
        .bind(pattern)
        .bind(query.room_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(students)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Student> {
        sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Student with id {} not found", id)))
    }

    async fn get_by_admission_number(&self, admission_number: &str) -> AppResult<Option<Student>> {
        let student = sqlx::query_as::<_, Student>(
            "SELECT * FROM students WHERE admission_number = $1",
        )
        .bind(admission_number.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(student)
    }

    async fn create(&self, student: &StudentRecord) -> AppResult<Student> {
        sqlx::query_as::<_, Student>(
            r#"
            INSERT INTO students (
                first_name, last_name, admission_number, student_id,
                year_of_study, current_class, picture, room_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            RETURNING *
            "#,
        )
        .bind(&student.first_name)
        .bind(&student.last_name)
        .bind(&student.admission_number)
        .bind(&student.student_id)
        .bind(student.year_of_study)
        .bind(&student.current_class)
        .bind(&student.picture)
        .bind(student.room_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    /// `student_id` is only written while still unset
    async fn update(&self, id: i32, student: &StudentRecord) -> AppResult<Student> {
        sqlx::query_as::<_, Student>(
            r#"
            UPDATE students SET
                first_name = $1, last_name = $2, admission_number = $3,
                student_id = COALESCE(student_id, $4),
                year_of_study = $5, current_class = $6, picture = $7, room_id = $8
            WHERE id = $9
            RETURNING *
            "#,
        )
        .bind(&student.first_name)
        .bind(&student.last_name)
        .bind(&student.admission_number)
        .bind(&student.student_id)
        .bind(student.year_of_study)
        .bind(&student.current_class)
        .bind(&student.picture)
        .bind(student.room_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| AppError::NotFound(format!("Student with id {} not found", id)))
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_delete_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Student with id {} not found", id)));
        }
        Ok(())
    }
}
