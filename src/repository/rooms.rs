//! Rooms repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::{like_pattern, map_db_error, map_delete_error, search_term, RoomStore};
use crate::{
    error::{AppError, AppResult},
    models::room::{Room, RoomQuery, RoomRecord},
};

#[derive(Clone)]
pub struct RoomsRepository {
    pool: Pool<Postgres>,
}

impl RoomsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomStore for RoomsRepository {
    /// List rooms ordered by form then stream
    async fn list(&self, query: &RoomQuery) -> AppResult<Vec<Room>> {
        let pattern = search_term(&query.search).map(|s| like_pattern(&s));

        let rooms = sqlx::query_as::<_, Room>(
            r#"
            SELECT * FROM rooms
            WHERE ($1::text IS NULL
                   OR LOWER(form) LIKE $1
                   OR LOWER(stream) LIKE $1
                   OR LOWER(COALESCE(class_teacher, '')) LIKE $1)
              AND ($2::text IS NULL OR LOWER(form) = LOWER($2))
            ORDER BY form, stream
            "#,
        )
        .bind(pattern)
        .bind(&query.form)
        .fetch_all(&self.pool)
        .await?;

        Ok(rooms)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Room> {
        sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Room with id {} not found", id)))
    }

    async fn create(&self, room: &RoomRecord) -> AppResult<Room> {
        sqlx::query_as::<_, Room>(
            r#"
            INSERT INTO rooms (form, stream, class_teacher, total_students)
            VALUES ($1, $2, $3, 0)
            RETURNING *
            "#,
        )
        .bind(&room.form)
        .bind(&room.stream)
        .bind(&room.class_teacher)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn update(&self, id: i32, room: &RoomRecord) -> AppResult<Room> {
        sqlx::query_as::<_, Room>(
            r#"
            UPDATE rooms SET form = $1, stream = $2, class_teacher = $3
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(&room.form)
        .bind(&room.stream)
        .bind(&room.class_teacher)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| AppError::NotFound(format!("Room with id {} not found", id)))
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let students: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM students WHERE room_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        if students > 0 {
            return Err(AppError::ProtectedDelete(format!(
                "Room {} still has {} student(s) assigned",
                id, students
            )));
        }

        let result = sqlx::query("DELETE FROM rooms WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_delete_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Room with id {} not found", id)));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn recount_students(&self, id: i32) -> AppResult<i32> {
        sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE rooms
            SET total_students = (SELECT COUNT(*) FROM students WHERE room_id = $1)::int
            WHERE id = $1
            RETURNING total_students
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Room with id {} not found", id)))
    }
}
