//! Aggregate queries behind the dashboards and the analysis view

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};

use super::{borrows::BORROW_DETAILS_SELECT, GroupBy, StatsStore, UNASSIGNED_TEACHER};
use crate::{
    error::AppResult,
    models::{
        borrow::BorrowDetails,
        stats::{BookBorrowCount, GroupStat, RoomStat, StudentBorrowCount, Totals},
    },
};

#[derive(Clone)]
pub struct StatsRepository {
    pool: Pool<Postgres>,
}

impl StatsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatsStore for StatsRepository {
    async fn totals(&self, now: DateTime<Utc>) -> AppResult<Totals> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM books) AS total_books,
                (SELECT COUNT(*) FROM students) AS total_students,
                (SELECT COUNT(*) FROM rooms) AS total_rooms,
                (SELECT COUNT(*) FROM shelves) AS total_shelves,
                (SELECT COUNT(*) FROM borrows WHERE NOT returned) AS active_borrows,
                (SELECT COUNT(*) FROM borrows WHERE NOT returned AND due_date < $1) AS overdue_borrows
            "#,
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(Totals {
            total_books: row.get("total_books"),
            total_students: row.get("total_students"),
            total_rooms: row.get("total_rooms"),
            total_shelves: row.get("total_shelves"),
            active_borrows: row.get("active_borrows"),
            overdue_borrows: row.get("overdue_borrows"),
        })
    }

    async fn room_stats(&self, form: Option<String>) -> AppResult<Vec<RoomStat>> {
        let stats = sqlx::query_as::<_, RoomStat>(
            r#"
            SELECT r.id AS room_id, r.form, r.stream, r.class_teacher,
                   COUNT(DISTINCT s.id) AS students,
                   COUNT(br.id) AS active_borrows
            FROM rooms r
            LEFT JOIN students s ON s.room_id = r.id
            LEFT JOIN borrows br ON br.student_id = s.id AND NOT br.returned
            WHERE ($1::text IS NULL OR LOWER(r.form) = LOWER($1))
            GROUP BY r.id, r.form, r.stream, r.class_teacher
            ORDER BY r.form, r.stream
            "#,
        )
        .bind(form)
        .fetch_all(&self.pool)
        .await?;

        Ok(stats)
    }

    async fn group_stats(&self, group_by: GroupBy) -> AppResult<Vec<GroupStat>> {
        let key = match group_by {
            GroupBy::Form => "r.form",
            GroupBy::Stream => "r.stream",
            GroupBy::Teacher => "COALESCE(r.class_teacher, $1)",
        };

        let sql = format!(
            r#"
            SELECT {key} AS label,
                   COUNT(DISTINCT s.id) AS students,
                   COUNT(br.id) AS active_borrows
            FROM rooms r
            LEFT JOIN students s ON s.room_id = r.id
            LEFT JOIN borrows br ON br.student_id = s.id AND NOT br.returned
            GROUP BY 1
            ORDER BY 1
            "#,
            key = key
        );

        let mut query = sqlx::query_as::<_, GroupStat>(&sql);
        if group_by == GroupBy::Teacher {
            query = query.bind(UNASSIGNED_TEACHER);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    async fn most_borrowed_books(&self, limit: i64) -> AppResult<Vec<BookBorrowCount>> {
        let books = sqlx::query_as::<_, BookBorrowCount>(
            r#"
            SELECT b.id AS book_id, b.title, b.book_number, COUNT(br.id) AS borrow_count
            FROM books b
            JOIN borrows br ON br.book_id = b.id
            GROUP BY b.id, b.title, b.book_number
            ORDER BY borrow_count DESC, b.title
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    async fn most_active_students(&self, limit: i64) -> AppResult<Vec<StudentBorrowCount>> {
        let students = sqlx::query_as::<_, StudentBorrowCount>(
            r#"
            SELECT s.id AS student_id, s.first_name, s.last_name, s.admission_number,
                   COUNT(br.id) AS borrow_count
            FROM students s
            JOIN borrows br ON br.student_id = s.id
            GROUP BY s.id, s.first_name, s.last_name, s.admission_number
            HAVING COUNT(br.id) > 0
            ORDER BY borrow_count DESC, s.last_name, s.first_name
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(students)
    }

    async fn due_between(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> AppResult<Vec<BorrowDetails>> {
        let sql = format!(
            "{} WHERE NOT br.returned AND br.due_date BETWEEN $1 AND $2 ORDER BY br.due_date, br.id",
            BORROW_DETAILS_SELECT
        );

        let borrows = sqlx::query_as::<_, BorrowDetails>(&sql)
            .bind(from)
            .bind(until)
            .fetch_all(&self.pool)
            .await?;

        Ok(borrows)
    }

    async fn room_borrow_counts(&self, room_id: i32, now: DateTime<Utc>) -> AppResult<(i64, i64)> {
        let counts = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE br.due_date < $2)
            FROM borrows br
            JOIN students s ON s.id = br.student_id
            WHERE s.room_id = $1 AND NOT br.returned
            "#,
        )
        .bind(room_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(counts)
    }
}
