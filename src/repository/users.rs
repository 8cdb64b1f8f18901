//! Users repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::{like_pattern, map_db_error, map_delete_error, search_term, UserStore};
use crate::{
    error::{AppError, AppResult},
    models::user::{NewUser, ProfileChanges, Role, User, UserQuery},
};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn not_found(id: i32) -> AppError {
    AppError::NotFound(format!("User with id {} not found", id))
}

#[async_trait]
impl UserStore for UsersRepository {
    async fn list(&self, query: &UserQuery) -> AppResult<Vec<User>> {
        let pattern = search_term(&query.search).map(|s| like_pattern(&s));

        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE ($1::text IS NULL
                   OR LOWER(username) LIKE $1
                   OR LOWER(first_name) LIKE $1
                   OR LOWER(last_name) LIKE $1
                   OR LOWER(COALESCE(email, '')) LIKE $1
                   OR LOWER(COALESCE(admission_number, '')) LIKE $1
                   OR LOWER(COALESCE(phone, '')) LIKE $1)
              AND ($2::text IS NULL OR role = $2)
            ORDER BY last_name, first_name, username
            "#,
        )
        .bind(pattern)
        .bind(query.role.map(|r| r.as_str()))
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found(id))
    }

    async fn find_by_login(&self, identifier: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE LOWER(username) = LOWER($1)
               OR LOWER(email) = LOWER($1)
               OR phone = $1
            ORDER BY (LOWER(username) = LOWER($1)) DESC, id
            LIMIT 1
            "#,
        )
        .bind(identifier.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_student(&self, admission_number: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE role = 'student' AND admission_number = $1
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(admission_number.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn create(&self, user: &NewUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (
                username, email, password, first_name, last_name,
                role, admission_number, phone, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            RETURNING *
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role)
        .bind(&user.admission_number)
        .bind(&user.phone)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn update_profile(&self, id: i32, changes: &ProfileChanges) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                first_name = COALESCE($1, first_name),
                last_name = COALESCE($2, last_name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                password = COALESCE($5, password)
            WHERE id = $6
            RETURNING *
            "#,
        )
        .bind(&changes.first_name)
        .bind(&changes.last_name)
        .bind(&changes.email)
        .bind(&changes.phone)
        .bind(&changes.password)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| not_found(id))
    }

    async fn set_role(&self, id: i32, role: Role) -> AppResult<User> {
        sqlx::query_as::<_, User>("UPDATE users SET role = $1 WHERE id = $2 RETURNING *")
            .bind(role)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?
            .ok_or_else(|| not_found(id))
    }

    async fn set_password(&self, id: i32, password_hash: &str) -> AppResult<()> {
        let result = sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    /// `processed_by` and `uploaded_by` references are nulled by their foreign keys
    async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_delete_error)?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }
}
