use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use userapi_core::error::{AppError, Result};
use userapi_core::user::{User, UserInput, UserRepository};

type UserRow = (
    i64,
    String,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
);

const USER_COLUMNS: &str = "id, name, email, created_at, updated_at, deleted_at";

fn into_user(row: UserRow) -> User {
    let (id, name, email, created_at, updated_at, deleted_at) = row;
    User {
        id,
        name,
        email,
        created_at,
        updated_at,
        deleted_at,
    }
}

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("user {} not found", id))
}

/// Map unique violations on the email index to `Conflict`.
fn write_error(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict("email already exists".to_string())
        }
        _ => AppError::Database(e.to_string()),
    }
}

/// Postgres-backed user storage. Deletes are soft: they set `deleted_at`.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, input: &UserInput) -> Result<User> {
        let row: UserRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO users (name, email, created_at, updated_at)
            VALUES ($1, $2, NOW(), NOW())
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&input.name)
        .bind(&input.email)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(into_user(row))
    }

    async fn find_by_id(&self, id: i64) -> Result<User> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE id = $1 AND deleted_at IS NULL",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(into_user).ok_or_else(|| not_found(id))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE email = $1 AND deleted_at IS NULL",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(row.map(into_user))
    }

    async fn save(&self, id: i64, input: &UserInput) -> Result<User> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            r#"
            UPDATE users
            SET name = $2, email = $3, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(&input.name)
        .bind(&input.email)
        .fetch_optional(&self.pool)
        .await
        .map_err(write_error)?;

        row.map(into_user).ok_or_else(|| not_found(id))
    }

    async fn soft_delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }
}

impl UserRepository for PgUserRepository {
    fn create<'a>(
        &'a self,
        input: &'a UserInput,
    ) -> Pin<Box<dyn Future<Output = Result<User>> + Send + 'a>> {
        Box::pin(self.insert(input))
    }

    fn get_by_id(&self, id: i64) -> Pin<Box<dyn Future<Output = Result<User>> + Send + '_>> {
        Box::pin(self.find_by_id(id))
    }

    fn get_by_email<'a>(
        &'a self,
        email: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<User>>> + Send + 'a>> {
        Box::pin(self.find_by_email(email))
    }

    fn update<'a>(
        &'a self,
        id: i64,
        input: &'a UserInput,
    ) -> Pin<Box<dyn Future<Output = Result<User>> + Send + 'a>> {
        Box::pin(self.save(id, input))
    }

    fn delete(&self, id: i64) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(self.soft_delete(id))
    }
}
