//! Repository for the `users` table.

use clipstream_core::types::DbId;
use sqlx::PgPool;

use crate::models::user::{CreateUser, User};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, username, email, full_name, avatar_url, password_hash, \
                        refresh_token_hash, created_at, updated_at";

/// Provides identity-record operations for users.
pub struct UserRepo;

impl UserRepo {
    /// Insert a new user, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (username, email, full_name, avatar_url, password_hash)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.username)
            .bind(&input.email)
            .bind(&input.full_name)
            .bind(&input.avatar_url)
            .bind(&input.password_hash)
            .fetch_one(pool)
            .await
    }

    /// Find a user by internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a user whose username or email equals `identifier`.
    ///
    /// Stored values are normalized, so `identifier` must be normalized too.
    pub async fn find_by_username_or_email(
        pool: &PgPool,
        identifier: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE username = $1 OR email = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(identifier)
            .fetch_optional(pool)
            .await
    }

    /// Update a user's password hash. Returns `true` if the row was updated.
    pub async fn update_password(
        pool: &PgPool,
        id: DbId,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(password_hash)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Overwrite the refresh-token hash unconditionally (used at login).
    pub async fn set_refresh_hash(
        pool: &PgPool,
        id: DbId,
        hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(hash)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Compare-and-set the refresh-token hash.
    ///
    /// The write only lands if the stored value still equals `expected`
    /// (`IS NOT DISTINCT FROM` so a `NULL` expectation matches a `NULL` column).
    /// Returns `true` if this call won the swap.
    pub async fn swap_refresh_hash(
        pool: &PgPool,
        id: DbId,
        expected: Option<&str>,
        new_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token_hash = $3, updated_at = NOW()
             WHERE id = $1 AND refresh_token_hash IS NOT DISTINCT FROM $2",
        )
        .bind(id)
        .bind(expected)
        .bind(new_hash)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Clear the refresh-token hash. Clearing an already-empty slot is a no-op.
    pub async fn clear_refresh_hash(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET refresh_token_hash = NULL, updated_at = NOW()
             WHERE id = $1 AND refresh_token_hash IS NOT NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
