use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub confirmed: bool,
    pub avatar: Option<String>,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub created_at: OffsetDateTime,
}

impl User {
    /// Find a user by email. Exact match, no normalization beyond what the
    /// caller already applied.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, confirmed, avatar, refresh_token, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new user with hashed password and an optional bootstrap
    /// avatar URL.
    pub async fn create(
        db: &PgPool,
        username: &str,
        email: &str,
        password_hash: &str,
        avatar: Option<&str>,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, avatar)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, email, password_hash, confirmed, avatar, refresh_token, created_at
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(avatar)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Persist the single active refresh token, or clear it with `None`.
    pub async fn update_refresh_token(
        db: &PgPool,
        user_id: Uuid,
        token: Option<&str>,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET refresh_token = $1 WHERE id = $2")
            .bind(token)
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Flip the confirmed flag. A second call is a no-op.
    pub async fn confirm_email(db: &PgPool, email: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET confirmed = TRUE WHERE email = $1")
            .bind(email)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Overwrite the stored avatar URL and return the updated row.
    pub async fn update_avatar(db: &PgPool, email: &str, url: &str) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET avatar = $1 WHERE email = $2
            RETURNING id, username, email, password_hash, confirmed, avatar, refresh_token, created_at
            "#,
        )
        .bind(url)
        .bind(email)
        .fetch_one(db)
        .await?;
        Ok(user)
    }
}
