use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User, UserChanges};
use crate::error::AppResult;

/// Credential store. Implementations must reject duplicate emails and
/// usernames atomically with `AppError::Conflict`.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn insert(&self, user: NewUser) -> AppResult<User>;
    async fn update(&self, id: Uuid, changes: UserChanges) -> AppResult<Option<User>>;
    /// Removes the user and every listing they own. Returns `false` if absent.
    async fn delete(&self, id: Uuid) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, avatar, created_at, updated_at";

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn insert(&self, user: NewUser) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, avatar)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.avatar)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET username      = COALESCE($2, username),
                   email         = COALESCE($3, email),
                   password_hash = COALESCE($4, password_hash),
                   avatar        = COALESCE($5, avatar),
                   updated_at    = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.username)
        .bind(changes.email)
        .bind(changes.password_hash)
        .bind(changes.avatar)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        // listings go with it via ON DELETE CASCADE
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
