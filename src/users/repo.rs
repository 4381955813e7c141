use anyhow::Context;
use async_trait::async_trait;
use sqlx::{types::Json, PgPool};

use super::repo_types::{NewUser, UserRow};
use crate::content::{CommentId, PostId};
use crate::users::model::{User, UserId};

/// Persistence for users. The PostgreSQL store is used at runtime; tests run
/// against the in-memory one.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> anyhow::Result<Option<User>>;
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn insert(&self, new_user: NewUser) -> anyhow::Result<User>;
    /// Writes every stored column of `user` back. Collections are owned by the
    /// comment and post rows and are not touched.
    async fn save(&self, user: &User) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn hydrate(&self, row: Option<UserRow>) -> anyhow::Result<Option<User>> {
        let Some(row) = row else {
            return Ok(None);
        };

        let comments = sqlx::query_scalar::<_, i64>(
            r#"SELECT id FROM comments WHERE author_id = $1 ORDER BY id ASC"#,
        )
        .bind(row.id)
        .fetch_all(&self.db)
        .await
        .context("list comment ids by author")?;

        let posts = sqlx::query_scalar::<_, i64>(
            r#"SELECT id FROM blog_posts WHERE author_id = $1 ORDER BY id ASC"#,
        )
        .bind(row.id)
        .fetch_all(&self.db)
        .await
        .context("list post ids by author")?;

        Ok(Some(row.into_user(
            comments.into_iter().map(CommentId).collect(),
            posts.into_iter().map(PostId).collect(),
        )))
    }
}

const USER_COLUMNS: &str = "id, username, roles, password_hash, name, email, password_change_date";

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: UserId) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        self.hydrate(row).await
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await
        .context("find user by username")?;
        self.hydrate(row).await
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        self.hydrate(row).await
    }

    async fn insert(&self, new_user: NewUser) -> anyhow::Result<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (username, roles, password_hash, name, email)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&new_user.username)
        .bind(Json(&new_user.roles))
        .bind(&new_user.password_hash)
        .bind(&new_user.name)
        .bind(&new_user.email)
        .fetch_one(&self.db)
        .await
        .context("insert user")?;
        // a fresh account has authored nothing yet
        Ok(row.into_user(Vec::new(), Vec::new()))
    }

    async fn save(&self, user: &User) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET username = $2,
                   roles = $3,
                   password_hash = $4,
                   name = $5,
                   email = $6,
                   password_change_date = $7
             WHERE id = $1
            "#,
        )
        .bind(user.id())
        .bind(user.username())
        .bind(Json(user.roles()))
        .bind(user.password_hash())
        .bind(user.name())
        .bind(user.email())
        .bind(user.password_change_date())
        .execute(&self.db)
        .await
        .context("update user")?;
        Ok(())
    }
}

#[cfg(test)]
pub use memory::InMemoryUserStore;
