use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;

use crate::content::{CommentId, PostId};
use crate::users::model::{User, UserId};

/// Row of the `users` table.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: UserId,
    pub username: String,
    pub roles: Json<Vec<String>>,
    pub password_hash: String,
    pub name: String,
    pub email: String,
    pub password_change_date: Option<OffsetDateTime>,
}

impl UserRow {
    pub fn into_user(self, comments: Vec<CommentId>, posts: Vec<PostId>) -> User {
        User::from_parts(
            self.id,
            self.username,
            self.roles.0,
            self.password_hash,
            self.name,
            self.email,
            self.password_change_date,
            comments,
            posts,
        )
    }
}

/// Columns for a registration insert. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub name: String,
    pub email: String,
    pub roles: Vec<String>,
}
