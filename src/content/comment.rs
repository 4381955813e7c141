use time::OffsetDateTime;

use super::Authored;
use crate::users::model::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommentId(pub i64);

/// Comment row. `author` is the owning side of `User::comments`.
#[derive(Debug, Clone)]
pub struct Comment {
    pub id: CommentId,
    pub content: String,
    pub published: OffsetDateTime,
    pub author: Option<UserId>,
}

impl Comment {
    pub fn new(id: CommentId, content: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
            published: OffsetDateTime::now_utc(),
            author: None,
        }
    }
}

impl Authored for Comment {
    type Id = CommentId;

    fn id(&self) -> CommentId {
        self.id
    }

    fn author(&self) -> Option<UserId> {
        self.author
    }

    fn set_author(&mut self, author: Option<UserId>) {
        self.author = author;
    }
}
