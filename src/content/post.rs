use time::OffsetDateTime;

use super::Authored;
use crate::users::model::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PostId(pub i64);

/// Blog post row. `author` is the owning side of `User::posts`.
#[derive(Debug, Clone)]
pub struct BlogPost {
    pub id: PostId,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub published: OffsetDateTime,
    pub author: Option<UserId>,
}

impl BlogPost {
    pub fn new(id: PostId, title: impl Into<String>, slug: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            slug: slug.into(),
            content: content.into(),
            published: OffsetDateTime::now_utc(),
            author: None,
        }
    }
}

impl Authored for BlogPost {
    type Id = PostId;

    fn id(&self) -> PostId {
        self.id
    }

    fn author(&self) -> Option<UserId> {
        self.author
    }

    fn set_author(&mut self, author: Option<UserId>) {
        self.author = author;
    }
}
