//! Records that point back at their author.
//!
//! `Comment` and `BlogPost` own the author relation; a `User` only mirrors it
//! as a list of child ids.

mod comment;
mod post;

pub use comment::{Comment, CommentId};
pub use post::{BlogPost, PostId};

use crate::users::model::UserId;

/// A child record carrying a weak back-reference to its author.
pub trait Authored {
    type Id: Copy + PartialEq;

    fn id(&self) -> Self::Id;
    fn author(&self) -> Option<UserId>;
    fn set_author(&mut self, author: Option<UserId>);
}

/// Record `child` under `owner`, pointing its back-reference at `owner`.
pub(crate) fn attach<T: Authored>(ids: &mut Vec<T::Id>, owner: UserId, child: &mut T) {
    if !ids.contains(&child.id()) {
        ids.push(child.id());
    }
    child.set_author(Some(owner));
}

/// Drop `child` from `owner`'s list. The back-reference is only cleared when
/// it still points at `owner`; a child already moved to someone else keeps
/// its new author.
pub(crate) fn detach<T: Authored>(ids: &mut Vec<T::Id>, owner: UserId, child: &mut T) {
    let id = child.id();
    ids.retain(|existing| *existing != id);
    if child.author() == Some(owner) {
        child.set_author(None);
    }
}
