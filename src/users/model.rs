use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::content::{self, BlogPost, Comment, CommentId, PostId};

pub const ROLE_COMMENTATOR: &str = "ROLE_COMMENTATOR";
pub const ROLE_WRITER: &str = "ROLE_WRITER";
pub const ROLE_EDITOR: &str = "ROLE_EDITOR";
pub const ROLE_ADMIN: &str = "ROLE_ADMIN";
pub const ROLE_SUPERADMIN: &str = "ROLE_SUPERADMIN";

/// Roles every freshly registered account starts with.
pub const DEFAULT_ROLES: &[&str] = &[ROLE_COMMENTATOR];

/// Roles that see every field of every account.
pub const ADMIN_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_SUPERADMIN];

/// True when `roles` grants administrative access. Works on stored roles as
/// well as the role list carried by an access token.
pub fn is_admin(roles: &[String]) -> bool {
    roles.iter().any(|r| ADMIN_ROLES.contains(&r.as_str()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Persisted user account.
///
/// Only stored state lives here. Confirmation and reset passwords arrive on
/// their own payload types and never reach this struct.
#[derive(Debug, Clone)]
pub struct User {
    id: UserId,
    username: String,
    roles: Vec<String>,
    password_hash: String,
    name: String,
    email: String,
    password_change_date: Option<OffsetDateTime>,
    comments: Vec<CommentId>,
    posts: Vec<PostId>,
}

impl User {
    pub fn new(
        id: UserId,
        username: impl Into<String>,
        password_hash: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id,
            username: username.into(),
            roles: DEFAULT_ROLES.iter().map(|r| r.to_string()).collect(),
            password_hash: password_hash.into(),
            name: name.into(),
            email: email.into(),
            password_change_date: None,
            comments: Vec::new(),
            posts: Vec::new(),
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        self.username = username.into();
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn set_password_hash(&mut self, hash: impl Into<String>) {
        self.password_hash = hash.into();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.email = email.into();
    }

    /// Roles with duplicates removed, first occurrence wins.
    pub fn roles(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(self.roles.len());
        for role in &self.roles {
            if !out.contains(role) {
                out.push(role.clone());
            }
        }
        out
    }

    /// Replaces the stored roles as given.
    pub fn set_roles(&mut self, roles: Vec<String>) {
        self.roles = roles;
    }

    pub fn add_role(&mut self, role: impl Into<String>) {
        let role = role.into();
        if !self.roles.contains(&role) {
            self.roles.push(role);
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn password_change_date(&self) -> Option<OffsetDateTime> {
        self.password_change_date
    }

    pub fn set_password_change_date(&mut self, at: Option<OffsetDateTime>) {
        self.password_change_date = at;
    }

    /// Millisecond unix time of the last password change. Tokens carry the
    /// stamp they were minted with, so staleness does not depend on `iat`,
    /// which only has whole-second resolution.
    pub fn password_stamp(&self) -> Option<i64> {
        self.password_change_date
            .map(|changed| (changed.unix_timestamp_nanos() / 1_000_000) as i64)
    }

    /// True when a token minted with `stamp` predates the last password change.
    pub fn token_predates_password_change(&self, stamp: Option<i64>) -> bool {
        match self.password_stamp() {
            Some(current) => stamp != Some(current),
            None => false,
        }
    }

    pub fn comments(&self) -> &[CommentId] {
        &self.comments
    }

    pub fn posts(&self) -> &[PostId] {
        &self.posts
    }

    pub fn add_comment(&mut self, comment: &mut Comment) {
        content::attach(&mut self.comments, self.id, comment);
    }

    pub fn remove_comment(&mut self, comment: &mut Comment) {
        content::detach(&mut self.comments, self.id, comment);
    }

    pub fn add_post(&mut self, post: &mut BlogPost) {
        content::attach(&mut self.posts, self.id, post);
    }

    pub fn remove_post(&mut self, post: &mut BlogPost) {
        content::detach(&mut self.posts, self.id, post);
    }

    /// Rebuilds a user from stored columns plus the ids of its authored rows.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        id: UserId,
        username: String,
        roles: Vec<String>,
        password_hash: String,
        name: String,
        email: String,
        password_change_date: Option<OffsetDateTime>,
        comments: Vec<CommentId>,
        posts: Vec<PostId>,
    ) -> Self {
        Self {
            id,
            username,
            roles,
            password_hash,
            name,
            email,
            password_change_date,
            comments,
            posts,
        }
    }
}
