//! Which user fields each operation accepts and each viewer may read.

use serde_json::{Map, Value};

use crate::error::ValidationErrors;
use crate::users::model::{is_admin, User, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    ResetPassword,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Anonymous,
    Authenticated,
    Owner,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Id,
    Username,
    Roles,
    Password,
    VerifiedPassword,
    NewPassword,
    NewVerifiedPassword,
    OldPassword,
    Name,
    Email,
    Comments,
    Posts,
}

impl Field {
    pub fn key(self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Username => "username",
            Field::Roles => "roles",
            Field::Password => "password",
            Field::VerifiedPassword => "verifiedPassword",
            Field::NewPassword => "newPassword",
            Field::NewVerifiedPassword => "newVerifiedPassword",
            Field::OldPassword => "oldPassword",
            Field::Name => "name",
            Field::Email => "email",
            Field::Comments => "comments",
            Field::Posts => "posts",
        }
    }
}

const PUBLIC_READ: &[Field] = &[Field::Id, Field::Username, Field::Name, Field::Comments, Field::Posts];
const OWNER_READ: &[Field] = &[
    Field::Id,
    Field::Username,
    Field::Name,
    Field::Email,
    Field::Comments,
    Field::Posts,
];
const ADMIN_READ: &[Field] = &[
    Field::Id,
    Field::Username,
    Field::Name,
    Field::Email,
    Field::Roles,
    Field::Comments,
    Field::Posts,
];

const CREATE_WRITE: &[Field] = &[
    Field::Username,
    Field::Password,
    Field::VerifiedPassword,
    Field::Name,
    Field::Email,
];
const UPDATE_WRITE: &[Field] = &[Field::Name, Field::Email];
const RESET_WRITE: &[Field] = &[Field::NewPassword, Field::NewVerifiedPassword, Field::OldPassword];

impl Viewer {
    /// How `requester` sees `subject`. `None` means no authenticated identity.
    pub fn resolve(requester: Option<(UserId, &[String])>, subject: &User) -> Self {
        match requester {
            None => Viewer::Anonymous,
            Some((_, roles)) if is_admin(roles) => Viewer::Admin,
            Some((id, _)) if id == subject.id() => Viewer::Owner,
            Some(_) => Viewer::Authenticated,
        }
    }
}

pub fn readable_fields(viewer: Viewer) -> &'static [Field] {
    match viewer {
        Viewer::Anonymous | Viewer::Authenticated => PUBLIC_READ,
        Viewer::Owner => OWNER_READ,
        Viewer::Admin => ADMIN_READ,
    }
}

pub fn writable_fields(op: Operation) -> &'static [Field] {
    match op {
        Operation::Create => CREATE_WRITE,
        Operation::Read => &[],
        Operation::Update => UPDATE_WRITE,
        Operation::ResetPassword => RESET_WRITE,
    }
}

/// Rejects body keys the operation does not accept, e.g. `roles` on
/// registration or `password` on a profile update.
pub fn check_writable(op: Operation, body: &Value) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if let Value::Object(map) = body {
        let allowed = writable_fields(op);
        for key in map.keys() {
            if !allowed.iter().any(|f| f.key() == key) {
                errors.add(key, "This field was not expected.");
            }
        }
    }
    errors.into_result()
}

/// Serializes the fields of `user` that `viewer` may read.
pub fn project(user: &User, viewer: Viewer) -> Value {
    let mut out = Map::new();
    for field in readable_fields(viewer) {
        let value = match field {
            Field::Id => Value::from(user.id().0),
            Field::Username => Value::from(user.username()),
            Field::Name => Value::from(user.name()),
            Field::Email => Value::from(user.email()),
            Field::Roles => Value::from(user.roles()),
            Field::Comments => Value::from(user.comments().iter().map(|c| c.0).collect::<Vec<_>>()),
            Field::Posts => Value::from(user.posts().iter().map(|p| p.0).collect::<Vec<_>>()),
            // not present in any read table
            Field::Password
            | Field::VerifiedPassword
            | Field::NewPassword
            | Field::NewVerifiedPassword
            | Field::OldPassword => continue,
        };
        out.insert(field.key().to_string(), value);
    }
    Value::Object(out)
}
