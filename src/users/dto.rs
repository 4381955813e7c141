use serde::{Deserialize, Deserializer, Serialize};

use crate::auth::PublicUser;

/// Missing and `null` string fields decode as empty so the blank check
/// reports them per field.
fn blank_if_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Registration payload. `verified_password` is only compared, never stored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUser {
    #[serde(default, deserialize_with = "blank_if_null")]
    pub username: String,
    #[serde(default, deserialize_with = "blank_if_null")]
    pub password: String,
    #[serde(default, deserialize_with = "blank_if_null")]
    pub verified_password: String,
    #[serde(default, deserialize_with = "blank_if_null")]
    pub name: String,
    #[serde(default, deserialize_with = "blank_if_null")]
    pub email: String,
}

/// Profile update payload.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateProfile {
    #[serde(default, deserialize_with = "blank_if_null")]
    pub name: String,
    #[serde(default, deserialize_with = "blank_if_null")]
    pub email: String,
}

/// Password reset payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPassword {
    #[serde(default, deserialize_with = "blank_if_null")]
    pub new_password: String,
    #[serde(default, deserialize_with = "blank_if_null")]
    pub new_verified_password: String,
    #[serde(default, deserialize_with = "blank_if_null")]
    pub old_password: String,
}

/// Returned after a successful password reset; older tokens stop working.
#[derive(Debug, Serialize)]
pub struct ResetPasswordResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: PublicUser,
}
