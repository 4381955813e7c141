use time::OffsetDateTime;
use tracing::{info, warn};

use crate::auth::password::{hash_password, verify_password};
use crate::error::{ApiError, ApiResult, ValidationErrors};
use crate::users::{
    dto::{RegisterUser, ResetPassword, UpdateProfile},
    model::{User, DEFAULT_ROLES},
    repo::UserStore,
    repo_types::NewUser,
    validation::{validate_password_reset, validate_profile_update, validate_registration},
};

pub const USERNAME_TAKEN: &str = "This username is already used.";
pub const EMAIL_TAKEN: &str = "This email is already used.";

/// Maps a unique-index violation raised by the database into the field error
/// the pre-check would have produced. Covers the race between check and write.
fn unique_violation(err: &anyhow::Error) -> Option<ValidationErrors> {
    let db_err = err.downcast_ref::<sqlx::Error>()?.as_database_error()?;
    if !db_err.is_unique_violation() {
        return None;
    }
    let mut errors = ValidationErrors::default();
    match db_err.constraint() {
        Some(c) if c.contains("username") => errors.add("username", USERNAME_TAKEN),
        Some(c) if c.contains("email") => errors.add("email", EMAIL_TAKEN),
        _ => return None,
    }
    Some(errors)
}

fn storage_error(err: anyhow::Error) -> ApiError {
    match unique_violation(&err) {
        Some(errors) => ApiError::Validation(errors),
        None => ApiError::Internal(err),
    }
}

pub async fn register(store: &dyn UserStore, mut payload: RegisterUser) -> ApiResult<User> {
    payload.email = payload.email.trim().to_lowercase();
    payload.username = payload.username.trim().to_string();

    let mut errors = match validate_registration(&payload) {
        Ok(()) => ValidationErrors::default(),
        Err(errors) => errors,
    };
    if store.find_by_username(&payload.username).await?.is_some() {
        errors.add("username", USERNAME_TAKEN);
    }
    if store.find_by_email(&payload.email).await?.is_some() {
        errors.add("email", EMAIL_TAKEN);
    }
    if !errors.is_empty() {
        warn!(username = %payload.username, "registration rejected");
        return Err(errors.into());
    }

    let password_hash = hash_password(&payload.password)?;
    let user = store
        .insert(NewUser {
            username: payload.username,
            password_hash,
            name: payload.name,
            email: payload.email,
            roles: DEFAULT_ROLES.iter().map(|r| r.to_string()).collect(),
        })
        .await
        .map_err(storage_error)?;

    info!(user_id = %user.id(), username = %user.username(), "user registered");
    Ok(user)
}

pub async fn update_profile(
    store: &dyn UserStore,
    mut user: User,
    mut payload: UpdateProfile,
) -> ApiResult<User> {
    payload.email = payload.email.trim().to_lowercase();

    let mut errors = match validate_profile_update(&payload) {
        Ok(()) => ValidationErrors::default(),
        Err(errors) => errors,
    };
    if let Some(other) = store.find_by_email(&payload.email).await? {
        if other.id() != user.id() {
            errors.add("email", EMAIL_TAKEN);
        }
    }
    errors.into_result()?;

    user.set_name(payload.name);
    user.set_email(payload.email);
    store.save(&user).await.map_err(storage_error)?;

    info!(user_id = %user.id(), "profile updated");
    Ok(user)
}

pub async fn reset_password(
    store: &dyn UserStore,
    mut user: User,
    payload: ResetPassword,
) -> ApiResult<User> {
    if let Err(e) = validate_password_reset(&payload, user.password_hash()) {
        warn!(user_id = %user.id(), "password reset rejected");
        return Err(e);
    }

    user.set_password_hash(hash_password(&payload.new_password)?);
    user.set_password_change_date(Some(OffsetDateTime::now_utc()));
    store.save(&user).await?;

    info!(user_id = %user.id(), "password reset");
    Ok(user)
}

/// Login by username. Unknown user and wrong password look the same to the caller.
pub async fn authenticate(store: &dyn UserStore, username: &str, password: &str) -> ApiResult<User> {
    let invalid = || ApiError::Unauthorized("Invalid credentials".into());

    let Some(user) = store.find_by_username(username.trim()).await? else {
        warn!(username = %username, "login unknown username");
        return Err(invalid());
    };
    if !verify_password(password, user.password_hash())? {
        warn!(user_id = %user.id(), "login invalid password");
        return Err(invalid());
    }
    Ok(user)
}
