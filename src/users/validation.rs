//! Constraint checks, one entry point per write operation.
//!
//! Each function collects every violation instead of stopping at the first,
//! so a client gets all field errors for a payload in one response.
//! Uniqueness needs the store and is checked in `services`.

use lazy_static::lazy_static;
use regex::Regex;

use crate::auth::password::verify_password;
use crate::error::{ApiResult, ValidationErrors};
use crate::users::dto::{RegisterUser, ResetPassword, UpdateProfile};

pub const NOT_BLANK: &str = "This value should not be blank.";
pub const INVALID_EMAIL: &str = "This value is not a valid email address.";
pub const INVALID_USERNAME: &str =
    "Username must start with a letter and contain only letters, digits, underscores and hyphens.";
pub const WEAK_PASSWORD: &str = "Password must be at least seven characters long and contain at least one digit, one upper case letter and one lower case letter.";
pub const PASSWORDS_MISMATCH: &str = "Passwords do not match.";
pub const WRONG_CURRENT_PASSWORD: &str = "This value should be the user's current password.";

const USERNAME_LEN: (usize, usize) = (3, 180);
const NAME_LEN: (usize, usize) = (5, 255);
const EMAIL_LEN: (usize, usize) = (6, 255);
const PASSWORD_MIN_LEN: usize = 7;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

pub(crate) fn is_strong_password(password: &str) -> bool {
    let mut has_upper = false;
    let mut has_lower = false;
    let mut has_digit = false;
    for c in password.chars() {
        if c.is_uppercase() {
            has_upper = true;
        } else if c.is_lowercase() {
            has_lower = true;
        } else if c.is_ascii_digit() {
            has_digit = true;
        }
    }
    password.chars().count() >= PASSWORD_MIN_LEN && has_upper && has_lower && has_digit
}

/// Records a blank violation and returns false, so callers can skip the
/// remaining checks on that field.
fn not_blank(errors: &mut ValidationErrors, field: &str, value: &str) -> bool {
    if value.trim().is_empty() {
        errors.add(field, NOT_BLANK);
        return false;
    }
    true
}

fn length(errors: &mut ValidationErrors, field: &str, value: &str, (min, max): (usize, usize)) {
    let len = value.chars().count();
    if len < min {
        errors.add(
            field,
            format!("This value is too short. It should have {} characters or more.", min),
        );
    } else if len > max {
        errors.add(
            field,
            format!("This value is too long. It should have {} characters or less.", max),
        );
    }
}

fn check_name(errors: &mut ValidationErrors, name: &str) {
    if not_blank(errors, "name", name) {
        length(errors, "name", name, NAME_LEN);
    }
}

fn check_email(errors: &mut ValidationErrors, email: &str) {
    if not_blank(errors, "email", email) {
        if !is_valid_email(email) {
            errors.add("email", INVALID_EMAIL);
        }
        length(errors, "email", email, EMAIL_LEN);
    }
}

fn check_new_password(
    errors: &mut ValidationErrors,
    (field, password): (&str, &str),
    (confirm_field, confirmation): (&str, &str),
) {
    if not_blank(errors, field, password) && !is_strong_password(password) {
        errors.add(field, WEAK_PASSWORD);
    }
    if not_blank(errors, confirm_field, confirmation) && password != confirmation {
        errors.add(confirm_field, PASSWORDS_MISMATCH);
    }
}

pub fn validate_registration(payload: &RegisterUser) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    if not_blank(&mut errors, "username", &payload.username) {
        if !is_valid_username(&payload.username) {
            errors.add("username", INVALID_USERNAME);
        }
        length(&mut errors, "username", &payload.username, USERNAME_LEN);
    }
    check_new_password(
        &mut errors,
        ("password", &payload.password),
        ("verifiedPassword", &payload.verified_password),
    );
    check_name(&mut errors, &payload.name);
    check_email(&mut errors, &payload.email);

    errors.into_result()
}

pub fn validate_profile_update(payload: &UpdateProfile) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    check_name(&mut errors, &payload.name);
    check_email(&mut errors, &payload.email);
    errors.into_result()
}

/// The current-password check runs regardless of whether the new password
/// is acceptable.
pub fn validate_password_reset(payload: &ResetPassword, stored_hash: &str) -> ApiResult<()> {
    let mut errors = ValidationErrors::default();

    check_new_password(
        &mut errors,
        ("newPassword", &payload.new_password),
        ("newVerifiedPassword", &payload.new_verified_password),
    );
    if !verify_password(&payload.old_password, stored_hash)? {
        errors.add("oldPassword", WRONG_CURRENT_PASSWORD);
    }

    Ok(errors.into_result()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;
    use crate::error::ApiError;

    fn alice() -> RegisterUser {
        RegisterUser {
            username: "alice".into(),
            password: "Secret1".into(),
            verified_password: "Secret1".into(),
            name: "Alice Liddell".into(),
            email: "alice@example.com".into(),
        }
    }

    fn violations(result: ApiResult<()>) -> ValidationErrors {
        match result {
            Err(ApiError::Validation(errors)) => errors,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn registration_accepts_valid_user() {
        assert!(validate_registration(&alice()).is_ok());
    }

    #[test]
    fn registration_rejects_mismatched_confirmation() {
        let mut payload = alice();
        payload.verified_password = "Other1".into();
        let errors = validate_registration(&payload).unwrap_err();
        assert_eq!(errors.violations.len(), 1);
        assert_eq!(errors.violations[0].property_path, "verifiedPassword");
        assert_eq!(errors.violations[0].message, PASSWORDS_MISMATCH);
    }

    #[test]
    fn registration_collects_every_violation() {
        let payload = RegisterUser {
            username: "1abc".into(),
            password: "short".into(),
            verified_password: "short".into(),
            name: "Al".into(),
            email: "not-an-email".into(),
        };
        let errors = validate_registration(&payload).unwrap_err();
        assert!(errors.has("username"));
        assert!(errors.has("password"));
        assert!(errors.has("name"));
        assert!(errors.has("email"));
        assert!(!errors.has("verifiedPassword"));
    }

    #[test]
    fn registration_reports_blank_fields_once() {
        let payload = RegisterUser {
            username: " ".into(),
            password: "".into(),
            verified_password: "".into(),
            name: "".into(),
            email: "".into(),
        };
        let errors = validate_registration(&payload).unwrap_err();
        assert_eq!(errors.violations.len(), 5);
        assert!(errors.has("verifiedPassword"));
        assert!(errors.violations.iter().all(|v| v.message == NOT_BLANK));
    }

    #[test]
    fn username_rules() {
        assert!(is_valid_username("alice"));
        assert!(is_valid_username("a_b-c9"));
        assert!(!is_valid_username("_alice"));
        assert!(!is_valid_username("9lives"));
        assert!(!is_valid_username("ali ce"));

        let mut payload = alice();
        payload.username = "ab".into();
        assert!(validate_registration(&payload).unwrap_err().has("username"));

        payload.username = format!("a{}", "b".repeat(180));
        assert!(validate_registration(&payload).unwrap_err().has("username"));
    }

    #[test]
    fn password_strength() {
        assert!(is_strong_password("Secret1"));
        assert!(!is_strong_password("Secre1"));
        assert!(!is_strong_password("secret1"));
        assert!(!is_strong_password("SECRET1"));
        assert!(!is_strong_password("Secrets"));
    }

    #[test]
    fn email_rules() {
        assert!(is_valid_email("user@example.com"));
        assert!(!is_valid_email("user@example"));
        assert!(!is_valid_email("user example.com"));

        let mut payload = alice();
        payload.email = "a@b.c".into();
        let errors = validate_registration(&payload).unwrap_err();
        assert_eq!(errors.violations.len(), 1);
        assert!(errors.violations[0].message.contains("too short"));
    }

    #[test]
    fn profile_update_checks_name_and_email() {
        let ok = UpdateProfile {
            name: "Alice Liddell".into(),
            email: "alice@example.com".into(),
        };
        assert!(validate_profile_update(&ok).is_ok());

        let bad = UpdateProfile {
            name: "Al".into(),
            email: "nope".into(),
        };
        let errors = validate_profile_update(&bad).unwrap_err();
        assert!(errors.has("name"));
        assert!(errors.has("email"));
    }

    #[test]
    fn reset_accepts_correct_old_password() {
        let hash = hash_password("Secret1").unwrap();
        let payload = ResetPassword {
            new_password: "Better22".into(),
            new_verified_password: "Better22".into(),
            old_password: "Secret1".into(),
        };
        assert!(validate_password_reset(&payload, &hash).is_ok());
    }

    #[test]
    fn reset_rejects_wrong_old_password_even_with_valid_new_one() {
        let hash = hash_password("Secret1").unwrap();
        let payload = ResetPassword {
            new_password: "Better22".into(),
            new_verified_password: "Better22".into(),
            old_password: "Guess123".into(),
        };
        let errors = violations(validate_password_reset(&payload, &hash));
        assert_eq!(errors.violations.len(), 1);
        assert_eq!(errors.violations[0].property_path, "oldPassword");
    }

    #[test]
    fn reset_reports_mismatch_and_wrong_old_password_together() {
        let hash = hash_password("Secret1").unwrap();
        let payload = ResetPassword {
            new_password: "Better22".into(),
            new_verified_password: "Better33".into(),
            old_password: "nope".into(),
        };
        let errors = violations(validate_password_reset(&payload, &hash));
        assert!(errors.has("newVerifiedPassword"));
        assert!(errors.has("oldPassword"));
    }
}
