use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{instrument, warn};

use crate::{
    auth::{AuthUser, JwtKeys, PublicUser},
    error::{ApiError, ApiResult, ValidationErrors},
    state::AppState,
    users::{
        dto::{RegisterUser, ResetPassword, ResetPasswordResponse, UpdateProfile},
        model::{User, UserId},
        services,
        view::{check_writable, project, Operation, Viewer},
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register))
        .route("/users/:id", get(get_user).put(update_user))
        .route("/users/:id/reset-password", put(reset_password))
        .route("/me", get(get_me))
}

/// Checks the body against the operation's writable fields, then decodes it.
/// Missing and null fields decode as blank and are reported by validation;
/// only a malformed body ends up under `body`.
fn parse_payload<T: DeserializeOwned>(op: Operation, body: Value) -> ApiResult<T> {
    check_writable(op, &body)?;
    serde_json::from_value(body).map_err(|e| {
        let mut errors = ValidationErrors::default();
        errors.add("body", e.to_string());
        ApiError::Validation(errors)
    })
}

async fn load_user(state: &AppState, id: UserId) -> ApiResult<User> {
    state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User".into()))
}

/// Loads the user behind an owner-only route. The requester must be that
/// user and must hold a token minted after the last password change.
async fn load_owned(state: &AppState, auth: &AuthUser, id: UserId) -> ApiResult<User> {
    if auth.id != id {
        warn!(requester = %auth.id, target = %id, "write on someone else's account");
        return Err(ApiError::Forbidden);
    }
    let user = load_user(state, id).await?;
    if user.token_predates_password_change(auth.password_stamp) {
        return Err(ApiError::Unauthorized("Token issued before password change".into()));
    }
    Ok(user)
}

#[instrument(skip(state, body))]
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let payload: RegisterUser = parse_payload(Operation::Create, body)?;
    let user = services::register(state.users.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(project(&user, Viewer::Owner))))
}

#[instrument(skip(state, auth))]
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let user = load_user(&state, UserId(id)).await?;
    let viewer = Viewer::resolve(Some((auth.id, auth.roles.as_slice())), &user);
    Ok(Json(project(&user, viewer)))
}

#[instrument(skip(state, auth, body))]
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let user = load_owned(&state, &auth, UserId(id)).await?;
    let payload: UpdateProfile = parse_payload(Operation::Update, body)?;
    let user = services::update_profile(state.users.as_ref(), user, payload).await?;
    let viewer = Viewer::resolve(Some((auth.id, auth.roles.as_slice())), &user);
    Ok(Json(project(&user, viewer)))
}

#[instrument(skip(state, auth, body))]
pub async fn reset_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> ApiResult<Json<ResetPasswordResponse>> {
    let user = load_owned(&state, &auth, UserId(id)).await?;
    let payload: ResetPassword = parse_payload(Operation::ResetPassword, body)?;
    let user = services::reset_password(state.users.as_ref(), user, payload).await?;

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign_access(user.id(), &user.roles(), user.password_stamp())?;
    let refresh_token = keys.sign_refresh(user.id(), user.password_stamp())?;

    Ok(Json(ResetPasswordResponse {
        access_token,
        refresh_token,
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(state, auth))]
pub async fn get_me(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<Value>> {
    let user = load_user(&state, auth.id).await.map_err(|e| match e {
        ApiError::NotFound(_) => ApiError::Unauthorized("User not found".into()),
        other => other,
    })?;
    Ok(Json(project(&user, Viewer::Owner)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::verify_password;
    use crate::users::model::ROLE_ADMIN;
    use crate::users::validation::NOT_BLANK;
    use serde_json::json;

    fn alice_body() -> Value {
        json!({
            "username": "alice",
            "password": "Secret1",
            "verifiedPassword": "Secret1",
            "name": "Alice Liddell",
            "email": "alice@example.com"
        })
    }

    fn auth_for(id: i64, roles: &[&str]) -> AuthUser {
        AuthUser {
            id: UserId(id),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            password_stamp: None,
        }
    }

    async fn registered(state: &AppState, body: Value) -> i64 {
        let (status, Json(json)) = register(State(state.clone()), Json(body)).await.expect("register");
        assert_eq!(status, StatusCode::CREATED);
        json["id"].as_i64().expect("id")
    }

    #[tokio::test]
    async fn register_returns_owner_view_without_password() {
        let state = AppState::fake();
        let (status, Json(json)) = register(State(state), Json(alice_body())).await.unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["username"], "alice");
        assert_eq!(json["email"], "alice@example.com");
        assert!(json.get("password").is_none());
        assert!(json.get("verifiedPassword").is_none());
        assert!(json.get("roles").is_none());
    }

    #[tokio::test]
    async fn register_refuses_roles_in_body() {
        let state = AppState::fake();
        let mut body = alice_body();
        body["roles"] = json!([ROLE_ADMIN]);
        match register(State(state), Json(body)).await {
            Err(ApiError::Validation(errors)) => assert!(errors.has("roles")),
            other => panic!("unexpected {:?}", other.map(|(s, _)| s)),
        }
    }

    fn messages_for(errors: &ValidationErrors, field: &str) -> Vec<String> {
        errors
            .violations
            .iter()
            .filter(|v| v.property_path == field)
            .map(|v| v.message.clone())
            .collect()
    }

    #[tokio::test]
    async fn register_reports_each_missing_field() {
        let state = AppState::fake();
        let body = json!({ "username": "alice" });
        match register(State(state), Json(body)).await {
            Err(ApiError::Validation(errors)) => {
                assert!(!errors.has("body"));
                assert!(!errors.has("username"));
                for field in ["password", "verifiedPassword", "name", "email"] {
                    assert_eq!(messages_for(&errors, field), vec![NOT_BLANK.to_string()], "{}", field);
                }
            }
            other => panic!("unexpected {:?}", other.map(|(s, _)| s)),
        }
    }

    #[tokio::test]
    async fn register_treats_null_as_blank() {
        let state = AppState::fake();
        let mut body = alice_body();
        body["email"] = Value::Null;
        match register(State(state), Json(body)).await {
            Err(ApiError::Validation(errors)) => {
                assert_eq!(messages_for(&errors, "email"), vec![NOT_BLANK.to_string()]);
                assert_eq!(errors.violations.len(), 1);
            }
            other => panic!("unexpected {:?}", other.map(|(s, _)| s)),
        }
    }

    #[tokio::test]
    async fn register_reports_wrong_json_type_under_body() {
        let state = AppState::fake();
        let mut body = alice_body();
        body["name"] = json!(42);
        match register(State(state), Json(body)).await {
            Err(ApiError::Validation(errors)) => assert!(errors.has("body")),
            other => panic!("unexpected {:?}", other.map(|(s, _)| s)),
        }
    }

    #[tokio::test]
    async fn update_and_reset_report_missing_fields() {
        let state = AppState::fake();
        let id = registered(&state, alice_body()).await;

        match update_user(State(state.clone()), auth_for(id, &[]), Path(id), Json(json!({}))).await {
            Err(ApiError::Validation(errors)) => {
                assert_eq!(messages_for(&errors, "name"), vec![NOT_BLANK.to_string()]);
                assert_eq!(messages_for(&errors, "email"), vec![NOT_BLANK.to_string()]);
            }
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }

        let body = json!({ "oldPassword": "Secret1", "newVerifiedPassword": null });
        match reset_password(State(state), auth_for(id, &[]), Path(id), Json(body)).await {
            Err(ApiError::Validation(errors)) => {
                assert_eq!(messages_for(&errors, "newPassword"), vec![NOT_BLANK.to_string()]);
                assert_eq!(messages_for(&errors, "newVerifiedPassword"), vec![NOT_BLANK.to_string()]);
                assert!(!errors.has("oldPassword"));
            }
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn read_projection_depends_on_viewer() {
        let state = AppState::fake();
        let id = registered(&state, alice_body()).await;

        let Json(stranger) = get_user(State(state.clone()), auth_for(id + 100, &[]), Path(id))
            .await
            .unwrap();
        assert!(stranger.get("email").is_none());

        let Json(owner) = get_user(State(state.clone()), auth_for(id, &[]), Path(id)).await.unwrap();
        assert_eq!(owner["email"], "alice@example.com");
        assert!(owner.get("roles").is_none());

        let Json(admin) = get_user(State(state.clone()), auth_for(id + 100, &[ROLE_ADMIN]), Path(id))
            .await
            .unwrap();
        assert!(admin.get("roles").is_some());

        assert!(matches!(
            get_user(State(state), auth_for(id, &[]), Path(id + 1)).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn only_the_owner_may_update() {
        let state = AppState::fake();
        let id = registered(&state, alice_body()).await;
        let body = json!({ "name": "Alice Pleasance", "email": "alice@wonderland.org" });

        assert!(matches!(
            update_user(State(state.clone()), auth_for(id + 1, &[ROLE_ADMIN]), Path(id), Json(body.clone())).await,
            Err(ApiError::Forbidden)
        ));

        let Json(json) = update_user(State(state), auth_for(id, &[]), Path(id), Json(body))
            .await
            .unwrap();
        assert_eq!(json["name"], "Alice Pleasance");
        assert_eq!(json["email"], "alice@wonderland.org");
    }

    #[tokio::test]
    async fn update_rejects_password_field() {
        let state = AppState::fake();
        let id = registered(&state, alice_body()).await;
        let body = json!({ "name": "Alice Pleasance", "email": "alice@example.com", "password": "Hacked1" });

        match update_user(State(state), auth_for(id, &[]), Path(id), Json(body)).await {
            Err(ApiError::Validation(errors)) => assert!(errors.has("password")),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn reset_password_issues_fresh_tokens_and_invalidates_old_ones() {
        let state = AppState::fake();
        let id = registered(&state, alice_body()).await;
        let stale = auth_for(id, &[]);

        let body = json!({
            "newPassword": "Better22",
            "newVerifiedPassword": "Better22",
            "oldPassword": "Secret1"
        });
        let Json(resp) = reset_password(State(state.clone()), stale.clone(), Path(id), Json(body))
            .await
            .expect("reset");
        assert_eq!(resp.user.id, UserId(id));

        let keys = JwtKeys::from_ref(&state);
        let claims = keys.verify(&resp.access_token).unwrap();
        assert_eq!(claims.sub, UserId(id));

        let stored = state.users.find_by_id(UserId(id)).await.unwrap().unwrap();
        assert!(verify_password("Better22", stored.password_hash()).unwrap());
        assert_eq!(claims.pwd, stored.password_stamp());

        let again = json!({ "name": "Alice Pleasance", "email": "alice@example.com" });
        assert!(matches!(
            update_user(State(state.clone()), stale, Path(id), Json(again.clone())).await,
            Err(ApiError::Unauthorized(_))
        ));

        let fresh = AuthUser {
            password_stamp: claims.pwd,
            ..auth_for(id, &[])
        };
        assert!(update_user(State(state), fresh, Path(id), Json(again)).await.is_ok());
    }

    #[tokio::test]
    async fn reset_password_with_wrong_old_password_fails() {
        let state = AppState::fake();
        let id = registered(&state, alice_body()).await;
        let body = json!({
            "newPassword": "Better22",
            "newVerifiedPassword": "Better22",
            "oldPassword": "Wrong999"
        });
        match reset_password(State(state), auth_for(id, &[]), Path(id), Json(body)).await {
            Err(ApiError::Validation(errors)) => assert!(errors.has("oldPassword")),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn me_returns_owner_view() {
        let state = AppState::fake();
        let id = registered(&state, alice_body()).await;
        let Json(json) = get_me(State(state.clone()), auth_for(id, &[])).await.unwrap();
        assert_eq!(json["email"], "alice@example.com");

        assert!(matches!(
            get_me(State(state), auth_for(id + 5, &[])).await,
            Err(ApiError::Unauthorized(_))
        ));
    }
}
