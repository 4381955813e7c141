use axum::{
    extract::{FromRef, State},
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, RefreshRequest},
        jwt::JwtKeys,
    },
    error::{ApiError, ApiResult},
    state::AppState,
    users::{model::User, services},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

fn issue_tokens(keys: &JwtKeys, user: &User) -> ApiResult<AuthResponse> {
    let access_token = keys.sign_access(user.id(), &user.roles(), user.password_stamp())?;
    let refresh_token = keys.sign_refresh(user.id(), user.password_stamp())?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser::from(user),
    })
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let user = services::authenticate(state.users.as_ref(), &payload.username, &payload.password).await?;
    let response = issue_tokens(&JwtKeys::from_ref(&state), &user)?;
    info!(user_id = %user.id(), "user logged in");
    Ok(Json(response))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(&payload.refresh_token).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        ApiError::Unauthorized(e.to_string())
    })?;

    let user = state
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;

    if user.token_predates_password_change(claims.pwd) {
        warn!(user_id = %user.id(), "refresh token predates password change");
        return Err(ApiError::Unauthorized("Token issued before password change".into()));
    }

    // roles are re-read so a refreshed access token reflects current grants
    Ok(Json(issue_tokens(&keys, &user)?))
}
