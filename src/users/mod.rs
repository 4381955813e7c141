use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod model;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod validation;
pub mod view;

pub fn router() -> Router<AppState> {
    handlers::user_routes()
}
