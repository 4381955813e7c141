pub mod app;
pub mod auth;
pub mod config;
pub mod content;
pub mod error;
pub mod state;
pub mod users;
