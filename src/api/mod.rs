use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use crate::state::AppState;

pub mod auth;
pub mod authentication;
pub mod users;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/authentication", post(authentication::login))
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route(
            "/api/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route(
            "/api/users/{id}/change-password",
            post(users::change_password),
        )
        .with_state(state)
}
