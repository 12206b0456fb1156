use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;

use crate::api::auth::Authenticated;
use crate::auth::service::PasswordVerifier;
use crate::error::AppError;
use crate::state::AppState;
use crate::users::store::{UpdateOutcome, UserSummary};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub password_old: String,
    pub password_new: String,
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    _auth: Authenticated,
) -> Json<Vec<UserSummary>> {
    let users = state.users.read().await;
    Json(users.list().iter().map(UserSummary::from).collect())
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Authenticated(claims): Authenticated,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserSummary>), AppError> {
    if req.password.is_empty() {
        return Err(AppError::BadRequest("Password must not be empty".to_string()));
    }

    let password_hash = state.passwords.hash(&req.password).await?;
    let created = state
        .users
        .write()
        .await
        .add(req.name, req.email, password_hash)?;

    match created {
        Some(user) => {
            tracing::info!("{} created user {}", claims.sub, user.id);
            Ok((StatusCode::CREATED, Json(UserSummary::from(&user))))
        }
        None => Err(AppError::BadRequest("Email already taken".to_string())),
    }
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    _auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<UserSummary>, AppError> {
    let users = state.users.read().await;
    let user = users.get(&id).ok_or(AppError::NotFound("Unknown user"))?;
    Ok(Json(UserSummary::from(user)))
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Authenticated(claims): Authenticated,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserSummary>, AppError> {
    let outcome = state.users.write().await.update(&id, req.name, req.email)?;
    match outcome {
        UpdateOutcome::Updated(user) => {
            tracing::info!("{} updated user {}", claims.sub, user.id);
            Ok(Json(UserSummary::from(&user)))
        }
        UpdateOutcome::NotFound => Err(AppError::NotFound("Unknown user")),
        UpdateOutcome::EmailTaken => Err(AppError::BadRequest("Email already taken".to_string())),
    }
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Authenticated(claims): Authenticated,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if !state.users.write().await.remove(&id)? {
        return Err(AppError::NotFound("Unknown user"));
    }
    tracing::info!("{} deleted user {}", claims.sub, id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    _auth: Authenticated,
    Path(id): Path<String>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    if req.password_new.is_empty() {
        return Err(AppError::BadRequest("Password must not be empty".to_string()));
    }

    let current_hash = state
        .users
        .read()
        .await
        .get(&id)
        .map(|u| u.password_hash.clone())
        .ok_or(AppError::NotFound("Unknown user"))?;

    if !state.passwords.verify(&req.password_old, &current_hash).await? {
        return Err(AppError::Unauthorized("Wrong password"));
    }

    let password_hash = state.passwords.hash(&req.password_new).await?;
    if !state.users.write().await.set_password(&id, password_hash)? {
        return Err(AppError::NotFound("Unknown user"));
    }
    Ok(StatusCode::NO_CONTENT)
}
