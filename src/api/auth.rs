use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::auth::token::Claims;
use crate::error::AppError;
use crate::state::AppState;

/// Claims of a valid `Authorization: Bearer <jwt>` session token.
pub struct Authenticated(pub Claims);

impl FromRequestParts<Arc<AppState>> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(AppError::Unauthorized("Missing Authorization header"))?
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid Authorization header value"))?
            .strip_prefix("Bearer ")
            .ok_or(AppError::Unauthorized("Expected Bearer token"))?;

        let claims = state.tokens.verify(token).map_err(|e| {
            tracing::debug!("Rejected session token: {}", e);
            AppError::Unauthorized("Invalid or expired token")
        })?;
        Ok(Authenticated(claims))
    }
}
