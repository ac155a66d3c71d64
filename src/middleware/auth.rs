use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::routes::AppState;
use crate::services::auth;

/// Authenticated user id, inserted into request extensions by [`require_auth`]
#[derive(Clone, Copy, Debug)]
pub struct AuthUser(pub Uuid);

/// Middleware guarding authenticated routes.
///
/// Expects an `Authorization: Bearer <jwt>` header; rejects the request with
/// 401 before it reaches a handler otherwise.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> AppResult<Response> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

    let user_id = auth::verify_token(token, &state.config.jwt_secret)?;

    request.extensions_mut().insert(AuthUser(user_id));

    Ok(next.run(request).await)
}
