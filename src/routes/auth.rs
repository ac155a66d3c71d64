use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::{error::AppResult, models::Profile, routes::AppState, services::auth};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub profile: Profile,
}

/// Handler for account registration
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let user = auth::register(
        &state.pool,
        &request.username,
        &request.email,
        &request.password,
    )
    .await?;

    let token = auth::issue_token(user.id, &state.config.jwt_secret, state.config.jwt_ttl_secs)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            profile: Profile::from(&user),
        }),
    ))
}

/// Handler for login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let user = auth::login(&state.pool, &request.username, &request.password).await?;
    let token = auth::issue_token(user.id, &state.config.jwt_secret, state.config.jwt_ttl_secs)?;

    Ok(Json(AuthResponse {
        token,
        profile: Profile::from(&user),
    }))
}
