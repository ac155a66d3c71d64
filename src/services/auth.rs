use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{RemoteViewer, User};
use crate::services::providers::CatalogProvider;

const MIN_PASSWORD_LEN: usize = 8;
const MAX_USERNAME_LEN: usize = 32;

/// JWT claims carried by every session token
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    /// Expiry, seconds since epoch
    pub exp: usize,
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Generates a fresh random salt for password hashing
pub fn generate_salt() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex_encode(&bytes)
}

/// Salted SHA-256 password hash, hex encoded
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex_encode(&hasher.finalize())
}

pub fn verify_password(password: &str, salt: &str, expected_hash: &str) -> bool {
    hash_password(password, salt) == expected_hash
}

/// Signs a session token for the given user
pub fn issue_token(user_id: Uuid, secret: &str, ttl_secs: u64) -> AppResult<String> {
    let exp = Utc::now().timestamp() as usize + ttl_secs as usize;
    let claims = Claims { sub: user_id, exp };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
}

/// Verifies a session token and returns the user id it was issued for
pub fn verify_token(token: &str, secret: &str) -> AppResult<Uuid> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;
    Ok(data.claims.sub)
}

/// Registers a new account
pub async fn register(
    pool: &PgPool,
    username: &str,
    email: &str,
    password: &str,
) -> AppResult<User> {
    let username = username.trim();
    let email = email.trim();

    if username.is_empty() || username.len() > MAX_USERNAME_LEN {
        return Err(AppError::InvalidInput(format!(
            "Username must be between 1 and {} characters",
            MAX_USERNAME_LEN
        )));
    }
    if !email.contains('@') {
        return Err(AppError::InvalidInput("Invalid email address".to_string()));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::InvalidInput(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let taken: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM users WHERE username = $1 OR email = $2")
            .bind(username)
            .bind(email)
            .fetch_optional(pool)
            .await?;

    if taken.is_some() {
        return Err(AppError::Conflict(
            "Username or email is already in use".to_string(),
        ));
    }

    let salt = generate_salt();
    let user = User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        email: email.to_string(),
        password_hash: hash_password(password, &salt),
        password_salt: salt,
        anilist_token: None,
        anilist_user_id: None,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO users (id, username, email, password_hash, password_salt, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(user.id)
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.password_salt)
    .bind(user.created_at)
    .execute(pool)
    .await?;

    tracing::info!(user_id = %user.id, username = %user.username, "User registered");

    Ok(user)
}

/// Verifies credentials and returns the account
pub async fn login(pool: &PgPool, username: &str, password: &str) -> AppResult<User> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = $1")
        .bind(username.trim())
        .fetch_optional(pool)
        .await?;

    // Same error for unknown user and wrong password
    let user = user.ok_or_else(|| {
        AppError::Unauthorized("Invalid username or password".to_string())
    })?;

    if !verify_password(password, &user.password_salt, &user.password_hash) {
        return Err(AppError::Unauthorized(
            "Invalid username or password".to_string(),
        ));
    }

    Ok(user)
}

/// Loads an account by id
pub async fn find_user(pool: &PgPool, user_id: Uuid) -> AppResult<User> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    user.ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Links an AniList account by validating the supplied token against the API
/// and storing it alongside the resolved viewer id.
pub async fn link_anilist(
    pool: &PgPool,
    catalog: &dyn CatalogProvider,
    user_id: Uuid,
    token: &str,
) -> AppResult<RemoteViewer> {
    if token.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "AniList token cannot be empty".to_string(),
        ));
    }

    let viewer = catalog.viewer(token).await?;

    sqlx::query("UPDATE users SET anilist_token = $1, anilist_user_id = $2 WHERE id = $3")
        .bind(token)
        .bind(viewer.id)
        .bind(user_id)
        .execute(pool)
        .await?;

    tracing::info!(
        user_id = %user_id,
        anilist_user_id = viewer.id,
        "AniList account linked"
    );

    Ok(viewer)
}

/// Removes the stored AniList link
pub async fn unlink_anilist(pool: &PgPool, user_id: Uuid) -> AppResult<()> {
    sqlx::query("UPDATE users SET anilist_token = NULL, anilist_user_id = NULL WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;

    tracing::info!(user_id = %user_id, "AniList account unlinked");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_verify_round_trip() {
        let salt = generate_salt();
        let hash = hash_password("correct horse battery staple", &salt);
        assert!(verify_password("correct horse battery staple", &salt, &hash));
        assert!(!verify_password("wrong password", &salt, &hash));
    }

    #[test]
    fn test_same_password_different_salt_differs() {
        let first = hash_password("hunter22222", &generate_salt());
        let second = hash_password("hunter22222", &generate_salt());
        assert_ne!(first, second);
    }

    #[test]
    fn test_token_round_trip() {
        let user_id = Uuid::new_v4();
        let token = issue_token(user_id, "secret", 3600).unwrap();
        let decoded = verify_token(&token, "secret").unwrap();
        assert_eq!(decoded, user_id);
    }

    #[test]
    fn test_token_rejects_wrong_secret() {
        let token = issue_token(Uuid::new_v4(), "secret", 3600).unwrap();
        assert!(verify_token(&token, "other-secret").is_err());
    }

    #[test]
    fn test_token_rejects_garbage() {
        assert!(verify_token("not-a-jwt", "secret").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = issue_token(Uuid::new_v4(), "secret", 0).unwrap();
        // Default validation applies a 60s leeway, so force an already-old expiry
        let claims = Claims {
            sub: Uuid::new_v4(),
            exp: (Utc::now().timestamp() - 3600) as usize,
        };
        let stale = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert!(verify_token(&stale, "secret").is_err());
        // A zero-ttl token is within leeway and still decodes
        assert!(verify_token(&token, "secret").is_ok());
    }
}
