use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A registered account
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub password_salt: String,
    /// AniList access token supplied by the user when linking
    pub anilist_token: Option<String>,
    /// AniList viewer id resolved at link time
    pub anilist_user_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Public view of a user, safe to return to clients
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    pub anilist_linked: bool,
    pub anilist_user_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for Profile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            anilist_linked: user.anilist_token.is_some(),
            anilist_user_id: user.anilist_user_id,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user(token: Option<&str>) -> User {
        User {
            id: Uuid::new_v4(),
            username: "rin".to_string(),
            email: "rin@example.com".to_string(),
            password_hash: "hash".to_string(),
            password_salt: "salt".to_string(),
            anilist_token: token.map(str::to_string),
            anilist_user_id: token.map(|_| 54321),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_profile_hides_credentials() {
        let user = test_user(Some("secret-token"));
        let profile = Profile::from(&user);

        let json = serde_json::to_string(&profile).unwrap();
        assert!(!json.contains("secret-token"));
        assert!(!json.contains("hash"));
        assert!(json.contains("rin"));
    }

    #[test]
    fn test_profile_reports_link_state() {
        assert!(Profile::from(&test_user(Some("t"))).anilist_linked);
        assert!(!Profile::from(&test_user(None)).anilist_linked);
    }
}
