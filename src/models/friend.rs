use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a friend request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "friend_request_status", rename_all = "snake_case")]
pub enum FriendRequestStatus {
    Pending,
    Accepted,
    Declined,
}

/// A request from one user to befriend another
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FriendRequest {
    pub id: Uuid,
    pub from_user: Uuid,
    pub to_user: Uuid,
    pub status: FriendRequestStatus,
    pub created_at: DateTime<Utc>,
}

/// An accepted friend as returned to the client
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Friend {
    pub id: Uuid,
    pub username: String,
    pub since: DateTime<Utc>,
}

/// Normalizes a friendship pair so the smaller uuid always comes first.
///
/// The friendships table stores each edge once; lookups must use the same
/// ordering as inserts.
pub fn normalize_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_pair_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(normalize_pair(a, b), normalize_pair(b, a));
    }

    #[test]
    fn test_normalize_pair_smaller_first() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (first, second) = normalize_pair(a, b);
        assert!(first <= second);
    }

    #[test]
    fn test_request_status_serialization() {
        let json = serde_json::to_string(&FriendRequestStatus::Pending).unwrap();
        assert_eq!(json, "\"pending\"");
    }
}
