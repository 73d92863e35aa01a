use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::User;

/// Request body for `POST /auth/signup`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignUpRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for `POST /auth/signin`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignInRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Identity asserted by an external provider, `POST /auth/google`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FederatedSignInRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub photo: Option<String>,
}

/// User as returned to the client; carries no credential material.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            avatar: u.avatar,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_user_never_carries_password_hash() {
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@x.com".into(),
            password_hash: "$argon2id$secret-hash".into(),
            avatar: None,
            created_at: now,
            updated_at: now,
        };
        let raw = serde_json::to_string(&user).unwrap();
        assert!(!raw.contains("secret-hash"));

        let public = serde_json::to_value(PublicUser::from(user)).unwrap();
        assert_eq!(public["username"], "alice");
        assert!(public.get("_id").is_some());
        assert!(public.get("passwordHash").is_none());
        assert!(public.get("password_hash").is_none());
    }

    #[test]
    fn missing_fields_deserialize_as_empty() {
        let req: SignUpRequest = serde_json::from_str(r#"{"email":"a@b.co"}"#).unwrap();
        assert!(req.username.is_empty());
        assert!(req.password.is_empty());
    }
}
