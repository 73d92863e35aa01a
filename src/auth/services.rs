use std::time::Duration;

use axum_extra::extract::cookie::{Cookie, SameSite};
use lazy_static::lazy_static;
use rand::Rng;
use uuid::Uuid;
use regex::Regex;
use tracing::{info, warn};

use crate::auth::{
    jwt::JwtKeys,
    password::{generate_password, hash_password, verify_password},
    repo::UserStore,
    repo_types::{NewUser, User},
};
use crate::error::{AppError, AppResult, STALE_ACCOUNT};

pub const SESSION_COOKIE: &str = "access_token";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Signed token together with the user it was issued for.
#[derive(Debug)]
pub struct Session {
    pub token: String,
    pub user: User,
}

/// Identity asserted by an external provider.
#[derive(Debug, Clone)]
pub struct FederatedIdentity {
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

pub async fn sign_up(
    users: &dyn UserStore,
    username: &str,
    email: &str,
    password: &str,
) -> AppResult<User> {
    let username = username.trim();
    let email = normalize_email(email);

    if username.is_empty() || email.is_empty() || password.is_empty() {
        return Err(AppError::Validation("All fields are required".into()));
    }
    if !is_valid_email(&email) {
        return Err(AppError::Validation("Invalid email".into()));
    }

    if users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let password_hash = hash_password(password)?;
    let user = users
        .insert(NewUser {
            username: username.to_string(),
            email,
            password_hash,
            avatar: None,
        })
        .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

pub async fn sign_in(
    users: &dyn UserStore,
    keys: &JwtKeys,
    email: &str,
    password: &str,
) -> AppResult<Session> {
    let email = normalize_email(email);
    if email.is_empty() || password.is_empty() {
        return Err(AppError::Validation("Email and password are required".into()));
    }

    let user = users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "sign-in with invalid password");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    let token = keys.sign(user.id)?;
    info!(user_id = %user.id, "user signed in");
    Ok(Session { token, user })
}

/// Loads the account behind an authenticated identity. Tokens outlive account
/// deletion, so a missing row is an auth failure rather than a lookup miss.
pub async fn require_account(users: &dyn UserStore, user_id: Uuid) -> AppResult<User> {
    users.find_by_id(user_id).await?.ok_or_else(|| {
        warn!(%user_id, "token names a deleted account");
        AppError::Unauthorized(STALE_ACCOUNT.into())
    })
}

/// Signs in by provider-asserted email, provisioning a local account on first use.
pub async fn sign_in_federated(
    users: &dyn UserStore,
    keys: &JwtKeys,
    identity: FederatedIdentity,
) -> AppResult<Session> {
    let email = normalize_email(&identity.email);
    let name = identity.display_name.trim();
    if email.is_empty() || name.is_empty() {
        return Err(AppError::Validation(
            "Email and name are required from Google".into(),
        ));
    }

    if let Some(user) = users.find_by_email(&email).await? {
        let token = keys.sign(user.id)?;
        info!(user_id = %user.id, "federated sign-in");
        return Ok(Session { token, user });
    }

    let password_hash = hash_password(&generate_password())?;
    let user = users
        .insert(NewUser {
            username: derive_username(name),
            email,
            password_hash,
            avatar: identity.avatar_url.filter(|a| !a.trim().is_empty()),
        })
        .await?;

    let token = keys.sign(user.id)?;
    info!(user_id = %user.id, username = %user.username, "federated account provisioned");
    Ok(Session { token, user })
}

/// Lower-cased display name without whitespace plus a numeric suffix in `0..10000`.
pub(crate) fn derive_username(display_name: &str) -> String {
    let base: String = display_name
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    let suffix: u32 = rand::thread_rng().gen_range(0..10_000);
    format!("{base}{suffix}")
}

pub fn session_cookie(token: String, ttl: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .max_age(time::Duration::seconds(ttl.as_secs() as i64))
        .build()
}

/// Expired session cookie; sent even when the request carried none.
pub fn cleared_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::ZERO)
        .expires(time::OffsetDateTime::UNIX_EPOCH)
        .build()
}
