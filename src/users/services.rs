use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{
    password::hash_password,
    repo::UserStore,
    repo_types::{User, UserChanges},
    services::{is_valid_email, normalize_email},
};
use crate::error::{AppError, AppResult};
use crate::users::dto::UpdateProfileRequest;

pub(crate) fn ensure_self(identity: Uuid, target: Uuid, action: &str) -> AppResult<()> {
    if identity != target {
        warn!(%identity, %target, "profile access denied");
        return Err(AppError::Unauthorized(format!(
            "You can only {action} your own account!"
        )));
    }
    Ok(())
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub async fn update_profile(
    users: &dyn UserStore,
    identity: Uuid,
    target: Uuid,
    req: UpdateProfileRequest,
) -> AppResult<User> {
    ensure_self(identity, target, "update")?;

    let email = non_empty(req.email).map(|e| normalize_email(&e));
    if let Some(email) = &email {
        if !is_valid_email(email) {
            return Err(AppError::Validation("Invalid email".into()));
        }
    }
    let password_hash = match req.password.filter(|p| !p.is_empty()) {
        Some(p) => Some(hash_password(&p)?),
        None => None,
    };

    let changes = UserChanges {
        username: non_empty(req.username),
        email,
        password_hash,
        avatar: non_empty(req.avatar),
    };

    let user = users
        .update(target, changes)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    info!(user_id = %user.id, "profile updated");
    Ok(user)
}

/// Deletes the account together with every listing it owns.
pub async fn delete_account(users: &dyn UserStore, identity: Uuid, target: Uuid) -> AppResult<()> {
    ensure_self(identity, target, "delete")?;
    if !users.delete(target).await? {
        return Err(AppError::NotFound("User not found".into()));
    }
    info!(user_id = %target, "account deleted");
    Ok(())
}
