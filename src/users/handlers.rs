use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::{delete, put},
    Json, Router,
};
use axum_extra::extract::{cookie::CookieJar, WithRejection};
use tracing::instrument;
use uuid::Uuid;

use super::{dto::UpdateProfileRequest, services};
use crate::{
    auth::{
        dto::{MessageResponse, PublicUser},
        services::cleared_session_cookie,
        AuthUser,
    },
    error::{AppError, AppResult},
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user/update/:id", put(update_user))
        .route("/user/delete/:id", delete(delete_user))
}

#[instrument(skip(state, body))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    body: Bytes,
) -> AppResult<Json<PublicUser>> {
    services::ensure_self(user_id, id, "update")?;
    let payload: UpdateProfileRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("Invalid profile payload: {e}")))?;
    let user = services::update_profile(state.users.as_ref(), user_id, id, payload).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, jar))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<MessageResponse>)> {
    services::delete_account(state.users.as_ref(), user_id, id).await?;
    Ok((
        jar.add(cleared_session_cookie()),
        Json(MessageResponse::ok("User has been deleted!")),
    ))
}
